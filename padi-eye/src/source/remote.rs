//! Fetching remote video into a local file

use crate::config::VisionConfig;
use crate::error::{Result, VisionError};
use async_trait::async_trait;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

const MAX_URL_LEN: usize = 2048;
const MAX_VIDEO_SIZE: u64 = 4_000_000_000;

/// Downloads a remote video and returns the local file it was written to
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PathBuf>;
}

/// Accept only http(s) URLs of sane length
pub fn validate_url(url: &str) -> Result<Url> {
    if url.is_empty() || url.len() > MAX_URL_LEN {
        return Err(VisionError::FetchFailed("Invalid URL".to_string()));
    }

    let parsed = Url::parse(url)
        .map_err(|e| VisionError::FetchFailed(format!("Unsupported URL {}: {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(VisionError::FetchFailed(format!(
                "Unsupported URL scheme '{}'",
                other
            )))
        }
    }

    if parsed.host_str().is_none() {
        return Err(VisionError::FetchFailed(format!("URL {} has no host", url)));
    }

    Ok(parsed)
}

/// True for hosts served by the external downloader rather than plain HTTP
pub fn is_youtube_host(url: &Url) -> bool {
    match url.host_str() {
        Some(host) => {
            let host = host.trim_start_matches("www.").trim_start_matches("m.");
            host == "youtube.com" || host == "youtu.be" || host.ends_with(".youtube.com")
        }
        None => false,
    }
}

async fn ensure_download_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).await.map_err(|e| {
        VisionError::FetchFailed(format!("Failed to create download directory {:?}: {}", dir, e))
    })
}

fn unique_target(dir: &Path) -> PathBuf {
    dir.join(format!("{}.mp4", uuid::Uuid::new_v4()))
}

/// Runs an external `yt-dlp` compatible program
pub struct YtDlpFetcher {
    program: String,
    download_dir: PathBuf,
    timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<String>, download_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            download_dir,
            timeout,
        }
    }
}

#[async_trait]
impl RemoteFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        validate_url(url)?;
        ensure_download_dir(&self.download_dir).await?;
        let target = unique_target(&self.download_dir);

        info!("Downloading {} with {}", url, self.program);
        let child = Command::new(&self.program)
            .args(["-f", "best", "--no-playlist", "-o"])
            .arg(&target)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                VisionError::FetchFailed(format!("Failed to start downloader '{}': {}", self.program, e))
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                VisionError::FetchFailed(format!("Downloader '{}' failed: {}", self.program, e))
            })?,
            Err(_) => {
                let _ = fs::remove_file(&target).await;
                return Err(VisionError::FetchFailed(format!(
                    "Download of {} timed out after {:?}",
                    url, self.timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .trim()
                .to_string();
            warn!("Downloader failed for {}: {}", url, reason);
            let _ = fs::remove_file(&target).await;
            return Err(VisionError::FetchFailed(format!(
                "Downloader exited with {}: {}",
                output.status, reason
            )));
        }

        if !target.is_file() {
            return Err(VisionError::FetchFailed(format!(
                "Downloader reported success but {:?} is missing",
                target
            )));
        }

        debug!("Downloader output: {}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(target)
    }
}

/// Plain HTTP(S) download of a video file
pub struct HttpFetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
    max_size: u64,
}

impl HttpFetcher {
    pub fn new(download_dir: PathBuf, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            download_dir,
            max_size: MAX_VIDEO_SIZE,
        })
    }

    /// Override the largest body accepted, in bytes
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    fn too_large(&self, size: u64) -> VisionError {
        VisionError::FetchFailed(format!(
            "Video too large: {} bytes (max {} bytes)",
            size, self.max_size
        ))
    }

    /// Stream the body into `path`, enforcing the size cap as chunks arrive.
    async fn download_body(&self, mut response: reqwest::Response, path: &Path) -> Result<u64> {
        let mut file = fs::File::create(path)
            .await
            .map_err(|e| VisionError::FetchFailed(format!("Failed to write video: {}", e)))?;
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| VisionError::FetchFailed(format!("Reading body failed: {}", e)))?
        {
            written = written.saturating_add(chunk.len() as u64);
            if written > self.max_size {
                return Err(self.too_large(written));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| VisionError::FetchFailed(format!("Failed to write video: {}", e)))?;
        }

        file.flush()
            .await
            .map_err(|e| VisionError::FetchFailed(format!("Failed to write video: {}", e)))?;
        Ok(written)
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        let url = validate_url(url)?;
        ensure_download_dir(&self.download_dir).await?;

        info!("Downloading {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| VisionError::FetchFailed(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(VisionError::FetchFailed(format!(
                "Failed to download video: HTTP {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_size {
                return Err(self.too_large(content_length));
            }
        }

        // Only complete downloads carry the .mp4 name
        let target = unique_target(&self.download_dir);
        let temp_path = target.with_extension("part");

        let written = match self.download_body(response, &temp_path).await {
            Ok(0) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(VisionError::FetchFailed(format!("{} returned an empty body", url)));
            }
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, &target).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(VisionError::FetchFailed(format!("Failed to store video: {}", e)));
        }

        info!("Downloaded {} bytes to {:?}", written, target);
        Ok(target)
    }
}

/// Sends YouTube URLs to the external downloader and everything else over HTTP
pub struct RoutingFetcher {
    downloader: YtDlpFetcher,
    http: HttpFetcher,
}

impl RoutingFetcher {
    pub fn new(downloader: YtDlpFetcher, http: HttpFetcher) -> Self {
        Self { downloader, http }
    }

    pub fn from_config(config: &VisionConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.fetch_timeout_secs);
        Ok(Self::new(
            YtDlpFetcher::new(config.downloader.clone(), config.download_dir.clone(), timeout),
            HttpFetcher::new(config.download_dir.clone(), timeout)?,
        ))
    }
}

#[async_trait]
impl RemoteFetcher for RoutingFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        let parsed = validate_url(url)?;
        if is_youtube_host(&parsed) {
            self.downloader.fetch(url).await
        } else {
            self.http.fetch(url).await
        }
    }
}
