// Padi Eye Command Line Interface
// Runs the detector over images, stored video, webcams and YouTube, and browses past results

mod sink;

use anyhow::Context;
use clap::{Parser, Subcommand};
use image::ImageFormat;
use padi_eye::source::RoutingFetcher;
use padi_eye::{
    process_image, run_stream, DetectorAdapter, FrameSink, FrameSource, FrameStream,
    HistoryReader, ImageInput, RecordStore, ResultRecorder, StopSignal, VisionConfig,
};
use sink::{JpegFileSink, LogSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "padi")]
#[command(about = "Padi Eye - object detection on images, video, webcams and YouTube", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON or TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Confidence threshold in percent (0-100)
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..=100))]
    confidence: Option<u8>,

    /// Directory annotated frames are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect objects in a single image and record the result
    Image {
        /// Image file (jpg, jpeg, png, bmp, webp)
        path: PathBuf,
    },

    /// Detect objects in every frame of a stored video
    Video {
        /// Video file
        path: PathBuf,
    },

    /// Detect objects on a live webcam stream until Ctrl-C
    Webcam {
        /// Camera device index (defaults to the configured index)
        #[arg(long, short)]
        index: Option<u32>,
    },

    /// Download a YouTube (or plain HTTP) video and detect objects in it
    Youtube {
        /// Video URL
        url: String,
    },

    /// List recorded detection results
    History {
        /// Write every recorded image to this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = load_config(cli.config.as_deref(), cli.confidence)?;

    match cli.command {
        Commands::Image { path } => {
            detect_image(&config, path, cli.output_dir.as_deref())?;
        }
        Commands::Video { path } => {
            let stream = FrameSource::StoredVideo(path).open_local()?;
            detect_stream(&config, stream, cli.output_dir).await?;
        }
        Commands::Webcam { index } => {
            let index = index.unwrap_or(config.webcam_index);
            let stream = FrameSource::WebcamDevice(index).open_local()?;
            detect_stream(&config, stream, cli.output_dir).await?;
        }
        Commands::Youtube { url } => {
            let fetcher = RoutingFetcher::from_config(&config)?;
            let stream = FrameSource::RemoteVideo(url).open(&fetcher).await?;
            detect_stream(&config, stream, cli.output_dir).await?;
        }
        Commands::History { export_dir } => {
            show_history(&config, export_dir.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>, confidence_percent: Option<u8>) -> anyhow::Result<VisionConfig> {
    let mut config = match path {
        Some(path) => VisionConfig::from_file(path)?,
        None => VisionConfig::default(),
    }
    .with_env();

    if let Some(percent) = confidence_percent {
        config.confidence = f32::from(percent) / 100.0;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(feature = "onnx")]
fn load_detector(config: &VisionConfig) -> anyhow::Result<DetectorAdapter> {
    let model = padi_eye::models::YoloModel::new(config)
        .with_context(|| format!("Failed to load model {:?}", config.model_path))?;
    Ok(DetectorAdapter::new(Box::new(model)))
}

#[cfg(not(feature = "onnx"))]
fn load_detector(_config: &VisionConfig) -> anyhow::Result<DetectorAdapter> {
    anyhow::bail!("padi was built without the `onnx` feature; rebuild with `--features onnx`")
}

fn open_store(config: &VisionConfig) -> anyhow::Result<Arc<RecordStore>> {
    let store = RecordStore::open(&config.database_path)
        .with_context(|| format!("Failed to open {:?}", config.database_path))?;
    Ok(Arc::new(store))
}

fn detect_image(config: &VisionConfig, path: PathBuf, output_dir: Option<&Path>) -> anyhow::Result<()> {
    let mut adapter = load_detector(config)?;
    let recorder = ResultRecorder::new(open_store(config)?, config.jpeg_quality);

    let outcome = process_image(
        ImageInput::Path(path),
        &mut adapter,
        &recorder,
        config.confidence,
        config.display_height,
    )?;

    println!("Detected {} objects", outcome.detections.len());
    for detection in &outcome.detections {
        println!(
            "  {:<20} {:>5.1}%  at ({:.0}, {:.0}) {:.0}x{:.0}",
            detection.label,
            detection.confidence * 100.0,
            detection.bbox.x,
            detection.bbox.y,
            detection.bbox.width,
            detection.bbox.height
        );
    }

    match &outcome.record {
        Ok(record) => println!("Saved as record {}", record.id),
        Err(e) => warn!("Result shown but not saved: {}", e),
    }

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;
        outcome.uploaded.save_with_format(dir.join("uploaded.jpg"), ImageFormat::Jpeg)?;
        outcome.result.save_with_format(dir.join("result.jpg"), ImageFormat::Jpeg)?;
        println!("Wrote uploaded.jpg and result.jpg to {:?}", dir);
    }

    Ok(())
}

async fn detect_stream(
    config: &VisionConfig,
    stream: FrameStream,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut adapter = load_detector(config)?;
    let mut sink: Box<dyn FrameSink + Send> = match output_dir {
        Some(dir) => Box::new(JpegFileSink::new(dir)?),
        None => Box::new(LogSink),
    };

    let stop = StopSignal::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current frame");
            ctrl_c_stop.stop();
        }
    });

    let confidence = config.confidence;
    let display_height = config.display_height;
    let summary = tokio::task::spawn_blocking(move || {
        run_stream(
            stream,
            &mut adapter,
            confidence,
            display_height,
            sink.as_mut(),
            &stop,
        )
    })
    .await??;

    println!(
        "Processed {} frames with {} detections{}",
        summary.frames,
        summary.detections,
        if summary.stopped { " (stopped)" } else { "" }
    );
    Ok(())
}

fn show_history(config: &VisionConfig, export_dir: Option<&Path>) -> anyhow::Result<()> {
    let reader = HistoryReader::new(open_store(config)?);
    let entries = reader.entries(config.display_height)?;

    if entries.is_empty() {
        println!("No detections recorded yet");
        return Ok(());
    }

    println!("{:<6} {:<20} {:<10} {}", "ID", "TIMESTAMP", "CONF", "OBJECTS");
    for entry in &entries {
        println!(
            "{:<6} {:<20} {:<10} {}",
            entry.id, entry.timestamp, entry.confidence, entry.object_name
        );
    }

    if let Some(dir) = export_dir {
        std::fs::create_dir_all(dir)?;
        for entry in &entries {
            entry.image.save_with_format(dir.join(format!("{}.jpg", entry.id)), ImageFormat::Jpeg)?;
        }
        println!("Exported {} images to {:?}", entries.len(), dir);
    }

    Ok(())
}
