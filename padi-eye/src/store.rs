//! Append-only detection record store backed by sled

use crate::error::{Result, VisionError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// A persisted detection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: u64,
    /// Sorted, de-duplicated labels joined by ", "
    pub object_name: String,
    /// Threshold the detection was run with, as text
    pub confidence: String,
    /// Base64 of the JPEG-encoded annotated frame
    pub image_base64: String,
    pub timestamp: DateTime<Utc>,
}

/// Record contents before the store assigns an id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub object_name: String,
    pub confidence: String,
    pub image_base64: String,
}

/// Storage seam for detection records.
///
/// Records are never updated or deleted once inserted.
pub trait DetectionStore: Send + Sync {
    /// Persist a record, returning it with its assigned id and timestamp
    fn insert(&self, record: NewRecord) -> Result<DetectionRecord>;

    /// Every record in ascending id order
    fn list_all(&self) -> Result<Vec<DetectionRecord>>;
}

/// sled-backed [`DetectionStore`].
///
/// Holds one handle for its whole lifetime: sled takes an exclusive lock on
/// the database directory, so a second open while this one lives fails.
pub struct RecordStore {
    db: sled::Db,
    write_lock: Mutex<()>,
}

impl RecordStore {
    /// Open or create the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    VisionError::Persistence(format!("Cannot create {:?}: {}", parent, e))
                })?;
            }
        }

        let db = sled::open(path)
            .map_err(|e| VisionError::Persistence(format!("Cannot open store {:?}: {}", path, e)))?;
        info!("Opened detection store at {:?} ({} records)", path, db.len());

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// In-memory store that is discarded on drop
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    fn last_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        match self.db.last()? {
            Some((_, value)) => {
                let record: DetectionRecord = bincode::deserialize(&value)?;
                Ok(Some(record.timestamp))
            }
            None => Ok(None),
        }
    }
}

impl DetectionStore for RecordStore {
    fn insert(&self, record: NewRecord) -> Result<DetectionRecord> {
        let _guard = self.write_lock.lock();

        // Ids start at 1 and big-endian keys keep sled iteration in id order
        let id = self.db.generate_id()? + 1;
        let now = Utc::now();
        let timestamp = match self.last_timestamp()? {
            Some(last) if last > now => last,
            _ => now,
        };

        let stored = DetectionRecord {
            id,
            object_name: record.object_name,
            confidence: record.confidence,
            image_base64: record.image_base64,
            timestamp,
        };

        let value = bincode::serialize(&stored)?;
        self.db.insert(id.to_be_bytes(), value)?;
        self.db.flush()?;

        debug!("Stored detection record {} ({:?})", id, stored.object_name);
        Ok(stored)
    }

    fn list_all(&self) -> Result<Vec<DetectionRecord>> {
        self.db
            .iter()
            .values()
            .map(|value| {
                let value = value?;
                Ok(bincode::deserialize::<DetectionRecord>(&value)?)
            })
            .collect()
    }
}
