// # CSV Audit Sink
//
// Append-only audit log of every accepted datagram.
//
// ## File Format
//
// ```csv
// ts,data
// 2025-01-09T12:00:00.123456Z,1
// ```
//
// ## Durability
//
// - The file (and its parent directory) is created lazily on first append
// - The header is written exactly once, when the file is missing or empty
// - Appends are serialized through a per-sink mutex so rows from concurrent
//   handler invocations never interleave
// - Each row is synced to disk before the append returns

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::traits::{Datagram, DatagramHandler};

/// One row of the audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Capture time (UTC, ISO-8601)
    pub ts: DateTime<Utc>,
    /// Decoded payload
    pub data: String,
}

/// Append-only CSV writer for `AuditRecord`s
#[derive(Debug)]
pub struct CsvAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvAuditSink {
    /// Create a sink writing to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the audit log
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode `data` and append it stamped with the current time
    pub async fn append(&self, data: &[u8]) -> Result<(), Error> {
        let text = std::str::from_utf8(data)?;
        self.append_record(&AuditRecord {
            ts: Utc::now(),
            data: text.to_string(),
        })
        .await
    }

    /// Append a prepared record
    pub async fn append_record(&self, record: &AuditRecord) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        let needs_header = match fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.ensure_parent_dir().await?;
                true
            }
            Err(e) => {
                return Err(Error::audit_sink(format!(
                    "Failed to stat audit log {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let row = encode_row(record, needs_header)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                Error::audit_sink(format!(
                    "Failed to open audit log {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        file.write_all(&row).await.map_err(|e| {
            Error::audit_sink(format!(
                "Failed to append to audit log {}: {}",
                self.path.display(),
                e
            ))
        })?;
        file.sync_data().await.map_err(|e| {
            Error::audit_sink(format!(
                "Failed to sync audit log {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Read every record back (used by tooling and tests)
    pub async fn records(&self) -> Result<Vec<AuditRecord>, Error> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::Reader::from_reader(content.as_slice());
        let records = reader.deserialize().collect::<Result<Vec<AuditRecord>, _>>()?;
        Ok(records)
    }

    async fn ensure_parent_dir(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::audit_sink(format!(
                    "Failed to create audit directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

/// Serialize one row (and the header, if requested) into a buffer
fn encode_row(record: &AuditRecord, with_header: bool) -> Result<Vec<u8>, Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());
    writer.serialize(record)?;
    writer
        .into_inner()
        .map_err(|e| Error::audit_sink(format!("Failed to encode audit row: {}", e)))
}

#[async_trait]
impl DatagramHandler for CsvAuditSink {
    async fn handle(&self, datagram: &Datagram) -> Result<(), Error> {
        self.append(&datagram.payload).await
    }

    fn name(&self) -> &'static str {
        "store"
    }
}
