//! Append-only per-call logs of relayed audio and AI text responses.
//!
//! Retention is decided by the [`CallLogFactory`] the relay is built with.
//! [`FileCallLogFactory`] writes two flat files per call and rotates each one
//! to `<name>.1` before it would exceed a byte bound.

use crate::{error::RelayError, session::CallId};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{debug, info, warn};

/// Default rotation bound for a single log file (10 MiB).
pub const DEFAULT_MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Direction of a relayed audio payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDirection {
    /// Caller audio received from telephony.
    Received,
    /// Assistant audio sent to telephony.
    Sent,
}

impl fmt::Display for AudioDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioDirection::Received => write!(f, "received"),
            AudioDirection::Sent => write!(f, "sent"),
        }
    }
}

/// The two append-only logs of a single call.
#[async_trait]
pub trait CallLog: Send + Sync {
    /// Appends one audio record.
    async fn record_audio(&self, direction: AudioDirection, payload: &str)
    -> Result<(), RelayError>;

    /// Appends one AI text response.
    async fn record_text(&self, text: &str) -> Result<(), RelayError>;

    /// Flushes and closes both logs. Closing twice is a no-op.
    async fn close(&self) -> Result<(), RelayError>;
}

/// Opens the logs of a new call.
#[async_trait]
pub trait CallLogFactory: Send + Sync {
    async fn open(&self, call_id: &CallId) -> Result<Arc<dyn CallLog>, RelayError>;
}

/// A log that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCallLog;

#[async_trait]
impl CallLog for NullCallLog {
    async fn record_audio(&self, _: AudioDirection, _: &str) -> Result<(), RelayError> {
        Ok(())
    }

    async fn record_text(&self, _: &str) -> Result<(), RelayError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, false)
}

/// Formats an audio log line (without the trailing newline).
pub fn audio_line(direction: AudioDirection, payload: &str) -> String {
    format!("{} {} {}", timestamp(), direction, payload)
}

/// Formats a text log line (without the trailing newline). Embedded line
/// breaks are escaped so each response stays on one line.
pub fn text_line(text: &str) -> String {
    let escaped = text.replace('\r', "\\r").replace('\n', "\\n");
    format!("{} {}", timestamp(), escaped)
}

/// A single append-only file with size-bounded rotation.
#[derive(Debug)]
struct RotatingFile {
    path: PathBuf,
    file: Option<File>,
    written: u64,
    max_bytes: u64,
}

impl RotatingFile {
    async fn open(path: PathBuf, max_bytes: u64) -> Result<Self, RelayError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let written = file.metadata().await?.len();
        Ok(Self {
            path,
            file: Some(file),
            written,
            max_bytes,
        })
    }

    fn rotated_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".1");
        PathBuf::from(name)
    }

    /// Moves the current file aside and starts a new one at the same path.
    ///
    /// The current handle is only replaced once the new file is open. If the
    /// file was moved or deleted externally, writing resumes in a fresh file.
    async fn rotate(&mut self) -> Result<(), RelayError> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
        }
        let rotated = self.rotated_path();
        match tokio::fs::rename(&self.path, &rotated).await {
            Ok(()) => {
                debug!(path = %self.path.display(), rotated = %rotated.display(), "Rotated call log");
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not rotate call log, starting a new file");
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        self.file = Some(file);
        self.written = 0;
        Ok(())
    }

    async fn append(&mut self, line: &str) -> Result<(), RelayError> {
        if self.file.is_none() {
            return Err(RelayError::LogClosed);
        }
        let len = line.len() as u64 + 1;
        if self.written > 0 && self.written + len > self.max_bytes {
            if let Err(e) = self.rotate().await {
                warn!(path = %self.path.display(), error = %e, "Call log rotation failed, appending to the current file");
            }
        }
        let file = self.file.as_mut().ok_or(RelayError::LogClosed)?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        file.write_all(&buf).await?;
        file.flush().await?;
        self.written += len;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}

/// File-backed logs of one call: `<call_id>.audio.log` and
/// `<call_id>.responses.log`.
#[derive(Debug)]
pub struct FileCallLog {
    audio: Mutex<RotatingFile>,
    text: Mutex<RotatingFile>,
}

impl FileCallLog {
    pub async fn open(dir: &Path, call_id: &CallId, max_bytes: u64) -> Result<Self, RelayError> {
        tokio::fs::create_dir_all(dir).await?;
        let audio =
            RotatingFile::open(dir.join(format!("{}.audio.log", call_id)), max_bytes).await?;
        let text =
            RotatingFile::open(dir.join(format!("{}.responses.log", call_id)), max_bytes).await?;
        Ok(Self {
            audio: Mutex::new(audio),
            text: Mutex::new(text),
        })
    }
}

#[async_trait]
impl CallLog for FileCallLog {
    async fn record_audio(
        &self,
        direction: AudioDirection,
        payload: &str,
    ) -> Result<(), RelayError> {
        self.audio
            .lock()
            .await
            .append(&audio_line(direction, payload))
            .await
    }

    async fn record_text(&self, text: &str) -> Result<(), RelayError> {
        self.text.lock().await.append(&text_line(text)).await
    }

    async fn close(&self) -> Result<(), RelayError> {
        let audio = self.audio.lock().await.close().await;
        let text = self.text.lock().await.close().await;
        audio.and(text)
    }
}

/// Creates a [`FileCallLog`] per call inside a directory.
#[derive(Debug, Clone)]
pub struct FileCallLogFactory {
    dir: PathBuf,
    max_bytes: u64,
}

impl FileCallLogFactory {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes: max_bytes.max(1),
        }
    }
}

#[async_trait]
impl CallLogFactory for FileCallLogFactory {
    async fn open(&self, call_id: &CallId) -> Result<Arc<dyn CallLog>, RelayError> {
        let log = FileCallLog::open(&self.dir, call_id, self.max_bytes).await?;
        info!(dir = %self.dir.display(), "Opened call logs");
        Ok(Arc::new(log))
    }
}
