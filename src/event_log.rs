//! Append-only lifecycle log.
//!
//! One [`EventLog`] is created at process start and handed by `&mut` to every
//! component that records milestones. Each line is `<timestamp> <message>`.
//! Messages are mirrored to the `log` facade so `RUST_LOG` shows them too.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Timestamp layout used for log lines and log file names.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H.%M.%S";

pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub struct EventLog {
    sink: Box<dyn Write>,
    path: Option<PathBuf>,
}

impl EventLog {
    /// Create `<dir>/<timestamp>.log`. The directory must already exist.
    pub fn create(dir: &Path) -> io::Result<Self> {
        let path = dir.join(format!("{}.log", timestamp()));
        Self::append_to(&path)
    }

    /// Open (or create) a specific log file in append mode.
    pub fn append_to(path: &Path) -> io::Result<Self> {
        let file: File = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Box::new(BufWriter::new(file)),
            path: Some(path.to_path_buf()),
        })
    }

    /// A log that only forwards to the `log` facade.
    pub fn disabled() -> Self {
        Self {
            sink: Box::new(io::sink()),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::info!("{}", message);
        self.write_line(message);
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::warn!("{}", message);
        self.write_line(&format!("Warning: {}", message));
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::error!("{}", message);
        self.write_line(&format!("Error: {}", message));
    }

    /// Flush and release the file. Called once at process end.
    pub fn close(mut self) -> io::Result<()> {
        self.sink.flush()
    }

    fn write_line(&mut self, message: &str) {
        // A broken log file must never take the pipeline down with it.
        if let Err(e) = writeln!(self.sink, "{} {}", timestamp(), message) {
            log::warn!("failed to append to event log: {}", e);
        }
    }
}

/// Create the log directory (if needed) and open a fresh log file in it.
pub fn open_in(dir: &Path) -> io::Result<EventLog> {
    fs::create_dir_all(dir)?;
    EventLog::create(dir)
}
