//! Numbered text artifacts on disk.
//!
//! Artifacts live at `<dir>/frame_<index>.txt` (zero-based, no padding) and only
//! exist for one extract-and-play cycle.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};
use crate::event_log::EventLog;

pub struct FrameStore {
    dir: PathBuf,
}

impl FrameStore {
    /// Use an existing directory. Creating it is the caller's job.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(PipelineError::StorageUnavailable {
                path: dir.to_path_buf(),
            });
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(format!("frame_{}.txt", index))
    }

    pub fn write(&self, index: usize, text: &str) -> Result<()> {
        fs::write(self.path_for(index), text).map_err(|source| {
            if !self.dir.is_dir() {
                PipelineError::StorageUnavailable {
                    path: self.dir.clone(),
                }
            } else {
                PipelineError::StorageWriteFailure { index, source }
            }
        })
    }

    pub fn read(&self, index: usize) -> Result<String> {
        let path = self.path_for(index);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PipelineError::MissingArtifact { index, path })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove one artifact. A missing artifact is not an error.
    pub fn delete(&self, index: usize) -> Result<()> {
        match fs::remove_file(self.path_for(index)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete artifacts `0..total`, logging failures. Returns how many failed.
    pub fn delete_range(&self, total: usize, log: &mut EventLog) -> usize {
        let mut failures = 0;
        for index in 0..total {
            if let Err(e) = self.delete(index) {
                failures += 1;
                log.warn(format!("could not delete frame {}: {}", index, e));
            }
        }
        failures
    }

    /// Remove `frame_*.txt` left behind by an interrupted run.
    pub fn purge_stale(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                if name.starts_with("frame_") && name.ends_with(".txt") {
                    fs::remove_file(path)?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
