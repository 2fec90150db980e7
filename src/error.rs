//! Error types for the `vid2ascii` library.
//!
//! [`PipelineError`] is returned by every fallible operation of the extraction
//! and playback passes. Some variants are fatal (the pipeline stops), others are
//! tolerated by the caller and only logged; see [`PipelineError::is_fatal`].

use std::{io::Error as IoError, path::PathBuf};

use thiserror::Error;

/// The unified error type for all pipeline operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The decoder could not open or parse the input file.
    #[error("Unable to read media at {path}: {reason}")]
    UnreadableMedia {
        /// Path that was passed to the frame source.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The artifact directory is missing or cannot be created.
    #[error("Artifact directory {path} is unavailable")]
    StorageUnavailable {
        /// The directory the frame store was pointed at.
        path: PathBuf,
    },

    /// An artifact expected during playback does not exist.
    #[error("Frame artifact {index} is missing ({path})")]
    MissingArtifact {
        /// Zero-based frame index.
        index: usize,
        /// Path that was looked up.
        path: PathBuf,
    },

    /// A single artifact could not be written.
    #[error("Failed to write frame artifact {index}: {source}")]
    StorageWriteFailure {
        /// Zero-based frame index.
        index: usize,
        /// The I/O error reported by the filesystem.
        #[source]
        source: IoError,
    },

    /// The decoder stopped producing well-formed frames.
    #[error("Failed to decode video frame: {0}")]
    Decode(String),

    /// Conversion options are out of range.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// A playback driver was started twice.
    #[error("Playback driver is not idle")]
    PlaybackState,

    /// Writing to the display surface failed.
    #[error("Display error: {0}")]
    Display(#[source] IoError),

    /// Any other I/O error.
    #[error(transparent)]
    Io(#[from] IoError),
}

impl PipelineError {
    /// Whether the error must stop the pipeline.
    ///
    /// Write failures of individual artifacts and missing artifacts are
    /// tolerated: the frame is dropped and processing continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::StorageWriteFailure { .. } | PipelineError::MissingArtifact { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn tolerated_errors_are_not_fatal() {
        let write = PipelineError::StorageWriteFailure {
            index: 3,
            source: IoError::new(ErrorKind::PermissionDenied, "denied"),
        };
        let missing = PipelineError::MissingArtifact {
            index: 4,
            path: PathBuf::from("frames/frame_4.txt"),
        };
        assert!(!write.is_fatal());
        assert!(!missing.is_fatal());
    }

    #[test]
    fn media_and_storage_errors_are_fatal() {
        let media = PipelineError::UnreadableMedia {
            path: PathBuf::from("clip.mp4"),
            reason: "no video stream".into(),
        };
        let storage = PipelineError::StorageUnavailable {
            path: PathBuf::from("frames"),
        };
        assert!(media.is_fatal());
        assert!(storage.is_fatal());
        assert_eq!(
            media.to_string(),
            "Unable to read media at clip.mp4: no video stream"
        );
    }
}
