//! # vid2ascii - terminal ASCII video player
//!
//! `vid2ascii` turns a video into monochrome ASCII-art frames and plays them back
//! in the terminal at the source frame rate. It works in two passes:
//!
//! 1. **Extraction**: every decoded frame is downsampled, reduced to luma,
//!    blended with the previous frame to suppress flicker, mapped onto the
//!    ramp `"&@%#*+=-:. "` and written to `frames/frame_<n>.txt`.
//! 2. **Playback**: the stored frames are drawn in order, one every
//!    `round(1000 / fps)` milliseconds, and deleted afterwards.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use vid2ascii::{
//!     ConversionOptions, EventLog, FfmpegSource, FrameStore, Pipeline, progress::BarReporter,
//!     surface,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! std::fs::create_dir_all("frames")?;
//! let store = FrameStore::open(Path::new("frames"))?;
//! let options = ConversionOptions::default().with_alpha(0.5);
//! let mut source = FfmpegSource::open(Path::new("clip.mp4"))?;
//! let mut log = EventLog::disabled();
//!
//! Pipeline::new(&store, &options).run(
//!     &mut source,
//!     &mut BarReporter::new(),
//!     surface::select(),
//!     &mut log,
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod ascii;
pub mod blend;
pub mod error;
pub mod event_log;
pub mod pipeline;
pub mod playback;
pub mod preprocessing;
pub mod progress;
pub mod source;
pub mod store;
pub mod surface;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use ascii::{AsciiEncoder, DEFAULT_RAMP};
pub use blend::{TemporalBlender, DEFAULT_ALPHA};
pub use error::{PipelineError, Result};
pub use event_log::EventLog;
pub use pipeline::{extract, ExtractionSummary, Pipeline, RunReport};
pub use playback::{CancellationToken, PlaybackDriver, PlaybackReport, PlaybackSession, PlaybackState};
pub use preprocessing::{IntensityFrame, Preprocessor, DEFAULT_SCALE_X, DEFAULT_SCALE_Y, MAX_SCALE};
pub use source::{FfmpegConfig, FfmpegSource, FrameSource, MemorySource, RawFrame, VideoInfo};
pub use store::FrameStore;

/// File extensions accepted as video input.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "webm"];

/// Whether `path` names a video file by its extension.
pub fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

fn default_scale_x() -> f32 {
    DEFAULT_SCALE_X
}
fn default_scale_y() -> f32 {
    DEFAULT_SCALE_Y
}
fn default_alpha() -> f32 {
    DEFAULT_ALPHA
}
fn default_ascii_chars() -> String {
    DEFAULT_RAMP.to_string()
}
fn default_frames_dir() -> PathBuf {
    PathBuf::from("frames")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}

/// Application configuration, read from `vid2ascii.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_scale_x")]
    pub scale_x: f32,
    #[serde(default = "default_scale_y")]
    pub scale_y: f32,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_ascii_chars")]
    pub ascii_chars: String,
    #[serde(default = "default_frames_dir")]
    pub frames_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub keep_artifacts: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scale_x: default_scale_x(),
            scale_y: default_scale_y(),
            alpha: default_alpha(),
            ascii_chars: default_ascii_chars(),
            frames_dir: default_frames_dir(),
            log_dir: default_log_dir(),
            keep_artifacts: false,
        }
    }
}

impl AppConfig {
    /// Parse and validate a JSON config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let cfg: AppConfig = serde_json::from_str(&text).context("parsing config json")?;

        if !cfg.ascii_chars.is_ascii() {
            return Err(anyhow!(
                "Config file {} contains non-ASCII characters in ascii_chars field. \
                Please use only ASCII characters.",
                path.display()
            ));
        }
        Ok(cfg)
    }

    /// Look in the app data directory, then the working directory, then fall
    /// back to built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        let mut tried: Vec<PathBuf> = Vec::new();
        if let Some(mut d) = dirs::data_dir() {
            d.push("vid2ascii");
            d.push("vid2ascii.json");
            tried.push(d);
        }
        tried.push(PathBuf::from("vid2ascii.json"));

        for p in &tried {
            if p.exists() {
                log::debug!("loading config from {}", p.display());
                return Self::from_file(p);
            }
        }
        Ok(Self::default())
    }

    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions {
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            alpha: self.alpha,
            ascii_chars: self.ascii_chars.clone(),
            keep_artifacts: self.keep_artifacts,
        }
    }
}

/// Options for the extraction and playback passes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    /// Horizontal downsampling factor
    pub scale_x: f32,
    /// Vertical downsampling factor
    pub scale_y: f32,
    /// Weight of the current frame when blending with the previous one
    pub alpha: f32,
    /// Character ramp, darkest first
    pub ascii_chars: String,
    /// Leave artifacts on disk after playback
    pub keep_artifacts: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        AppConfig::default().conversion_options()
    }
}

impl ConversionOptions {
    pub fn with_scale(mut self, scale_x: f32, scale_y: f32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_ascii_chars(mut self, ascii_chars: String) -> Self {
        self.ascii_chars = ascii_chars;
        self
    }

    pub fn with_keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let opts = ConversionOptions::default();
        assert_eq!(opts.scale_x, 0.30);
        assert_eq!(opts.scale_y, 0.15);
        assert_eq!(opts.alpha, 0.5);
        assert_eq!(opts.ascii_chars, "&@%#*+=-:. ");
        assert!(!opts.keep_artifacts);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vid2ascii.json");
        fs::write(&path, r#"{"alpha": 0.75, "frames_dir": "/tmp/ascii"}"#).unwrap();
        let cfg = AppConfig::from_file(&path).unwrap();
        assert_eq!(cfg.alpha, 0.75);
        assert_eq!(cfg.frames_dir, PathBuf::from("/tmp/ascii"));
        assert_eq!(cfg.scale_y, 0.15);
        assert_eq!(cfg.log_dir, PathBuf::from("log"));
    }

    #[test]
    fn non_ascii_ramp_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vid2ascii.json");
        fs::write(&path, r#"{"ascii_chars": "█▓▒░ "}"#).unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }

    #[test]
    fn video_extensions() {
        assert!(has_video_extension(Path::new("clip.mp4")));
        assert!(has_video_extension(Path::new("dir/Clip.MKV")));
        assert!(!has_video_extension(Path::new("notes.txt")));
        assert!(!has_video_extension(Path::new("mp4")));
    }
}
