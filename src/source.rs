//! Frame sources.
//!
//! [`FfmpegSource`] probes the input with `ffprobe` and decodes it by piping raw
//! `rgb24` frames out of an `ffmpeg` child process. [`MemorySource`] serves
//! frames from memory and backs the synthetic-video tests.

use image::RgbImage;
use serde::Deserialize;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command as ProcCommand, Stdio};
use std::thread::{self, JoinHandle};

use crate::error::{PipelineError, Result};

/// A raw color frame as produced by the decoder.
pub type RawFrame = RgbImage;

/// A finite, forward-only sequence of frames that can be explicitly repositioned.
pub trait FrameSource {
    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;

    /// Total number of frames reported by the container.
    fn frame_count(&self) -> usize;

    /// Frames per second.
    fn frame_rate(&self) -> f64;

    /// Reposition so that the next call to `next_frame` yields frame `index`.
    fn seek(&mut self, index: usize) -> Result<()>;
}

/// Stream metadata gathered before decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub frame_count: usize,
}

#[derive(Debug, Deserialize)]
struct StreamList {
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    nb_read_packets: Option<String>,
}

/// Parse an ffprobe rational such as `30000/1001` or a plain number.
fn parse_rate(s: &str) -> Option<f64> {
    let rate = match s.trim().split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn parse_stream_info(json: &str) -> std::result::Result<VideoInfo, String> {
    let list: StreamList =
        serde_json::from_str(json).map_err(|e| format!("parsing ffprobe output: {}", e))?;
    let stream = list
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream found".to_string())?;

    if stream.width == 0 || stream.height == 0 {
        return Err("video stream has no dimensions".to_string());
    }

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| "video stream has no usable frame rate".to_string())?;

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .or_else(|| {
            stream
                .nb_read_packets
                .as_deref()
                .and_then(|n| n.parse::<usize>().ok())
        })
        .unwrap_or(0);

    Ok(VideoInfo {
        width: stream.width,
        height: stream.height,
        frame_rate,
        frame_count,
    })
}

/// Locations of the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegConfig {
    pub fn ffmpeg_cmd(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe_cmd(&self) -> &Path {
        &self.ffprobe
    }
}

/// Query stream metadata with `ffprobe`.
pub fn stream_info(path: &Path, config: &FfmpegConfig) -> Result<VideoInfo> {
    let unreadable = |reason: String| PipelineError::UnreadableMedia {
        path: path.to_path_buf(),
        reason,
    };

    let output = ProcCommand::new(config.ffprobe_cmd())
        .args(["-v", "error", "-select_streams", "v:0", "-count_packets"])
        .args([
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,nb_read_packets",
        ])
        .args(["-of", "json"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| unreadable(format!("running ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(unreadable(format!("ffprobe failed: {}", stderr.trim())));
    }

    parse_stream_info(&String::from_utf8_lossy(&output.stdout)).map_err(unreadable)
}

/// Keep at most this much of ffmpeg's stderr for error messages.
const STDERR_TAIL: usize = 4096;

fn stderr_tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

struct Decoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    produced: usize,
}

impl Decoder {
    /// Reap the child after its stdout hit EOF. Returns the stderr tail when
    /// ffmpeg exited unsuccessfully.
    fn finish(&mut self) -> Result<Option<String>> {
        let status = self
            .child
            .wait()
            .map_err(|e| PipelineError::Decode(format!("waiting for ffmpeg: {}", e)))?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if status.success() {
            return Ok(None);
        }
        let tail = stderr_tail(&stderr);
        Ok(Some(if tail.is_empty() {
            format!("ffmpeg exited with {}", status)
        } else {
            format!("ffmpeg exited with {}: {}", status, tail)
        }))
    }

    fn shutdown(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(h) = self.stderr.take() {
            let _ = h.join();
        }
    }
}

/// Decodes a video file through an `ffmpeg` child process.
pub struct FfmpegSource {
    path: PathBuf,
    config: FfmpegConfig,
    info: VideoInfo,
    start_index: usize,
    decoder: Option<Decoder>,
    exhausted: bool,
}

impl FfmpegSource {
    /// Read stream metadata for `path` and prepare for decoding. No frames are decoded yet.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, FfmpegConfig::default())
    }

    pub fn open_with_config(path: &Path, config: FfmpegConfig) -> Result<Self> {
        let info = stream_info(path, &config)?;
        log::debug!(
            "opened {}: {}x{} @ {:.3} fps, {} frames",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            info.frame_count
        );
        Ok(Self {
            path: path.to_path_buf(),
            config,
            info,
            start_index: 0,
            decoder: None,
            exhausted: false,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn decoder_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-loglevel".into(), "error".into(), "-nostdin".into()];
        if self.start_index > 0 {
            let seconds = self.start_index as f64 / self.info.frame_rate;
            args.push("-ss".into());
            args.push(format!("{:.6}", seconds));
        }
        args.push("-noautorotate".into());
        args.push("-i".into());
        args
    }

    fn spawn_decoder(&self) -> Result<Decoder> {
        let mut child = ProcCommand::new(self.config.ffmpeg_cmd())
            .args(self.decoder_args())
            .arg(&self.path)
            .args(["-an", "-sn", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::UnreadableMedia {
                path: self.path.clone(),
                reason: format!("running ffmpeg: {}", e),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Decode("ffmpeg stdout was not captured".into()))?;

        // stderr is drained concurrently with stdout
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        Ok(Decoder {
            child,
            stdout: BufReader::new(stdout),
            stderr,
            produced: 0,
        })
    }

    /// The decoder hit EOF: reap it and turn a failed exit into an error.
    fn end_of_stream(&mut self) -> Result<Option<RawFrame>> {
        self.exhausted = true;
        let Some(mut decoder) = self.decoder.take() else {
            return Ok(None);
        };
        match decoder.finish()? {
            None => Ok(None),
            Some(reason) if decoder.produced == 0 => Err(PipelineError::UnreadableMedia {
                path: self.path.clone(),
                reason,
            }),
            Some(reason) => Err(PipelineError::Decode(format!(
                "after {} frames: {}",
                decoder.produced, reason
            ))),
        }
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.decoder.is_none() {
            self.decoder = Some(self.spawn_decoder()?);
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };

        let (w, h) = (self.info.width, self.info.height);
        let mut buf = vec![0u8; w as usize * h as usize * 3];
        let mut filled = 0;
        while filled < buf.len() {
            match decoder.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(PipelineError::Decode(e.to_string())),
            }
        }

        if filled < buf.len() {
            if filled > 0 {
                log::warn!(
                    "discarding truncated trailing frame ({} of {} bytes)",
                    filled,
                    buf.len()
                );
            }
            return self.end_of_stream();
        }
        decoder.produced += 1;

        RgbImage::from_raw(w, h, buf)
            .map(Some)
            .ok_or_else(|| PipelineError::Decode("frame buffer size mismatch".into()))
    }

    fn frame_count(&self) -> usize {
        self.info.frame_count
    }

    fn frame_rate(&self) -> f64 {
        self.info.frame_rate
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.shutdown();
        }
        self.start_index = index;
        self.exhausted = false;
        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.shutdown();
        }
    }
}

/// Frames held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: Vec<RawFrame>,
    frame_rate: f64,
    position: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<RawFrame>, frame_rate: f64) -> Self {
        Self {
            frames,
            frame_rate,
            position: 0,
        }
    }

    /// `count` frames of `width`x`height` where every pixel of frame `i` is gray `levels(i)`.
    pub fn uniform(
        width: u32,
        height: u32,
        frame_rate: f64,
        levels: impl IntoIterator<Item = u8>,
    ) -> Self {
        let frames = levels
            .into_iter()
            .map(|v| RgbImage::from_pixel(width, height, image::Rgb([v, v, v])))
            .collect();
        Self::new(frames, frame_rate)
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        self.position = index.min(self.frames.len());
        Ok(())
    }
}
