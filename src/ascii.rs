use crate::error::{PipelineError, Result};
use crate::preprocessing::IntensityFrame;

/// Glyphs from darkest to lightest.
pub const DEFAULT_RAMP: &str = "&@%#*+=-:. ";

/// Maps intensities onto a character ramp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiEncoder {
    ramp: Vec<u8>,
}

impl Default for AsciiEncoder {
    fn default() -> Self {
        Self {
            ramp: DEFAULT_RAMP.as_bytes().to_vec(),
        }
    }
}

impl AsciiEncoder {
    pub fn new(ramp: &str) -> Result<Self> {
        if ramp.is_empty() {
            return Err(PipelineError::InvalidOptions(
                "character ramp cannot be empty".into(),
            ));
        }
        if !ramp.is_ascii() {
            return Err(PipelineError::InvalidOptions(
                "character ramp must contain only ASCII characters".into(),
            ));
        }
        if ramp.contains(['\n', '\r']) {
            return Err(PipelineError::InvalidOptions(
                "character ramp cannot contain line breaks".into(),
            ));
        }
        Ok(Self {
            ramp: ramp.as_bytes().to_vec(),
        })
    }

    pub fn ramp(&self) -> &[u8] {
        &self.ramp
    }

    /// Linear, non gamma-corrected quantization: `floor(v / 255 * (len - 1))`.
    pub fn char_for(&self, intensity: u8) -> char {
        let last = self.ramp.len() - 1;
        let idx = (intensity as f64 / 255.0 * last as f64) as usize;
        self.ramp[idx.min(last)] as char
    }

    /// One line per pixel row, each terminated by `\n`.
    pub fn encode(&self, frame: &IntensityFrame) -> String {
        let (w, h) = frame.dimensions();
        let mut out = String::with_capacity((w as usize + 1) * h as usize);
        for row in frame.rows() {
            out.extend(row.map(|px| self.char_for(px[0])));
            out.push('\n');
        }
        out
    }
}
