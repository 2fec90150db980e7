use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::error::{PipelineError, Result};

/// A single-channel intensity frame.
pub type IntensityFrame = GrayImage;

/// Horizontal scale applied before encoding. Terminal cells are taller than
/// they are wide, so rows are reduced much more than columns.
pub const DEFAULT_SCALE_X: f32 = 0.30;
pub const DEFAULT_SCALE_Y: f32 = 0.15;

/// Frames are only ever shrunk.
pub const MAX_SCALE: f32 = 1.0;

/// Downsamples raw frames and reduces them to luma.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessor {
    scale_x: f32,
    scale_y: f32,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            scale_x: DEFAULT_SCALE_X,
            scale_y: DEFAULT_SCALE_Y,
        }
    }
}

impl Preprocessor {
    pub fn new(scale_x: f32, scale_y: f32) -> Result<Self> {
        for (name, v) in [("scale_x", scale_x), ("scale_y", scale_y)] {
            if !(v.is_finite() && v > 0.0 && v <= MAX_SCALE) {
                return Err(PipelineError::InvalidOptions(format!(
                    "{} must be within (0, {}], got {}",
                    name, MAX_SCALE, v
                )));
            }
        }
        Ok(Self { scale_x, scale_y })
    }

    /// Output dimensions for a `width`x`height` source frame.
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        let w = (width as f32 * self.scale_x).round() as u32;
        let h = (height as f32 * self.scale_y).round() as u32;
        (w.max(1), h.max(1))
    }

    pub fn apply(&self, frame: &RgbImage) -> IntensityFrame {
        let (orig_w, orig_h) = frame.dimensions();
        let (target_w, target_h) = self.target_size(orig_w, orig_h);

        let resized;
        let frame = if (target_w, target_h) != (orig_w, orig_h) {
            resized = imageops::resize(frame, target_w, target_h, FilterType::Triangle);
            &resized
        } else {
            frame
        };

        let (w, h) = frame.dimensions();
        GrayImage::from_fn(w, h, |x, y| Luma([luminance(*frame.get_pixel(x, y))]))
    }
}

/// Rec.601 luma.
fn luminance(rgb: Rgb<u8>) -> u8 {
    let r = rgb[0] as f64;
    let g = rgb[1] as f64;
    let b = rgb[2] as f64;
    (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_ratios_shrink_rows_more_than_columns() {
        let pre = Preprocessor::default();
        assert_eq!(pre.target_size(1920, 1080), (576, 162));
        assert_eq!(pre.target_size(10, 10), (3, 2));
        assert_eq!(pre.target_size(1, 1), (1, 1));
    }

    #[test]
    fn gray_pixels_keep_their_level() {
        for v in [0u8, 1, 64, 128, 200, 255] {
            assert_eq!(luminance(Rgb([v, v, v])), v);
        }
    }

    #[test]
    fn green_is_brighter_than_blue() {
        assert!(luminance(Rgb([0, 255, 0])) > luminance(Rgb([255, 0, 0])));
        assert!(luminance(Rgb([255, 0, 0])) > luminance(Rgb([0, 0, 255])));
    }

    #[test]
    fn uniform_frame_stays_uniform() {
        let frame = RgbImage::from_pixel(40, 20, Rgb([128, 128, 128]));
        let out = Preprocessor::default().apply(&frame);
        assert_eq!(out.dimensions(), (12, 3));
        assert!(out.pixels().all(|p| p[0] == 128));
    }

    #[test]
    fn rejects_non_positive_scales() {
        assert!(Preprocessor::new(0.0, 0.15).is_err());
        assert!(Preprocessor::new(0.3, -1.0).is_err());
        assert!(Preprocessor::new(f32::NAN, 0.15).is_err());
        assert!(Preprocessor::new(1.0, 1.0).is_ok());
    }

    #[test]
    fn rejects_upscaling() {
        assert!(Preprocessor::new(2.0, 0.15).is_err());
        assert!(Preprocessor::new(0.3, 1.0001).is_err());
        assert!(Preprocessor::new(1e30, 1e30).is_err());
        assert!(Preprocessor::new(f32::INFINITY, 0.15).is_err());
    }
}
