//! Temporal blending between consecutive intensity frames.
//!
//! Thresholding every frame independently makes noisy regions flicker from one
//! glyph to the next. Mixing each frame with its predecessor smooths that out.

use image::{GrayImage, Luma};

use crate::error::{PipelineError, Result};
use crate::preprocessing::IntensityFrame;

pub const DEFAULT_ALPHA: f32 = 0.5;

/// Per pixel `alpha * current + (1 - alpha) * previous`, rounded.
///
/// Frames of different dimensions cannot be mixed; `current` is returned as is.
pub fn blend(current: &GrayImage, previous: &GrayImage, alpha: f32) -> GrayImage {
    if current.dimensions() != previous.dimensions() {
        return current.clone();
    }
    let alpha = alpha as f64;
    let (w, h) = current.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let c = current.get_pixel(x, y)[0] as f64;
        let p = previous.get_pixel(x, y)[0] as f64;
        Luma([(alpha * c + (1.0 - alpha) * p).round().clamp(0.0, 255.0) as u8])
    })
}

/// Holds the previous frame between extraction steps.
#[derive(Debug, Clone)]
pub struct TemporalBlender {
    alpha: f32,
    previous: Option<IntensityFrame>,
}

impl Default for TemporalBlender {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            previous: None,
        }
    }
}

impl TemporalBlender {
    pub fn new(alpha: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(PipelineError::InvalidOptions(format!(
                "alpha must be within [0, 1], got {}",
                alpha
            )));
        }
        Ok(Self {
            alpha,
            previous: None,
        })
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Blend `current` with the stored frame, then keep `current` (unblended)
    /// as the next step's previous frame.
    pub fn push(&mut self, current: IntensityFrame) -> IntensityFrame {
        let blended = match &self.previous {
            Some(prev) => blend(&current, prev, self.alpha),
            None => current.clone(),
        };
        self.previous = Some(current);
        blended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(w: u32, h: u32, v: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([v]))
    }

    #[test]
    fn first_frame_passes_through() {
        let mut blender = TemporalBlender::default();
        let frame = GrayImage::from_fn(3, 2, |x, y| Luma([(x * 40 + y * 90) as u8]));
        assert_eq!(blender.push(frame.clone()), frame);
    }

    #[test]
    fn half_alpha_is_the_mean() {
        let mut blender = TemporalBlender::default();
        blender.push(gray(2, 2, 100));
        let out = blender.push(gray(2, 2, 200));
        assert!(out.pixels().all(|p| p[0] == 150));

        // odd sums round to nearest
        let out = blend(&gray(1, 1, 128), &gray(1, 1, 0), 0.5);
        assert_eq!(out.get_pixel(0, 0)[0], 64);
    }

    #[test]
    fn previous_slot_holds_unblended_frame() {
        let mut blender = TemporalBlender::default();
        blender.push(gray(1, 1, 0));
        blender.push(gray(1, 1, 128));
        // blended with 128, not with the previous output of 64
        let out = blender.push(gray(1, 1, 255));
        assert_eq!(out.get_pixel(0, 0)[0], 192);
    }

    #[test]
    fn extreme_alphas() {
        let cur = gray(2, 1, 10);
        let prev = gray(2, 1, 250);
        assert_eq!(blend(&cur, &prev, 1.0), cur);
        assert_eq!(blend(&cur, &prev, 0.0), prev);
    }

    #[test]
    fn shape_change_restarts_blending() {
        let mut blender = TemporalBlender::default();
        blender.push(gray(2, 2, 0));
        let frame = gray(3, 3, 90);
        assert_eq!(blender.push(frame.clone()), frame);
    }

    #[test]
    fn mismatched_dimensions_yield_current() {
        let cur = gray(4, 3, 40);
        assert_eq!(blend(&cur, &gray(2, 2, 200), 0.5), cur);
        assert_eq!(blend(&cur, &gray(8, 8, 200), 0.5), cur);
    }

    #[test]
    fn alpha_is_validated() {
        assert!(TemporalBlender::new(-0.1).is_err());
        assert!(TemporalBlender::new(1.1).is_err());
        assert!(TemporalBlender::new(f32::NAN).is_err());
        assert_eq!(TemporalBlender::new(0.25).unwrap().alpha(), 0.25);
    }
}
