use crate::error::{Result, ZvidError};

/// Substituted when the container reports no usable frame rate.
pub const DEFAULT_SOURCE_FPS: f64 = 30.0;

/// Keeps every `stride`-th source frame, starting at frame 0.
///
/// `stride = max(1, round(source_fps / target_fps))` with ties rounded to
/// even, so a 25 fps source at 10 fps keeps every 2nd frame. Only ever
/// downsamples: a target at or above the source rate keeps every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRateSampler {
    stride: u64,
}

impl FrameRateSampler {
    pub fn new(source_fps: Option<f64>, target_fps: u32) -> Result<Self> {
        if target_fps == 0 {
            return Err(ZvidError::InvalidConfig(
                "target fps must be positive".to_string(),
            ));
        }
        let ratio = effective_source_fps(source_fps) / f64::from(target_fps);
        let stride = ratio.round_ties_even().max(1.0) as u64;
        Ok(Self { stride })
    }

    pub fn with_stride(stride: u64) -> Self {
        Self {
            stride: stride.max(1),
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn keep(&self, source_index: u64) -> bool {
        source_index % self.stride == 0
    }
}

/// Reported fps, or [`DEFAULT_SOURCE_FPS`] when missing, non-positive or not finite.
pub fn effective_source_fps(source_fps: Option<f64>) -> f64 {
    match source_fps {
        Some(fps) if fps.is_finite() && fps > 0.0 => fps,
        _ => DEFAULT_SOURCE_FPS,
    }
}
