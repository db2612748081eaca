//! Binary encoding core for zoned RGB565 video streams and raw PCM audio.
//!
//! Everything in this crate is pure byte logic: media decoding lives in
//! `zvid-media`, and the command line lives in the `zvid` binary.

pub mod error;
pub mod frame;
pub mod geometry;
pub mod pipeline;
pub mod pixel;
pub mod sampler;
pub mod wav;
pub mod zone;

pub use error::{Result, ZvidError};
pub use frame::RgbFrame;
pub use geometry::FrameGeometry;
pub use pipeline::{FrameSource, PipelineConfig, ZonePipeline, ZoneRunSummary};
pub use sampler::FrameRateSampler;
pub use wav::PcmAudio;
pub use zone::{ZoneHeader, ZoneSet, ZoneStreamWriter};
