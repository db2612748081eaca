//! FFmpeg collaborators for the zone video converter: probing, video frame
//! decoding/resizing and audio rendering to WAV.

/// Registers FFmpeg components. Call once at startup before opening inputs.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod audio;
pub mod decoder;
pub mod input;
pub mod metadata;
pub mod scaler;
pub mod stream;
pub mod video;

pub use audio::{AudioRenderConfig, RenderedAudio, render_wav};
pub use metadata::{MediaInfo, probe};
pub use video::VideoFrameSource;
