//! Frame loop and audio step of a conversion run.
//!
//! ```text
//! FrameSource ─► FrameRateSampler.keep? ─► split into Z row bands ─► RGB565 ─► ZoneStreamWriter[z]
//!                                                                                   │
//!                                                              finalize(frame_count) ◄┘
//!
//! rendered WAV ─► wav::extract ─► raw PCM file
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Result, ZvidError};
use crate::frame::RgbFrame;
use crate::geometry::FrameGeometry;
use crate::sampler::{FrameRateSampler, effective_source_fps};
use crate::wav::{self, PcmAudio};
use crate::zone::ZoneSet;

/// Decoded frames in source order, already sized to the output geometry.
///
/// Yielding `Err(ZvidError::Decode(_))` ends the run early without failing
/// it; any other error aborts the run after the zones are finalized.
pub trait FrameSource: Iterator<Item = Result<RgbFrame>> {
    /// Frame rate reported by the container, if any.
    fn frame_rate(&self) -> Option<f64>;
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub geometry: FrameGeometry,
    pub target_fps: u32,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRunSummary {
    pub source_fps: f64,
    pub stride: u64,
    /// Source frames pulled from the source, kept or not.
    pub source_frames: u64,
    /// Frames written to every zone.
    pub frames_written: u32,
    /// Set when a decode failure ended iteration early.
    pub decode_error: Option<String>,
    pub zone_paths: Vec<PathBuf>,
}

pub struct ZonePipeline {
    config: PipelineConfig,
}

struct Progress {
    source_frames: u64,
    decode_error: Option<String>,
}

impl ZonePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Encodes every kept frame of `source` into the zone files.
    ///
    /// Zones are finalized on every exit path with the number of frames
    /// actually written. A loop error takes precedence over a finalize error.
    pub fn run<S: FrameSource + ?Sized>(&self, source: &mut S) -> Result<ZoneRunSummary> {
        let reported_fps = source.frame_rate();
        let sampler = FrameRateSampler::new(reported_fps, self.config.target_fps)?;
        let source_fps = effective_source_fps(reported_fps);
        log::info!(
            "zone run: {}x{} in {} zones of {} rows, source {:.3} fps (reported {:?}) -> {} fps, stride {}",
            self.config.geometry.width(),
            self.config.geometry.height(),
            self.config.geometry.zone_count(),
            self.config.geometry.rows_per_zone(),
            source_fps,
            reported_fps,
            self.config.target_fps,
            sampler.stride()
        );

        let mut zones = ZoneSet::open(&self.config.output_dir, self.config.geometry)?;
        let zone_paths = zones.paths();
        let fed = Self::feed(source, &sampler, &mut zones);
        let finalized = zones.finalize();
        let progress = fed?;
        let frames_written = finalized?;

        log::info!(
            "zone run done: {} source frames, {} frames written",
            progress.source_frames,
            frames_written
        );
        Ok(ZoneRunSummary {
            source_fps,
            stride: sampler.stride(),
            source_frames: progress.source_frames,
            frames_written,
            decode_error: progress.decode_error,
            zone_paths,
        })
    }

    fn feed<S: FrameSource + ?Sized>(
        source: &mut S,
        sampler: &FrameRateSampler,
        zones: &mut ZoneSet,
    ) -> Result<Progress> {
        let mut index = 0u64;
        let mut decode_error = None;
        while let Some(item) = source.next() {
            let frame = match item {
                Ok(frame) => frame,
                Err(ZvidError::Decode(msg)) => {
                    log::warn!("decode failed at source frame {}, stopping: {}", index, msg);
                    decode_error = Some(msg);
                    break;
                }
                Err(e) => return Err(e),
            };
            if sampler.keep(index) {
                zones.append_frame(&frame)?;
            }
            index += 1;
        }
        Ok(Progress {
            source_frames: index,
            decode_error,
        })
    }
}

/// Reads a rendered WAV file, extracts its PCM payload and writes it to `pcm_path`.
pub fn extract_audio(wav_path: &Path, pcm_path: &Path) -> Result<PcmAudio> {
    let data = std::fs::read(wav_path).map_err(|e| ZvidError::io(wav_path, e))?;
    match wav::format(&data) {
        Some(fmt) => log::info!(
            "wav {}: {} Hz, {} ch, {} bit, format {}",
            wav_path.display(),
            fmt.sample_rate,
            fmt.channels,
            fmt.bits_per_sample,
            fmt.audio_format
        ),
        None => log::warn!("wav {}: no fmt chunk", wav_path.display()),
    }
    let pcm = wav::extract(data)?;
    std::fs::write(pcm_path, pcm.as_bytes()).map_err(|e| ZvidError::io(pcm_path, e))?;
    log::info!(
        "pcm written: {} ({} bytes, {} samples)",
        pcm_path.display(),
        pcm.len(),
        pcm.sample_count()
    );
    Ok(pcm)
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
