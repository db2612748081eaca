use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;
use zvid_core::{FrameSource, RgbFrame, ZonePipeline, ZoneRunSummary, pipeline};
use zvid_media::{AudioRenderConfig, RenderedAudio, VideoFrameSource};

use crate::config::ConvertConfig;

/// `audio_22k_mono` for the default 22 050 Hz mono render.
pub fn audio_file_stem(config: &AudioRenderConfig) -> String {
    let layout = match config.channels {
        1 => "mono",
        _ => "stereo",
    };
    format!("audio_{}k_{}", config.sample_rate / 1000, layout)
}

/// Ends frame iteration once the token is cancelled, so the zones are
/// finalized with the frames written so far.
pub struct Cancellable<S> {
    inner: S,
    cancel: CancellationToken,
}

impl<S> Cancellable<S> {
    pub fn new(inner: S, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }
}

impl<S: Iterator<Item = zvid_core::Result<RgbFrame>>> Iterator for Cancellable<S> {
    type Item = zvid_core::Result<RgbFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.inner.next()
    }
}

impl<S: FrameSource> FrameSource for Cancellable<S> {
    fn frame_rate(&self) -> Option<f64> {
        self.inner.frame_rate()
    }
}

pub struct ConvertJob {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub config: ConvertConfig,
    pub audio: bool,
}

#[derive(Debug)]
pub struct AudioOutcome {
    pub rendered: RenderedAudio,
    pub pcm_path: PathBuf,
    pub pcm_bytes: usize,
}

/// Runs the video job and the audio job side by side on the blocking pool.
///
/// An audio failure does not touch the zone files already written; both
/// results are logged and the first failure is returned.
pub async fn run(job: ConvertJob, cancel: CancellationToken) -> anyhow::Result<()> {
    let pipeline_config = job.config.pipeline(&job.output_dir)?;
    tokio::fs::create_dir_all(&job.output_dir)
        .await
        .with_context(|| format!("create output dir {}", job.output_dir.display()))?;

    match zvid_media::probe(&job.input) {
        Ok(info) => log::info!("input {}: {}", job.input.display(), info),
        Err(e) => log::warn!("probe failed: {:#}", e),
    }

    let video_input = job.input.clone();
    let video_cancel = cancel.clone();
    let geometry = pipeline_config.geometry;
    let video = tokio::task::spawn_blocking(move || -> anyhow::Result<ZoneRunSummary> {
        let source = VideoFrameSource::open(
            &video_input,
            u32::from(geometry.width()),
            geometry.height(),
        )?;
        let mut source = Cancellable::new(source, video_cancel);
        Ok(ZonePipeline::new(pipeline_config).run(&mut source)?)
    });

    let audio = if job.audio {
        let audio_input = job.input.clone();
        let output_dir = job.output_dir.clone();
        let audio_config = job.config.audio();
        let audio_cancel = cancel.clone();
        Some(tokio::task::spawn_blocking(move || {
            render_audio(&audio_input, &output_dir, audio_config, &audio_cancel)
        }))
    } else {
        None
    };

    // join both before bailing so neither task is left running detached
    let video = video.await;
    let audio = match audio {
        Some(handle) => Some(handle.await),
        None => None,
    };
    let video = video.context("video task")?;
    let audio = audio.transpose().context("audio task")?;

    match &video {
        Ok(summary) => {
            log::info!(
                "video: {} frames in {} zones (stride {}, {} source frames){}",
                summary.frames_written,
                summary.zone_paths.len(),
                summary.stride,
                summary.source_frames,
                if cancel.is_cancelled() { ", cancelled" } else { "" }
            );
            if let Some(err) = &summary.decode_error {
                log::warn!("video ended early on decode error: {}", err);
            }
        }
        Err(e) => log::error!("video failed: {:#}", e),
    }
    match &audio {
        Some(Ok(Some(outcome))) => log::info!(
            "audio: {} ({} bytes PCM, {} Hz, {} ch)",
            outcome.pcm_path.display(),
            outcome.pcm_bytes,
            outcome.rendered.sample_rate,
            outcome.rendered.channels
        ),
        Some(Ok(None)) => log::warn!("audio: input has no audio stream, no PCM written"),
        Some(Err(e)) => log::error!("audio failed: {:#}", e),
        None => log::info!("audio: skipped"),
    }

    video?;
    if let Some(audio) = audio {
        audio?;
    }
    log::info!("done, files written to {}", job.output_dir.display());
    Ok(())
}

fn render_audio(
    input: &Path,
    output_dir: &Path,
    config: AudioRenderConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<AudioOutcome>> {
    let stem = audio_file_stem(&config);
    let wav_path = output_dir.join(format!("{}.wav", stem));
    let Some(rendered) =
        zvid_media::render_wav(input, &wav_path, config, || cancel.is_cancelled())?
    else {
        return Ok(None);
    };
    let pcm_path = output_dir.join(format!("{}.pcm", stem));
    let pcm = pipeline::extract_audio(&wav_path, &pcm_path)?;
    Ok(Some(AudioOutcome {
        rendered,
        pcm_path,
        pcm_bytes: pcm.len(),
    }))
}
