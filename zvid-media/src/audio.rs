//! Renders a file's audio track to a signed 16-bit PCM WAV file.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use ffmpeg_next::format::{Sample, sample::Type};
use ffmpeg_next::frame::Audio;
use ffmpeg_next::software::resampling;
use ffmpeg_next::ChannelLayout;

use crate::decoder::{DecodedFrame, Decoder};
use crate::input::AvInput;

/// Sample rate of the display's audio output.
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioRenderConfig {
    pub sample_rate: u32,
    /// 1 (mono) or 2 (stereo).
    pub channels: u16,
}

#[derive(Debug, Clone)]
pub struct RenderedAudio {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    /// Sample frames written (one sample per channel each).
    pub frames: u64,
    /// The render was stopped before the end of the input.
    pub interrupted: bool,
}

type WavWriter = hound::WavWriter<BufWriter<File>>;

struct Renderer {
    config: AudioRenderConfig,
    layout: ChannelLayout,
    resampler: Option<resampling::Context>,
    writer: WavWriter,
    frames: u64,
}

impl Renderer {
    fn push(&mut self, frame: &Audio) -> anyhow::Result<()> {
        if self.resampler.is_none() {
            let src_layout = if frame.channel_layout().is_empty() {
                ChannelLayout::default(i32::from(frame.channels()))
            } else {
                frame.channel_layout()
            };
            log::debug!(
                "resampler {:?} {:?} {} Hz -> s16 {:?} {} Hz",
                frame.format(),
                src_layout,
                frame.rate(),
                self.layout,
                self.config.sample_rate
            );
            self.resampler = Some(resampling::Context::get(
                frame.format(),
                src_layout,
                frame.rate(),
                Sample::I16(Type::Packed),
                self.layout,
                self.config.sample_rate,
            )?);
        }
        let Some(resampler) = self.resampler.as_mut() else {
            anyhow::bail!("resampler not initialized");
        };

        // rate conversion can emit slightly more samples than it consumed
        let capacity = frame.samples() as u64 * u64::from(self.config.sample_rate)
            / u64::from(frame.rate().max(1))
            + 64;
        let mut out = self.output_frame(capacity as usize);
        resampler.run(frame, &mut out)?;
        self.write(&out)
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        loop {
            let mut out = self.output_frame(4096);
            match self.resampler.as_mut() {
                Some(resampler) => {
                    resampler.flush(&mut out)?;
                }
                None => return Ok(()),
            }
            if out.samples() == 0 {
                return Ok(());
            }
            self.write(&out)?;
        }
    }

    fn output_frame(&self, samples: usize) -> Audio {
        let mut out = Audio::new(Sample::I16(Type::Packed), samples, self.layout);
        out.set_rate(self.config.sample_rate);
        out
    }

    fn write(&mut self, out: &Audio) -> anyhow::Result<()> {
        let count = out.samples() * usize::from(self.config.channels);
        for pair in out.data(0).chunks_exact(2).take(count) {
            self.writer
                .write_sample(i16::from_ne_bytes([pair[0], pair[1]]))?;
        }
        self.frames += out.samples() as u64;
        Ok(())
    }
}

/// Decodes the best audio stream of `input`, resamples it to
/// `config.sample_rate` / `config.channels` / s16 and writes `wav_path`.
///
/// Returns `Ok(None)` when the input has no audio stream. `should_stop` is
/// polled between packets; when it returns true the WAV is closed with what
/// was rendered so far.
pub fn render_wav(
    input: &Path,
    wav_path: &Path,
    config: AudioRenderConfig,
    should_stop: impl Fn() -> bool,
) -> anyhow::Result<Option<RenderedAudio>> {
    let layout = match config.channels {
        1 => ChannelLayout::MONO,
        2 => ChannelLayout::STEREO,
        n => anyhow::bail!("unsupported channel count {}", n),
    };
    let mut av_input = AvInput::open(input)?;
    let Some(stream) = av_input.audio_stream().cloned() else {
        log::warn!("no audio stream in {}", input.display());
        return Ok(None);
    };
    log::info!(
        "audio stream #{}: {} Hz, {} ch",
        stream.index(),
        stream.sample_rate(),
        stream.channels()
    );
    let mut decoder = Decoder::new(&stream).context("open audio decoder")?;

    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let writer = hound::WavWriter::create(wav_path, spec)
        .with_context(|| format!("create {}", wav_path.display()))?;
    let mut renderer = Renderer {
        config,
        layout,
        resampler: None,
        writer,
        frames: 0,
    };

    let mut interrupted = false;
    loop {
        if should_stop() {
            log::warn!("audio render stopped early");
            interrupted = true;
            break;
        }
        let packet = av_input.read_packet()?;
        match &packet {
            Some(p) if p.stream() == decoder.stream_index() => decoder.send_packet(p)?,
            Some(_) => continue,
            None => decoder.send_eof()?,
        }
        while let Some(frame) = decoder.receive_frame()? {
            if let DecodedFrame::Audio(frame) = frame {
                renderer.push(&frame)?;
            }
        }
        if packet.is_none() {
            break;
        }
    }
    renderer.flush()?;

    let frames = renderer.frames;
    renderer
        .writer
        .finalize()
        .with_context(|| format!("finalize {}", wav_path.display()))?;
    log::info!(
        "wav written: {} ({} sample frames, {:.2}s)",
        wav_path.display(),
        frames,
        frames as f64 / f64::from(config.sample_rate)
    );
    Ok(Some(RenderedAudio {
        path: wav_path.to_path_buf(),
        sample_rate: config.sample_rate,
        channels: config.channels,
        frames,
        interrupted,
    }))
}
