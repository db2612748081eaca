//! Media summary logged at the start of a conversion (similar to ffprobe).

use std::fmt;
use std::path::Path;

use anyhow::Context as _;

use crate::stream::AvStream;

#[derive(Debug, Clone)]
pub enum StreamKind {
    Video { width: u32, height: u32, fps: Option<f64> },
    Audio { sample_rate: u32, channels: u32 },
    Other(String),
}

#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub index: usize,
    /// Codec name, e.g. "h264", "aac"
    pub codec_name: String,
    pub kind: StreamKind,
}

#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// e.g. "mov,mp4,m4a,3gp,3g2,mj2"
    pub format_name: String,
    /// None if unknown (e.g. raw h264).
    pub duration_sec: Option<f64>,
    pub streams: Vec<StreamInfo>,
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "format={}", self.format_name)?;
        match self.duration_sec {
            Some(d) => write!(f, " duration={:.3}s", d)?,
            None => write!(f, " duration=N/A")?,
        }
        for s in &self.streams {
            write!(f, "\n  #{} {}", s.index, s.codec_name)?;
            match &s.kind {
                StreamKind::Video { width, height, fps } => match fps {
                    Some(fps) => write!(f, " video {}x{} @ {:.3} fps", width, height, fps)?,
                    None => write!(f, " video {}x{} @ unknown fps", width, height)?,
                },
                StreamKind::Audio {
                    sample_rate,
                    channels,
                } => write!(f, " audio {} Hz, {} ch", sample_rate, channels)?,
                StreamKind::Other(medium) => write!(f, " {}", medium)?,
            }
        }
        Ok(())
    }
}

pub fn probe(path: &Path) -> anyhow::Result<MediaInfo> {
    let input = ffmpeg_next::format::input(path)
        .with_context(|| format!("probe {}", path.display()))?;

    // duration is in 1/AV_TIME_BASE seconds
    let duration_sec = match input.duration() {
        d if d == ffmpeg_next::ffi::AV_NOPTS_VALUE as i64 || d <= 0 => None,
        d => Some(d as f64 / 1_000_000.0),
    };

    let streams = input
        .streams()
        .map(|stream| {
            let stream = AvStream::from(stream);
            let kind = if stream.is_video() {
                StreamKind::Video {
                    width: stream.width(),
                    height: stream.height(),
                    fps: stream.fps(),
                }
            } else if stream.is_audio() {
                StreamKind::Audio {
                    sample_rate: stream.sample_rate(),
                    channels: stream.channels(),
                }
            } else {
                StreamKind::Other(format!("{:?}", stream.parameters().medium()).to_lowercase())
            };
            StreamInfo {
                index: stream.index(),
                codec_name: format!("{:?}", stream.parameters().id()).to_lowercase(),
                kind,
            }
        })
        .collect();

    Ok(MediaInfo {
        format_name: input.format().name().to_string(),
        duration_sec,
        streams,
    })
}
