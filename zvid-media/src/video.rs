use std::path::Path;

use anyhow::Context as _;
use zvid_core::{FrameSource, RgbFrame, ZvidError};

use crate::decoder::{DecodedFrame, Decoder};
use crate::input::AvInput;
use crate::scaler::RgbScaler;

/// Decodes the best video stream of a file into display-sized RGB24 frames.
///
/// Any demux, decode or scale failure is yielded once as
/// `ZvidError::Decode` and ends the iteration.
pub struct VideoFrameSource {
    input: AvInput,
    decoder: Decoder,
    scaler: RgbScaler,
    fps: Option<f64>,
    eof_sent: bool,
    finished: bool,
}

impl VideoFrameSource {
    pub fn open(path: &Path, width: u32, height: u32) -> anyhow::Result<Self> {
        let input = AvInput::open(path)?;
        let stream = input
            .video_stream()
            .cloned()
            .with_context(|| format!("no video stream in {}", path.display()))?;
        let decoder = Decoder::new(&stream).context("open video decoder")?;
        log::info!(
            "video stream #{}: {}x{}, fps {:?}",
            stream.index(),
            stream.width(),
            stream.height(),
            stream.fps()
        );
        Ok(Self {
            input,
            decoder,
            scaler: RgbScaler::new(width, height),
            fps: stream.fps(),
            eof_sent: false,
            finished: false,
        })
    }

    fn next_decoded(&mut self) -> anyhow::Result<Option<ffmpeg_next::frame::Video>> {
        loop {
            if let Some(DecodedFrame::Video(frame)) = self.decoder.receive_frame()? {
                return Ok(Some(frame));
            }
            if self.eof_sent {
                return Ok(None);
            }
            match self.input.read_packet()? {
                Some(packet) if packet.stream() == self.decoder.stream_index() => {
                    self.decoder.send_packet(&packet)?;
                }
                Some(_) => {}
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn next_frame(&mut self) -> anyhow::Result<Option<RgbFrame>> {
        match self.next_decoded()? {
            Some(frame) => Ok(Some(self.scaler.scale(&frame)?)),
            None => Ok(None),
        }
    }
}

impl Iterator for VideoFrameSource {
    type Item = zvid_core::Result<RgbFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(ZvidError::Decode(format!("{:#}", e))))
            }
        }
    }
}

impl FrameSource for VideoFrameSource {
    fn frame_rate(&self) -> Option<f64> {
        self.fps
    }
}

#[cfg(test)]
#[path = "video_test.rs"]
mod video_test;
