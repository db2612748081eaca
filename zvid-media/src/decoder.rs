use ffmpeg_next::Packet;

use crate::stream::AvStream;

pub enum DecodedFrame {
    Video(ffmpeg_next::frame::Video),
    Audio(ffmpeg_next::frame::Audio),
}

enum DecoderType {
    Video(ffmpeg_next::codec::decoder::Video),
    Audio(ffmpeg_next::codec::decoder::Audio),
}

impl DecoderType {
    fn send_packet(&mut self, packet: &Packet) -> anyhow::Result<()> {
        match self {
            DecoderType::Video(video_decoder) => video_decoder.send_packet(packet)?,
            DecoderType::Audio(audio_decoder) => audio_decoder.send_packet(packet)?,
        }
        Ok(())
    }

    fn send_eof(&mut self) -> anyhow::Result<()> {
        match self {
            DecoderType::Video(video_decoder) => video_decoder.send_eof()?,
            DecoderType::Audio(audio_decoder) => audio_decoder.send_eof()?,
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> anyhow::Result<Option<DecodedFrame>> {
        match self {
            DecoderType::Video(video_decoder) => {
                let mut frame = ffmpeg_next::frame::Video::empty();
                match video_decoder.receive_frame(&mut frame) {
                    Ok(()) => Ok(Some(DecodedFrame::Video(frame))),
                    Err(ffmpeg_next::Error::Eof) => Ok(None),
                    Err(ffmpeg_next::Error::Other { errno })
                        if errno == ffmpeg_next::util::error::EAGAIN =>
                    {
                        Ok(None)
                    }
                    Err(err) => Err(err.into()),
                }
            }
            DecoderType::Audio(audio_decoder) => {
                let mut frame = ffmpeg_next::frame::Audio::empty();
                match audio_decoder.receive_frame(&mut frame) {
                    Ok(()) => Ok(Some(DecodedFrame::Audio(frame))),
                    Err(ffmpeg_next::Error::Eof) => Ok(None),
                    Err(ffmpeg_next::Error::Other { errno })
                        if errno == ffmpeg_next::util::error::EAGAIN =>
                    {
                        Ok(None)
                    }
                    Err(err) => Err(err.into()),
                }
            }
        }
    }
}

/// Synchronous decoder for one stream. `receive_frame` returns `Ok(None)`
/// both when more input is needed and after the final frame was drained.
pub struct Decoder {
    stream_index: usize,
    inner: DecoderType,
}

impl Decoder {
    pub fn new(stream: &AvStream) -> anyhow::Result<Self> {
        let mut decoder_ctx = ffmpeg_next::codec::Context::new();
        unsafe {
            (*decoder_ctx.as_mut_ptr()).time_base = stream.time_base().into();
        }
        decoder_ctx.set_parameters(stream.parameters().clone())?;

        let inner = if stream.is_video() {
            let video_decoder = decoder_ctx.decoder().video()?;
            if video_decoder.format() == ffmpeg_next::format::Pixel::None
                || video_decoder.width() == 0
                || video_decoder.height() == 0
            {
                return Err(anyhow::anyhow!("missing codec parameters"));
            }
            DecoderType::Video(video_decoder)
        } else if stream.is_audio() {
            DecoderType::Audio(decoder_ctx.decoder().audio()?)
        } else {
            return Err(anyhow::anyhow!("unsupported stream type"));
        };

        Ok(Self {
            stream_index: stream.index(),
            inner,
        })
    }

    pub fn send_packet(&mut self, packet: &Packet) -> anyhow::Result<()> {
        self.inner.send_packet(packet)
    }

    pub fn send_eof(&mut self) -> anyhow::Result<()> {
        self.inner.send_eof()
    }

    pub fn receive_frame(&mut self) -> anyhow::Result<Option<DecodedFrame>> {
        self.inner.receive_frame()
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }
}
