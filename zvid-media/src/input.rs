use std::collections::HashMap;
use std::path::Path;

use anyhow::Context as _;
use ffmpeg_next::{Packet, media};

use crate::stream::AvStream;

/// A demuxed media file. Packets are pulled one at a time on the caller's thread.
pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    streams: HashMap<usize, AvStream>,
    best_video: Option<usize>,
    best_audio: Option<usize>,
}

impl AvInput {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let input = ffmpeg_next::format::input(path)
            .with_context(|| format!("open input {}", path.display()))?;

        let mut streams = HashMap::new();
        for stream in input.streams() {
            streams.insert(stream.index(), AvStream::from(stream));
        }
        let best_video = input.streams().best(media::Type::Video).map(|s| s.index());
        let best_audio = input.streams().best(media::Type::Audio).map(|s| s.index());

        Ok(Self {
            inner: input,
            streams,
            best_video,
            best_audio,
        })
    }

    pub fn streams(&self) -> &HashMap<usize, AvStream> {
        &self.streams
    }

    pub fn video_stream(&self) -> Option<&AvStream> {
        self.best_video.and_then(|i| self.streams.get(&i))
    }

    pub fn audio_stream(&self) -> Option<&AvStream> {
        self.best_audio.and_then(|i| self.streams.get(&i))
    }

    /// Next packet of any stream, `Ok(None)` at end of file.
    pub fn read_packet(&mut self) -> anyhow::Result<Option<Packet>> {
        let mut packet = Packet::empty();
        match packet.read(&mut self.inner) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("read packet: {}", e)),
        }
    }
}
