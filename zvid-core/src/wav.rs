//! Raw PCM extraction from RIFF/WAV buffers.

use std::ops::Range;

use bytes::Bytes;

use crate::error::{Result, ZvidError};

/// `RIFF` + size + `WAVE`, skipped before chunk scanning.
pub const RIFF_HEADER_LEN: usize = 12;
/// Header length of a canonical PCM WAV file, used as the fallback offset.
pub const CANONICAL_HEADER_LEN: usize = 44;

const CHUNK_HEADER_LEN: usize = 8;
const DATA_CHUNK_ID: &[u8; 4] = b"data";
const FMT_CHUNK_ID: &[u8; 4] = b"fmt ";

/// Headerless little-endian PCM samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    data: Bytes,
}

impl PcmAudio {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of 16-bit samples (all channels).
    pub fn sample_count(&self) -> usize {
        self.data.len() / 2
    }
}

/// One chunk seen while scanning: its id and the byte range of its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: [u8; 4],
    pub payload: Range<usize>,
}

/// Iterates the chunks after the RIFF header.
///
/// Each chunk's declared length is consumed in full, recognized or not; no
/// pad byte is skipped for odd lengths. Iteration stops at the first chunk
/// header that does not fit in the buffer. A payload range is clamped to the
/// buffer end when the declared length runs past it.
pub struct Chunks<'a> {
    buf: &'a [u8],
    cursor: Option<usize>,
}

pub fn chunks(buf: &[u8]) -> Chunks<'_> {
    Chunks {
        buf,
        cursor: Some(RIFF_HEADER_LEN),
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let cursor = self.cursor?;
        let header = self.buf.get(cursor..cursor.checked_add(CHUNK_HEADER_LEN)?)?;
        let id = [header[0], header[1], header[2], header[3]];
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let start = cursor + CHUNK_HEADER_LEN;
        self.cursor = start.checked_add(len);
        Some(Chunk {
            id,
            payload: start..start.saturating_add(len).min(self.buf.len()),
        })
    }
}

/// Returns the payload of the first `data` chunk.
///
/// When no `data` chunk is found the buffer is assumed to carry a canonical
/// 44-byte header and everything after byte 44 is returned. Buffers shorter
/// than that are [`ZvidError::MalformedAudio`].
pub fn extract(wav: impl Into<Bytes>) -> Result<PcmAudio> {
    let wav = wav.into();
    if let Some(chunk) = chunks(&wav).find(|c| &c.id == DATA_CHUNK_ID) {
        log::debug!(
            "wav data chunk at {}..{}",
            chunk.payload.start,
            chunk.payload.end
        );
        return Ok(PcmAudio {
            data: wav.slice(chunk.payload),
        });
    }
    if wav.len() < CANONICAL_HEADER_LEN {
        return Err(ZvidError::MalformedAudio(format!(
            "no data chunk and only {} bytes (need at least {})",
            wav.len(),
            CANONICAL_HEADER_LEN
        )));
    }
    log::warn!(
        "wav has no data chunk, assuming a {}-byte header",
        CANONICAL_HEADER_LEN
    );
    Ok(PcmAudio {
        data: wav.slice(CANONICAL_HEADER_LEN..),
    })
}

/// Fields of the `fmt ` chunk that describe PCM layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

/// Reads the `fmt ` chunk, if present and long enough.
pub fn format(wav: &[u8]) -> Option<WavFormat> {
    let chunk = chunks(wav).find(|c| &c.id == FMT_CHUNK_ID)?;
    let p = wav.get(chunk.payload)?;
    if p.len() < 16 {
        return None;
    }
    Some(WavFormat {
        audio_format: u16::from_le_bytes([p[0], p[1]]),
        channels: u16::from_le_bytes([p[2], p[3]]),
        sample_rate: u32::from_le_bytes([p[4], p[5], p[6], p[7]]),
        bits_per_sample: u16::from_le_bytes([p[14], p[15]]),
    })
}
