//! RGB565 pixel packing.
//!
//! Quantization is truncating, never rounding: red and blue keep their top 5
//! bits, green its top 6, so `encode` is bit-exact and reproducible across
//! machines. Packed values are serialized little-endian, low byte first.

use std::ops::Range;

use crate::frame::RgbFrame;

/// Size of one packed pixel in bytes.
pub const BYTES_PER_PIXEL: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

pub fn encode(px: Rgb) -> u16 {
    (u16::from(px.r >> 3) << 11) | (u16::from(px.g >> 2) << 5) | u16::from(px.b >> 3)
}

/// Inverse of [`encode`] up to quantization: the low 3/2/3 bits come back as zero.
pub fn decode(value: u16) -> Rgb {
    Rgb {
        r: ((value >> 11) as u8 & 0x1f) << 3,
        g: ((value >> 5) as u8 & 0x3f) << 2,
        b: (value as u8 & 0x1f) << 3,
    }
}

/// Packs pixels into `2 * pixels.len()` bytes.
pub fn pack_row_block(pixels: &[Rgb]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * BYTES_PER_PIXEL);
    for &px in pixels {
        out.extend_from_slice(&encode(px).to_le_bytes());
    }
    out
}

/// Packs tightly packed RGB24 bytes, appending to `out`. A trailing partial
/// pixel is ignored.
pub fn pack_rgb24_into(rgb: &[u8], out: &mut Vec<u8>) {
    out.reserve(rgb.len() / 3 * BYTES_PER_PIXEL);
    for px in rgb.chunks_exact(3) {
        let value = encode(Rgb::new(px[0], px[1], px[2]));
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Packs rows `[rows.start, rows.end)` of `frame`, row-major.
pub fn pack_rows(frame: &RgbFrame, rows: Range<usize>) -> Vec<u8> {
    let mut out = Vec::new();
    pack_rgb24_into(frame.rows(rows), &mut out);
    out
}

/// Reads back packed values, low byte first.
pub fn unpack(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(BYTES_PER_PIXEL)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode(Rgb::new(0, 0, 0)), 0x0000);
        assert_eq!(encode(Rgb::new(255, 255, 255)), 0xffff);
        assert_eq!(encode(Rgb::new(255, 0, 0)), 0xf800);
        assert_eq!(encode(Rgb::new(0, 255, 0)), 0x07e0);
        assert_eq!(encode(Rgb::new(0, 0, 255)), 0x001f);
        // truncation, not rounding: 7 >> 3 == 0
        assert_eq!(encode(Rgb::new(7, 3, 7)), 0x0000);
        assert_eq!(encode(Rgb::new(8, 4, 8)), 0x0821);
    }

    #[test]
    fn test_decode_recovers_truncated_channels() {
        for r in (0..=255u16).step_by(3) {
            for g in (0..=255u16).step_by(5) {
                for b in (0..=255u16).step_by(7) {
                    let px = Rgb::new(r as u8, g as u8, b as u8);
                    let back = decode(encode(px));
                    assert_eq!(back.r, px.r & 0xf8);
                    assert_eq!(back.g, px.g & 0xfc);
                    assert_eq!(back.b, px.b & 0xf8);
                }
            }
        }
    }

    #[test]
    fn test_pack_row_block_is_low_byte_first() {
        let pixels = [Rgb::new(255, 0, 0), Rgb::new(0, 0, 255), Rgb::new(18, 200, 99)];
        let packed = pack_row_block(&pixels);
        assert_eq!(packed.len(), pixels.len() * 2);
        assert_eq!(&packed[..4], &[0x00, 0xf8, 0x1f, 0x00]);
        let values = unpack(&packed);
        let expected: Vec<u16> = pixels.iter().map(|&p| encode(p)).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_pack_rows_restricts_to_range() {
        let mut data = vec![0u8; 4 * 3 * 3];
        // row 1 is pure green
        for px in data[12..24].chunks_exact_mut(3) {
            px[1] = 255;
        }
        let frame = RgbFrame::new(data, 4, 3).unwrap();
        let packed = pack_rows(&frame, 1..2);
        assert_eq!(unpack(&packed), vec![0x07e0; 4]);
        assert_eq!(pack_rows(&frame, 0..3).len(), 4 * 3 * 2);
    }

    #[test]
    fn test_pack_rgb24_matches_row_block() {
        let pixels = [Rgb::new(1, 2, 3), Rgb::new(250, 128, 64)];
        let rgb: Vec<u8> = pixels.iter().flat_map(|p| [p.r, p.g, p.b]).collect();
        let mut out = Vec::new();
        pack_rgb24_into(&rgb, &mut out);
        assert_eq!(out, pack_row_block(&pixels));
    }
}
