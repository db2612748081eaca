use std::fmt::{Display, Formatter};
use std::ops::Range;

use bytes::Bytes;

use crate::error::{Result, ZvidError};
use crate::pixel::Rgb;

/// A decoded truecolor frame: tightly packed RGB24, row-major, no stride padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    data: Bytes,
    width: u32,
    height: u32,
}

impl RgbFrame {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32) -> Result<Self> {
        let data = data.into();
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(ZvidError::InvalidState(format!(
                "rgb frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Frame filled with a single color.
    pub fn solid(width: u32, height: u32, color: Rgb) -> Self {
        let pixels = width as usize * height as usize;
        let data: Vec<u8> = std::iter::repeat_n([color.r, color.g, color.b], pixels)
            .flatten()
            .collect();
        Self {
            data: Bytes::from(data),
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// RGB24 bytes of the rows in `rows`. Panics if the range is past the last row.
    pub fn rows(&self, rows: Range<usize>) -> &[u8] {
        let stride = self.width as usize * 3;
        &self.data[rows.start * stride..rows.end * stride]
    }
}

impl Display for RgbFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RgbFrame {{ {}x{}, data: {} }}",
            self.width,
            self.height,
            self.data.len()
        )
    }
}
