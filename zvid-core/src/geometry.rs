use std::ops::Range;

use crate::error::{Result, ZvidError};
use crate::pixel::BYTES_PER_PIXEL;

/// Output frame size and its split into equal-height row bands ("zones").
///
/// `zone_count * rows_per_zone == height` always holds. Width and
/// rows_per_zone are stored as u16 in every zone header, so both are
/// checked against `u16::MAX` here rather than at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    width: u16,
    height: u32,
    rows_per_zone: u16,
    zone_count: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, rows_per_zone: u32, zone_count: u32) -> Result<Self> {
        if width == 0 || height == 0 || rows_per_zone == 0 || zone_count == 0 {
            return Err(ZvidError::InvalidGeometry(format!(
                "all dimensions must be non-zero (width={}, height={}, rows_per_zone={}, zone_count={})",
                width, height, rows_per_zone, zone_count
            )));
        }
        let width = u16::try_from(width).map_err(|_| {
            ZvidError::InvalidGeometry(format!("width {} does not fit in u16", width))
        })?;
        let rows = u16::try_from(rows_per_zone).map_err(|_| {
            ZvidError::InvalidGeometry(format!(
                "rows_per_zone {} does not fit in u16",
                rows_per_zone
            ))
        })?;
        if u64::from(zone_count) * u64::from(rows_per_zone) != u64::from(height) {
            return Err(ZvidError::InvalidGeometry(format!(
                "zone_count ({}) * rows_per_zone ({}) != height ({})",
                zone_count, rows_per_zone, height
            )));
        }
        Ok(Self {
            width,
            height,
            rows_per_zone: rows,
            zone_count,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rows_per_zone(&self) -> u16 {
        self.rows_per_zone
    }

    pub fn zone_count(&self) -> u32 {
        self.zone_count
    }

    /// Row range `[z*R, (z+1)*R)` owned by zone `z`.
    pub fn zone_rows(&self, zone: u32) -> Range<usize> {
        let rows = self.rows_per_zone as usize;
        let start = zone as usize * rows;
        start..start + rows
    }

    /// Packed bytes one zone contributes per frame.
    pub fn zone_frame_bytes(&self) -> usize {
        self.rows_per_zone as usize * self.width as usize * BYTES_PER_PIXEL
    }

    /// Size of a tightly packed RGB24 frame of this geometry.
    pub fn rgb_frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}
