//! Per-zone output streams.
//!
//! Layout of a zone file, little-endian throughout:
//!
//! ```text
//! offset  size  field
//!      0     4  magic "ZVID"
//!      4     2  width
//!      6     2  rows_per_zone
//!      8     2  bytes_per_pixel (2)
//!     10     4  frame_count (0 until finalize)
//!     14     1  pixel_format (1 = RGB565)
//!     15     7  reserved, zero
//!     22     -  frame_count * rows_per_zone * width * 2 bytes of pixels
//! ```

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, ZvidError};
use crate::frame::RgbFrame;
use crate::geometry::FrameGeometry;
use crate::pixel::{self, BYTES_PER_PIXEL};

pub const ZONE_MAGIC: [u8; 4] = *b"ZVID";
pub const HEADER_SIZE: usize = 22;
pub const FRAME_COUNT_OFFSET: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PixelFormat {
    Rgb565 = 1,
}

impl TryFrom<u8> for PixelFormat {
    type Error = ZvidError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(PixelFormat::Rgb565),
            other => Err(ZvidError::InvalidHeader(format!(
                "unknown pixel format {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneHeader {
    pub width: u16,
    pub rows_per_zone: u16,
    pub bytes_per_pixel: u16,
    pub frame_count: u32,
    pub pixel_format: PixelFormat,
}

impl ZoneHeader {
    /// Header as written at open time, with a zero frame count.
    pub fn new(geometry: &FrameGeometry) -> Self {
        Self {
            width: geometry.width(),
            rows_per_zone: geometry.rows_per_zone(),
            bytes_per_pixel: BYTES_PER_PIXEL as u16,
            frame_count: 0,
            pixel_format: PixelFormat::Rgb565,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&ZONE_MAGIC);
        buf[4..6].copy_from_slice(&self.width.to_le_bytes());
        buf[6..8].copy_from_slice(&self.rows_per_zone.to_le_bytes());
        buf[8..10].copy_from_slice(&self.bytes_per_pixel.to_le_bytes());
        buf[10..14].copy_from_slice(&self.frame_count.to_le_bytes());
        buf[14] = self.pixel_format as u8;
        buf
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let Some(buf) = bytes.get(..HEADER_SIZE) else {
            return Err(ZvidError::InvalidHeader(format!(
                "need {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        };
        if buf[0..4] != ZONE_MAGIC {
            return Err(ZvidError::InvalidHeader(format!(
                "bad magic {:02x?}",
                &buf[0..4]
            )));
        }
        let u16_at = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
        let bytes_per_pixel = u16_at(8);
        if usize::from(bytes_per_pixel) != BYTES_PER_PIXEL {
            return Err(ZvidError::InvalidHeader(format!(
                "bytes_per_pixel must be {}, got {}",
                BYTES_PER_PIXEL, bytes_per_pixel
            )));
        }
        Ok(Self {
            width: u16_at(4),
            rows_per_zone: u16_at(6),
            bytes_per_pixel,
            frame_count: u32::from_le_bytes([buf[10], buf[11], buf[12], buf[13]]),
            pixel_format: PixelFormat::try_from(buf[14])?,
        })
    }

    /// Reads and parses the header at the start of a zone file.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| ZvidError::io(path, e))?;
        let mut buf = [0u8; HEADER_SIZE];
        file.read_exact(&mut buf)
            .map_err(|e| ZvidError::io(path, e))?;
        Self::parse(&buf)
    }

    pub fn frame_bytes(&self) -> u64 {
        u64::from(self.rows_per_zone) * u64::from(self.width) * u64::from(self.bytes_per_pixel)
    }

    /// Total file size implied by this header.
    pub fn expected_file_len(&self) -> u64 {
        HEADER_SIZE as u64 + u64::from(self.frame_count) * self.frame_bytes()
    }
}

/// Conventional name of zone `zone` inside an output directory.
pub fn zone_path(dir: &Path, zone: u32) -> PathBuf {
    dir.join(format!("zvideo_zone{}.bin", zone))
}

enum WriterState {
    Open(BufWriter<File>),
    Finalized,
}

/// Append-only writer for one zone stream.
///
/// Opening writes the header with a zero frame count. [`finalize`] patches
/// the count in place at [`FRAME_COUNT_OFFSET`]. A writer dropped while still
/// open finalizes itself with the frames appended so far.
///
/// [`finalize`]: ZoneStreamWriter::finalize
pub struct ZoneStreamWriter {
    zone: u32,
    path: PathBuf,
    header: ZoneHeader,
    frame_bytes: usize,
    frames: u32,
    state: WriterState,
}

impl ZoneStreamWriter {
    pub fn open(path: impl Into<PathBuf>, zone: u32, geometry: &FrameGeometry) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| ZvidError::io(&path, e))?;
        let header = ZoneHeader::new(geometry);
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&header.to_bytes())
            .map_err(|e| ZvidError::io(&path, e))?;
        log::debug!("zone {} opened: {}", zone, path.display());
        Ok(Self {
            zone,
            path,
            header,
            frame_bytes: geometry.zone_frame_bytes(),
            frames: 0,
            state: WriterState::Open(writer),
        })
    }

    pub fn zone(&self) -> u32 {
        self.zone
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, WriterState::Open(_))
    }

    /// Appends one frame's packed pixels for this zone.
    pub fn append(&mut self, packed: &[u8]) -> Result<()> {
        let WriterState::Open(writer) = &mut self.state else {
            return Err(ZvidError::InvalidState(format!(
                "append on finalized zone {}",
                self.zone
            )));
        };
        if packed.len() != self.frame_bytes {
            return Err(ZvidError::InvalidState(format!(
                "zone {} frame must be {} bytes, got {}",
                self.zone,
                self.frame_bytes,
                packed.len()
            )));
        }
        let next = self.frames.checked_add(1).ok_or_else(|| {
            ZvidError::InvalidState(format!("zone {} frame count overflow", self.zone))
        })?;
        writer
            .write_all(packed)
            .map_err(|e| ZvidError::io(&self.path, e))?;
        self.frames = next;
        Ok(())
    }

    /// Patches the frame count into the header and closes the file.
    ///
    /// Runs even after a failed append: whatever is still buffered is
    /// written out if possible, then the header gets the number of whole
    /// frames that actually reached the file and any torn tail is cut off.
    /// A write error hit while flushing is returned after the header patch.
    pub fn finalize(&mut self) -> Result<u32> {
        let writer = match std::mem::replace(&mut self.state, WriterState::Finalized) {
            WriterState::Open(writer) => writer,
            WriterState::Finalized => {
                return Err(ZvidError::InvalidState(format!(
                    "zone {} already finalized",
                    self.zone
                )));
            }
        };
        let (mut file, pending) = writer.into_parts();
        let flushed = match pending {
            Ok(buf) => file.write_all(&buf),
            Err(_) => Err(std::io::Error::other("writer panicked with data buffered")),
        };
        let sealed = seal(&mut file, &self.header, self.frames, self.frame_bytes as u64);

        let io = |e: std::io::Error| ZvidError::io(&self.path, e);
        if let Ok(durable) = &sealed {
            if *durable < self.frames {
                log::warn!(
                    "zone {}: {} frames appended but only {} reached the file",
                    self.zone,
                    self.frames,
                    durable
                );
            }
            self.frames = *durable;
        }
        flushed.map_err(io)?;
        let frames = sealed.map_err(io)?;
        log::debug!("zone {} finalized: {} frames", self.zone, frames);
        Ok(frames)
    }
}

/// Trims `file` to the whole frames it holds (at most `counted`) and writes
/// that count into the header, rewriting the header if it never made it out.
fn seal(
    file: &mut File,
    header: &ZoneHeader,
    counted: u32,
    frame_bytes: u64,
) -> std::io::Result<u32> {
    let len = file.metadata()?.len();
    let on_disk = len.saturating_sub(HEADER_SIZE as u64) / frame_bytes;
    let durable = u32::try_from(on_disk).unwrap_or(u32::MAX).min(counted);
    file.set_len(HEADER_SIZE as u64 + u64::from(durable) * frame_bytes)?;
    if len < HEADER_SIZE as u64 {
        let header = ZoneHeader {
            frame_count: durable,
            ..*header
        };
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.to_bytes())?;
    } else {
        file.seek(SeekFrom::Start(FRAME_COUNT_OFFSET))?;
        file.write_all(&durable.to_le_bytes())?;
    }
    file.sync_all()?;
    Ok(durable)
}

impl Drop for ZoneStreamWriter {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.finalize() {
                log::error!("zone {} finalize on drop failed: {}", self.zone, e);
            }
        }
    }
}

/// All zone writers of one run, opened together and finalized together.
pub struct ZoneSet {
    geometry: FrameGeometry,
    writers: Vec<ZoneStreamWriter>,
}

impl ZoneSet {
    /// Opens `zvideo_zone{z}.bin` for every zone under `dir`. Zones opened
    /// before a failure are finalized empty when the partial set drops.
    pub fn open(dir: &Path, geometry: FrameGeometry) -> Result<Self> {
        let mut writers = Vec::with_capacity(geometry.zone_count() as usize);
        for zone in 0..geometry.zone_count() {
            writers.push(ZoneStreamWriter::open(
                zone_path(dir, zone),
                zone,
                &geometry,
            )?);
        }
        Ok(Self { geometry, writers })
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.writers.iter().map(|w| w.path().to_path_buf()).collect()
    }

    /// Splits `frame` into row bands and appends each to its zone.
    pub fn append_frame(&mut self, frame: &RgbFrame) -> Result<()> {
        if frame.width() != u32::from(self.geometry.width())
            || frame.height() != self.geometry.height()
        {
            return Err(ZvidError::InvalidState(format!(
                "frame is {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.geometry.width(),
                self.geometry.height()
            )));
        }
        for writer in &mut self.writers {
            let rows = self.geometry.zone_rows(writer.zone());
            writer.append(&pixel::pack_rows(frame, rows))?;
        }
        Ok(())
    }

    /// Finalizes every zone, even after a failure, and returns the smallest
    /// per-zone frame count or the first error.
    ///
    /// Zones only disagree when an append failed partway through a frame's
    /// bands; the zones before the failing one then hold one frame more.
    pub fn finalize(mut self) -> Result<u32> {
        let mut first_err = None;
        let mut frames: Option<u32> = None;
        for writer in &mut self.writers {
            match writer.finalize() {
                Ok(n) => frames = Some(frames.map_or(n, |f| f.min(n))),
                Err(e) => {
                    log::error!("zone {} finalize failed: {}", writer.zone(), e);
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(frames.unwrap_or(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::Rgb;

    fn geometry() -> FrameGeometry {
        FrameGeometry::new(4, 6, 2, 3).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let header = ZoneHeader {
            frame_count: 0x01020304,
            ..ZoneHeader::new(&FrameGeometry::new(96, 54, 9, 6).unwrap())
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"ZVID");
        assert_eq!(&bytes[4..6], &[96, 0]);
        assert_eq!(&bytes[6..8], &[9, 0]);
        assert_eq!(&bytes[8..10], &[2, 0]);
        assert_eq!(&bytes[10..14], &[4, 3, 2, 1]);
        assert_eq!(bytes[14], 1);
        assert_eq!(&bytes[15..], &[0u8; 7]);
        assert_eq!(ZoneHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let good = ZoneHeader::new(&geometry()).to_bytes();
        assert!(ZoneHeader::parse(&good[..21]).is_err());

        let mut bad_magic = good;
        bad_magic[0] = b'X';
        assert!(ZoneHeader::parse(&bad_magic).is_err());

        let mut bad_format = good;
        bad_format[14] = 9;
        assert!(ZoneHeader::parse(&bad_format).is_err());

        let mut bad_bpp = good;
        bad_bpp[8] = 3;
        assert!(matches!(
            ZoneHeader::parse(&bad_bpp),
            Err(ZvidError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_open_writes_placeholder_header() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("z.bin");
        let mut writer = ZoneStreamWriter::open(&path, 0, &geometry())?;
        // BufWriter holds the header until a flush; finalize flushes it.
        writer.finalize()?;
        let bytes = std::fs::read(&path)?;
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(ZoneHeader::parse(&bytes)?.frame_count, 0);
        Ok(())
    }

    #[test]
    fn test_append_then_finalize_patches_count() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("z.bin");
        let g = geometry();
        let mut writer = ZoneStreamWriter::open(&path, 1, &g)?;
        for _ in 0..5 {
            writer.append(&vec![0xab; g.zone_frame_bytes()])?;
        }
        assert_eq!(writer.finalize()?, 5);

        let bytes = std::fs::read(&path)?;
        let header = ZoneHeader::parse(&bytes)?;
        assert_eq!(header.frame_count, 5);
        assert_eq!(bytes.len() as u64, header.expected_file_len());
        assert_eq!(bytes.len(), HEADER_SIZE + 5 * 2 * 4 * 2);
        assert!(bytes[HEADER_SIZE..].iter().all(|&b| b == 0xab));
        Ok(())
    }

    #[test]
    fn test_append_after_finalize_is_invalid_state() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let g = geometry();
        let mut writer = ZoneStreamWriter::open(dir.path().join("z.bin"), 0, &g)?;
        writer.finalize()?;
        let err = writer.append(&vec![0; g.zone_frame_bytes()]).unwrap_err();
        assert!(matches!(err, ZvidError::InvalidState(_)));
        assert!(matches!(writer.finalize(), Err(ZvidError::InvalidState(_))));
        Ok(())
    }

    #[test]
    fn test_append_wrong_size_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut writer = ZoneStreamWriter::open(dir.path().join("z.bin"), 0, &geometry())?;
        assert!(matches!(
            writer.append(&[0; 3]),
            Err(ZvidError::InvalidState(_))
        ));
        assert_eq!(writer.frames(), 0);
        Ok(())
    }

    #[test]
    fn test_drop_finalizes_open_writer() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("z.bin");
        let g = geometry();
        {
            let mut writer = ZoneStreamWriter::open(&path, 0, &g)?;
            writer.append(&vec![1; g.zone_frame_bytes()])?;
            writer.append(&vec![2; g.zone_frame_bytes()])?;
        }
        let header = ZoneHeader::read_from(&path)?;
        assert_eq!(header.frame_count, 2);
        assert_eq!(std::fs::metadata(&path)?.len(), header.expected_file_len());
        Ok(())
    }

    #[test]
    fn test_open_fails_for_missing_dir() {
        let err = ZoneStreamWriter::open("/nonexistent/dir/z.bin", 0, &geometry())
            .err()
            .unwrap();
        assert!(matches!(err, ZvidError::Io { .. }));
    }

    #[test]
    fn test_zone_set_splits_rows() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let g = geometry();
        let mut zones = ZoneSet::open(dir.path(), g)?;
        // rows 0..2 red, 2..4 green, 4..6 blue
        let mut data = Vec::new();
        for color in [[255, 0, 0], [0, 255, 0], [0, 0, 255]] {
            for _ in 0..2 * 4 {
                data.extend_from_slice(&color);
            }
        }
        zones.append_frame(&RgbFrame::new(data, 4, 6)?)?;
        zones.append_frame(&RgbFrame::solid(4, 6, Rgb::new(255, 255, 255)))?;
        assert_eq!(zones.finalize()?, 2);

        for (zone, first) in [(0u32, 0xf800u16), (1, 0x07e0), (2, 0x001f)] {
            let bytes = std::fs::read(zone_path(dir.path(), zone))?;
            assert_eq!(ZoneHeader::parse(&bytes)?.frame_count, 2);
            let values = pixel::unpack(&bytes[HEADER_SIZE..]);
            assert_eq!(values.len(), 2 * 2 * 4);
            assert!(values[..8].iter().all(|&v| v == first));
            assert!(values[8..].iter().all(|&v| v == 0xffff));
        }
        Ok(())
    }

    #[test]
    fn test_zone_set_rejects_wrong_frame_size() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut zones = ZoneSet::open(dir.path(), geometry())?;
        let err = zones
            .append_frame(&RgbFrame::solid(4, 4, Rgb::default()))
            .unwrap_err();
        assert!(matches!(err, ZvidError::InvalidState(_)));
        assert_eq!(zones.finalize()?, 0);
        Ok(())
    }

    fn open_rw(path: &Path) -> std::io::Result<File> {
        std::fs::OpenOptions::new().read(true).write(true).open(path)
    }

    #[test]
    fn test_seal_keeps_only_frames_on_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("z.bin");
        let g = geometry();
        let header = ZoneHeader::new(&g);
        let frame_bytes = g.zone_frame_bytes();

        // what a write that failed mid-stream leaves behind: header with a
        // zero count, one whole frame, then half of the next
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend(vec![0x11; frame_bytes]);
        bytes.extend(vec![0x22; frame_bytes / 2]);
        std::fs::write(&path, &bytes)?;

        let mut file = open_rw(&path)?;
        assert_eq!(seal(&mut file, &header, 8, frame_bytes as u64)?, 1);
        drop(file);

        let header = ZoneHeader::read_from(&path)?;
        assert_eq!(header.frame_count, 1);
        assert_eq!(std::fs::metadata(&path)?.len(), header.expected_file_len());
        Ok(())
    }

    #[test]
    fn test_seal_never_counts_more_than_appended() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("z.bin");
        let g = geometry();
        let header = ZoneHeader::new(&g);
        let frame_bytes = g.zone_frame_bytes();

        let mut bytes = header.to_bytes().to_vec();
        bytes.extend(vec![0; 3 * frame_bytes]);
        std::fs::write(&path, &bytes)?;

        let mut file = open_rw(&path)?;
        assert_eq!(seal(&mut file, &header, 2, frame_bytes as u64)?, 2);
        drop(file);
        assert_eq!(ZoneHeader::read_from(&path)?.frame_count, 2);
        assert_eq!(
            std::fs::metadata(&path)?.len(),
            (HEADER_SIZE + 2 * frame_bytes) as u64
        );
        Ok(())
    }

    #[test]
    fn test_seal_rewrites_missing_header() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("z.bin");
        let g = geometry();
        std::fs::write(&path, b"ZVI")?;

        let mut file = open_rw(&path)?;
        assert_eq!(seal(&mut file, &ZoneHeader::new(&g), 4, g.zone_frame_bytes() as u64)?, 0);
        drop(file);

        let bytes = std::fs::read(&path)?;
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(ZoneHeader::parse(&bytes)?, ZoneHeader::new(&g));
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_finalize_after_failed_append_still_closes() {
        // every write to /dev/full fails with ENOSPC
        let g = geometry();
        let Ok(mut writer) = ZoneStreamWriter::open("/dev/full", 0, &g) else {
            eprintln!("skip: /dev/full not writable");
            return;
        };
        let frame = vec![0x5a; g.zone_frame_bytes()];
        let mut failed = false;
        for _ in 0..10_000 {
            if let Err(e) = writer.append(&frame) {
                assert!(matches!(e, ZvidError::Io { .. }));
                failed = true;
                break;
            }
        }
        assert!(failed);

        assert!(matches!(writer.finalize(), Err(ZvidError::Io { .. })));
        assert!(!writer.is_open());
        assert!(matches!(writer.finalize(), Err(ZvidError::InvalidState(_))));
    }

    #[test]
    fn test_zone_set_reports_smallest_count() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let g = geometry();
        let mut zones = ZoneSet::open(dir.path(), g)?;
        zones.append_frame(&RgbFrame::solid(4, 6, Rgb::new(9, 9, 9)))?;
        // a frame whose bands only reached the first zone
        zones.writers[0].append(&vec![0; g.zone_frame_bytes()])?;
        let paths = zones.paths();

        assert_eq!(zones.finalize()?, 1);
        assert_eq!(ZoneHeader::read_from(&paths[0])?.frame_count, 2);
        assert_eq!(ZoneHeader::read_from(&paths[1])?.frame_count, 1);
        assert_eq!(ZoneHeader::read_from(&paths[2])?.frame_count, 1);
        Ok(())
    }
}
