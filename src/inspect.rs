use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use zvid_core::ZoneHeader;

#[derive(Debug)]
pub struct ZoneReport {
    pub path: PathBuf,
    pub header: ZoneHeader,
    pub file_len: u64,
}

impl ZoneReport {
    /// The file holds exactly the header plus `frame_count` frames.
    pub fn is_consistent(&self) -> bool {
        self.file_len == self.header.expected_file_len()
    }
}

impl fmt::Display for ZoneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        writeln!(f, "{}", self.path.display())?;
        writeln!(
            f,
            "  {}x{} px, {} bytes/px, {:?}",
            h.width, h.rows_per_zone, h.bytes_per_pixel, h.pixel_format
        )?;
        writeln!(f, "  frames: {} ({} bytes each)", h.frame_count, h.frame_bytes())?;
        if self.is_consistent() {
            write!(f, "  size: {} bytes, ok", self.file_len)
        } else {
            write!(
                f,
                "  size: {} bytes, expected {}",
                self.file_len,
                h.expected_file_len()
            )
        }
    }
}

pub fn inspect(path: &Path) -> anyhow::Result<ZoneReport> {
    let header = ZoneHeader::read_from(path)?;
    let file_len = std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    Ok(ZoneReport {
        path: path.to_path_buf(),
        header,
        file_len,
    })
}
