use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, ZvidError>;

#[derive(Debug, thiserror::Error)]
pub enum ZvidError {
    /// Creating, writing, seeking or closing an output failed.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A source frame could not be read. Ends frame iteration early.
    #[error("decode error: {0}")]
    Decode(String),
    #[error("malformed audio: {0}")]
    MalformedAudio(String),
    /// Contract violation, e.g. append after finalize.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid zone header: {0}")]
    InvalidHeader(String),
}

impl ZvidError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
