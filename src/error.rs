use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by frame sources and the playback controller.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to open frame source {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read frame source: {0}")]
    Read(#[from] io::Error),
    #[error("frame source {} contains no frames", path.display())]
    EmptySource { path: PathBuf },
    #[error("frame number {requested} out of range (0..={total})")]
    OutOfRange { requested: i64, total: usize },
    #[error("{operation} is not available on a live stream")]
    Unsupported { operation: &'static str },
}

impl FrameError {
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}

pub type FrameResult<T> = std::result::Result<T, FrameError>;
