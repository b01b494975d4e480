use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResampleError {
    #[error("cellsize mismatch: {expected} vs {found}")]
    CellsizeMismatch { expected: f64, found: f64 },

    #[error("grid extents do not overlap: {0}")]
    NoOverlap(String),

    #[error("grids are not cell aligned: {0}")]
    Misaligned(String),

    #[error("grid shapes differ: {expected:?} vs {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("seed cell ({row}, {col}) does not belong to zone {zone_value}")]
    InvalidSeed {
        row: usize,
        col: usize,
        zone_value: f32,
    },

    #[error("unsupported grid format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResampleError {
    pub fn invalid_settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResampleError>;
