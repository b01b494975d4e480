//! Grid file readers and writers.

pub mod asc;
pub mod idf;

use std::path::Path;

use crate::error::{ResampleError, Result};
use crate::model::Grid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridFormat {
    Idf,
    Asc,
}

impl GridFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "idf" => Some(GridFormat::Idf),
            "asc" => Some(GridFormat::Asc),
            _ => None,
        }
    }
}

fn format_of(path: &Path) -> Result<GridFormat> {
    GridFormat::from_path(path).ok_or_else(|| {
        ResampleError::UnsupportedFormat(format!("{}: expected .idf or .asc", path.display()))
    })
}

/// Read a grid, choosing the format from the file extension.
pub fn read_grid(path: &Path) -> Result<Grid> {
    match format_of(path)? {
        GridFormat::Idf => idf::read_idf(path),
        GridFormat::Asc => asc::read_asc(path),
    }
}

/// Write a grid, choosing the format from the file extension.
pub fn write_grid(grid: &Grid, path: &Path) -> Result<()> {
    match format_of(path)? {
        GridFormat::Idf => idf::write_idf(grid, path),
        GridFormat::Asc => asc::write_asc(grid, path),
    }
}
