//! Resampling strategies.
//!
//! Every strategy turns a value grid and a zone grid of the same shape into a
//! result grid of that shape. A `zone_value` of `Some(v)` restricts the work
//! to zone cells equal to `v`; `None` handles every zone, treating cells with
//! equal zone values as the same zone.

mod idw;
mod nearest;
mod statistics;

pub use idw::{idw_value, InverseDistance};
pub use nearest::NearestNeighbour;
pub use statistics::{FullZoneStatistics, LocalWindowStatistics, ZoneStatistic};

use crate::error::{ResampleError, Result};
use crate::model::{values_equal, Grid};

/// Granularity the orchestrator feeds a strategy with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleScope {
    /// One connected region at a time
    Region,
    /// The full grid in a single call
    WholeGrid,
}

pub trait ResampleStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn scope(&self) -> ResampleScope;

    fn resample(&self, values: &Grid, zone: &Grid, zone_value: Option<f32>) -> Result<Grid>;
}

fn check_shapes(values: &Grid, zone: &Grid) -> Result<()> {
    zone.check_cellsize(values)?;
    if values.shape() != zone.shape() {
        return Err(ResampleError::ShapeMismatch {
            expected: zone.shape(),
            found: values.shape(),
        });
    }
    Ok(())
}

#[inline]
fn in_scope(zone: &Grid, row: usize, col: usize, zone_value: Option<f32>) -> bool {
    let value = zone.get(row, col);
    !zone.is_nodata(value) && zone_value.map_or(true, |v| values_equal(value, v))
}

/// Hash key consistent with `values_equal`.
#[inline]
fn zone_key(value: f32) -> u32 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        f32::NAN.to_bits()
    } else {
        value.to_bits()
    }
}
