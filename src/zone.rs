//! Zone orchestration: scan, discover, resample, merge.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::{ResampleError, Result};
use crate::model::{values_equal, Cell, Connectivity, Grid};
use crate::region::{discover_region, RegionQuery};
use crate::resample::{ResampleScope, ResampleStrategy};
use crate::settings::ResampleSettings;

/// Zone value and no-data of a derived zone grid.
pub const DERIVED_ZONE_VALUE: f32 = 1.0;
pub const DERIVED_ZONE_NODATA: f32 = 0.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Regions handed to a region strategy
    pub regions: usize,
    /// Zone cells that received a value they did not have
    pub filled: usize,
    /// Zone cells still without a value
    pub unresolved: usize,
}

#[derive(Debug, Clone)]
pub struct ResampleOutcome {
    pub grid: Grid,
    pub summary: RunSummary,
}

pub struct ZoneResampler {
    strategy: Box<dyn ResampleStrategy>,
    connectivity: Connectivity,
}

impl ZoneResampler {
    pub fn new(settings: &ResampleSettings) -> Result<Self> {
        Ok(Self::with_strategy(
            settings.strategy()?,
            settings.connectivity(),
        ))
    }

    pub fn with_strategy(strategy: Box<dyn ResampleStrategy>, connectivity: Connectivity) -> Self {
        Self {
            strategy,
            connectivity,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Resample `values` within the zones of `zone`.
    ///
    /// The result covers the zone grid's extent and carries the value grid's
    /// no-data value.
    pub fn run(&self, values: &Grid, zone: &Grid) -> Result<ResampleOutcome> {
        zone.check_cellsize(values)?;
        let aligned = values.align_to(&zone.extent)?;
        let tolerance = zone.cellsize * 1e-6;
        let offset = (aligned.extent.min_x - zone.extent.min_x)
            .abs()
            .max((aligned.extent.max_y - zone.extent.max_y).abs());
        if aligned.shape() != zone.shape() || offset > tolerance {
            return Err(ResampleError::Misaligned(format!(
                "value grid {:?} cannot be aligned to zone extent {:?}",
                values.extent, zone.extent
            )));
        }

        info!(
            "Resampling {}x{} grid with {}",
            zone.rows,
            zone.cols,
            self.strategy.name()
        );

        // ゾーンと値の重なりで初期化
        let mut result = aligned.reset();
        result.replace_from(zone, &aligned)?;

        let regions = match self.strategy.scope() {
            ResampleScope::WholeGrid => {
                let local = self.strategy.resample(&aligned, zone, None)?;
                result.replace_from(&local, &local)?;
                0
            }
            ResampleScope::Region => self.resample_regions(&aligned, zone, &mut result)?,
        };

        let summary = summarize(&aligned, zone, &result, regions);
        if summary.unresolved > 0 {
            warn!(
                "{} zone cells could not be resolved and remain no-data",
                summary.unresolved
            );
        }
        info!(
            "Filled {} cells in {} regions",
            summary.filled, summary.regions
        );

        Ok(ResampleOutcome {
            grid: result,
            summary,
        })
    }

    fn resample_regions(&self, values: &Grid, zone: &Grid, result: &mut Grid) -> Result<usize> {
        let mut processed = values.clone();
        // ゾーン値が値グリッドのno-dataと同じでも処理済みと判定できる値
        let marker = if values_equal(processed.nodata, 1.0) {
            0.0
        } else {
            1.0
        };
        let mut sub_zones: HashMap<u32, usize> = HashMap::new();
        let mut regions = 0;

        for row in 0..zone.rows {
            for col in 0..zone.cols {
                if !zone.has_data(row, col) || processed.has_data(row, col) {
                    continue;
                }
                let zone_value = zone.get(row, col);

                let query = RegionQuery::new(zone_value, self.connectivity);
                let region = discover_region(zone, zone, Cell::new(row, col), &query)?;
                let bounds = region.bounds;
                let local_values =
                    values.window(bounds.min_row, bounds.min_col, bounds.rows(), bounds.cols());
                let local_result =
                    self.strategy
                        .resample(&local_values, &region.grid, Some(zone_value))?;

                result.replace_from(&region.grid, &local_result)?;
                processed.replace_where_data(&region.grid, marker)?;

                regions += 1;
                let ordinal = sub_zones.entry(zone_value.to_bits()).or_insert(0);
                *ordinal += 1;
                debug!(
                    "Resampled sub-zone {}.{} ({} cells)",
                    zone_value,
                    ordinal,
                    region.cells.len()
                );
            }
        }

        Ok(regions)
    }

    /// Fill the no-data cells of `values` using a zone derived from them.
    ///
    /// Cells outside the derived zone keep their values.
    pub fn run_derived(&self, values: &Grid) -> Result<ResampleOutcome> {
        if self.strategy.scope() != ResampleScope::Region {
            return Err(ResampleError::invalid_settings(format!(
                "{} needs a zone grid",
                self.strategy.name()
            )));
        }

        let zone = derive_zone(values, self.connectivity);
        let outcome = self.run(values, &zone)?;

        let mut grid = values.clone();
        grid.replace_from(&outcome.grid, &outcome.grid)?;
        Ok(ResampleOutcome {
            grid,
            summary: outcome.summary,
        })
    }
}

/// Zone of the no-data cells of `values`, grown by one cell.
pub fn derive_zone(values: &Grid, connectivity: Connectivity) -> Grid {
    let mut zone = Grid {
        nodata: DERIVED_ZONE_NODATA,
        values: vec![DERIVED_ZONE_NODATA; values.values.len()],
        ..values.clone()
    };
    for row in 0..values.rows {
        for col in 0..values.cols {
            if values.has_data(row, col) {
                continue;
            }
            zone.set(row, col, DERIVED_ZONE_VALUE);
            let cell = Cell::new(row, col);
            for neighbour in cell.neighbours(values.rows, values.cols, connectivity) {
                zone.set(neighbour.row, neighbour.col, DERIVED_ZONE_VALUE);
            }
        }
    }
    zone
}

fn summarize(values: &Grid, zone: &Grid, result: &Grid, regions: usize) -> RunSummary {
    let mut summary = RunSummary {
        regions,
        ..Default::default()
    };
    for row in 0..zone.rows {
        for col in 0..zone.cols {
            if !zone.has_data(row, col) {
                continue;
            }
            match (values.has_data(row, col), result.has_data(row, col)) {
                (false, true) => summary.filled += 1,
                (_, false) => summary.unresolved += 1,
                _ => {}
            }
        }
    }
    summary
}
