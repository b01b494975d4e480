use std::collections::HashMap;

use tracing::debug;

use super::{check_shapes, in_scope, zone_key, ResampleScope, ResampleStrategy};
use crate::error::Result;
use crate::model::{values_equal, Grid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneStatistic {
    Minimum,
    Maximum,
    Mean,
    /// Nearest-rank percentile, 0-100
    Percentile(u8),
}

impl ZoneStatistic {
    /// Statistic over `values`, `None` when empty. The slice may be reordered.
    pub fn compute(&self, values: &mut [f32]) -> Option<f32> {
        if values.is_empty() {
            return None;
        }
        let value = match self {
            ZoneStatistic::Minimum => values.iter().copied().fold(f32::INFINITY, f32::min),
            ZoneStatistic::Maximum => values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            ZoneStatistic::Mean => {
                let sum: f64 = values.iter().map(|&v| v as f64).sum();
                (sum / values.len() as f64) as f32
            }
            ZoneStatistic::Percentile(percentile) => {
                values.sort_by(f32::total_cmp);
                // 整数演算で floor(p/100·n) を求める
                let rank = (*percentile as usize).saturating_mul(values.len()) / 100;
                values[rank.min(values.len() - 1)]
            }
        };
        Some(value)
    }
}

/// One statistic per zone, assigned to every cell of the zone.
#[derive(Debug, Clone, Copy)]
pub struct FullZoneStatistics {
    statistic: ZoneStatistic,
}

impl FullZoneStatistics {
    pub fn new(statistic: ZoneStatistic) -> Self {
        Self { statistic }
    }
}

impl ResampleStrategy for FullZoneStatistics {
    fn name(&self) -> &'static str {
        "full zone statistics"
    }

    fn scope(&self) -> ResampleScope {
        ResampleScope::WholeGrid
    }

    fn resample(&self, values: &Grid, zone: &Grid, zone_value: Option<f32>) -> Result<Grid> {
        check_shapes(values, zone)?;

        // ゾーンごとの値を収集
        let mut populations: HashMap<u32, (f32, Vec<f32>)> = HashMap::new();
        for row in 0..zone.rows {
            for col in 0..zone.cols {
                if !in_scope(zone, row, col, zone_value) {
                    continue;
                }
                let zone_id = zone.get(row, col);
                let entry = populations
                    .entry(zone_key(zone_id))
                    .or_insert_with(|| (zone_id, Vec::new()));
                if values.has_data(row, col) {
                    entry.1.push(values.get(row, col));
                }
            }
        }

        let mut statistics = HashMap::with_capacity(populations.len());
        for (key, (zone_id, mut population)) in populations {
            match self.statistic.compute(&mut population) {
                Some(value) => {
                    statistics.insert(key, value);
                }
                None => debug!("Zone {} has no values, left unassigned", zone_id),
            }
        }

        let mut result = values.reset();
        for row in 0..zone.rows {
            for col in 0..zone.cols {
                if !in_scope(zone, row, col, zone_value) {
                    continue;
                }
                if let Some(&value) = statistics.get(&zone_key(zone.get(row, col))) {
                    result.set(row, col, value);
                }
            }
        }
        Ok(result)
    }
}

/// Statistic over a `(2d+1)²` window of same-zone cells around every cell.
#[derive(Debug, Clone, Copy)]
pub struct LocalWindowStatistics {
    statistic: ZoneStatistic,
    half_width: usize,
}

impl LocalWindowStatistics {
    pub fn new(statistic: ZoneStatistic, half_width: usize) -> Self {
        Self {
            statistic,
            half_width,
        }
    }
}

impl ResampleStrategy for LocalWindowStatistics {
    fn name(&self) -> &'static str {
        "local window statistics"
    }

    fn scope(&self) -> ResampleScope {
        ResampleScope::WholeGrid
    }

    fn resample(&self, values: &Grid, zone: &Grid, zone_value: Option<f32>) -> Result<Grid> {
        if self.half_width == 0 {
            return FullZoneStatistics::new(self.statistic).resample(values, zone, zone_value);
        }
        check_shapes(values, zone)?;

        let d = self.half_width;
        let mut result = values.reset();
        let mut window = Vec::new();
        for row in 0..zone.rows {
            for col in 0..zone.cols {
                if !in_scope(zone, row, col, zone_value) {
                    continue;
                }
                let zone_id = zone.get(row, col);

                window.clear();
                let last_row = row.saturating_add(d).min(zone.rows - 1);
                let last_col = col.saturating_add(d).min(zone.cols - 1);
                for r in row.saturating_sub(d)..=last_row {
                    for c in col.saturating_sub(d)..=last_col {
                        if values_equal(zone.get(r, c), zone_id) && values.has_data(r, c) {
                            window.push(values.get(r, c));
                        }
                    }
                }

                if let Some(value) = self.statistic.compute(&mut window) {
                    result.set(row, col, value);
                }
            }
        }
        Ok(result)
    }
}
