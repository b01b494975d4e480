use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::{check_shapes, in_scope, ResampleScope, ResampleStrategy};
use crate::error::Result;
use crate::model::{values_equal, Cell, Connectivity, Grid};
use crate::settings::ConflictMethod;

/// Breadth-first propagation of known values into no-data cells.
///
/// Propagation runs in rounds. A round resolves exactly the cells that were
/// queued when it started, from neighbour values resolved in earlier rounds,
/// and commits them together.
#[derive(Debug, Clone, Copy)]
pub struct NearestNeighbour {
    conflict_method: ConflictMethod,
    connectivity: Connectivity,
}

impl NearestNeighbour {
    pub fn new(conflict_method: ConflictMethod, connectivity: Connectivity) -> Self {
        Self {
            conflict_method,
            connectivity,
        }
    }

    fn same_zone(zone: &Grid, a: Cell, b: Cell) -> bool {
        values_equal(zone.get(a.row, a.col), zone.get(b.row, b.col))
    }

    fn resolved_neighbours<'a>(
        &'a self,
        result: &'a Grid,
        zone: &'a Grid,
        cell: Cell,
    ) -> impl Iterator<Item = f32> + 'a {
        cell.neighbours(result.rows, result.cols, self.connectivity)
            .filter(move |n| result.has_data(n.row, n.col) && Self::same_zone(zone, cell, *n))
            .map(move |n| result.get(n.row, n.col))
    }
}

impl ResampleStrategy for NearestNeighbour {
    fn name(&self) -> &'static str {
        "nearest neighbour"
    }

    fn scope(&self) -> ResampleScope {
        ResampleScope::Region
    }

    fn resample(&self, values: &Grid, zone: &Grid, zone_value: Option<f32>) -> Result<Grid> {
        check_shapes(values, zone)?;

        // 既知の値をコピー
        let mut result = values.reset();
        for row in 0..zone.rows {
            for col in 0..zone.cols {
                if in_scope(zone, row, col, zone_value) {
                    result.set(row, col, values.get(row, col));
                }
            }
        }

        // 初期フロンティア
        let mut queue = VecDeque::new();
        let mut queued = HashSet::new();
        for row in 0..zone.rows {
            for col in 0..zone.cols {
                if !in_scope(zone, row, col, zone_value) || result.has_data(row, col) {
                    continue;
                }
                let cell = Cell::new(row, col);
                if self.resolved_neighbours(&result, zone, cell).next().is_some() {
                    queued.insert(cell);
                    queue.push_back(cell);
                }
            }
        }

        let mut rounds = 0;
        while !queue.is_empty() {
            rounds += 1;
            let round_size = queue.len();
            let mut resolved = Vec::with_capacity(round_size);
            for cell in queue.drain(..round_size) {
                let neighbours = self.resolved_neighbours(&result, zone, cell);
                match combine(self.conflict_method, neighbours) {
                    Some(value) => resolved.push(Cell::with_value(cell.row, cell.col, value)),
                    // 後のラウンドで近傍が増えたら再投入できるようにする
                    None => {
                        queued.remove(&cell);
                    }
                }
            }

            // ラウンド内の値は同時に確定させる
            for cell in &resolved {
                if let Some(value) = cell.value {
                    result.set(cell.row, cell.col, value);
                }
            }

            for cell in &resolved {
                for neighbour in cell.neighbours(zone.rows, zone.cols, self.connectivity) {
                    if !result.has_data(neighbour.row, neighbour.col)
                        && Self::same_zone(zone, *cell, neighbour)
                        && queued.insert(neighbour)
                    {
                        queue.push_back(neighbour);
                    }
                }
            }
        }

        debug!("Nearest neighbour propagation finished after {} rounds", rounds);
        Ok(result)
    }
}

/// Combine resolved neighbour values; `None` when nothing counts.
pub(crate) fn combine(method: ConflictMethod, values: impl Iterator<Item = f32>) -> Option<f32> {
    match method {
        ConflictMethod::ArithmeticAverage => {
            let (sum, count) = values.fold((0.0f64, 0usize), |(sum, count), v| {
                (sum + v as f64, count + 1)
            });
            (count > 0).then(|| (sum / count as f64) as f32)
        }
        ConflictMethod::HarmonicAverage => {
            let mut reciprocal_sum = 0.0f64;
            let mut count = 0usize;
            let mut has_zero = false;
            for v in values {
                if v == 0.0 {
                    has_zero = true;
                } else {
                    reciprocal_sum += 1.0 / v as f64;
                }
                count += 1;
            }
            if count == 0 {
                None
            } else if has_zero {
                // 0を含む調和平均は定義できないので0とする
                Some(0.0)
            } else {
                Some((count as f64 / reciprocal_sum) as f32)
            }
        }
        ConflictMethod::MinimumValue => {
            let mut min = f32::MAX;
            let mut count = 0;
            for v in values {
                if v < min {
                    min = v;
                    count = 1;
                }
            }
            (count > 0).then_some(min)
        }
        ConflictMethod::MaximumValue => {
            let mut max = f32::MIN;
            let mut count = 0;
            for v in values {
                if v > max {
                    max = v;
                    count = 1;
                }
            }
            (count > 0).then_some(max)
        }
    }
}
