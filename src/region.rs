//! Connected zone regions.
//!
//! A region is one connected island of cells sharing a zone value. Discovery
//! is a breadth-first flood fill from a seed cell and yields the minimal
//! bounding sub-grid of the island.

use std::collections::{HashSet, VecDeque};

use crate::error::{ResampleError, Result};
use crate::model::{values_equal, Cell, Connectivity, Extent, Grid};

/// Parameters of a single flood fill.
#[derive(Debug, Clone, Copy)]
pub struct RegionQuery {
    pub zone_value: f32,
    /// Value grid cells must equal this to be expanded; `None` expands all
    pub searched_value: Option<f32>,
    /// Expand boundary cells as well
    pub include_boundary: bool,
    pub connectivity: Connectivity,
    /// Written into the output grid for region cells
    pub replacement: f32,
}

impl RegionQuery {
    pub fn new(zone_value: f32, connectivity: Connectivity) -> Self {
        Self {
            zone_value,
            searched_value: None,
            include_boundary: false,
            connectivity,
            replacement: zone_value,
        }
    }
}

/// Inclusive row/column bounds in parent grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl CellBounds {
    fn new(cell: Cell) -> Self {
        Self {
            min_row: cell.row,
            min_col: cell.col,
            max_row: cell.row,
            max_col: cell.col,
        }
    }

    fn include(&mut self, cell: Cell) {
        self.min_row = self.min_row.min(cell.row);
        self.min_col = self.min_col.min(cell.col);
        self.max_row = self.max_row.max(cell.row);
        self.max_col = self.max_col.max(cell.col);
    }

    pub fn rows(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    pub fn cols(&self) -> usize {
        self.max_col - self.min_col + 1
    }
}

#[derive(Debug, Clone)]
pub struct Region {
    /// Bounding sub-grid: region cells hold the replacement value
    pub grid: Grid,
    /// Expanded cells, in visiting order
    pub cells: Vec<Cell>,
    /// Visited cells that failed the searched value
    pub boundary: Vec<Cell>,
    pub bounds: CellBounds,
}

/// Flood fill the zone island containing `seed`.
pub fn discover_region(
    zone: &Grid,
    values: &Grid,
    seed: Cell,
    query: &RegionQuery,
) -> Result<Region> {
    if seed.row >= zone.rows
        || seed.col >= zone.cols
        || !values_equal(zone.get(seed.row, seed.col), query.zone_value)
    {
        return Err(ResampleError::InvalidSeed {
            row: seed.row,
            col: seed.col,
            zone_value: query.zone_value,
        });
    }
    if values.shape() != zone.shape() {
        return Err(ResampleError::ShapeMismatch {
            expected: zone.shape(),
            found: values.shape(),
        });
    }

    let mut queue = VecDeque::new();
    let mut queued = HashSet::new();
    let mut cells = Vec::new();
    let mut boundary = Vec::new();
    let mut bounds = CellBounds::new(seed);

    queued.insert(seed);
    queue.push_back(seed);

    while let Some(cell) = queue.pop_front() {
        bounds.include(cell);

        let expand = query.include_boundary
            || query
                .searched_value
                .map_or(true, |v| values_equal(values.get(cell.row, cell.col), v));
        if !expand {
            boundary.push(cell);
            continue;
        }
        cells.push(cell);

        for neighbour in cell.neighbours(zone.rows, zone.cols, query.connectivity) {
            if queued.contains(&neighbour)
                || !values_equal(zone.get(neighbour.row, neighbour.col), query.zone_value)
            {
                continue;
            }
            queued.insert(neighbour);
            queue.push_back(neighbour);
        }
    }

    let extent = Extent::new(
        zone.extent.min_x + bounds.min_col as f64 * zone.cellsize,
        zone.extent.max_y - (bounds.max_row + 1) as f64 * zone.cellsize,
        zone.extent.min_x + (bounds.max_col + 1) as f64 * zone.cellsize,
        zone.extent.max_y - bounds.min_row as f64 * zone.cellsize,
    );
    let mut grid = Grid {
        extent,
        cellsize: zone.cellsize,
        nodata: zone.nodata,
        rows: bounds.rows(),
        cols: bounds.cols(),
        values: vec![zone.nodata; bounds.rows() * bounds.cols()],
    };
    for cell in &cells {
        grid.set(
            cell.row - bounds.min_row,
            cell.col - bounds.min_col,
            query.replacement,
        );
    }

    Ok(Region {
        grid,
        cells,
        boundary,
        bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ND: f32 = -9999.0;

    fn zone_grid() -> Grid {
        // ゾーン1: 左上のL字と右下の孤立セル（斜めで接続）
        Grid::from_rows(
            0.0,
            0.0,
            1.0,
            ND,
            &[
                &[1.0, 1.0, 2.0, 2.0],
                &[1.0, 2.0, 2.0, 2.0],
                &[2.0, 1.0, 2.0, ND],
                &[2.0, 2.0, 2.0, 1.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_eight_connectivity_joins_diagonals() {
        let zone = zone_grid();
        let query = RegionQuery::new(1.0, Connectivity::Eight);
        let region = discover_region(&zone, &zone, Cell::new(0, 0), &query).unwrap();

        assert_eq!(region.cells.len(), 4);
        assert_eq!(
            region.bounds,
            CellBounds {
                min_row: 0,
                min_col: 0,
                max_row: 2,
                max_col: 1
            }
        );
        assert_eq!(region.grid.shape(), (3, 2));
        assert_eq!(region.grid.count_data(), 4);
        assert_eq!(region.grid.extent, Extent::new(0.0, 1.0, 2.0, 4.0));
    }

    #[test]
    fn test_four_connectivity_splits_diagonals() {
        let zone = zone_grid();
        let query = RegionQuery::new(1.0, Connectivity::Four);
        let region = discover_region(&zone, &zone, Cell::new(0, 0), &query).unwrap();

        assert_eq!(region.cells.len(), 3);
        assert_eq!(region.grid.shape(), (2, 2));
        assert!(!region.grid.has_data(1, 1));
    }

    #[test]
    fn test_every_cell_in_exactly_one_region() {
        let zone = zone_grid();
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let mut owner = vec![0usize; zone.rows * zone.cols];
            let mut regions = 0;
            for row in 0..zone.rows {
                for col in 0..zone.cols {
                    let value = zone.get(row, col);
                    if !zone.has_data(row, col) || owner[row * zone.cols + col] != 0 {
                        continue;
                    }
                    regions += 1;
                    let query = RegionQuery::new(value, connectivity);
                    let region =
                        discover_region(&zone, &zone, Cell::new(row, col), &query).unwrap();
                    let bounds = region.bounds;
                    for cell in &region.cells {
                        assert_eq!(owner[cell.row * zone.cols + cell.col], 0);
                        owner[cell.row * zone.cols + cell.col] = regions;
                        assert!(cell.row >= bounds.min_row && cell.row <= bounds.max_row);
                        assert!(cell.col >= bounds.min_col && cell.col <= bounds.max_col);
                    }
                    // 境界ボックスは実際のセル範囲と一致する
                    let rows = region.cells.iter().map(|c| c.row);
                    let cols = region.cells.iter().map(|c| c.col);
                    assert_eq!(rows.clone().min(), Some(bounds.min_row));
                    assert_eq!(rows.max(), Some(bounds.max_row));
                    assert_eq!(cols.clone().min(), Some(bounds.min_col));
                    assert_eq!(cols.max(), Some(bounds.max_col));
                }
            }
            let expected = match connectivity {
                Connectivity::Four => 4,
                Connectivity::Eight => 3,
            };
            assert_eq!(regions, expected, "{connectivity:?}");
            assert_eq!(owner.iter().filter(|&&o| o != 0).count(), 15);
        }
    }

    #[test]
    fn test_searched_value_stops_expansion() {
        let zone = Grid::from_rows(0.0, 0.0, 1.0, ND, &[&[1.0, 1.0, 1.0]]).unwrap();
        let values = Grid::from_rows(0.0, 0.0, 1.0, ND, &[&[5.0, 7.0, 5.0]]).unwrap();
        let query = RegionQuery {
            searched_value: Some(5.0),
            replacement: 9.0,
            ..RegionQuery::new(1.0, Connectivity::Four)
        };
        let region = discover_region(&zone, &values, Cell::new(0, 0), &query).unwrap();

        assert_eq!(region.cells, vec![Cell::new(0, 0)]);
        assert_eq!(region.boundary, vec![Cell::new(0, 1)]);
        assert_eq!(region.grid.values, vec![9.0, ND]);

        let query = RegionQuery {
            include_boundary: true,
            ..query
        };
        let region = discover_region(&zone, &values, Cell::new(0, 0), &query).unwrap();
        assert_eq!(region.cells.len(), 3);
        assert!(region.boundary.is_empty());
    }

    #[test]
    fn test_seed_outside_zone_is_rejected() {
        let zone = zone_grid();
        let query = RegionQuery::new(1.0, Connectivity::Eight);
        let err = discover_region(&zone, &zone, Cell::new(0, 2), &query).unwrap_err();
        assert!(matches!(err, ResampleError::InvalidSeed { row: 0, col: 2, .. }));
    }
}
