use std::hash::{Hash, Hasher};

use crate::error::{ResampleError, Result};

/// Relative tolerance for cellsize comparison and cell boundary snapping.
const CELL_EPSILON: f64 = 1e-6;

/// Exact float equality where NaN equals NaN.
///
/// Zone values and no-data sentinels are compared with this, never with an
/// epsilon, so a NaN sentinel behaves like any other sentinel.
#[inline]
pub fn values_equal(a: f32, b: f32) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let extent = Extent::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        if extent.min_x < extent.max_x && extent.min_y < extent.max_y {
            Some(extent)
        } else {
            None
        }
    }

    pub fn union(&self, other: &Extent) -> Extent {
        Extent::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }
}

/// Neighbourhood used for flood fills and propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Cardinal neighbours only
    Four,
    /// Cardinal and diagonal neighbours
    #[default]
    Eight,
}

impl Connectivity {
    pub fn from_skip_diagonal(skip_diagonal: bool) -> Self {
        if skip_diagonal {
            Connectivity::Four
        } else {
            Connectivity::Eight
        }
    }

    /// Row/column offsets in row-major order.
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &[(-1, 0), (0, -1), (0, 1), (1, 0)],
            Connectivity::Eight => &[
                (-1, -1),
                (-1, 0),
                (-1, 1),
                (0, -1),
                (0, 1),
                (1, -1),
                (1, 0),
                (1, 1),
            ],
        }
    }
}

/// Cursor into a grid. Identity is (row, col); `value` is payload only.
#[derive(Debug, Clone, Copy)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub value: Option<f32>,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            value: None,
        }
    }

    pub fn with_value(row: usize, col: usize, value: f32) -> Self {
        Self {
            row,
            col,
            value: Some(value),
        }
    }

    /// Neighbours inside a `rows` x `cols` grid.
    pub fn neighbours(
        self,
        rows: usize,
        cols: usize,
        connectivity: Connectivity,
    ) -> impl Iterator<Item = Cell> {
        connectivity.offsets().iter().filter_map(move |&(dr, dc)| {
            let row = self.row.checked_add_signed(dr)?;
            let col = self.col.checked_add_signed(dc)?;
            (row < rows && col < cols).then(|| Cell::new(row, col))
        })
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.row == other.row && self.col == other.col
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.row.hash(state);
        self.col.hash(state);
    }
}

/// Dense single precision raster with square cells.
///
/// Values are stored row-major starting at the top (max_y) row.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub extent: Extent,
    pub cellsize: f64,
    pub nodata: f32,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f32>,
}

fn cells_along(length: f64, cellsize: f64) -> usize {
    ((length / cellsize) - CELL_EPSILON).ceil().max(0.0) as usize
}

impl Grid {
    /// Grid covering `extent`, filled with no-data.
    pub fn new(extent: Extent, cellsize: f64, nodata: f32) -> Self {
        let rows = cells_along(extent.height(), cellsize);
        let cols = cells_along(extent.width(), cellsize);
        Self {
            extent,
            cellsize,
            nodata,
            rows,
            cols,
            values: vec![nodata; rows * cols],
        }
    }

    pub fn from_values(
        extent: Extent,
        cellsize: f64,
        nodata: f32,
        values: Vec<f32>,
    ) -> Result<Self> {
        let mut grid = Self::new(extent, cellsize, nodata);
        if values.len() != grid.values.len() {
            return Err(ResampleError::ShapeMismatch {
                expected: grid.shape(),
                found: (values.len() / grid.cols.max(1), grid.cols),
            });
        }
        grid.values = values;
        Ok(grid)
    }

    /// Grid from rows of values, lower-left corner at (`min_x`, `min_y`).
    pub fn from_rows(
        min_x: f64,
        min_y: f64,
        cellsize: f64,
        nodata: f32,
        rows: &[&[f32]],
    ) -> Result<Self> {
        let cols = rows.first().map_or(0, |row| row.len());
        if let Some(ragged) = rows.iter().find(|row| row.len() != cols) {
            return Err(ResampleError::ShapeMismatch {
                expected: (rows.len(), cols),
                found: (rows.len(), ragged.len()),
            });
        }
        let extent = Extent::new(
            min_x,
            min_y,
            min_x + cols as f64 * cellsize,
            min_y + rows.len() as f64 * cellsize,
        );
        Self::from_values(extent, cellsize, nodata, rows.concat())
    }

    /// No-data grid with the same geometry as `self`.
    pub fn reset(&self) -> Self {
        Self {
            values: vec![self.nodata; self.values.len()],
            ..self.clone()
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.values[row * self.cols + col] = value;
    }

    #[inline]
    pub fn is_nodata(&self, value: f32) -> bool {
        values_equal(value, self.nodata)
    }

    #[inline]
    pub fn has_data(&self, row: usize, col: usize) -> bool {
        !self.is_nodata(self.get(row, col))
    }

    pub fn count_data(&self) -> usize {
        self.values.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.extent.min_x + (col as f64 + 0.5) * self.cellsize,
            self.extent.max_y - (row as f64 + 0.5) * self.cellsize,
        )
    }

    /// Cell containing the point, `None` outside the extent.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if x < self.extent.min_x || y > self.extent.max_y {
            return None;
        }
        let col = ((x - self.extent.min_x) / self.cellsize).floor() as usize;
        let row = ((self.extent.max_y - y) / self.cellsize).floor() as usize;
        (row < self.rows && col < self.cols).then_some((row, col))
    }

    pub fn check_cellsize(&self, other: &Grid) -> Result<()> {
        if (self.cellsize - other.cellsize).abs() > CELL_EPSILON * self.cellsize {
            return Err(ResampleError::CellsizeMismatch {
                expected: self.cellsize,
                found: other.cellsize,
            });
        }
        Ok(())
    }

    /// Row/column offset of `other`'s top-left cell inside `self`.
    fn offset_of(&self, other: &Grid) -> (isize, isize) {
        let row = ((self.extent.max_y - other.extent.max_y) / self.cellsize).round() as isize;
        let col = ((other.extent.min_x - self.extent.min_x) / self.cellsize).round() as isize;
        (row, col)
    }

    fn for_each_mask_cell<F>(&mut self, mask: &Grid, mut apply: F) -> Result<()>
    where
        F: FnMut(&mut Grid, usize, usize, usize, usize),
    {
        self.check_cellsize(mask)?;
        let (row_offset, col_offset) = self.offset_of(mask);
        for row in 0..mask.rows {
            let Some(target_row) = row.checked_add_signed(row_offset) else {
                continue;
            };
            if target_row >= self.rows {
                continue;
            }
            for col in 0..mask.cols {
                let Some(target_col) = col.checked_add_signed(col_offset) else {
                    continue;
                };
                if target_col < self.cols {
                    apply(self, target_row, target_col, row, col);
                }
            }
        }
        Ok(())
    }

    /// Set cells whose matching `mask` cell equals `predicate_value`.
    pub fn replace_where_value(
        &mut self,
        mask: &Grid,
        predicate_value: f32,
        new_value: f32,
    ) -> Result<()> {
        self.for_each_mask_cell(mask, |grid, row, col, mask_row, mask_col| {
            if values_equal(mask.get(mask_row, mask_col), predicate_value) {
                grid.set(row, col, new_value);
            }
        })
    }

    /// Set cells whose matching `mask` cell holds data.
    pub fn replace_where_data(&mut self, mask: &Grid, new_value: f32) -> Result<()> {
        self.for_each_mask_cell(mask, |grid, row, col, mask_row, mask_col| {
            if mask.has_data(mask_row, mask_col) {
                grid.set(row, col, new_value);
            }
        })
    }

    /// Copy `source` into `self` wherever `mask` holds data.
    ///
    /// `mask` and `source` must share their shape; cells are matched to
    /// `self` by world position.
    pub fn replace_from(&mut self, mask: &Grid, source: &Grid) -> Result<()> {
        if mask.shape() != source.shape() {
            return Err(ResampleError::ShapeMismatch {
                expected: mask.shape(),
                found: source.shape(),
            });
        }
        self.for_each_mask_cell(mask, |grid, row, col, mask_row, mask_col| {
            if mask.has_data(mask_row, mask_col) {
                grid.set(row, col, source.get(mask_row, mask_col));
            }
        })
    }

    /// Independent copy of a cell window.
    pub fn window(&self, row: usize, col: usize, rows: usize, cols: usize) -> Self {
        let extent = Extent::new(
            self.extent.min_x + col as f64 * self.cellsize,
            self.extent.max_y - (row + rows) as f64 * self.cellsize,
            self.extent.min_x + (col + cols) as f64 * self.cellsize,
            self.extent.max_y - row as f64 * self.cellsize,
        );
        let mut values = Vec::with_capacity(rows * cols);
        for r in row..row + rows {
            let start = r * self.cols + col;
            values.extend_from_slice(&self.values[start..start + cols]);
        }
        Self {
            extent,
            cellsize: self.cellsize,
            nodata: self.nodata,
            rows,
            cols,
            values,
        }
    }

    /// Sub-grid covering the overlap with `extent`, snapped outward to cell
    /// boundaries.
    pub fn clip_to(&self, extent: &Extent) -> Result<Self> {
        let overlap = self.extent.intersection(extent).ok_or_else(|| {
            ResampleError::NoOverlap(format!("{:?} and {:?}", self.extent, extent))
        })?;

        let cs = self.cellsize;
        let col0 = ((overlap.min_x - self.extent.min_x) / cs + CELL_EPSILON).floor() as usize;
        let col1 = ((overlap.max_x - self.extent.min_x) / cs - CELL_EPSILON).ceil() as usize;
        let row0 = ((self.extent.max_y - overlap.max_y) / cs + CELL_EPSILON).floor() as usize;
        let row1 = ((self.extent.max_y - overlap.min_y) / cs - CELL_EPSILON).ceil() as usize;

        let col1 = col1.min(self.cols);
        let row1 = row1.min(self.rows);
        Ok(self.window(row0, col0, row1.saturating_sub(row0), col1.saturating_sub(col0)))
    }

    /// No-data padded grid covering the union with `extent`, snapped outward
    /// to cell boundaries.
    pub fn enlarge_to(&self, extent: &Extent) -> Self {
        let cs = self.cellsize;
        let union = self.extent.union(extent);
        let cells_before = |distance: f64| (distance / cs - CELL_EPSILON).ceil().max(0.0);

        let enlarged = Extent::new(
            self.extent.min_x - cells_before(self.extent.min_x - union.min_x) * cs,
            self.extent.min_y - cells_before(self.extent.min_y - union.min_y) * cs,
            self.extent.max_x + cells_before(union.max_x - self.extent.max_x) * cs,
            self.extent.max_y + cells_before(union.max_y - self.extent.max_y) * cs,
        );
        if enlarged == self.extent {
            return self.clone();
        }

        let mut grid = Grid::new(enlarged, cs, self.nodata);
        let (row_offset, col_offset) = grid.offset_of(self);
        for row in 0..self.rows {
            let target_row = row + row_offset as usize;
            for col in 0..self.cols {
                grid.set(target_row, col + col_offset as usize, self.get(row, col));
            }
        }
        grid
    }

    /// Clip then enlarge, so the result covers exactly `extent` when it is
    /// aligned with this grid's cell boundaries.
    pub fn align_to(&self, extent: &Extent) -> Result<Self> {
        Ok(self.clip_to(extent)?.enlarge_to(extent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ND: f32 = -9999.0;

    fn grid_3x3() -> Grid {
        Grid::from_rows(
            0.0,
            0.0,
            10.0,
            ND,
            &[&[1.0, 2.0, 3.0], &[4.0, ND, 6.0], &[7.0, 8.0, 9.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_dimensions_follow_extent() {
        let grid = Grid::new(Extent::new(0.0, 0.0, 25.0, 30.0), 10.0, ND);
        assert_eq!(grid.shape(), (3, 3));

        let grid = Grid::new(Extent::new(0.0, 0.0, 0.3, 0.2), 0.1, ND);
        assert_eq!(grid.shape(), (2, 3));
    }

    #[test]
    fn test_cell_addressing() {
        let grid = grid_3x3();
        assert_eq!(grid.cell_center(0, 0), (5.0, 25.0));
        assert_eq!(grid.cell_at(5.0, 25.0), Some((0, 0)));
        assert_eq!(grid.cell_at(29.0, 1.0), Some((2, 2)));
        assert_eq!(grid.cell_at(31.0, 1.0), None);
        assert_eq!(grid.count_data(), 8);
    }

    #[test]
    fn test_cell_identity_ignores_value() {
        let mut set = HashSet::new();
        set.insert(Cell::with_value(1, 2, 5.0));
        assert!(set.contains(&Cell::new(1, 2)));
        assert_eq!(Cell::with_value(1, 2, 5.0), Cell::with_value(1, 2, 7.0));
    }

    #[test]
    fn test_neighbours_respect_bounds() {
        let corner = Cell::new(0, 0);
        assert_eq!(corner.neighbours(3, 3, Connectivity::Four).count(), 2);
        assert_eq!(corner.neighbours(3, 3, Connectivity::Eight).count(), 3);
        let center = Cell::new(1, 1);
        assert_eq!(center.neighbours(3, 3, Connectivity::Eight).count(), 8);
    }

    #[test]
    fn test_nan_sentinel() {
        let grid = Grid::from_rows(0.0, 0.0, 1.0, f32::NAN, &[&[f32::NAN, 1.0]]).unwrap();
        assert!(!grid.has_data(0, 0));
        assert!(grid.has_data(0, 1));
        assert!(values_equal(f32::NAN, f32::NAN));
        assert!(!values_equal(1.0, 1.000001));
    }

    #[test]
    fn test_replace_from_uses_world_position() {
        let mut grid = grid_3x3();
        // 中央セルから右下2x2のマスク
        let mask = Grid::from_rows(10.0, 0.0, 10.0, ND, &[&[1.0, ND], &[1.0, 1.0]]).unwrap();
        let source =
            Grid::from_rows(10.0, 0.0, 10.0, ND, &[&[50.0, 60.0], &[80.0, 90.0]]).unwrap();

        grid.replace_from(&mask, &source).unwrap();
        assert_eq!(grid.get(1, 1), 50.0);
        assert_eq!(grid.get(1, 2), 6.0);
        assert_eq!(grid.get(2, 1), 80.0);
        assert_eq!(grid.get(2, 2), 90.0);
        assert_eq!(grid.get(0, 0), 1.0);
    }

    #[test]
    fn test_replace_from_is_idempotent() {
        let zone = grid_3x3();
        let mut once = grid_3x3();
        once.set(0, 0, 42.0);
        let source = once.clone();
        once.replace_from(&zone, &source).unwrap();
        let mut twice = once.clone();
        let snapshot = twice.clone();
        twice.replace_from(&zone, &snapshot).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_replace_where_value_and_data() {
        let mut grid = grid_3x3();
        let mask = grid_3x3();
        grid.replace_where_value(&mask, 9.0, 0.0).unwrap();
        assert_eq!(grid.get(2, 2), 0.0);

        let mut target = grid.reset();
        target.replace_where_data(&mask, 1.0).unwrap();
        assert_eq!(target.count_data(), 8);
        assert!(!target.has_data(1, 1));
    }

    #[test]
    fn test_cellsize_mismatch_is_an_error() {
        let mut grid = grid_3x3();
        let other = Grid::from_rows(0.0, 0.0, 5.0, ND, &[&[1.0]]).unwrap();
        let err = grid.replace_from(&other, &other).unwrap_err();
        assert!(matches!(err, ResampleError::CellsizeMismatch { .. }));
    }

    #[test]
    fn test_clip_and_enlarge_keep_alignment() {
        let grid = grid_3x3();
        // 非整列の範囲はセル境界まで外側に広げる
        let clipped = grid.clip_to(&Extent::new(12.0, 3.0, 40.0, 18.0)).unwrap();
        assert_eq!(clipped.extent, Extent::new(10.0, 0.0, 30.0, 20.0));
        assert_eq!(clipped.values, vec![ND, 6.0, 8.0, 9.0]);

        let enlarged = grid.enlarge_to(&Extent::new(-10.0, 0.0, 30.0, 40.0));
        assert_eq!(enlarged.shape(), (4, 4));
        assert_eq!(enlarged.get(0, 0), ND);
        assert_eq!(enlarged.get(1, 1), 1.0);
        assert_eq!(enlarged.get(3, 3), 9.0);
    }

    #[test]
    fn test_align_to_disjoint_extent_fails() {
        let grid = grid_3x3();
        let err = grid
            .align_to(&Extent::new(100.0, 100.0, 200.0, 200.0))
            .unwrap_err();
        assert!(matches!(err, ResampleError::NoOverlap(_)));
    }
}
