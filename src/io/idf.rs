//! iMOD IDF binary grids.
//!
//! Little-endian 4-byte records: record length marker, ncol, nrow, xmin,
//! xmax, ymin, ymax, dmin, dmax, nodata, four flag bytes (ieq, itb, ivf,
//! unused), then dx/dy for equidistant grids, optional top/bot, and the
//! values row by row starting at the top.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{ResampleError, Result};
use crate::model::{Extent, Grid};

const SINGLE_PRECISION_MARKER: i32 = 1271;
const DOUBLE_PRECISION_MARKER: i32 = 2295;
const MAX_INITIAL_CELLS: usize = 1 << 20;

/// Parsed IDF header.
#[derive(Debug, Clone, PartialEq)]
pub struct IdfHeader {
    pub ncol: usize,
    pub nrow: usize,
    pub extent: Extent,
    pub dmin: f32,
    pub dmax: f32,
    pub nodata: f32,
    pub cellsize: f64,
    /// Layer top and bottom, if present
    pub top_bottom: Option<(f32, f32)>,
}

struct RecordReader<'a, R> {
    inner: R,
    path: &'a Path,
}

impl<R: Read> RecordReader<'_, R> {
    fn bytes(&mut self) -> Result<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf).map_err(|e| {
            ResampleError::parse(self.path, format!("truncated IDF file: {}", e))
        })?;
        Ok(buf)
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.bytes()?))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.bytes()?))
    }

    fn count(&mut self, name: &str) -> Result<usize> {
        let value = self.i32()?;
        usize::try_from(value)
            .ok()
            .filter(|&v| v > 0)
            .ok_or_else(|| ResampleError::parse(self.path, format!("invalid {}: {}", name, value)))
    }
}

fn read_header<R: Read>(records: &mut RecordReader<'_, R>) -> Result<IdfHeader> {
    match records.i32()? {
        SINGLE_PRECISION_MARKER => {}
        DOUBLE_PRECISION_MARKER => {
            return Err(ResampleError::UnsupportedFormat(format!(
                "{}: double precision IDF",
                records.path.display()
            )));
        }
        other => {
            return Err(ResampleError::parse(
                records.path,
                format!("not an IDF file (record marker {})", other),
            ));
        }
    }

    let ncol = records.count("ncol")?;
    let nrow = records.count("nrow")?;
    let xmin = records.f32()? as f64;
    let xmax = records.f32()? as f64;
    let ymin = records.f32()? as f64;
    let ymax = records.f32()? as f64;
    let dmin = records.f32()?;
    let dmax = records.f32()?;
    let nodata = records.f32()?;
    let [ieq, itb, _ivf, _] = records.bytes()?;

    if ieq != 0 {
        return Err(ResampleError::UnsupportedFormat(format!(
            "{}: non-equidistant IDF",
            records.path.display()
        )));
    }
    let dx = records.f32()? as f64;
    let dy = records.f32()? as f64;
    if (dx - dy).abs() > dx.abs() * 1e-6 {
        return Err(ResampleError::UnsupportedFormat(format!(
            "{}: non-square cells ({} x {})",
            records.path.display(),
            dx,
            dy
        )));
    }
    let top_bottom = if itb == 1 {
        Some((records.f32()?, records.f32()?))
    } else {
        None
    };

    Ok(IdfHeader {
        ncol,
        nrow,
        extent: Extent::new(xmin, ymin, xmax, ymax),
        dmin,
        dmax,
        nodata,
        cellsize: dx,
        top_bottom,
    })
}

pub fn read_idf(path: &Path) -> Result<Grid> {
    let file = File::open(path)?;
    read_idf_from(BufReader::new(file), path)
}

pub fn read_idf_from<R: Read>(reader: R, path: &Path) -> Result<Grid> {
    let mut records = RecordReader {
        inner: reader,
        path,
    };
    let header = read_header(&mut records)?;

    let cells = header.nrow.checked_mul(header.ncol).ok_or_else(|| {
        ResampleError::parse(
            path,
            format!("grid too large: {} x {}", header.nrow, header.ncol),
        )
    })?;
    // ヘッダの値は信用せず、確保はデータを読みながら伸ばす
    let mut values = Vec::with_capacity(cells.min(MAX_INITIAL_CELLS));
    for _ in 0..cells {
        values.push(records.f32()?);
    }

    debug!(
        "Read IDF {:?}: {}x{} cells of {}",
        path, header.nrow, header.ncol, header.cellsize
    );

    Ok(Grid {
        extent: header.extent,
        cellsize: header.cellsize,
        nodata: header.nodata,
        rows: header.nrow,
        cols: header.ncol,
        values,
    })
}

pub fn write_idf(grid: &Grid, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_idf_to(grid, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_idf_to<W: Write>(grid: &Grid, writer: &mut W) -> Result<()> {
    let (dmin, dmax) = grid
        .values
        .iter()
        .filter(|&&v| !grid.is_nodata(v))
        .fold(None, |range: Option<(f32, f32)>, &v| match range {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })
        .unwrap_or((grid.nodata, grid.nodata));

    writer.write_all(&SINGLE_PRECISION_MARKER.to_le_bytes())?;
    writer.write_all(&(grid.cols as i32).to_le_bytes())?;
    writer.write_all(&(grid.rows as i32).to_le_bytes())?;
    for value in [
        grid.extent.min_x as f32,
        grid.extent.max_x as f32,
        grid.extent.min_y as f32,
        grid.extent.max_y as f32,
        dmin,
        dmax,
        grid.nodata,
    ] {
        writer.write_all(&value.to_le_bytes())?;
    }
    // ieq=0, itb=0, ivf=0
    writer.write_all(&[0u8; 4])?;
    writer.write_all(&(grid.cellsize as f32).to_le_bytes())?;
    writer.write_all(&(grid.cellsize as f32).to_le_bytes())?;
    for value in &grid.values {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ND: f32 = -9999.0;

    fn create_test_grid() -> Grid {
        Grid::from_rows(
            155000.0,
            463000.0,
            25.0,
            ND,
            &[&[1.0, 2.0, ND], &[4.0, -5.5, 6.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        write_idf_to(&create_test_grid(), &mut buf).unwrap();

        // 13 x 4バイトのヘッダ + 6セル
        assert_eq!(buf.len(), 13 * 4 + 6 * 4);
        assert_eq!(i32::from_le_bytes(buf[0..4].try_into().unwrap()), 1271);
        assert_eq!(i32::from_le_bytes(buf[4..8].try_into().unwrap()), 3);
        assert_eq!(i32::from_le_bytes(buf[8..12].try_into().unwrap()), 2);
        // dmin / dmax はno-dataを除外
        assert_eq!(f32::from_le_bytes(buf[28..32].try_into().unwrap()), -5.5);
        assert_eq!(f32::from_le_bytes(buf[32..36].try_into().unwrap()), 6.0);
    }

    #[test]
    fn test_write_and_read_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("HEAD_L1.IDF");
        let grid = create_test_grid();

        write_idf(&grid, &path).unwrap();
        let read = read_idf(&path).unwrap();

        assert_eq!(read, grid);
    }

    #[test]
    fn test_reads_top_bottom_record() {
        let mut buf = Vec::new();
        write_idf_to(&create_test_grid(), &mut buf).unwrap();
        // itb=1 にして top/bot を挿入
        buf[40 + 1] = 1;
        let mut with_tb = buf[..52].to_vec();
        with_tb.extend_from_slice(&10.0f32.to_le_bytes());
        with_tb.extend_from_slice(&(-20.0f32).to_le_bytes());
        with_tb.extend_from_slice(&buf[52..]);

        let mut records = RecordReader {
            inner: with_tb.as_slice(),
            path: Path::new("tb.idf"),
        };
        let header = read_header(&mut records).unwrap();
        assert_eq!(header.top_bottom, Some((10.0, -20.0)));

        let grid = read_idf_from(with_tb.as_slice(), Path::new("tb.idf")).unwrap();
        assert_eq!(grid.values, create_test_grid().values);
    }

    #[test]
    fn test_rejects_bad_files() {
        let err = read_idf_from(&[0u8; 8][..], Path::new("bad.idf")).unwrap_err();
        assert!(matches!(err, ResampleError::Parse { .. }));

        let mut buf = Vec::new();
        write_idf_to(&create_test_grid(), &mut buf).unwrap();
        buf[0..4].copy_from_slice(&2295i32.to_le_bytes());
        let err = read_idf_from(buf.as_slice(), Path::new("double.idf")).unwrap_err();
        assert!(matches!(err, ResampleError::UnsupportedFormat(_)));

        let mut buf = Vec::new();
        write_idf_to(&create_test_grid(), &mut buf).unwrap();
        buf.truncate(buf.len() - 2);
        let err = read_idf_from(buf.as_slice(), Path::new("short.idf")).unwrap_err();
        assert!(matches!(err, ResampleError::Parse { .. }));
    }

    #[test]
    fn test_oversized_header_is_a_parse_error() {
        let mut buf = Vec::new();
        write_idf_to(&create_test_grid(), &mut buf).unwrap();
        buf[4..8].copy_from_slice(&i32::MAX.to_le_bytes());
        buf[8..12].copy_from_slice(&i32::MAX.to_le_bytes());
        // 巨大なヘッダでも確保で落ちずにデータ不足として扱う
        let err = read_idf_from(buf.as_slice(), Path::new("huge.idf")).unwrap_err();
        assert!(matches!(err, ResampleError::Parse { .. }));
    }
}
