//! ESRI ASCII grids.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{ResampleError, Result};
use crate::model::{Extent, Grid};

const DEFAULT_NODATA: f32 = -9999.0;

pub fn read_asc(path: &Path) -> Result<Grid> {
    let content = fs::read_to_string(path)?;
    parse_asc(&content, path)
}

pub fn parse_asc(content: &str, path: &Path) -> Result<Grid> {
    let mut ncols = None;
    let mut nrows = None;
    let mut x_corner = None;
    let mut y_corner = None;
    let mut x_center = None;
    let mut y_center = None;
    let mut cellsize = None;
    let mut nodata = DEFAULT_NODATA;

    let mut tokens = content.split_whitespace().peekable();
    // キーワードが続く間はヘッダ
    while let Some(key) = tokens.next_if(|t| t.starts_with(|c: char| c.is_ascii_alphabetic())) {
        let value = tokens
            .next()
            .ok_or_else(|| ResampleError::parse(path, format!("missing value for {}", key)))?;
        let number = |name: &str| -> Result<f64> {
            value.parse::<f64>().map_err(|e| {
                ResampleError::parse(path, format!("invalid {} '{}': {}", name, value, e))
            })
        };
        match key.to_ascii_lowercase().as_str() {
            "ncols" => ncols = Some(number("ncols")? as usize),
            "nrows" => nrows = Some(number("nrows")? as usize),
            "xllcorner" => x_corner = Some(number("xllcorner")?),
            "yllcorner" => y_corner = Some(number("yllcorner")?),
            "xllcenter" => x_center = Some(number("xllcenter")?),
            "yllcenter" => y_center = Some(number("yllcenter")?),
            "cellsize" => cellsize = Some(number("cellsize")?),
            "nodata_value" => nodata = number("NODATA_value")? as f32,
            other => {
                return Err(ResampleError::parse(
                    path,
                    format!("unknown header keyword '{}'", other),
                ));
            }
        }
    }

    let missing = |name: &str| ResampleError::parse(path, format!("missing {}", name));
    let ncols = ncols.ok_or_else(|| missing("ncols"))?;
    let nrows = nrows.ok_or_else(|| missing("nrows"))?;
    let cellsize = cellsize.ok_or_else(|| missing("cellsize"))?;
    let min_x = x_corner
        .or_else(|| x_center.map(|x| x - cellsize / 2.0))
        .ok_or_else(|| missing("xllcorner"))?;
    let min_y = y_corner
        .or_else(|| y_center.map(|y| y - cellsize / 2.0))
        .ok_or_else(|| missing("yllcorner"))?;

    let cells = nrows.checked_mul(ncols).ok_or_else(|| {
        ResampleError::parse(path, format!("grid too large: {} x {}", nrows, ncols))
    })?;
    let values = tokens
        .map(|t| {
            t.parse::<f32>()
                .map_err(|e| ResampleError::parse(path, format!("invalid value '{}': {}", t, e)))
        })
        .collect::<Result<Vec<f32>>>()?;
    if values.len() != cells {
        return Err(ResampleError::parse(
            path,
            format!("expected {} values, found {}", cells, values.len()),
        ));
    }

    Ok(Grid {
        extent: Extent::new(
            min_x,
            min_y,
            min_x + ncols as f64 * cellsize,
            min_y + nrows as f64 * cellsize,
        ),
        cellsize,
        nodata,
        rows: nrows,
        cols: ncols,
        values,
    })
}

pub fn write_asc(grid: &Grid, path: &Path) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "ncols        {}", grid.cols)?;
    writeln!(writer, "nrows        {}", grid.rows)?;
    writeln!(writer, "xllcorner    {}", grid.extent.min_x)?;
    writeln!(writer, "yllcorner    {}", grid.extent.min_y)?;
    writeln!(writer, "cellsize     {}", grid.cellsize)?;
    writeln!(writer, "NODATA_value {}", grid.nodata)?;
    for row in grid.values.chunks(grid.cols.max(1)) {
        let line = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}
