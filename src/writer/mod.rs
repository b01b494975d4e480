use anyhow::{Context, Result};
use gdal::raster::Buffer;
use gdal::{DriverManager, Metadata};
use std::path::Path;

use crate::model::Grid;

#[derive(Default)]
pub struct GeoTiffWriter {}

impl GeoTiffWriter {
    pub fn new() -> Self {
        Self {}
    }

    pub fn write(&self, grid: &Grid, output_path: &Path) -> Result<()> {
        self.write_band(grid, output_path, None)
    }

    /// Same as [`write`](Self::write), recording the method in `RESAMPLE_METHOD`.
    pub fn write_with_method(&self, grid: &Grid, output_path: &Path, method: &str) -> Result<()> {
        self.write_band(grid, output_path, Some(method))
    }

    fn write_band(&self, grid: &Grid, output_path: &Path, method: Option<&str>) -> Result<()> {
        // GTiffドライバーを取得
        let driver =
            DriverManager::get_driver_by_name("GTiff").context("Failed to get GTiff driver")?;

        let (rows, cols) = grid.shape();
        let mut dataset = driver
            .create_with_band_type::<f32, _>(output_path, cols, rows, 1)
            .context("Failed to create dataset")?;

        // 左上原点、北が上
        let geo_transform = [
            grid.extent.min_x,
            grid.cellsize,
            0.0,
            grid.extent.max_y,
            0.0,
            -grid.cellsize,
        ];
        dataset
            .set_geo_transform(&geo_transform)
            .context("Failed to set geo transform")?;

        let mut band = dataset.rasterband(1).context("Failed to get raster band")?;
        band.set_no_data_value(Some(grid.nodata as f64))
            .context("Failed to set no data value")?;

        // 行優先・上から
        let mut buffer = Buffer::new((cols, rows), grid.values.clone());
        band.write((0, 0), (cols, rows), &mut buffer)
            .context("Failed to write raster data")?;

        if let Some(method) = method {
            dataset
                .set_metadata_item("RESAMPLE_METHOD", method, "")
                .context("Failed to set resample method metadata")?;
        }

        tracing::debug!("Written GeoTIFF {:?}: {} x {} pixels", output_path, cols, rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdal::Dataset;
    use tempfile::TempDir;

    fn gtiff_available() -> bool {
        DriverManager::get_driver_by_name("GTiff").is_ok()
    }

    fn create_test_grid() -> Grid {
        Grid::from_rows(
            155000.0,
            463000.0,
            25.0,
            -9999.0,
            &[&[1.0, 2.0, 3.0], &[4.0, -9999.0, 6.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_write_geotiff() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("head.tif");

        GeoTiffWriter::new()
            .write_with_method(&create_test_grid(), &output_path, "nearest neighbour")
            .unwrap();

        let dataset = Dataset::open(&output_path).unwrap();
        assert_eq!(dataset.raster_size(), (3, 2));

        let transform = dataset.geo_transform().unwrap();
        assert_eq!(transform[0], 155000.0);
        assert_eq!(transform[1], 25.0);
        assert_eq!(transform[3], 463050.0);
        assert_eq!(transform[5], -25.0);

        let band = dataset.rasterband(1).unwrap();
        assert_eq!(band.no_data_value(), Some(-9999.0));
        assert_eq!(
            dataset.metadata_item("RESAMPLE_METHOD", "").as_deref(),
            Some("nearest neighbour")
        );
    }

    #[test]
    fn test_write_without_method_metadata() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("plain.tif");

        GeoTiffWriter::new()
            .write(&create_test_grid(), &output_path)
            .unwrap();

        let dataset = Dataset::open(&output_path).unwrap();
        assert_eq!(dataset.raster_size(), (3, 2));
        assert_eq!(dataset.metadata_item("RESAMPLE_METHOD", ""), None);
    }
}
