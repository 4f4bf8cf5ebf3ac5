//! Test data generators for synthetic raster time series.
//!
//! These generators create predictable, verifiable data patterns that
//! can be checked back after a pipeline run.

use std::path::{Path, PathBuf};

use raster_common::GridDescriptor;
use raster_io::{write_raster, RasterWriteOptions};

use crate::fixtures::MISSING_IN;

/// Creates a test grid with predictable values.
///
/// Each cell value is `col * 1000 + row`, so `grid[row * width + col]`
/// can be verified directly after any read path.
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Predictable per-date sample value for series files.
///
/// `year * 1000 + doy` stays exactly representable in f32 for any
/// plausible year, so means over known dates can be asserted exactly.
pub fn series_value(year: i32, doy: u32) -> f32 {
    (year * 1000) as f32 + doy as f32
}

/// Writes one dated single-band source file named
/// `{yyyy}{ddd}_{tile}_{prefix}.rst`, every pixel set to `value`.
pub fn write_dated_raster(
    dir: &Path,
    prefix: &str,
    year: i32,
    doy: u32,
    grid: &GridDescriptor,
    value: f32,
) -> PathBuf {
    let path = dir.join(format!("{year}{doy:03}_t1_{prefix}.rst"));
    let data = vec![value; grid.pixel_count()];
    write_raster(
        &path,
        &data,
        1,
        grid,
        &RasterWriteOptions {
            no_data_value: Some(MISSING_IN),
            ..Default::default()
        },
    )
    .expect("failed to write test raster");
    path
}

/// Writes a full series of dated source files, one per (year, doy),
/// each filled with [`series_value`]. Returns the written paths.
pub fn write_series(
    dir: &Path,
    prefix: &str,
    grid: &GridDescriptor,
    years: impl IntoIterator<Item = i32>,
    doys: &[u32],
) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for year in years {
        for &doy in doys {
            paths.push(write_dated_raster(
                dir,
                prefix,
                year,
                doy,
                grid,
                series_value(year, doy),
            ));
        }
    }
    paths
}
