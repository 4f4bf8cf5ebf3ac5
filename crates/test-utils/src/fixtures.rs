//! Common test fixtures for pipeline tests.
//!
//! This module provides pre-defined grids, filename patterns and
//! constants that represent common scenarios in raster time-series
//! processing.

use raster_common::GridDescriptor;

/// No-data value used across the test suite.
pub const MISSING: f32 = -32768.0;

/// Input no-data value used by the synthetic series writers.
pub const MISSING_IN: f64 = -9999.0;

/// A small 5x4 geographic grid, half-degree resolution.
pub fn small_grid() -> GridDescriptor {
    GridDescriptor::new("EPSG:4326", [10.0, 0.5, 0.0, 45.0, 0.0, -0.5], 5, 4)
}

/// A 16x12 geographic grid, large enough for several row blocks.
pub fn medium_grid() -> GridDescriptor {
    GridDescriptor::new("EPSG:4326", [0.0, 0.25, 0.0, 60.0, 0.0, -0.25], 16, 12)
}

/// Filename pattern matching the series writers' output for one source.
///
/// Capture 1 is the 7-digit year+day-of-year date, capture 2 the tile.
pub fn source_pattern(prefix: &str) -> String {
    format!(r"^(\d{{7}})_(\w+)_{prefix}\.rst$")
}
