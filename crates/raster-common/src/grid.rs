//! Spatial grid descriptor shared by every raster in a run.

use serde::{Deserialize, Serialize};

/// Tolerance for comparing geotransform coefficients across files.
pub const GEO_TOLERANCE: f64 = 1e-4;

/// Describes the spatial grid of a raster: projection, affine geotransform
/// and pixel dimensions.
///
/// The first valid source file of a run establishes the descriptor; every
/// other file must be compatible with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDescriptor {
    /// Projection definition (WKT or similar opaque string).
    pub projection: String,
    /// Affine geotransform: origin x, pixel width, row rotation,
    /// origin y, column rotation, pixel height.
    pub geotransform: [f64; 6],
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl GridDescriptor {
    /// Create a new grid descriptor.
    pub fn new(
        projection: impl Into<String>,
        geotransform: [f64; 6],
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            projection: projection.into(),
            geotransform,
            width,
            height,
        }
    }

    /// Total number of pixels in the grid.
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Check whether another descriptor refers to the same grid.
    ///
    /// Projection and dimensions compare exactly; geotransform coefficients
    /// compare within [`GEO_TOLERANCE`].
    pub fn is_compatible(&self, other: &GridDescriptor) -> bool {
        self.projection == other.projection
            && self.width == other.width
            && self.height == other.height
            && self
                .geotransform
                .iter()
                .zip(other.geotransform.iter())
                .all(|(a, b)| (a - b).abs() <= GEO_TOLERANCE)
    }
}
