//! Common types shared across the temporal raster pipeline workspace.

pub mod grid;
pub mod pixel;
pub mod time;

pub use grid::{GridDescriptor, GEO_TOLERANCE};
pub use pixel::PixelType;
pub use time::{DateFormat, TimeGrid};
