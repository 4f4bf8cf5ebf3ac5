//! Raster file adapter for the temporal pipeline.
//!
//! The engine consumes rasters through a deliberately narrow interface:
//! open a file, read a named or numbered band as a windowed f32 array, and
//! write a multi-band raster with projection, geotransform and no-data
//! value. The on-disk format is a minimal self-describing container —
//! a magic number, a JSON header and little-endian band-sequential
//! samples — which keeps the adapter free of external format libraries.

pub mod dataset;
pub mod error;
pub mod header;
pub mod writer;

pub use dataset::{BandSelector, RasterDataset};
pub use error::{RasterIoError, Result};
pub use header::RasterHeader;
pub use writer::{write_raster, RasterWriteOptions};
