//! Multi-band raster writing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use raster_common::{GridDescriptor, PixelType};

use crate::error::{RasterIoError, Result};
use crate::header::{encode_samples, RasterHeader};

/// Options controlling how a raster is written.
#[derive(Debug, Clone, Default)]
pub struct RasterWriteOptions {
    /// On-disk sample type; f32 input is cast per sample.
    pub pixel_type: PixelType,
    /// No-data value recorded for all bands.
    pub no_data_value: Option<f64>,
    /// Decode scale to record in the header.
    pub scale: Option<f64>,
    /// Decode offset to record in the header.
    pub offset: Option<f64>,
    /// Band descriptions, parallel to band order.
    pub band_names: Vec<String>,
}

/// Write a multi-band raster.
///
/// `data` holds `bands * height * width` f32 samples, band-sequential and
/// row-major within each band.
pub fn write_raster(
    path: impl AsRef<Path>,
    data: &[f32],
    bands: usize,
    grid: &GridDescriptor,
    options: &RasterWriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let expected = bands * grid.pixel_count();
    if data.len() != expected {
        return Err(RasterIoError::WriteFailed(format!(
            "{}: expected {expected} samples for {bands} bands of {}x{}, got {}",
            path.display(),
            grid.width,
            grid.height,
            data.len()
        )));
    }
    if !options.band_names.is_empty() && options.band_names.len() != bands {
        return Err(RasterIoError::WriteFailed(format!(
            "{}: {} band names for {bands} bands",
            path.display(),
            options.band_names.len()
        )));
    }

    let header = RasterHeader {
        width: grid.width,
        height: grid.height,
        bands,
        pixel_type: options.pixel_type,
        projection: grid.projection.clone(),
        geotransform: grid.geotransform,
        no_data_value: options.no_data_value,
        scale: options.scale,
        offset: options.offset,
        band_names: options.band_names.clone(),
    };

    let file = File::create(path)
        .map_err(|e| RasterIoError::WriteFailed(format!("{}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    header.write_to(&mut writer)?;

    let mut raw = Vec::with_capacity(data.len() * options.pixel_type.byte_size());
    encode_samples(data, options.pixel_type, &mut raw);
    writer.write_all(&raw)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::RasterDataset;

    #[test]
    fn test_write_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.rst");
        let grid = GridDescriptor::new("PROJ", [0.0, 1.0, 0.0, 0.0, 0.0, -1.0], 3, 2);

        write_raster(
            &path,
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            1,
            &grid,
            &RasterWriteOptions {
                no_data_value: Some(-32768.0),
                ..Default::default()
            },
        )
        .unwrap();

        let mut ds = RasterDataset::open(&path).unwrap();
        assert_eq!(ds.read_window(0, 0, 2).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(ds.no_data_value(), Some(-32768.0));
    }

    #[test]
    fn test_sample_count_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let grid = GridDescriptor::new("PROJ", [0.0, 1.0, 0.0, 0.0, 0.0, -1.0], 3, 2);
        let err = write_raster(
            dir.path().join("bad.rst"),
            &[1.0, 2.0],
            1,
            &grid,
            &RasterWriteOptions::default(),
        );
        assert!(matches!(err, Err(RasterIoError::WriteFailed(_))));
    }
}
