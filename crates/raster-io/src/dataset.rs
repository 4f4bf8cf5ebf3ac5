//! Read access to a raster container.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use raster_common::GridDescriptor;

use crate::error::{RasterIoError, Result};
use crate::header::{decode_samples, RasterHeader};

/// Selects a band either by 1-based number or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BandSelector {
    /// 1-based band number.
    Index(usize),
    /// Band description as recorded in the file's band names.
    Name(String),
}

impl std::fmt::Display for BandSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BandSelector::Index(i) => write!(f, "#{i}"),
            BandSelector::Name(n) => write!(f, "{n}"),
        }
    }
}

/// An open raster file.
pub struct RasterDataset {
    path: PathBuf,
    reader: BufReader<File>,
    header: RasterHeader,
    data_offset: u64,
}

impl RasterDataset {
    /// Open a raster container and parse its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            RasterIoError::open_failed(format!("{}: {e}", path.display()))
        })?;
        let mut reader = BufReader::new(file);
        let (header, data_offset) = RasterHeader::read_from(&mut reader)?;
        Ok(Self {
            path,
            reader,
            header,
            data_offset,
        })
    }

    /// Path this dataset was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed container header.
    pub fn header(&self) -> &RasterHeader {
        &self.header
    }

    /// Spatial grid of this raster.
    pub fn descriptor(&self) -> GridDescriptor {
        self.header.descriptor()
    }

    /// Number of bands.
    pub fn bands(&self) -> usize {
        self.header.bands
    }

    /// Decode scale recorded in the file, if any.
    pub fn scale(&self) -> Option<f64> {
        self.header.scale
    }

    /// Decode offset recorded in the file, if any.
    pub fn offset(&self) -> Option<f64> {
        self.header.offset
    }

    /// No-data value recorded in the file, if any.
    pub fn no_data_value(&self) -> Option<f64> {
        self.header.no_data_value
    }

    /// Resolve a band selector to a zero-based band index.
    pub fn find_band(&self, selector: &BandSelector) -> Result<usize> {
        match selector {
            BandSelector::Index(n) => {
                if *n >= 1 && *n <= self.header.bands {
                    Ok(n - 1)
                } else {
                    Err(RasterIoError::BandNotFound(format!(
                        "band {n} of {} (file has {} bands)",
                        self.path.display(),
                        self.header.bands
                    )))
                }
            }
            BandSelector::Name(name) => self
                .header
                .band_names
                .iter()
                .position(|b| b == name)
                .ok_or_else(|| {
                    RasterIoError::BandNotFound(format!(
                        "band '{name}' of {}",
                        self.path.display()
                    ))
                }),
        }
    }

    /// Read a window of `rows` full-width rows starting at `row_offset`
    /// from a zero-based band, decoded to f32 in row-major order.
    pub fn read_window(&mut self, band: usize, row_offset: usize, rows: usize) -> Result<Vec<f32>> {
        if band >= self.header.bands {
            return Err(RasterIoError::BandNotFound(format!(
                "band #{} of {}",
                band + 1,
                self.path.display()
            )));
        }
        if row_offset + rows > self.header.height {
            return Err(RasterIoError::read_failed(format!(
                "window rows {}..{} outside raster height {}",
                row_offset,
                row_offset + rows,
                self.header.height
            )));
        }

        let sample_size = self.header.pixel_type.byte_size();
        let start = self.data_offset
            + (band * self.header.band_byte_len()) as u64
            + (row_offset * self.header.width * sample_size) as u64;
        let byte_len = rows * self.header.width * sample_size;

        self.reader.seek(SeekFrom::Start(start))?;
        let mut raw = vec![0u8; byte_len];
        self.reader.read_exact(&mut raw).map_err(|e| {
            RasterIoError::read_failed(format!("{}: {e}", self.path.display()))
        })?;

        let mut values = Vec::with_capacity(rows * self.header.width);
        decode_samples(&raw, self.header.pixel_type, &mut values);
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{write_raster, RasterWriteOptions};
    use raster_common::PixelType;

    fn sample_grid() -> GridDescriptor {
        GridDescriptor::new("EPSG:4326", [0.0, 1.0, 0.0, 10.0, 0.0, -1.0], 4, 3)
    }

    #[test]
    fn test_open_and_read_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.rst");

        // Two bands of 4x3: band 0 counts up, band 1 counts down.
        let band0: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let band1: Vec<f32> = (0..12).map(|v| (11 - v) as f32).collect();
        let data: Vec<f32> = band0.iter().chain(band1.iter()).copied().collect();

        write_raster(
            &path,
            &data,
            2,
            &sample_grid(),
            &RasterWriteOptions {
                band_names: vec!["up".into(), "down".into()],
                no_data_value: Some(-1.0),
                ..Default::default()
            },
        )
        .unwrap();

        let mut ds = RasterDataset::open(&path).unwrap();
        assert_eq!(ds.bands(), 2);
        assert_eq!(ds.no_data_value(), Some(-1.0));
        assert!(ds.descriptor().is_compatible(&sample_grid()));

        // Middle row of band 0.
        let window = ds.read_window(0, 1, 1).unwrap();
        assert_eq!(window, vec![4.0, 5.0, 6.0, 7.0]);

        // Named lookup resolves band 1.
        let band = ds.find_band(&BandSelector::Name("down".into())).unwrap();
        let window = ds.read_window(band, 0, 3).unwrap();
        assert_eq!(window[0], 11.0);
        assert_eq!(window[11], 0.0);
    }

    #[test]
    fn test_missing_band_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.rst");
        write_raster(
            &path,
            &vec![0.0; 12],
            1,
            &sample_grid(),
            &RasterWriteOptions::default(),
        )
        .unwrap();

        let ds = RasterDataset::open(&path).unwrap();
        assert!(ds.find_band(&BandSelector::Index(2)).is_err());
        assert!(ds.find_band(&BandSelector::Name("nope".into())).is_err());
    }

    #[test]
    fn test_int16_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.rst");
        write_raster(
            &path,
            &[100.0, -200.0, 300.0, -400.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
            1,
            &sample_grid(),
            &RasterWriteOptions {
                pixel_type: PixelType::Int16,
                ..Default::default()
            },
        )
        .unwrap();

        let mut ds = RasterDataset::open(&path).unwrap();
        let values = ds.read_window(0, 0, 1).unwrap();
        assert_eq!(values, vec![100.0, -200.0, 300.0, -400.0]);
    }
}
