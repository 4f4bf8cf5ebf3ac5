//! Container header: magic, version and the JSON metadata block.

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use raster_common::{GridDescriptor, PixelType};

use crate::error::{RasterIoError, Result};

/// Magic bytes identifying a raster container.
pub const MAGIC: [u8; 4] = *b"RAST";
/// Container format version.
pub const VERSION: u16 = 1;

/// JSON metadata stored at the head of every raster file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterHeader {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Number of bands.
    pub bands: usize,
    /// Sample type of the band data.
    pub pixel_type: PixelType,
    /// Projection definition string.
    pub projection: String,
    /// Affine geotransform.
    pub geotransform: [f64; 6],
    /// No-data value shared by all bands.
    #[serde(default)]
    pub no_data_value: Option<f64>,
    /// Decode scale (raw * scale + offset).
    #[serde(default)]
    pub scale: Option<f64>,
    /// Decode offset.
    #[serde(default)]
    pub offset: Option<f64>,
    /// Optional band descriptions, parallel to band order.
    #[serde(default)]
    pub band_names: Vec<String>,
}

impl RasterHeader {
    /// Spatial grid described by this header.
    pub fn descriptor(&self) -> GridDescriptor {
        GridDescriptor::new(
            self.projection.clone(),
            self.geotransform,
            self.width,
            self.height,
        )
    }

    /// Byte length of one band's sample data.
    pub fn band_byte_len(&self) -> usize {
        self.width * self.height * self.pixel_type.byte_size()
    }

    /// Read the magic/version/header preamble, returning the header and the
    /// offset where sample data begins.
    pub fn read_from(reader: &mut impl Read) -> Result<(Self, u64)> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(RasterIoError::open_failed("not a raster container"));
        }

        let mut version = [0u8; 2];
        reader.read_exact(&mut version)?;
        let version = u16::from_le_bytes(version);
        if version != VERSION {
            return Err(RasterIoError::invalid_header(format!(
                "unsupported container version {version}"
            )));
        }

        let mut len = [0u8; 4];
        reader.read_exact(&mut len)?;
        let header_len = u32::from_le_bytes(len) as usize;

        let mut json = vec![0u8; header_len];
        reader.read_exact(&mut json)?;
        let header: RasterHeader = serde_json::from_slice(&json)
            .map_err(|e| RasterIoError::invalid_header(e.to_string()))?;

        if header.width == 0 || header.height == 0 || header.bands == 0 {
            return Err(RasterIoError::invalid_header("zero-sized raster"));
        }

        let data_offset = (MAGIC.len() + 2 + 4 + header_len) as u64;
        Ok((header, data_offset))
    }

    /// Write the magic/version/header preamble.
    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        let json = serde_json::to_vec(self)
            .map_err(|e| RasterIoError::WriteFailed(e.to_string()))?;
        writer.write_all(&MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(json.len() as u32).to_le_bytes())?;
        writer.write_all(&json)?;
        Ok(())
    }
}

/// Decode one raw sample buffer into f32 values.
pub(crate) fn decode_samples(raw: &[u8], pixel_type: PixelType, out: &mut Vec<f32>) {
    match pixel_type {
        PixelType::Float32 => {
            for chunk in raw.chunks_exact(4) {
                out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
            }
        }
        PixelType::Int32 => {
            for chunk in raw.chunks_exact(4) {
                out.push(i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f32);
            }
        }
        PixelType::Int16 => {
            for chunk in raw.chunks_exact(2) {
                out.push(i16::from_le_bytes([chunk[0], chunk[1]]) as f32);
            }
        }
        PixelType::UInt8 => {
            for &b in raw {
                out.push(b as f32);
            }
        }
    }
}

/// Encode f32 values into raw sample bytes. Integer targets truncate
/// toward zero and saturate at the type bounds.
pub(crate) fn encode_samples(values: &[f32], pixel_type: PixelType, out: &mut Vec<u8>) {
    match pixel_type {
        PixelType::Float32 => {
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        PixelType::Int32 => {
            for v in values {
                out.extend_from_slice(&(*v as i32).to_le_bytes());
            }
        }
        PixelType::Int16 => {
            for v in values {
                out.extend_from_slice(&(*v as i16).to_le_bytes());
            }
        }
        PixelType::UInt8 => {
            for v in values {
                out.push(*v as u8);
            }
        }
    }
}
