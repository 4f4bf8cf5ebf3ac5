//! On-disk pixel sample types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sample type of raster band data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    /// 32-bit IEEE float.
    #[default]
    Float32,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 8-bit integer.
    UInt8,
}

/// Error returned when parsing an unknown pixel type name.
#[derive(Debug, Error)]
#[error("unknown pixel type: {0}")]
pub struct UnknownPixelType(pub String);

impl PixelType {
    /// Size of one sample in bytes.
    pub fn byte_size(&self) -> usize {
        match self {
            PixelType::Float32 | PixelType::Int32 => 4,
            PixelType::Int16 => 2,
            PixelType::UInt8 => 1,
        }
    }
}

impl std::str::FromStr for PixelType {
    type Err = UnknownPixelType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float32" | "f32" => Ok(PixelType::Float32),
            "int16" | "i16" => Ok(PixelType::Int16),
            "int32" | "i32" => Ok(PixelType::Int32),
            "uint8" | "u8" | "byte" => Ok(PixelType::UInt8),
            other => Err(UnknownPixelType(other.to_string())),
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelType::Float32 => write!(f, "float32"),
            PixelType::Int16 => write!(f, "int16"),
            PixelType::Int32 => write!(f, "int32"),
            PixelType::UInt8 => write!(f, "uint8"),
        }
    }
}
