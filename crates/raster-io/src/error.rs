//! Error types for raster file access.

use thiserror::Error;

/// Errors raised by the raster adapter.
#[derive(Debug, Error)]
pub enum RasterIoError {
    /// The file could not be opened or is not a raster container.
    #[error("failed to open raster: {0}")]
    OpenFailed(String),

    /// Reading sample data failed.
    #[error("failed to read raster data: {0}")]
    ReadFailed(String),

    /// The requested band does not exist.
    #[error("no such band: {0}")]
    BandNotFound(String),

    /// The container header is malformed.
    #[error("invalid raster header: {0}")]
    InvalidHeader(String),

    /// Writing a raster failed.
    #[error("failed to write raster: {0}")]
    WriteFailed(String),

    /// Underlying filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RasterIoError {
    /// Create an OpenFailed error.
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an InvalidHeader error.
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }
}

/// Result type for raster adapter operations.
pub type Result<T> = std::result::Result<T, RasterIoError>;
