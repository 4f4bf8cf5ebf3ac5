//! Error types for the pipeline engine.

use thiserror::Error;

/// Errors raised while preparing or executing a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid run configuration: bad step graph, unknown transform,
    /// mismatched cardinalities, bad tunables. Always surfaced before any
    /// block executes.
    #[error("configuration error: {0}")]
    Config(String),

    /// Source alignment failed: no matching files, grid mismatch,
    /// unresolvable no-data value, or completeness below threshold.
    /// Raised before scheduling.
    #[error("alignment error: {0}")]
    Alignment(String),

    /// A step's transform failed (or produced a misshapen result) while
    /// processing a block. Fatal for the whole run.
    #[error("step '{step}' failed on block {block}: {message}")]
    BlockExecution {
        step: String,
        block: usize,
        message: String,
    },

    /// Raster adapter failure outside the per-file recovery window.
    #[error(transparent)]
    Raster(#[from] raster_io::RasterIoError),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an alignment error.
    pub fn alignment(msg: impl Into<String>) -> Self {
        Self::Alignment(msg.into())
    }

    /// Create a block-execution error for a step.
    pub fn block_execution(step: impl Into<String>, block: usize, msg: impl Into<String>) -> Self {
        Self::BlockExecution {
            step: step.into(),
            block,
            message: msg.into(),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
