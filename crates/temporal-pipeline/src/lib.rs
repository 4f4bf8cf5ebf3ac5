//! Pipeline engine for temporal raster statistics.
//!
//! Aligns per-date single-band rasters from multiple sources onto a dense
//! (year, frame-of-year) time grid, resolves a dependency graph of named
//! processing steps, executes the graph per row-block on a worker pool,
//! and assembles the results into one output raster per (step, year).
//!
//! The entry point is [`Run`]: [`Run::prepare`] aligns sources and builds
//! the step graph, [`Run::execute`] schedules blocks, and
//! [`Run::write_outputs`] writes the final rasters.

pub mod align;
pub mod blocks;
pub mod config;
pub mod cube;
pub mod error;
pub mod graph;
pub mod output;
pub mod run;
pub mod steps;
pub mod worker;

pub use align::{align_sources, AlignedSource, Alignment};
pub use blocks::{partition_rows, Block};
pub use config::{RunConfig, SourceConfig, StepConfig};
pub use cube::DataCube;
pub use error::{PipelineError, Result};
pub use graph::{build_steps, Step, StepGraph};
pub use run::{Run, RunSummary};
pub use steps::{Transform, TransformFactory, TransformRegistry};
pub use worker::BlockReport;
