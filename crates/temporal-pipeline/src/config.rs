//! Run configuration: sources, steps and tunables.
//!
//! Loaded from JSON; every field of [`RunConfig`] except `sources` and
//! `steps` has a default so a minimal config stays minimal. CLI overrides
//! are applied by the runner binary before validation.

use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use raster_common::{DateFormat, PixelType};
use raster_io::BandSelector;

use crate::error::{PipelineError, Result};

/// One named time series of single-band rasters.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source name, referenced by step inputs.
    pub name: String,
    /// Filename regex; capture 1 is the date string, optional capture 2 a
    /// tile identifier.
    pub pattern: String,
    /// Band to read from each file (1-based number or band name).
    pub band: BandSelector,
    /// Decode scale; defaults to the first valid file's header, then 1.0.
    #[serde(default)]
    pub scale: Option<f64>,
    /// Decode offset; defaults to the first valid file's header, then 0.0.
    #[serde(default)]
    pub offset: Option<f64>,
    /// Input no-data value; must resolve here or from file headers.
    #[serde(default)]
    pub missing_in: Option<f64>,
}

/// One processing step of the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Transform module identifier, resolved against the registry.
    pub module: String,
    /// Step name; defaults to the module identifier.
    #[serde(default)]
    pub name: Option<String>,
    /// Transform parameters, parsed by the module's factory.
    #[serde(default)]
    pub params: serde_json::Value,
    /// Input source or step names.
    #[serde(deserialize_with = "one_or_many")]
    pub inputs: Vec<String>,
    /// Whether this step's result is written to an output raster.
    #[serde(default)]
    pub output: bool,
    /// Pixel type for the output raster; defaults to float32.
    #[serde(default)]
    pub output_type: Option<PixelType>,
    /// Optional declared input frame count, cross-checked against the
    /// resolved value.
    #[serde(default)]
    pub nin: Option<usize>,
    /// Optional declared input year count, cross-checked likewise.
    #[serde(default)]
    pub nyrin: Option<usize>,
}

impl StepConfig {
    /// Effective step name.
    pub fn step_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.module)
    }
}

/// Full configuration of one pipeline run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Directory searched for source files.
    #[serde(default)]
    pub project_dir: PathBuf,
    /// Directory output rasters are written to.
    #[serde(default)]
    pub output_dir: PathBuf,
    /// Prefix for output file names.
    #[serde(default)]
    pub project_name: String,
    /// Source descriptors.
    pub sources: Vec<SourceConfig>,
    /// Step descriptors, in execution order.
    pub steps: Vec<StepConfig>,
    /// Rows per block.
    #[serde(default = "default_block_rows")]
    pub block_rows: usize,
    /// Minimum mapped-slot ratio per source.
    #[serde(default)]
    pub completeness_threshold: f64,
    /// Worker pool size.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// No-data value used in cubes, buffers and output files.
    #[serde(default = "default_missing_output")]
    pub missing_output: f32,
    /// Days aggregated into one frame.
    #[serde(default = "default_days_per_frame")]
    pub days_per_frame: u32,
    /// Date string layout in source filenames.
    #[serde(default)]
    pub date_format: DateFormat,
    /// Debug mode: run only the block with this index.
    #[serde(default)]
    pub only_block: Option<usize>,
}

fn default_block_rows() -> usize {
    10
}

fn default_workers() -> usize {
    1
}

fn default_missing_output() -> f32 {
    -32768.0
}

fn default_days_per_frame() -> u32 {
    1
}

impl RunConfig {
    /// Load a run configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Load a run configuration from a JSON reader (e.g. stdin).
    pub fn from_json_reader(reader: &mut impl Read) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_json(&text)
    }

    /// Parse a run configuration from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PipelineError::config(e.to_string()))
    }

    /// Validate tunables and step naming before a run.
    pub fn validate(&self) -> Result<()> {
        if self.project_dir.as_os_str().is_empty() {
            return Err(PipelineError::config("project_dir is required"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(PipelineError::config("output_dir is required"));
        }
        if self.project_name.is_empty() {
            return Err(PipelineError::config("project_name is required"));
        }
        if self.sources.is_empty() {
            return Err(PipelineError::config("at least one source is required"));
        }
        if self.steps.is_empty() {
            return Err(PipelineError::config("at least one step is required"));
        }
        if self.block_rows == 0 {
            return Err(PipelineError::config("block_rows must be at least 1"));
        }
        if self.workers == 0 {
            return Err(PipelineError::config("workers must be at least 1"));
        }
        if self.days_per_frame == 0 || self.days_per_frame > 366 {
            return Err(PipelineError::config(format!(
                "days_per_frame must be in 1..=366, got {}",
                self.days_per_frame
            )));
        }
        if !(0.0..=1.0).contains(&self.completeness_threshold) {
            return Err(PipelineError::config(format!(
                "completeness_threshold must be in 0..=1, got {}",
                self.completeness_threshold
            )));
        }

        let mut names = HashSet::new();
        for step in &self.steps {
            if !names.insert(step.step_name().to_string()) {
                return Err(PipelineError::config(format!(
                    "duplicate step name '{}'",
                    step.step_name()
                )));
            }
        }
        let mut source_names = HashSet::new();
        for source in &self.sources {
            if !source_names.insert(source.name.clone()) {
                return Err(PipelineError::config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }
        Ok(())
    }
}

/// Accept either a single string or a list of strings.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}
