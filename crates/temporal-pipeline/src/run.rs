//! Run orchestration: alignment, graph building, block scheduling.
//!
//! Output buffers are pixel-major so that every block owns one contiguous
//! region per output step. The regions are split off as disjoint mutable
//! slices before scheduling, which lets blocks write concurrently without
//! locks.

use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{info, warn};

use raster_common::{GridDescriptor, TimeGrid};

use crate::align::{align_sources, Alignment};
use crate::blocks::partition_rows;
use crate::config::RunConfig;
use crate::error::{PipelineError, Result};
use crate::graph::{build_steps, StepGraph};
use crate::output;
use crate::steps::TransformRegistry;
use crate::worker::{execute_block, BlockOutput, BlockReport};

/// Shared result buffer for one output step.
///
/// Layout is `[(pixel * nout + band) * nyrout + year]` over the full
/// raster extent, pre-filled with the run's no-data value.
pub struct OutputBuffer {
    /// Index of the step in the graph.
    pub step: usize,
    /// Pixel-major samples.
    pub data: Vec<f32>,
}

/// Aggregate outcome of [`Run::execute`].
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// Number of blocks executed.
    pub blocks_executed: usize,
    /// Input files skipped across all blocks.
    pub files_skipped: usize,
}

/// A prepared pipeline run: aligned sources, resolved step graph and
/// allocated output buffers.
pub struct Run {
    config: RunConfig,
    alignment: Alignment,
    graph: StepGraph,
    buffers: Vec<OutputBuffer>,
}

impl Run {
    /// Validate the configuration, align the sources, resolve the step
    /// graph and allocate output buffers.
    pub fn prepare(config: RunConfig, registry: &TransformRegistry) -> Result<Self> {
        config.validate()?;

        let alignment = align_sources(
            &config.project_dir,
            &config.sources,
            config.days_per_frame,
            config.date_format,
            config.completeness_threshold,
        )?;

        let source_names: Vec<String> =
            config.sources.iter().map(|s| s.name.clone()).collect();
        let graph = build_steps(&config.steps, registry, &source_names, &alignment.time)?;
        if graph.output_steps().next().is_none() {
            return Err(PipelineError::config("no step is flagged for output"));
        }

        let pixels = alignment.grid.pixel_count();
        let buffers = graph
            .output_steps()
            .map(|(idx, step)| OutputBuffer {
                step: idx,
                data: vec![config.missing_output; pixels * step.nout * step.nyrout],
            })
            .collect();

        info!(
            sources = alignment.sources.len(),
            steps = graph.steps.len(),
            years = alignment.time.years(),
            frames_per_year = alignment.time.frames_per_year,
            width = alignment.grid.width,
            height = alignment.grid.height,
            "run prepared"
        );

        Ok(Self {
            config,
            alignment,
            graph,
            buffers,
        })
    }

    /// The shared spatial grid.
    pub fn grid(&self) -> &GridDescriptor {
        &self.alignment.grid
    }

    /// The shared time grid.
    pub fn time(&self) -> &TimeGrid {
        &self.alignment.time
    }

    /// The source alignment.
    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    /// The resolved step graph.
    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    /// Execute every block on a pool of `workers` threads.
    ///
    /// The first failing block aborts the run; skipped input files are
    /// aggregated into the summary.
    pub fn execute(&mut self) -> Result<RunSummary> {
        let width = self.alignment.grid.width;
        let all_blocks = partition_rows(self.alignment.grid.height, self.config.block_rows);

        if let Some(only) = self.config.only_block {
            if only >= all_blocks.len() {
                return Err(PipelineError::config(format!(
                    "only_block {only} out of range, run has {} blocks",
                    all_blocks.len()
                )));
            }
            warn!(block = only, total = all_blocks.len(), "running a single block");
        }

        // Samples per pixel for each output buffer, in buffer order.
        let strides: Vec<usize> = self
            .buffers
            .iter()
            .map(|b| {
                let step = &self.graph.steps[b.step];
                step.nout * step.nyrout
            })
            .collect();

        // Carve every buffer into per-block disjoint slices. Blocks not
        // selected for execution still consume their region so offsets
        // stay aligned.
        let mut remainders: Vec<(usize, &mut [f32])> = self
            .buffers
            .iter_mut()
            .map(|b| (b.step, b.data.as_mut_slice()))
            .collect();

        let mut jobs = Vec::with_capacity(all_blocks.len());
        for block in &all_blocks {
            let mut outputs = Vec::with_capacity(remainders.len());
            for ((step, remainder), stride) in remainders.iter_mut().zip(&strides) {
                let take = block.rows() * width * stride;
                let (head, tail) = std::mem::take(remainder).split_at_mut(take);
                *remainder = tail;
                outputs.push(BlockOutput {
                    step: *step,
                    slice: head,
                });
            }
            let selected = self
                .config
                .only_block
                .map_or(true, |only| only == block.index);
            if selected {
                jobs.push((*block, outputs));
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| PipelineError::config(format!("failed to build worker pool: {e}")))?;

        info!(
            blocks = jobs.len(),
            workers = self.config.workers,
            block_rows = self.config.block_rows,
            "executing blocks"
        );

        let grid = &self.alignment.grid;
        let time = &self.alignment.time;
        let sources = &self.alignment.sources;
        let graph = &self.graph;
        let missing = self.config.missing_output;

        let reports: Vec<BlockReport> = pool.install(|| {
            jobs.into_par_iter()
                .map(|(block, mut outputs)| {
                    execute_block(&block, grid, time, sources, graph, missing, &mut outputs)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let summary = RunSummary {
            blocks_executed: reports.len(),
            files_skipped: reports.iter().map(|r| r.files_skipped).sum(),
        };
        if summary.files_skipped > 0 {
            warn!(files_skipped = summary.files_skipped, "some input files were skipped");
        }
        info!(blocks = summary.blocks_executed, "all blocks finished");
        Ok(summary)
    }

    /// Write one raster per output step and year.
    pub fn write_outputs(&self) -> Result<Vec<PathBuf>> {
        output::write_outputs(&self.config, &self.alignment, &self.graph, &self.buffers)
    }

    /// The filled output buffers, in graph order.
    pub fn buffers(&self) -> &[OutputBuffer] {
        &self.buffers
    }
}
