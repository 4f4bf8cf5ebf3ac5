//! Per-block execution: read the block's window from every mapped file,
//! run the step graph, write output slices.

use tracing::debug;

use raster_common::{GridDescriptor, TimeGrid};
use raster_io::RasterDataset;

use crate::align::AlignedSource;
use crate::blocks::Block;
use crate::cube::DataCube;
use crate::error::{PipelineError, Result};
use crate::graph::StepGraph;

/// Per-block outcome returned to the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct BlockReport {
    /// Block index.
    pub block: usize,
    /// Input files skipped because they could not be opened or read.
    pub files_skipped: usize,
}

/// One output step's buffer slice owned by a block.
///
/// The slice is pixel-major: `[(pixel * nout + band) * nyrout + year]`,
/// `pixel` relative to the block's first pixel.
pub struct BlockOutput<'a> {
    /// Index of the output step in the graph.
    pub step: usize,
    /// This block's disjoint region of the shared buffer.
    pub slice: &'a mut [f32],
}

/// Execute the whole step graph for one block.
///
/// Individual unreadable files are counted and skipped (their slots stay
/// at the sentinel); a failing transform aborts with a block-execution
/// error naming the step.
pub fn execute_block(
    block: &Block,
    grid: &GridDescriptor,
    time: &TimeGrid,
    sources: &[AlignedSource],
    graph: &StepGraph,
    missing_out: f32,
    outputs: &mut [BlockOutput<'_>],
) -> Result<BlockReport> {
    let pixels = block.rows() * grid.width;
    let frames = time.frames_per_year;
    let years = time.years();

    // Time cube seeded with the sentinel; unread slots stay missing.
    let mut cube = DataCube::filled(sources.len(), frames, years, pixels, missing_out);
    let mut files_skipped = 0usize;

    for (si, source) in sources.iter().enumerate() {
        for (slot, path) in source.paths.iter().enumerate() {
            let Some(path) = path else {
                continue;
            };
            let window = match read_block_window(path, source, block) {
                Ok(window) => window,
                Err(e) => {
                    // Recovered locally: one corrupt file must not abort
                    // the block, but every skip is counted and logged.
                    debug!(
                        source = %source.name,
                        file = %path.display(),
                        block = block.index,
                        error = %e,
                        "skipping unreadable file"
                    );
                    files_skipped += 1;
                    continue;
                }
            };

            let year = slot / frames;
            let frame = slot % frames;
            let plane = cube.plane_mut(si, frame, year);
            for (p, &raw) in window.iter().enumerate() {
                if f64::from(raw) == source.missing_in {
                    continue;
                }
                plane[p] = (source.offset + source.scale * f64::from(raw)) as f32;
            }
        }
    }

    // Steps execute in declaration order; parents always precede children.
    let mut results: Vec<Option<DataCube>> = Vec::with_capacity(graph.steps.len());
    results.resize_with(graph.steps.len(), || None);

    for (idx, step) in graph.steps.iter().enumerate() {
        let input = if step.initial {
            cube.select(&step.input_indices)
        } else {
            let mut parents = Vec::with_capacity(step.input_indices.len());
            for &i in &step.input_indices {
                let parent = results[i].as_ref().ok_or_else(|| {
                    PipelineError::block_execution(
                        &step.name,
                        block.index,
                        "input step has not produced a result",
                    )
                })?;
                parents.push(parent);
            }
            DataCube::stack(&parents)
                .map_err(|e| PipelineError::block_execution(&step.name, block.index, e.to_string()))?
        };

        let result = step
            .transform
            .apply(&input, missing_out)
            .map_err(|e| PipelineError::block_execution(&step.name, block.index, e.to_string()))?;

        if result.inputs() != 1
            || result.bands() != step.nout
            || result.years() != step.nyrout
            || result.pixels() != pixels
        {
            return Err(PipelineError::block_execution(
                &step.name,
                block.index,
                format!(
                    "transform returned shape ({}, {}, {}, {}), expected (1, {}, {}, {pixels})",
                    result.inputs(),
                    result.bands(),
                    result.years(),
                    result.pixels(),
                    step.nout,
                    step.nyrout
                ),
            ));
        }

        if step.output {
            let output = outputs.iter_mut().find(|o| o.step == idx).ok_or_else(|| {
                PipelineError::block_execution(
                    &step.name,
                    block.index,
                    "no output buffer allocated for this step",
                )
            })?;
            write_output_slice(&result, output.slice);
        }

        results[idx] = Some(result);
    }

    Ok(BlockReport {
        block: block.index,
        files_skipped,
    })
}

/// Open one file and read the block's row window, decoded to f32.
fn read_block_window(
    path: &std::path::Path,
    source: &AlignedSource,
    block: &Block,
) -> raster_io::Result<Vec<f32>> {
    let mut dataset = RasterDataset::open(path)?;
    let band = dataset.find_band(&source.band)?;
    dataset.read_window(band, block.row_start, block.rows())
}

/// Transpose a `(nout, nyrout, pixels)` result into the block's
/// pixel-major buffer slice.
fn write_output_slice(result: &DataCube, slice: &mut [f32]) {
    let bands = result.bands();
    let years = result.years();
    debug_assert_eq!(slice.len(), result.pixels() * bands * years);

    for band in 0..bands {
        for year in 0..years {
            let plane = result.band_plane(band, year);
            for (p, &v) in plane.iter().enumerate() {
                slice[(p * bands + band) * years + year] = v;
            }
        }
    }
}
