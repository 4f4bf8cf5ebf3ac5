//! Output assembly: one raster per output step and year.

use std::path::PathBuf;
use tracing::info;

use raster_common::PixelType;
use raster_io::{write_raster, RasterWriteOptions};

use crate::align::Alignment;
use crate::config::RunConfig;
use crate::error::Result;
use crate::graph::StepGraph;
use crate::run::OutputBuffer;

/// Assemble the filled buffers into output rasters.
///
/// Each output step yields one multi-band raster per output year, named
/// `{project}_{step}.rst`, with a `_{year}` suffix when the step keeps
/// more than one year. Returns the written paths.
pub fn write_outputs(
    config: &RunConfig,
    alignment: &Alignment,
    graph: &StepGraph,
    buffers: &[OutputBuffer],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&config.output_dir)?;

    let pixels = alignment.grid.pixel_count();
    let mut written = Vec::new();

    for buffer in buffers {
        let step = &graph.steps[buffer.step];
        let options = RasterWriteOptions {
            pixel_type: step.output_type.unwrap_or(PixelType::Float32),
            no_data_value: Some(f64::from(config.missing_output)),
            ..Default::default()
        };

        for year in 0..step.nyrout {
            let mut data = vec![0.0f32; step.nout * pixels];
            // Pixel-major buffer to band-sequential raster order.
            for band in 0..step.nout {
                let plane = &mut data[band * pixels..(band + 1) * pixels];
                for (p, v) in plane.iter_mut().enumerate() {
                    *v = buffer.data[(p * step.nout + band) * step.nyrout + year];
                }
            }

            let filename = if step.nyrout > 1 {
                format!(
                    "{}_{}_{}.rst",
                    config.project_name,
                    step.name,
                    alignment.time.first_year + year as i32
                )
            } else {
                format!("{}_{}.rst", config.project_name, step.name)
            };
            let path = config.output_dir.join(filename);
            write_raster(&path, &data, step.nout, &alignment.grid, &options)?;
            info!(
                step = %step.name,
                bands = step.nout,
                file = %path.display(),
                "wrote output raster"
            );
            written.push(path);
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::Run;
    use crate::steps::TransformRegistry;
    use raster_common::GridDescriptor;
    use raster_io::RasterDataset;
    use std::path::Path;

    fn grid() -> GridDescriptor {
        GridDescriptor::new("EPSG:4326", [10.0, 0.5, 0.0, 40.0, 0.0, -0.5], 3, 4)
    }

    /// Two years, one frame per year.
    fn write_project(dir: &Path) {
        for (name, value) in [("2019001_t1_ndvi.rst", 4.0f32), ("2020001_t1_ndvi.rst", 8.0)] {
            raster_io::write_raster(
                &dir.join(name),
                &vec![value; grid().pixel_count()],
                1,
                &grid(),
                &RasterWriteOptions::default(),
            )
            .unwrap();
        }
    }

    fn config(dir: &Path, steps: &str) -> RunConfig {
        let json = format!(
            r#"{{
                "project_dir": {dir:?},
                "output_dir": {out:?},
                "project_name": "demo",
                "days_per_frame": 366,
                "sources": [{{
                    "name": "ndvi",
                    "pattern": "^(\\d{{7}})_(\\w+)_ndvi\\.rst$",
                    "band": 1,
                    "missing_in": -9999.0
                }}],
                "steps": [{steps}]
            }}"#,
            dir = dir,
            out = dir.join("out"),
        );
        RunConfig::from_json(&json).unwrap()
    }

    #[test]
    fn test_one_file_per_year_with_suffix() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path());
        let cfg = config(
            dir.path(),
            r#"{"module": "passthrough", "inputs": "ndvi", "output": true}"#,
        );

        let registry = TransformRegistry::with_builtins();
        let mut run = Run::prepare(cfg, &registry).unwrap();
        run.execute().unwrap();
        let written = run.write_outputs().unwrap();

        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["demo_passthrough_2019.rst", "demo_passthrough_2020.rst"]);

        let mut ds = RasterDataset::open(&written[1]).unwrap();
        assert_eq!(ds.bands(), 1);
        assert!(ds
            .read_window(0, 0, 4)
            .unwrap()
            .iter()
            .all(|&v| v == 8.0));
    }

    #[test]
    fn test_single_year_output_has_no_suffix() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path());
        let cfg = config(
            dir.path(),
            r#"{"module": "year_mean", "inputs": "ndvi", "output": true}"#,
        );

        let registry = TransformRegistry::with_builtins();
        let mut run = Run::prepare(cfg, &registry).unwrap();
        run.execute().unwrap();
        let written = run.write_outputs().unwrap();

        assert_eq!(written.len(), 1);
        assert_eq!(
            written[0].file_name().unwrap().to_str().unwrap(),
            "demo_year_mean.rst"
        );
        // Mean of the two yearly values.
        let mut ds = RasterDataset::open(&written[0]).unwrap();
        assert!(ds.read_window(0, 0, 4).unwrap().iter().all(|&v| v == 6.0));
        assert_eq!(ds.no_data_value(), Some(-32768.0));
    }

    #[test]
    fn test_output_type_honored() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path());
        let cfg = config(
            dir.path(),
            r#"{"module": "year_mean", "inputs": "ndvi", "output": true, "output_type": "int16"}"#,
        );

        let registry = TransformRegistry::with_builtins();
        let mut run = Run::prepare(cfg, &registry).unwrap();
        run.execute().unwrap();
        let written = run.write_outputs().unwrap();

        let mut ds = RasterDataset::open(&written[0]).unwrap();
        assert!(ds.read_window(0, 0, 4).unwrap().iter().all(|&v| v == 6.0));
    }
}
