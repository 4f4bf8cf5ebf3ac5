//! End-to-end pipeline tests: synthetic dated sources on disk, a full
//! prepare/execute/write cycle, outputs read back and verified.

use std::path::Path;

use serde_json::json;

use raster_io::RasterDataset;
use temporal_pipeline::{PipelineError, Run, RunConfig, TransformRegistry};
use test_utils::{
    medium_grid, series_value, source_pattern, write_dated_raster, write_series, MISSING,
    MISSING_IN,
};

fn base_config(dir: &Path, source_names: &[&str], steps: serde_json::Value) -> RunConfig {
    let sources: Vec<_> = source_names
        .iter()
        .map(|s| {
            json!({
                "name": s,
                "pattern": source_pattern(s),
                "band": 1
            })
        })
        .collect();
    let value = json!({
        "project_dir": dir,
        "output_dir": dir.join("out"),
        "project_name": "demo",
        "sources": sources,
        "steps": steps
    });
    RunConfig::from_json(&value.to_string()).unwrap()
}

fn registry() -> TransformRegistry {
    TransformRegistry::with_builtins()
}

#[test]
fn test_daily_two_source_blend_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let grid = medium_grid();

    // Two sources, three years, two mapped days each; evi runs 10 higher.
    write_series(dir.path(), "ndvi", &grid, [2019, 2020, 2021], &[1, 150]);
    for year in [2019, 2020, 2021] {
        for doy in [1, 150] {
            write_dated_raster(dir.path(), "evi", year, doy, &grid, series_value(year, doy) + 10.0);
        }
    }

    let config = base_config(
        dir.path(),
        &["ndvi", "evi"],
        json!([{
            "module": "source_mean",
            "name": "blend",
            "inputs": ["ndvi", "evi"],
            "output": true
        }]),
    );

    let mut run = Run::prepare(config, &registry()).unwrap();
    let summary = run.execute().unwrap();
    assert_eq!(summary.files_skipped, 0);

    let written = run.write_outputs().unwrap();
    let names: Vec<_> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["demo_blend_2019.rst", "demo_blend_2020.rst", "demo_blend_2021.rst"]
    );

    for (path, year) in written.iter().zip([2019, 2020, 2021]) {
        let mut ds = RasterDataset::open(path).unwrap();
        assert_eq!(ds.bands(), 366);

        // Mapped days carry the two-source mean at every pixel.
        for doy in [1u32, 150] {
            let band = ds.read_window(doy as usize - 1, 0, grid.height).unwrap();
            let expected = series_value(year, doy) + 5.0;
            assert!(band.iter().all(|&v| v == expected), "year {year} doy {doy}");
        }
        // A day no file maps to stays at the no-data value.
        let gap = ds.read_window(10, 0, grid.height).unwrap();
        assert!(gap.iter().all(|&v| v == MISSING));
    }
}

#[test]
fn test_completeness_gate_aborts_before_scheduling() {
    let dir = tempfile::tempdir().unwrap();
    let grid = medium_grid();
    // 2 mapped days of 366 is far below a 10% threshold.
    write_series(dir.path(), "ndvi", &grid, [2019], &[1, 150]);

    let mut config = base_config(
        dir.path(),
        &["ndvi"],
        json!([{"module": "passthrough", "inputs": "ndvi", "output": true}]),
    );
    config.completeness_threshold = 0.1;

    let err = Run::prepare(config, &registry());
    assert!(matches!(err, Err(PipelineError::Alignment(_))));
}

#[test]
fn test_chained_reduction_to_single_band() {
    let dir = tempfile::tempdir().unwrap();
    let grid = medium_grid();
    write_series(dir.path(), "ndvi", &grid, [2019, 2020], &[1, 150]);

    let config = base_config(
        dir.path(),
        &["ndvi"],
        json!([
            {"module": "frame_mean", "inputs": "ndvi", "output": false},
            {"module": "year_mean", "inputs": "frame_mean", "output": true}
        ]),
    );

    let mut run = Run::prepare(config, &registry()).unwrap();
    run.execute().unwrap();
    let written = run.write_outputs().unwrap();

    assert_eq!(written.len(), 1);
    assert_eq!(
        written[0].file_name().unwrap().to_str().unwrap(),
        "demo_year_mean.rst"
    );

    let mut ds = RasterDataset::open(&written[0]).unwrap();
    assert_eq!(ds.bands(), 1);

    let yearly = |year| (series_value(year, 1) + series_value(year, 150)) / 2.0;
    let expected = (yearly(2019) + yearly(2020)) / 2.0;
    let band = ds.read_window(0, 0, grid.height).unwrap();
    assert!(band.iter().all(|&v| v == expected));
}

#[test]
fn test_input_no_data_reaches_output_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let grid = medium_grid();

    // One file, pixel 0 set to the input no-data value.
    let mut data = vec![7.0f32; grid.pixel_count()];
    data[0] = MISSING_IN as f32;
    raster_io::write_raster(
        &dir.path().join("2019001_t1_ndvi.rst"),
        &data,
        1,
        &grid,
        &raster_io::RasterWriteOptions {
            no_data_value: Some(MISSING_IN),
            ..Default::default()
        },
    )
    .unwrap();

    let config = base_config(
        dir.path(),
        &["ndvi"],
        json!([{"module": "passthrough", "inputs": "ndvi", "output": true}]),
    );

    let mut run = Run::prepare(config, &registry()).unwrap();
    run.execute().unwrap();
    let written = run.write_outputs().unwrap();

    let mut ds = RasterDataset::open(&written[0]).unwrap();
    let band = ds.read_window(0, 0, grid.height).unwrap();
    assert_eq!(band[0], MISSING);
    assert!(band[1..].iter().all(|&v| v == 7.0));
}

#[test]
fn test_worker_count_does_not_change_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let grid = medium_grid();
    write_series(dir.path(), "ndvi", &grid, [2019, 2020], &[1, 60, 150, 300]);

    let mut outputs = Vec::new();
    for workers in [1usize, 4] {
        let mut config = base_config(
            dir.path(),
            &["ndvi"],
            json!([{"module": "frame_mean", "inputs": "ndvi", "output": true}]),
        );
        config.workers = workers;
        config.block_rows = 3;
        config.output_dir = dir.path().join(format!("out{workers}"));

        let mut run = Run::prepare(config, &registry()).unwrap();
        run.execute().unwrap();
        let written = run.write_outputs().unwrap();

        let mut samples = Vec::new();
        for path in &written {
            let mut ds = RasterDataset::open(path).unwrap();
            samples.extend(ds.read_window(0, 0, grid.height).unwrap());
        }
        outputs.push(samples);
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_mismatched_source_grids_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_series(dir.path(), "ndvi", &medium_grid(), [2019], &[1]);
    write_series(dir.path(), "evi", &test_utils::small_grid(), [2019], &[1]);

    let config = base_config(
        dir.path(),
        &["ndvi", "evi"],
        json!([{
            "module": "source_mean",
            "inputs": ["ndvi", "evi"],
            "output": true
        }]),
    );

    let err = Run::prepare(config, &registry());
    assert!(matches!(err, Err(PipelineError::Alignment(_))));
}
