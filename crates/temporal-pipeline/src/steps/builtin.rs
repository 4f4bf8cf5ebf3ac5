//! Builtin step transforms.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::cube::DataCube;
use crate::error::{PipelineError, Result};
use crate::steps::{Transform, TransformError, TransformRegistry};

/// Register every builtin transform.
pub(super) fn register_builtins(registry: &mut TransformRegistry) {
    registry.register("passthrough", |params| {
        parse_params::<NoParams>(params)?;
        Ok(Box::new(Passthrough))
    });
    registry.register("frame_mean", |params| {
        let params = parse_params::<FrameMeanParams>(params)?;
        Ok(Box::new(FrameMean { params }))
    });
    registry.register("year_mean", |params| {
        parse_params::<NoParams>(params)?;
        Ok(Box::new(YearMean))
    });
    registry.register("linear", |params| {
        let params = parse_params::<LinearParams>(params)?;
        Ok(Box::new(Linear { params }))
    });
    registry.register("source_mean", |params| {
        parse_params::<NoParams>(params)?;
        Ok(Box::new(SourceMean))
    });
}

/// Parse a step's raw params into a typed struct; `null` and `[]` are
/// both accepted as "no params" and map to the default.
fn parse_params<T: DeserializeOwned + Default>(params: &Value) -> Result<T> {
    match params {
        Value::Null => Ok(T::default()),
        Value::Array(a) if a.is_empty() => Ok(T::default()),
        other => serde_json::from_value(other.clone())
            .map_err(|e| PipelineError::config(format!("invalid params: {e}"))),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

fn require_single_input(input: &DataCube) -> std::result::Result<(), TransformError> {
    if input.inputs() != 1 {
        return Err(format!("expected a single input, got {}", input.inputs()).into());
    }
    Ok(())
}

/// Identity transform.
struct Passthrough;

impl Transform for Passthrough {
    fn apply(&self, input: &DataCube, _missing: f32) -> std::result::Result<DataCube, TransformError> {
        require_single_input(input)?;
        Ok(input.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FrameMeanParams {
    /// Minimum number of valid frames per (year, pixel); fewer leaves the
    /// pixel missing.
    #[serde(default = "default_min_count")]
    min_count: usize,
}

fn default_min_count() -> usize {
    1
}

impl Default for FrameMeanParams {
    fn default() -> Self {
        Self {
            min_count: default_min_count(),
        }
    }
}

/// Mean over valid frames per (year, pixel); one output band.
struct FrameMean {
    params: FrameMeanParams,
}

impl Transform for FrameMean {
    fn apply(&self, input: &DataCube, missing: f32) -> std::result::Result<DataCube, TransformError> {
        require_single_input(input)?;
        let pixels = input.pixels();
        let mut out = DataCube::filled(1, 1, input.years(), pixels, missing);

        for year in 0..input.years() {
            let mut sums = vec![0.0f64; pixels];
            let mut counts = vec![0usize; pixels];
            for band in 0..input.bands() {
                let plane = input.band_plane(band, year);
                for (p, &v) in plane.iter().enumerate() {
                    if v != missing {
                        sums[p] += v as f64;
                        counts[p] += 1;
                    }
                }
            }
            let plane = out.plane_mut(0, 0, year);
            for p in 0..pixels {
                if counts[p] >= self.params.min_count.max(1) {
                    plane[p] = (sums[p] / counts[p] as f64) as f32;
                }
            }
        }
        Ok(out)
    }

    fn output_count(&self, _nin: usize) -> usize {
        1
    }
}

/// Mean over valid years per (frame, pixel); one output year slice.
struct YearMean;

impl Transform for YearMean {
    fn apply(&self, input: &DataCube, missing: f32) -> std::result::Result<DataCube, TransformError> {
        require_single_input(input)?;
        let pixels = input.pixels();
        let mut out = DataCube::filled(1, input.bands(), 1, pixels, missing);

        for band in 0..input.bands() {
            let mut sums = vec![0.0f64; pixels];
            let mut counts = vec![0usize; pixels];
            for year in 0..input.years() {
                let plane = input.band_plane(band, year);
                for (p, &v) in plane.iter().enumerate() {
                    if v != missing {
                        sums[p] += v as f64;
                        counts[p] += 1;
                    }
                }
            }
            let plane = out.plane_mut(0, band, 0);
            for p in 0..pixels {
                if counts[p] > 0 {
                    plane[p] = (sums[p] / counts[p] as f64) as f32;
                }
            }
        }
        Ok(out)
    }

    fn output_years(&self, _nyrin: usize) -> usize {
        1
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinearParams {
    #[serde(default = "default_gain")]
    gain: f64,
    #[serde(default)]
    bias: f64,
}

fn default_gain() -> f64 {
    1.0
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            gain: default_gain(),
            bias: 0.0,
        }
    }
}

/// Per-sample `gain * v + bias`, missing samples untouched.
struct Linear {
    params: LinearParams,
}

impl Transform for Linear {
    fn apply(&self, input: &DataCube, missing: f32) -> std::result::Result<DataCube, TransformError> {
        require_single_input(input)?;
        let mut out = input.clone();
        for band in 0..input.bands() {
            for year in 0..input.years() {
                for v in out.plane_mut(0, band, year) {
                    if *v != missing {
                        *v = (self.params.gain * *v as f64 + self.params.bias) as f32;
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Mean across input slabs per (band, year, pixel); shape-preserving.
///
/// Intended for initial steps that blend several sources of the same
/// quantity.
struct SourceMean;

impl Transform for SourceMean {
    fn apply(&self, input: &DataCube, missing: f32) -> std::result::Result<DataCube, TransformError> {
        let pixels = input.pixels();
        let mut out = DataCube::filled(1, input.bands(), input.years(), pixels, missing);

        for band in 0..input.bands() {
            for year in 0..input.years() {
                let mut sums = vec![0.0f64; pixels];
                let mut counts = vec![0usize; pixels];
                for slab in 0..input.inputs() {
                    let plane = input.plane(slab, band, year);
                    for (p, &v) in plane.iter().enumerate() {
                        if v != missing {
                            sums[p] += v as f64;
                            counts[p] += 1;
                        }
                    }
                }
                let plane = out.plane_mut(0, band, year);
                for p in 0..pixels {
                    if counts[p] > 0 {
                        plane[p] = (sums[p] / counts[p] as f64) as f32;
                    }
                }
            }
        }
        Ok(out)
    }
}
