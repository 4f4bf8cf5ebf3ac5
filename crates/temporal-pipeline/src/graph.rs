//! Step graph building: input resolution and shape inference.
//!
//! Steps are resolved in declaration order. An input name must refer to a
//! source or to an already-declared step, so the declaration order is a
//! valid topological order and cycles cannot be expressed.

use tracing::debug;

use raster_common::{PixelType, TimeGrid};

use crate::config::StepConfig;
use crate::error::{PipelineError, Result};
use crate::steps::{Transform, TransformRegistry};

/// A resolved pipeline step.
pub struct Step {
    /// Step name (unique within the run).
    pub name: String,
    /// Transform module identifier.
    pub module: String,
    /// Whether inputs are sources (true) or prior steps (false).
    pub initial: bool,
    /// Indices into the source list (initial) or the step list.
    pub input_indices: Vec<usize>,
    /// Input band count per slab.
    pub nin: usize,
    /// Input year count.
    pub nyrin: usize,
    /// Output band count.
    pub nout: usize,
    /// Output year count.
    pub nyrout: usize,
    /// Whether this step's result is written to a raster.
    pub output: bool,
    /// Pixel type for the output raster.
    pub output_type: Option<PixelType>,
    /// The step's transform instance, params already bound.
    pub transform: Box<dyn Transform>,
}

/// The resolved step graph, in execution order.
pub struct StepGraph {
    /// Steps in declaration (= topological) order.
    pub steps: Vec<Step>,
}

impl StepGraph {
    /// Output-flagged steps with their indices.
    pub fn output_steps(&self) -> impl Iterator<Item = (usize, &Step)> {
        self.steps.iter().enumerate().filter(|(_, s)| s.output)
    }
}

/// What a single resolved input refers to.
#[derive(PartialEq, Clone, Copy)]
enum InputKind {
    Source,
    Step,
}

/// Resolve the configured steps against sources, prior steps and the
/// transform registry.
pub fn build_steps(
    configs: &[StepConfig],
    registry: &TransformRegistry,
    source_names: &[String],
    time: &TimeGrid,
) -> Result<StepGraph> {
    let mut steps: Vec<Step> = Vec::with_capacity(configs.len());

    for config in configs {
        let name = config.step_name().to_string();
        if steps.iter().any(|s| s.name == name) {
            return Err(PipelineError::config(format!(
                "duplicate step name '{name}'"
            )));
        }
        if config.inputs.is_empty() {
            return Err(PipelineError::config(format!(
                "step '{name}' has no inputs"
            )));
        }

        let mut kind: Option<InputKind> = None;
        let mut input_indices = Vec::with_capacity(config.inputs.len());
        let mut nin: Option<usize> = None;
        let mut nyrin: Option<usize> = None;

        for input in &config.inputs {
            let (this_kind, index, this_nin, this_nyrin) =
                if let Some(si) = source_names.iter().position(|s| s == input) {
                    (InputKind::Source, si, time.frames_per_year, time.years())
                } else if let Some(pi) = steps.iter().position(|s| &s.name == input) {
                    (InputKind::Step, pi, steps[pi].nout, steps[pi].nyrout)
                } else {
                    return Err(PipelineError::config(format!(
                        "step '{name}': input '{input}' is neither a source ({:?}) nor a prior step ({:?})",
                        source_names,
                        steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
                    )));
                };

            match kind {
                None => kind = Some(this_kind),
                Some(k) if k != this_kind => {
                    return Err(PipelineError::config(format!(
                        "step '{name}' mixes source and step inputs"
                    )));
                }
                Some(_) => {}
            }

            for (label, slot, value) in
                [("nin", &mut nin, this_nin), ("nyrin", &mut nyrin, this_nyrin)]
            {
                match slot {
                    None => *slot = Some(value),
                    Some(existing) if *existing != value => {
                        return Err(PipelineError::config(format!(
                            "step '{name}': input '{input}' has {label} {value}, expected {existing}"
                        )));
                    }
                    Some(_) => {}
                }
            }

            input_indices.push(index);
        }

        let nin = nin.unwrap();
        let nyrin = nyrin.unwrap();
        let initial = kind == Some(InputKind::Source);

        // Declared cardinalities must agree with the resolved ones.
        if let Some(declared) = config.nin {
            if declared != nin {
                return Err(PipelineError::config(format!(
                    "step '{name}': declared nin {declared} does not match resolved {nin}"
                )));
            }
        }
        if let Some(declared) = config.nyrin {
            if declared != nyrin {
                return Err(PipelineError::config(format!(
                    "step '{name}': declared nyrin {declared} does not match resolved {nyrin}"
                )));
            }
        }

        let transform = registry.create(&config.module, &config.params)?;
        let nout = transform.output_count(nin);
        let nyrout = transform.output_years(nyrin);
        debug!(
            step = %name,
            module = %config.module,
            initial,
            nin,
            nyrin,
            nout,
            nyrout,
            output = config.output,
            "resolved step"
        );

        steps.push(Step {
            name,
            module: config.module.clone(),
            initial,
            input_indices,
            nin,
            nyrin,
            nout,
            nyrout,
            output: config.output,
            output_type: config.output_type,
            transform,
        });
    }

    Ok(StepGraph { steps })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_config(module: &str, name: Option<&str>, inputs: &[&str], output: bool) -> StepConfig {
        StepConfig {
            module: module.to_string(),
            name: name.map(|s| s.to_string()),
            params: serde_json::Value::Null,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            output,
            output_type: None,
            nin: None,
            nyrin: None,
        }
    }

    fn sources() -> Vec<String> {
        vec!["ndvi".to_string(), "evi".to_string()]
    }

    fn time() -> TimeGrid {
        TimeGrid::new(2018, 2020, 1)
    }

    #[test]
    fn test_initial_step_shapes_from_time_grid() {
        let registry = TransformRegistry::with_builtins();
        let graph = build_steps(
            &[step_config("passthrough", None, &["ndvi"], true)],
            &registry,
            &sources(),
            &time(),
        )
        .unwrap();

        let step = &graph.steps[0];
        assert!(step.initial);
        assert_eq!(step.input_indices, vec![0]);
        assert_eq!((step.nin, step.nyrin), (366, 3));
        // No inference hook on passthrough: identity shapes.
        assert_eq!((step.nout, step.nyrout), (366, 3));
    }

    #[test]
    fn test_chained_step_inherits_parent_shapes() {
        let registry = TransformRegistry::with_builtins();
        let graph = build_steps(
            &[
                step_config("frame_mean", None, &["ndvi"], false),
                step_config("year_mean", None, &["frame_mean"], true),
            ],
            &registry,
            &sources(),
            &time(),
        )
        .unwrap();

        let mean = &graph.steps[0];
        assert_eq!((mean.nout, mean.nyrout), (1, 3));

        let year = &graph.steps[1];
        assert!(!year.initial);
        assert_eq!(year.input_indices, vec![0]);
        assert_eq!((year.nin, year.nyrin), (1, 3));
        assert_eq!((year.nout, year.nyrout), (1, 1));
    }

    #[test]
    fn test_unknown_input_rejected() {
        let registry = TransformRegistry::with_builtins();
        let err = build_steps(
            &[step_config("passthrough", None, &["nope"], false)],
            &registry,
            &sources(),
            &time(),
        );
        assert!(matches!(err, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_forward_reference_rejected() {
        let registry = TransformRegistry::with_builtins();
        // "later" is declared after the step that consumes it.
        let err = build_steps(
            &[
                step_config("passthrough", Some("first"), &["later"], false),
                step_config("passthrough", Some("later"), &["ndvi"], false),
            ],
            &registry,
            &sources(),
            &time(),
        );
        assert!(matches!(err, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_mixed_inputs_rejected() {
        let registry = TransformRegistry::with_builtins();
        let err = build_steps(
            &[
                step_config("passthrough", Some("p"), &["ndvi"], false),
                step_config("source_mean", None, &["evi", "p"], false),
            ],
            &registry,
            &sources(),
            &time(),
        );
        assert!(matches!(err, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_multi_source_fan_in() {
        let registry = TransformRegistry::with_builtins();
        let graph = build_steps(
            &[step_config("source_mean", None, &["ndvi", "evi"], true)],
            &registry,
            &sources(),
            &time(),
        )
        .unwrap();
        assert_eq!(graph.steps[0].input_indices, vec![0, 1]);
    }

    #[test]
    fn test_declared_cardinality_mismatch() {
        let registry = TransformRegistry::with_builtins();
        let mut config = step_config("passthrough", None, &["ndvi"], false);
        config.nin = Some(12);
        let err = build_steps(&[config], &registry, &sources(), &time());
        assert!(matches!(err, Err(PipelineError::Config(_))));

        let mut config = step_config("passthrough", None, &["ndvi"], false);
        config.nin = Some(366);
        config.nyrin = Some(3);
        assert!(build_steps(&[config], &registry, &sources(), &time()).is_ok());
    }

    #[test]
    fn test_unknown_module_rejected() {
        let registry = TransformRegistry::with_builtins();
        let err = build_steps(
            &[step_config("warp_drive", None, &["ndvi"], false)],
            &registry,
            &sources(),
            &time(),
        );
        assert!(matches!(err, Err(PipelineError::Config(_))));
    }
}
