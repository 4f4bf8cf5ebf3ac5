//! Step transforms and the registry resolving module identifiers.
//!
//! A step's `module` field names a transform. Resolution goes through an
//! explicit [`TransformRegistry`] populated with the builtins at
//! construction; external transforms are added with
//! [`TransformRegistry::register`]. Parameters are parsed once, by the
//! factory, so malformed params surface at graph-build time rather than
//! inside a worker.

pub mod builtin;

use std::collections::HashMap;

use crate::cube::DataCube;
use crate::error::{PipelineError, Result};

/// Error type for transform application; wrapped into a block-execution
/// error (with step name and block index) by the worker.
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;

/// A step's processing function plus its shape-inference hooks.
///
/// `apply` receives the step's input cube — `(inputs, bands, years,
/// pixels)`, single-input cubes indexed as `(bands, years, pixels)` — and
/// must return a single-input cube shaped `(nout, nyrout, pixels)`.
/// Samples equal to `missing` are not valid data and must stay `missing`
/// in the result unless the transform derives a value for them.
pub trait Transform: Send + Sync {
    /// Apply the transform to one block's data.
    fn apply(&self, input: &DataCube, missing: f32) -> std::result::Result<DataCube, TransformError>;

    /// Number of output bands for `nin` input bands. Identity by default.
    fn output_count(&self, nin: usize) -> usize {
        nin
    }

    /// Number of output year slices for `nyrin` input years. Identity by
    /// default.
    fn output_years(&self, nyrin: usize) -> usize {
        nyrin
    }
}

/// Creates a transform instance from a step's raw JSON params.
pub type TransformFactory = fn(&serde_json::Value) -> Result<Box<dyn Transform>>;

/// Maps module identifiers to transform factories.
pub struct TransformRegistry {
    factories: HashMap<String, TransformFactory>,
}

impl TransformRegistry {
    /// An empty registry with no modules.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry holding the builtin transforms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Register a transform factory, replacing any previous entry for the
    /// same module identifier.
    pub fn register(&mut self, module: impl Into<String>, factory: TransformFactory) {
        self.factories.insert(module.into(), factory);
    }

    /// Whether a module identifier is known.
    pub fn contains(&self, module: &str) -> bool {
        self.factories.contains_key(module)
    }

    /// Instantiate the transform for a module with the given params.
    pub fn create(&self, module: &str, params: &serde_json::Value) -> Result<Box<dyn Transform>> {
        let factory = self.factories.get(module).ok_or_else(|| {
            PipelineError::config(format!("unknown step module '{module}'"))
        })?;
        factory(params).map_err(|e| match e {
            PipelineError::Config(msg) => {
                PipelineError::config(format!("step module '{module}': {msg}"))
            }
            other => other,
        })
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_present() {
        let registry = TransformRegistry::with_builtins();
        for module in ["passthrough", "frame_mean", "year_mean", "linear", "source_mean"] {
            assert!(registry.contains(module), "missing builtin {module}");
        }
        assert!(!registry.contains("no_such_module"));
    }

    #[test]
    fn test_unknown_module_is_config_error() {
        let registry = TransformRegistry::with_builtins();
        let err = registry.create("no_such_module", &serde_json::Value::Null);
        assert!(matches!(err, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_external_registration() {
        struct Noop;
        impl Transform for Noop {
            fn apply(
                &self,
                input: &DataCube,
                _missing: f32,
            ) -> std::result::Result<DataCube, TransformError> {
                Ok(input.clone())
            }
        }

        let mut registry = TransformRegistry::with_builtins();
        registry.register("noop", |_params| Ok(Box::new(Noop)));
        assert!(registry.create("noop", &serde_json::Value::Null).is_ok());
    }
}
