//! Shared test utilities for the raster pipeline workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic raster generators with predictable values
//! - Dated source-file series writers
//! - Common grids and filename patterns
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Asserts that two f32 values are within a tolerance of each other.
///
/// # Usage
///
/// ```
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0f32, 1.0000001, 1e-5);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $tol:expr) => {{
        let (left, right, tol) = ($left as f32, $right as f32, $tol as f32);
        assert!(
            (left - right).abs() <= tol,
            "assertion failed: |{} - {}| > {}",
            left,
            right,
            tol
        );
    }};
}
