//! Dense f32 data cubes passed between pipeline steps.

use crate::error::{PipelineError, Result};

/// A 4-D `(inputs, bands, years, pixels)` array, pixels innermost.
///
/// The worker's time cube is a `DataCube` with one input slab per source
/// and `frames_per_year` bands; step results are cubes with a single input
/// slab. When `inputs == 1` transforms index the cube as
/// `(bands, years, pixels)` — the squeeze convention.
#[derive(Debug, Clone, PartialEq)]
pub struct DataCube {
    data: Vec<f32>,
    inputs: usize,
    bands: usize,
    years: usize,
    pixels: usize,
}

impl DataCube {
    /// Allocate a cube filled with `value`.
    pub fn filled(inputs: usize, bands: usize, years: usize, pixels: usize, value: f32) -> Self {
        Self {
            data: vec![value; inputs * bands * years * pixels],
            inputs,
            bands,
            years,
            pixels,
        }
    }

    /// Build a single-input cube from raw `(bands, years, pixels)` data.
    pub fn from_planes(data: Vec<f32>, bands: usize, years: usize, pixels: usize) -> Result<Self> {
        if data.len() != bands * years * pixels {
            return Err(PipelineError::config(format!(
                "cube data length {} does not match shape ({bands}, {years}, {pixels})",
                data.len()
            )));
        }
        Ok(Self {
            data,
            inputs: 1,
            bands,
            years,
            pixels,
        })
    }

    /// Number of input slabs.
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Number of bands (frames for time cubes, `nout` for results).
    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Number of year slices.
    pub fn years(&self) -> usize {
        self.years
    }

    /// Number of pixels in the innermost axis.
    pub fn pixels(&self) -> usize {
        self.pixels
    }

    /// Raw data, `(inputs, bands, years, pixels)` order.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn plane_offset(&self, input: usize, band: usize, year: usize) -> usize {
        debug_assert!(input < self.inputs && band < self.bands && year < self.years);
        ((input * self.bands + band) * self.years + year) * self.pixels
    }

    /// Contiguous pixel plane for `(input, band, year)`.
    pub fn plane(&self, input: usize, band: usize, year: usize) -> &[f32] {
        let off = self.plane_offset(input, band, year);
        &self.data[off..off + self.pixels]
    }

    /// Mutable pixel plane for `(input, band, year)`.
    pub fn plane_mut(&mut self, input: usize, band: usize, year: usize) -> &mut [f32] {
        let off = self.plane_offset(input, band, year);
        &mut self.data[off..off + self.pixels]
    }

    /// Pixel plane of a single-input cube (squeeze convention).
    pub fn band_plane(&self, band: usize, year: usize) -> &[f32] {
        debug_assert_eq!(self.inputs, 1);
        self.plane(0, band, year)
    }

    /// Copy out the slabs of the given inputs, in order.
    pub fn select(&self, indices: &[usize]) -> DataCube {
        let slab = self.bands * self.years * self.pixels;
        let mut data = Vec::with_capacity(indices.len() * slab);
        for &i in indices {
            debug_assert!(i < self.inputs);
            data.extend_from_slice(&self.data[i * slab..(i + 1) * slab]);
        }
        DataCube {
            data,
            inputs: indices.len(),
            bands: self.bands,
            years: self.years,
            pixels: self.pixels,
        }
    }

    /// Stack single-input cubes into one multi-input cube.
    ///
    /// All parts must agree on bands, years and pixels.
    pub fn stack(parts: &[&DataCube]) -> Result<DataCube> {
        let first = parts
            .first()
            .ok_or_else(|| PipelineError::config("cannot stack zero cubes"))?;
        let mut data = Vec::with_capacity(parts.len() * first.data.len());
        for part in parts {
            if part.inputs != 1
                || part.bands != first.bands
                || part.years != first.years
                || part.pixels != first.pixels
            {
                return Err(PipelineError::config(format!(
                    "cannot stack cube of shape ({}, {}, {}, {}) with ({}, {}, {}, {})",
                    part.inputs,
                    part.bands,
                    part.years,
                    part.pixels,
                    1,
                    first.bands,
                    first.years,
                    first.pixels
                )));
            }
            data.extend_from_slice(&part.data);
        }
        Ok(DataCube {
            data,
            inputs: parts.len(),
            bands: first.bands,
            years: first.years,
            pixels: first.pixels,
        })
    }
}
