//! Reference answer
//!
//! Loaded once per grading run and shared read-only by every comparison.

use crate::compare::image::{decode_png, to_luminance, WINDOW};
use crate::compare::value::NdArray;
use crate::config::types::{GradeError, Result};
use crate::utils::npy::read_npy;
use image::GrayImage;
use std::path::Path;

pub const EXPECTED_OUTPUT_FILE: &str = "expected_output.npy";
pub const EXPECTED_PLOT_FILE: &str = "expected_plot.png";

/// Expected result value and expected plot
#[derive(Debug, Clone)]
pub struct ReferenceAnswer {
    value: NdArray,
    plot: GrayImage,
}

impl ReferenceAnswer {
    /// Build from in-memory parts; the plot must fit at least one SSIM window
    pub fn new(value: NdArray, plot: GrayImage) -> Result<Self> {
        if plot.width() < WINDOW || plot.height() < WINDOW {
            return Err(GradeError::Reference(format!(
                "reference plot is {}x{}, smaller than the {}x{} similarity window",
                plot.width(),
                plot.height(),
                WINDOW,
                WINDOW
            )));
        }
        Ok(Self { value, plot })
    }

    /// Load `expected_output.npy` and `expected_plot.png` from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let value_path = dir.join(EXPECTED_OUTPUT_FILE);
        let value = read_npy(&value_path).map_err(|e| {
            GradeError::Reference(format!("cannot load {}: {}", value_path.display(), e))
        })?;

        let plot_path = dir.join(EXPECTED_PLOT_FILE);
        let plot_bytes = std::fs::read(&plot_path).map_err(|e| {
            GradeError::Reference(format!("cannot load {}: {}", plot_path.display(), e))
        })?;
        let plot = decode_png(&plot_bytes).map_err(|e| {
            GradeError::Reference(format!("cannot decode {}: {}", plot_path.display(), e))
        })?;

        log::info!(
            "Loaded reference answer from {}: value shape {:?}, plot {}x{}",
            dir.display(),
            value.shape(),
            plot.width(),
            plot.height()
        );
        Self::new(value, to_luminance(&plot))
    }

    pub fn value(&self) -> &NdArray {
        &self.value
    }

    /// Reference plot, already reduced to luminance
    pub fn plot(&self) -> &GrayImage {
        &self.plot
    }
}
