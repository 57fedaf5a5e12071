//! Artifact comparison
//!
//! Pure comparison functions: numeric values within an absolute tolerance,
//! and plots by perceptual similarity.

pub mod image;
pub mod value;

pub use self::image::{similarity, ssim, to_luminance};
pub use self::value::{values_match, NdArray, StudentValue};
