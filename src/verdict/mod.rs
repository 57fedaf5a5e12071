//! Evidence-backed verdict classification
//!
//! Derives execution verdicts as pure functions over launch evidence and the
//! driver manifest.

pub mod verdict;

pub use verdict::{ExecutionVerdict, VerdictClassifier, VerdictProvenance};
