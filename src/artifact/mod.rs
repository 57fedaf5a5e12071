//! Artifact extraction
//!
//! The driver manifest format and the owned execution result built from it.

pub mod extract;
pub mod manifest;

pub use extract::{extract, ExecutionResult, Figure, Namespace};
pub use manifest::{Binding, Manifest, ResultRecord, ScriptError};
