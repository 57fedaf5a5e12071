//! Configuration
//!
//! Grader configuration types, runtime envelopes, and startup validation.

pub mod presets;
pub mod types;
pub mod validator;

use crate::config::types::{GraderConfig, Result};
use std::path::Path;

/// Load grader configuration.
///
/// With no path the built-in defaults are used. A JSON file may set any
/// subset of fields; the rest keep their defaults.
pub fn load_config(path: Option<&Path>) -> Result<GraderConfig> {
    let Some(path) = path else {
        log::debug!("No config file given, using defaults");
        return Ok(GraderConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|e| {
        types::GradeError::Config(format!("cannot read config {}: {}", path.display(), e))
    })?;
    let config: GraderConfig = serde_json::from_str(&raw).map_err(|e| {
        types::GradeError::Config(format!("invalid config {}: {}", path.display(), e))
    })?;

    log::info!("Loaded config from {}", path.display());
    Ok(config)
}
