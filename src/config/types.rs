/// Core types and structures for the plotgrade system
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// What the screener does when a submission imports a forbidden module
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForbiddenImportPolicy {
    /// Verdict fails and the submission is never executed
    #[default]
    Reject,
    /// Diagnostics are recorded but execution proceeds
    Warn,
}

/// Interpreter settings for submission execution.
///
/// Unset fields are filled from the runtime envelope named by `envelope`
/// (see [`crate::config::presets`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime envelope ID
    pub envelope: String,
    /// Interpreter executable override
    pub executable: Option<String>,
    /// Interpreter arguments placed before the driver script
    pub args: Option<Vec<String>>,
    /// Wall clock limit per submission in milliseconds
    pub wall_time_limit_ms: Option<u64>,
    /// Per-stream cap on captured stdout/stderr (bytes)
    pub output_limit_bytes: usize,
    /// Extra environment for the interpreter
    pub environment: Vec<(String, String)>,
    /// Root directory for per-submission workspaces
    pub workspace_root: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            envelope: crate::config::presets::DEFAULT_ENVELOPE_ID.to_string(),
            executable: None,
            args: None,
            wall_time_limit_ms: None,
            output_limit_bytes: 1024 * 1024,
            environment: Vec::new(),
            workspace_root: None,
        }
    }
}

impl RuntimeConfig {
    /// Workspace root, defaulting to a directory under the system temp dir
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("plotgrade"))
    }
}

/// Full grader configuration (JSON file, every field optional)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    /// Directory holding `expected_output.npy` and `expected_plot.png`
    pub answers_dir: PathBuf,
    /// Directory scanned for submissions
    pub submissions_dir: PathBuf,
    /// Extension (without dot) identifying submissions
    pub submission_extension: String,
    /// Name the numeric result must be bound to
    pub result_name: String,
    /// Names the format checker requires to be bound
    pub required_variables: Vec<String>,
    /// Names the format checker requires to be bound and callable
    pub required_functions: Vec<String>,
    /// Top-level modules submissions may not import
    pub forbidden_imports: BTreeSet<String>,
    pub forbidden_import_policy: ForbiddenImportPolicy,
    /// Absolute tolerance for the value comparison
    pub tolerance: f64,
    /// Minimum SSIM for a plot to count as correct
    pub similarity_threshold: f64,
    /// Number of plots the assignment asks for
    pub expected_plots: u32,
    /// Fixed display denominator; computed from the plot count when unset
    pub score_denominator: Option<u32>,
    pub runtime: RuntimeConfig,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            answers_dir: PathBuf::from("correct_answers"),
            submissions_dir: PathBuf::from("student_scripts"),
            submission_extension: "py".to_string(),
            result_name: "result".to_string(),
            required_variables: vec!["result".to_string()],
            required_functions: vec!["my_func".to_string()],
            forbidden_imports: ["os", "sys", "subprocess", "shutil"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            forbidden_import_policy: ForbiddenImportPolicy::Reject,
            tolerance: 1e-4,
            similarity_threshold: 0.95,
            expected_plots: 1,
            score_denominator: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Custom error types for plotgrade
#[derive(Error, Debug)]
pub enum GradeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("NPY format error: {0}")]
    Npy(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Reference answer error: {0}")]
    Reference(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for plotgrade operations
pub type Result<T> = std::result::Result<T, GradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_assignment_contract() {
        let config = GraderConfig::default();
        assert_eq!(config.result_name, "result");
        assert_eq!(config.required_functions, vec!["my_func".to_string()]);
        assert!(config.forbidden_imports.contains("subprocess"));
        assert_eq!(config.forbidden_import_policy, ForbiddenImportPolicy::Reject);
        assert_eq!(config.tolerance, 1e-4);
        assert_eq!(config.similarity_threshold, 0.95);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: GraderConfig = serde_json::from_str(
            r#"{"tolerance": 0.01, "forbidden_import_policy": "warn", "runtime": {"wall_time_limit_ms": 500}}"#,
        )
        .unwrap();
        assert_eq!(config.tolerance, 0.01);
        assert_eq!(config.forbidden_import_policy, ForbiddenImportPolicy::Warn);
        assert_eq!(config.runtime.wall_time_limit_ms, Some(500));
        assert_eq!(config.submission_extension, "py");
        assert_eq!(config.runtime.envelope, "python3-matplotlib-v1");
    }
}
