// Startup config validation
// Invalid configuration fails fast with actionable errors before any submission runs

use crate::config::presets::get_presets;
use crate::config::types::{ForbiddenImportPolicy, GradeError, GraderConfig, Result};

/// Validation result with detailed errors
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate config at startup. Any error is fatal.
pub fn validate_config(config: &GraderConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_comparison(config, &mut result);
    validate_contract(config, &mut result);
    validate_runtime(config, &mut result);
    validate_screening(config, &mut result);

    for warning in &result.warnings {
        log::warn!("config: {}", warning);
    }

    if !result.is_valid() {
        let error_msg = format!("Config validation failed:\n{}", result.errors.join("\n"));
        return Err(GradeError::Config(error_msg));
    }

    Ok(result)
}

/// Tolerance and similarity threshold
fn validate_comparison(config: &GraderConfig, result: &mut ValidationResult) {
    if !(config.tolerance >= 0.0) {
        result.add_error(format!(
            "tolerance must be a non-negative number, got {}",
            config.tolerance
        ));
    }

    if !(0.0..=1.0).contains(&config.similarity_threshold) {
        result.add_error(format!(
            "similarity_threshold must be within [0, 1], got {}",
            config.similarity_threshold
        ));
    }

    if config.score_denominator == Some(0) {
        result.add_error("score_denominator cannot be zero".to_string());
    }
}

/// Names the submission contract depends on
fn validate_contract(config: &GraderConfig, result: &mut ValidationResult) {
    if config.result_name.trim().is_empty() {
        result.add_error("result_name cannot be empty".to_string());
    }

    if config.submission_extension.trim().is_empty() {
        result.add_error("submission_extension cannot be empty".to_string());
    }

    for name in config
        .required_variables
        .iter()
        .chain(config.required_functions.iter())
    {
        if name.trim().is_empty() {
            result.add_error("required names cannot be empty".to_string());
            break;
        }
    }
}

/// Interpreter envelope and limits
fn validate_runtime(config: &GraderConfig, result: &mut ValidationResult) {
    let runtime = &config.runtime;

    if !get_presets().has(&runtime.envelope) {
        result.add_error(format!("unknown runtime envelope: {}", runtime.envelope));
    }

    if let Some(executable) = &runtime.executable {
        if executable.trim().is_empty() {
            result.add_error("runtime executable cannot be empty".to_string());
        }
    }

    if runtime.wall_time_limit_ms == Some(0) {
        result.add_error("wall_time_limit_ms cannot be zero".to_string());
    }

    if runtime.output_limit_bytes == 0 {
        result.add_error("output_limit_bytes cannot be zero".to_string());
    }

    if let Some(root) = &runtime.workspace_root {
        if !root.is_absolute() {
            result.add_warning(format!(
                "workspace_root {:?} is relative; it resolves against the current directory",
                root
            ));
        }
    }
}

/// Forbidden import policy
fn validate_screening(config: &GraderConfig, result: &mut ValidationResult) {
    if config.forbidden_imports.is_empty() {
        result.add_warning("forbidden_imports is empty; no import is screened".to_string());
    }

    if config.forbidden_import_policy == ForbiddenImportPolicy::Warn {
        result.add_warning(
            "forbidden_import_policy is 'warn'; submissions with forbidden imports will run"
                .to_string(),
        );
    }

    if config
        .forbidden_imports
        .iter()
        .any(|name| name.contains('.') || name.trim().is_empty())
    {
        result.add_error(
            "forbidden_imports entries must be bare top-level module names".to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = GraderConfig::default();
        let result = validate_config(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let config = GraderConfig {
            tolerance: -1.0,
            ..GraderConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_nan_tolerance_rejected() {
        let config = GraderConfig {
            tolerance: f64::NAN,
            ..GraderConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config = GraderConfig {
            similarity_threshold: 1.5,
            ..GraderConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("similarity_threshold"));
    }

    #[test]
    fn test_zero_wall_time_rejected() {
        let mut config = GraderConfig::default();
        config.runtime.wall_time_limit_ms = Some(0);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("wall_time_limit_ms"));
    }

    #[test]
    fn test_unknown_envelope_rejected() {
        let mut config = GraderConfig::default();
        config.runtime.envelope = "lua-v1".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_result_name_rejected() {
        let config = GraderConfig {
            result_name: " ".to_string(),
            ..GraderConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_dotted_forbidden_name_rejected() {
        let mut config = GraderConfig::default();
        config.forbidden_imports.insert("os.path".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_warn_policy_is_warning_only() {
        let config = GraderConfig {
            forbidden_import_policy: ForbiddenImportPolicy::Warn,
            forbidden_imports: Default::default(),
            ..GraderConfig::default()
        };
        let result = validate_config(&config).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 2);
    }
}
