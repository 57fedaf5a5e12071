//! Submission format checks
//!
//! Confirms before submission that a script parses, avoids forbidden
//! imports, runs, binds the required names and draws at least one figure.
//! Screening here always rejects forbidden imports regardless of the
//! grading policy.

use crate::config::types::{ForbiddenImportPolicy, GraderConfig, Result};
use crate::exec::{ExecutionOutcome, Sandbox};
use crate::observability::audit::events;
use crate::screen::{Screener, Screening, Submission};
use std::path::Path;

pub const SUCCESS_MESSAGE: &str = "File format confirmed! You may submit now.";

/// Result of one format check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatReport {
    pub ok: bool,
    /// Every violation found, in check order
    pub diagnostics: Vec<String>,
}

impl FormatReport {
    fn from_diagnostics(diagnostics: Vec<String>) -> Self {
        Self {
            ok: diagnostics.is_empty(),
            diagnostics,
        }
    }

    /// Text shown to the student
    pub fn message(&self) -> String {
        if self.ok {
            SUCCESS_MESSAGE.to_string()
        } else {
            self.diagnostics.join("\n")
        }
    }
}

pub struct FormatValidator<S: Sandbox> {
    screener: Screener,
    sandbox: S,
    extension: String,
    required_variables: Vec<String>,
    required_functions: Vec<String>,
}

impl<S: Sandbox> FormatValidator<S> {
    pub fn new(config: &GraderConfig, sandbox: S) -> Self {
        Self {
            screener: Screener::from_config(config).with_policy(ForbiddenImportPolicy::Reject),
            sandbox,
            extension: config.submission_extension.clone(),
            required_variables: config.required_variables.clone(),
            required_functions: config.required_functions.clone(),
        }
    }

    /// Check the script at `path`
    pub fn check(&self, path: &Path) -> Result<FormatReport> {
        if !path.extension().is_some_and(|ext| ext == self.extension.as_str()) {
            let report = FormatReport::from_diagnostics(vec![format!(
                "File must be a .{} file",
                self.extension
            )]);
            events::format_checked(&path.display().to_string(), false, 1);
            return Ok(report);
        }
        self.check_submission(Submission::load(path)?)
    }

    /// Check an already-loaded submission
    pub fn check_submission(&self, submission: Submission) -> Result<FormatReport> {
        let name = submission.name().to_string();
        let mut diagnostics = Vec::new();

        match self.screener.screen_submission(submission)? {
            Screening::Rejected { verdict, .. } => {
                diagnostics.extend(verdict.diagnostics);
            }
            Screening::Admitted(screened) => match self.sandbox.execute(screened) {
                Ok(ExecutionOutcome::Completed(result)) => {
                    for variable in &self.required_variables {
                        if !result.namespace.contains(variable) {
                            diagnostics.push(format!("Missing required variable: {}", variable));
                        }
                    }
                    for function in &self.required_functions {
                        if !result.namespace.contains(function) {
                            diagnostics.push(format!("Missing required function: {}()", function));
                        } else if !result.namespace.is_callable(function) {
                            diagnostics
                                .push(format!("Required function is not callable: {}", function));
                        }
                    }
                    if result.plots.is_empty() {
                        diagnostics.push("No plot detected".to_string());
                    }
                }
                Ok(ExecutionOutcome::Failed(failure)) => {
                    diagnostics.push(format!("Your script could not run: {}", failure.cause));
                }
                Err(e) => {
                    log::error!("Sandbox failure while checking {}: {}", name, e);
                    diagnostics.push(format!("Your script could not run: {}", e));
                }
            },
        }

        let report = FormatReport::from_diagnostics(diagnostics);
        events::format_checked(&name, report.ok, report.diagnostics.len());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ExecutionResult, Figure, Namespace};
    use crate::compare::value::StudentValue;
    use crate::exec::ExecutionFailure;
    use crate::screen::ScreenedSubmission;
    use crate::verdict::ExecutionVerdict;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSandbox {
        outcome: ExecutionOutcome,
        runs: AtomicUsize,
    }

    impl ScriptedSandbox {
        fn new(outcome: ExecutionOutcome) -> Self {
            Self {
                outcome,
                runs: AtomicUsize::new(0),
            }
        }
    }

    impl Sandbox for ScriptedSandbox {
        fn execute(&self, _submission: ScreenedSubmission) -> Result<ExecutionOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.clone())
        }
    }

    fn completed(bindings: &[(&str, bool)], figures: usize) -> ExecutionOutcome {
        let mut namespace = Namespace::default();
        for (name, callable) in bindings {
            let kind = if *callable { "function" } else { "list" };
            namespace.bind(name, kind, *callable);
        }
        ExecutionOutcome::Completed(ExecutionResult {
            namespace,
            result: StudentValue::Missing,
            plots: (1..=figures)
                .map(|index| Figure {
                    index,
                    png: Vec::new(),
                })
                .collect(),
        })
    }

    fn validator(outcome: ExecutionOutcome) -> FormatValidator<ScriptedSandbox> {
        FormatValidator::new(&GraderConfig::default(), ScriptedSandbox::new(outcome))
    }

    fn check(validator: &FormatValidator<ScriptedSandbox>, source: &str) -> FormatReport {
        validator
            .check_submission(Submission::from_source("hw.py", source))
            .unwrap()
    }

    #[test]
    fn test_conforming_script() {
        let v = validator(completed(&[("result", false), ("my_func", true)], 1));
        let report = check(&v, "result = [1]\n");
        assert!(report.ok);
        assert_eq!(report.message(), SUCCESS_MESSAGE);
    }

    #[test]
    fn test_all_violations_accumulate() {
        let v = validator(completed(&[("my_func", false)], 0));
        let report = check(&v, "my_func = 3\n");
        assert!(!report.ok);
        assert_eq!(
            report.diagnostics,
            vec![
                "Missing required variable: result",
                "Required function is not callable: my_func",
                "No plot detected",
            ]
        );
    }

    #[test]
    fn test_missing_function_named() {
        let v = validator(completed(&[("result", false)], 2));
        let report = check(&v, "result = 1\n");
        assert_eq!(report.diagnostics, vec!["Missing required function: my_func()"]);
    }

    #[test]
    fn test_execution_failure_reported() {
        let v = validator(ExecutionOutcome::Failed(ExecutionFailure {
            verdict: ExecutionVerdict::ScriptError,
            cause: "NameError: name 'x' is not defined".to_string(),
        }));
        let report = check(&v, "print(x)\n");
        assert_eq!(
            report.message(),
            "Your script could not run: NameError: name 'x' is not defined"
        );
    }

    #[test]
    fn test_forbidden_import_never_executes_even_under_warn() {
        let config = GraderConfig {
            forbidden_import_policy: ForbiddenImportPolicy::Warn,
            ..GraderConfig::default()
        };
        let v = FormatValidator::new(
            &config,
            ScriptedSandbox::new(completed(&[("result", false), ("my_func", true)], 1)),
        );
        let report = check(&v, "import os\n");
        assert!(!report.ok);
        assert_eq!(report.diagnostics, vec!["Forbidden import detected: os"]);
        assert_eq!(v.sandbox.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wrong_extension() {
        let v = validator(completed(&[], 0));
        let report = v.check(Path::new("homework.txt")).unwrap();
        assert_eq!(report.diagnostics, vec!["File must be a .py file"]);
        assert_eq!(v.sandbox.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reports_are_independent_per_call() {
        let v = validator(completed(&[("result", false), ("my_func", true)], 0));
        let first = check(&v, "pass\n");
        let second = check(&v, "pass\n");
        assert_eq!(first, second);
        assert_eq!(second.diagnostics.len(), 1);
    }
}
