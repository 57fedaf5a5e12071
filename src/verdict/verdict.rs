/// Execution verdict classification
///
/// The verdict for one interpreter run is a pure function of the launch
/// evidence and the driver manifest (if any). Supervisor actions take
/// precedence, then what the driver reported, then the raw wait status.
use crate::artifact::Manifest;
use crate::exec::launch::LaunchEvidence;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stderr lines attached to crash diagnostics
const STDERR_TAIL_LINES: usize = 5;

/// Closed set of execution outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionVerdict {
    /// Top-level code ran to completion and artifacts were recorded
    Completed,
    /// Top-level code raised
    ScriptError,
    /// Killed at the wall limit
    TimedOut,
    /// Interpreter died without the driver reporting why
    Crashed,
    /// The grading machinery itself failed
    InternalError,
}

impl std::fmt::Display for ExecutionVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionVerdict::Completed => write!(f, "completed"),
            ExecutionVerdict::ScriptError => write!(f, "script_error"),
            ExecutionVerdict::TimedOut => write!(f, "timed_out"),
            ExecutionVerdict::Crashed => write!(f, "crashed"),
            ExecutionVerdict::InternalError => write!(f, "internal_error"),
        }
    }
}

/// Verdict plus the evidence it was derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictProvenance {
    pub verdict: ExecutionVerdict,
    /// Human-readable cause; `None` for a completed run
    pub cause: Option<String>,
    pub evidence_sources: Vec<String>,
}

impl VerdictProvenance {
    fn new(verdict: ExecutionVerdict, cause: Option<String>, sources: &[&str]) -> Self {
        Self {
            verdict,
            cause,
            evidence_sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Verdict classifier - pure function over evidence
pub struct VerdictClassifier;

impl VerdictClassifier {
    pub fn classify(
        evidence: &LaunchEvidence,
        manifest: Option<&Manifest>,
        wall_time_limit: Duration,
    ) -> VerdictProvenance {
        // Supervisor kill wins: the manifest of a killed run is never trusted
        if evidence.timed_out {
            return VerdictProvenance::new(
                ExecutionVerdict::TimedOut,
                Some(format!(
                    "execution timed out after {}",
                    format_limit(wall_time_limit)
                )),
                &["judge_actions", "wall_time"],
            );
        }

        if let Some(manifest) = manifest {
            if let Some(driver_error) = &manifest.driver_error {
                return VerdictProvenance::new(
                    ExecutionVerdict::InternalError,
                    Some(format!("grading driver failed: {}", driver_error)),
                    &["manifest.driver_error"],
                );
            }
            if let Some(error) = &manifest.error {
                return VerdictProvenance::new(
                    ExecutionVerdict::ScriptError,
                    Some(error.cause()),
                    &["manifest.error"],
                );
            }
            if evidence.exit_code == Some(0) {
                return VerdictProvenance::new(
                    ExecutionVerdict::Completed,
                    None,
                    &["manifest", "exit_code"],
                );
            }
        }

        if let Some(signal) = evidence.signal {
            return VerdictProvenance::new(
                ExecutionVerdict::Crashed,
                Some(with_stderr_tail(
                    format!("interpreter terminated by signal {}", signal),
                    &evidence.stderr,
                )),
                &["wait_outcome", "signal"],
            );
        }

        match evidence.exit_code {
            Some(0) => VerdictProvenance::new(
                ExecutionVerdict::InternalError,
                Some(with_stderr_tail(
                    "interpreter exited without recording results".to_string(),
                    &evidence.stderr,
                )),
                &["wait_outcome", "manifest_missing"],
            ),
            Some(code) => VerdictProvenance::new(
                ExecutionVerdict::Crashed,
                Some(with_stderr_tail(
                    format!("interpreter exited with status {}", code),
                    &evidence.stderr,
                )),
                &["wait_outcome", "exit_code"],
            ),
            None => VerdictProvenance::new(
                ExecutionVerdict::InternalError,
                Some("unexpected termination state".to_string()),
                &["wait_outcome"],
            ),
        }
    }
}

/// `30s`, `0.5s`
fn format_limit(limit: Duration) -> String {
    format!("{}s", limit.as_secs_f64())
}

fn with_stderr_tail(message: String, stderr: &str) -> String {
    let tail = stderr_tail(stderr, STDERR_TAIL_LINES);
    if tail.is_empty() {
        message
    } else {
        format!("{}: {}", message, tail)
    }
}

/// Last `n` non-blank stderr lines joined with " | "
pub fn stderr_tail(stderr: &str, n: usize) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}
