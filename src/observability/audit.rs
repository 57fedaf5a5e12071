/// Structured grading audit events
///
/// Every lifecycle step that decides a submission's fate is recorded as a
/// JSON event on the `plotgrade::audit` log target, correlated by run ID and
/// the SHA-256 of the exact source bytes that were screened and executed.
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::SystemTime;

pub const AUDIT_TARGET: &str = "plotgrade::audit";

/// Event severity levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// Types of grading events we track
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GradingEventType {
    ScreeningRejected,
    ForbiddenImportWarning,
    ExecutionStart,
    ExecutionEnd,
    ExecutionTimeout,
    ExecutionFailure,
    GradeRecorded,
    FormatChecked,
}

impl GradingEventType {
    pub fn default_severity(&self) -> Severity {
        match self {
            GradingEventType::ScreeningRejected => Severity::Medium,
            GradingEventType::ForbiddenImportWarning => Severity::Medium,
            GradingEventType::ExecutionTimeout => Severity::Medium,
            GradingEventType::ExecutionFailure => Severity::High,
            GradingEventType::ExecutionStart
            | GradingEventType::ExecutionEnd
            | GradingEventType::GradeRecorded
            | GradingEventType::FormatChecked => Severity::Low,
        }
    }
}

/// One grading event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingEvent {
    pub event_type: GradingEventType,
    pub severity: Severity,
    pub timestamp: SystemTime,
    pub submission: String,
    pub details: String,
    pub run_id: Option<String>,
    pub source_sha256: Option<String>,
    pub envelope_id: Option<String>,
    /// Runtime envelope description (name, version, executable)
    pub envelope: Option<HashMap<String, String>>,
}

impl GradingEvent {
    pub fn new(event_type: GradingEventType, submission: &str, details: String) -> Self {
        Self {
            event_type,
            severity: event_type.default_severity(),
            timestamp: SystemTime::now(),
            submission: submission.to_string(),
            details,
            run_id: None,
            source_sha256: None,
            envelope_id: None,
            envelope: None,
        }
    }

    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    /// Fingerprint the source bytes this event refers to
    pub fn with_source(mut self, source: &[u8]) -> Self {
        self.source_sha256 = Some(source_fingerprint(source));
        self
    }

    pub fn with_envelope_id(mut self, envelope_id: &str) -> Self {
        self.envelope_id = Some(envelope_id.to_string());
        self
    }

    pub fn with_envelope_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.envelope = Some(metadata);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Flat JSON record written to the audit target
    pub fn to_json(&self) -> serde_json::Value {
        let mut entry = serde_json::json!({
            "timestamp": self.timestamp
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            "event_type": self.event_type,
            "severity": self.severity,
            "submission": self.submission,
            "details": self.details,
            "process_id": std::process::id(),
        });
        if let Some(run_id) = &self.run_id {
            entry["run_id"] = serde_json::json!(run_id);
        }
        if let Some(sha) = &self.source_sha256 {
            entry["source_sha256"] = serde_json::json!(sha);
        }
        if let Some(envelope_id) = &self.envelope_id {
            entry["envelope_id"] = serde_json::json!(envelope_id);
        }
        if let Some(envelope) = &self.envelope {
            entry["envelope"] = serde_json::json!(envelope);
        }
        entry
    }
}

/// Hex SHA-256 of submission source
pub fn source_fingerprint(source: &[u8]) -> String {
    format!("{:x}", Sha256::digest(source))
}

/// Emit an event on the audit target
pub fn log_grading_event(event: GradingEvent) {
    let entry = event.to_json();
    match event.severity {
        Severity::High => error!(target: AUDIT_TARGET, "{}", entry),
        Severity::Medium => warn!(target: AUDIT_TARGET, "{}", entry),
        Severity::Low => info!(target: AUDIT_TARGET, "{}", entry),
    }
}

/// Convenience functions for common grading events
pub mod events {
    use super::*;
    use crate::screen::Verdict;

    pub fn screening_rejected(submission: &str, source: &[u8], verdict: &Verdict) {
        log_grading_event(
            GradingEvent::new(
                GradingEventType::ScreeningRejected,
                submission,
                verdict.diagnostics.join("; "),
            )
            .with_source(source),
        );
    }

    pub fn forbidden_import_warning(submission: &str, source: &[u8], verdict: &Verdict) {
        let modules: Vec<&str> = verdict
            .forbidden_imports
            .iter()
            .map(|f| f.module.as_str())
            .collect();
        log_grading_event(
            GradingEvent::new(
                GradingEventType::ForbiddenImportWarning,
                submission,
                format!("executing despite forbidden imports: {}", modules.join(", ")),
            )
            .with_source(source),
        );
    }

    pub fn grade_recorded(submission: &str, score: Option<u32>, max_possible: u32) {
        let details = match score {
            Some(score) => format!("score {}/{}", score, max_possible),
            None => "not graded".to_string(),
        };
        log_grading_event(GradingEvent::new(
            GradingEventType::GradeRecorded,
            submission,
            details,
        ));
    }

    pub fn format_checked(submission: &str, ok: bool, violations: usize) {
        log_grading_event(GradingEvent::new(
            GradingEventType::FormatChecked,
            submission,
            format!("ok={} violations={}", ok, violations),
        ));
    }
}
