//! Per-submission grade reports
//!
//! Reports are plain values returned to the caller; rendering them is the
//! caller's choice.

use crate::exec::ExecutionFailure;
use crate::screen::Verdict;

/// Outcome of comparing one produced plot with the reference plot
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOutcome {
    /// 1-based creation order
    pub index: usize,
    pub similarity: f64,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradeOutcome {
    /// Screening refused the submission; it was never executed
    Rejected,
    /// The submission ran but produced no artifacts
    ExecutionFailed(ExecutionFailure),
    Scored {
        value_correct: bool,
        plots: Vec<PlotOutcome>,
    },
}

/// Everything reported about one submission
#[derive(Debug, Clone)]
pub struct GradeReport {
    pub submission: String,
    pub screening: Verdict,
    pub outcome: GradeOutcome,
    /// Grading diagnostics in report order
    pub diagnostics: Vec<String>,
    /// `None` when the submission was rejected before grading
    pub score: Option<u32>,
    pub max_possible: u32,
}

impl GradeReport {
    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, GradeOutcome::Rejected)
    }

    /// Console rendering used by `auto_grade`
    pub fn render(&self) -> String {
        let mut lines = vec![
            String::new(),
            format!("Checking {} for forbidden imports", self.submission),
        ];
        lines.extend(self.screening.diagnostics.iter().cloned());

        if self.is_rejected() {
            lines.push(String::new());
            if self.screening.syntax_error {
                lines.push(format!("{} could not be parsed", self.submission));
            } else {
                lines.push(format!("{} has a forbidden import", self.submission));
            }
            return lines.join("\n");
        }

        lines.push(String::new());
        lines.push(format!("Grading {}:", self.submission));
        lines.extend(self.diagnostics.iter().cloned());
        lines.push(format!(
            "Total Score: {}/{}",
            self.score.unwrap_or(0),
            self.max_possible
        ));
        lines.join("\n")
    }
}

/// Totals over one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub graded: usize,
    pub rejected: usize,
    pub execution_failures: usize,
    /// Submissions that could not even be read
    pub load_errors: usize,
}
