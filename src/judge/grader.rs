//! Grading pipeline
//!
//! One submission at a time: screen, execute through the [`Sandbox`],
//! compare the result value and every produced plot, then report. Failures
//! stay with the submission that caused them.

use super::reference::ReferenceAnswer;
use super::report::{BatchSummary, GradeOutcome, GradeReport, PlotOutcome};
use crate::artifact::{ExecutionResult, Figure};
use crate::compare::image::{decode_png, similarity};
use crate::compare::value::{values_match, StudentValue};
use crate::config::types::{ForbiddenImportPolicy, GraderConfig, Result};
use crate::exec::{ExecutionFailure, ExecutionOutcome, Sandbox};
use crate::observability::audit::events;
use crate::screen::{Screener, Screening, Submission, Verdict};
use crate::verdict::ExecutionVerdict;
use std::path::{Path, PathBuf};

/// Scores submissions against one reference answer
pub struct Grader<S: Sandbox> {
    screener: Screener,
    sandbox: S,
    reference: ReferenceAnswer,
    result_name: String,
    tolerance: f64,
    similarity_threshold: f64,
    expected_plots: u32,
    score_denominator: Option<u32>,
}

impl<S: Sandbox> Grader<S> {
    pub fn new(config: &GraderConfig, reference: ReferenceAnswer, sandbox: S) -> Self {
        Self {
            screener: Screener::from_config(config),
            sandbox,
            reference,
            result_name: config.result_name.clone(),
            tolerance: config.tolerance,
            similarity_threshold: config.similarity_threshold,
            expected_plots: config.expected_plots,
            score_denominator: config.score_denominator,
        }
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    pub fn reference(&self) -> &ReferenceAnswer {
        &self.reference
    }

    /// Grade one submission
    pub fn grade(&self, submission: Submission) -> Result<GradeReport> {
        let name = submission.name().to_string();
        let source_len = submission.source().len();
        log::info!("Grading {} ({} bytes)", name, source_len);

        let screening = self.screener.screen_submission(submission)?;
        let report = match screening {
            Screening::Rejected {
                submission,
                verdict,
            } => {
                events::screening_rejected(&name, submission.source(), &verdict);
                GradeReport {
                    submission: name,
                    screening: verdict,
                    outcome: GradeOutcome::Rejected,
                    diagnostics: Vec::new(),
                    score: None,
                    max_possible: self.max_possible(0),
                }
            }
            Screening::Admitted(screened) => {
                let verdict = screened.verdict().clone();
                if verdict.has_forbidden_imports()
                    && self.screener.policy() == ForbiddenImportPolicy::Warn
                {
                    events::forbidden_import_warning(&name, screened.source(), &verdict);
                }

                let outcome = match self.sandbox.execute(screened) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        log::error!("Sandbox failure while running {}: {}", name, e);
                        ExecutionOutcome::Failed(ExecutionFailure {
                            verdict: ExecutionVerdict::InternalError,
                            cause: e.to_string(),
                        })
                    }
                };

                match outcome {
                    ExecutionOutcome::Completed(result) => self.score(name, verdict, result),
                    ExecutionOutcome::Failed(failure) => GradeReport {
                        submission: name,
                        screening: verdict,
                        diagnostics: vec![format!("Script could not run: {}", failure.cause)],
                        outcome: GradeOutcome::ExecutionFailed(failure),
                        score: Some(0),
                        max_possible: self.max_possible(0),
                    },
                }
            }
        };

        events::grade_recorded(&report.submission, report.score, report.max_possible);
        Ok(report)
    }

    /// Load a submission from disk and grade it
    pub fn grade_path(&self, path: &Path) -> Result<GradeReport> {
        self.grade(Submission::load(path)?)
    }

    /// Grade every file with `extension` in `dir`, in file-name order.
    ///
    /// `on_report` sees each report as soon as it exists. Submissions that
    /// cannot be read are logged and counted; the batch keeps going.
    pub fn grade_batch<F>(
        &self,
        dir: &Path,
        extension: &str,
        mut on_report: F,
    ) -> Result<BatchSummary>
    where
        F: FnMut(&GradeReport),
    {
        let paths = submission_paths(dir, extension)?;
        log::info!("Found {} submission(s) in {}", paths.len(), dir.display());

        let mut summary = BatchSummary::default();
        for path in paths {
            let report = match self.grade_path(&path) {
                Ok(report) => report,
                Err(e) => {
                    log::error!("Failed to grade {}: {}", path.display(), e);
                    summary.load_errors += 1;
                    continue;
                }
            };

            match report.outcome {
                GradeOutcome::Rejected => summary.rejected += 1,
                GradeOutcome::ExecutionFailed(_) => summary.execution_failures += 1,
                GradeOutcome::Scored { .. } => {}
            }
            summary.graded += 1;
            on_report(&report);
        }
        Ok(summary)
    }

    fn score(&self, name: String, verdict: Verdict, result: ExecutionResult) -> GradeReport {
        let mut diagnostics = Vec::new();
        let mut score = 0u32;

        if matches!(result.result, StudentValue::Missing) {
            diagnostics.push(format!("Missing required variable: {}", self.result_name));
        }
        if let StudentValue::Unconvertible(detail) = &result.result {
            log::debug!("{}: result is not numeric: {}", name, detail);
        }
        let value_correct = values_match(&result.result, self.reference.value(), self.tolerance);
        if value_correct {
            score += 1;
            diagnostics.push("Output values correct.".to_string());
        } else {
            diagnostics.push("Output values incorrect.".to_string());
        }

        let plots: Vec<PlotOutcome> = result
            .plots
            .iter()
            .map(|figure| self.compare_plot(&name, figure))
            .collect();
        if plots.is_empty() {
            diagnostics.push("No plot produced.".to_string());
        }
        for plot in &plots {
            if plot.correct {
                score += 1;
                diagnostics.push(format!("Plot {} is correct.", plot.index));
            } else {
                diagnostics.push(format!(
                    "Plot {} is incorrect. Similarity: {:.2}",
                    plot.index, plot.similarity
                ));
            }
        }

        let max_possible = self.max_possible(plots.len());
        GradeReport {
            submission: name,
            screening: verdict,
            outcome: GradeOutcome::Scored {
                value_correct,
                plots,
            },
            diagnostics,
            score: Some(score),
            max_possible,
        }
    }

    fn compare_plot(&self, name: &str, figure: &Figure) -> PlotOutcome {
        let score = match decode_png(&figure.png) {
            Ok(candidate) => similarity(&candidate, self.reference.plot()),
            Err(e) => {
                log::warn!("{}: plot {} is not a readable PNG: {}", name, figure.index, e);
                0.0
            }
        };
        PlotOutcome {
            index: figure.index,
            similarity: score,
            correct: score >= self.similarity_threshold,
        }
    }

    /// One value point plus one point per plot, expected or produced
    fn max_possible(&self, plots_produced: usize) -> u32 {
        self.score_denominator.unwrap_or_else(|| {
            let plots = (plots_produced as u32).max(self.expected_plots);
            1 + plots
        })
    }
}

/// Files in `dir` with `extension`, sorted by file name
pub fn submission_paths(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}
