//! Grading orchestration.
//!
//! The reference answer, the per-submission pipeline and the reports it
//! produces. Execution is reached only through [`crate::exec::Sandbox`].

pub mod grader;
pub mod reference;
pub mod report;

pub use grader::{submission_paths, Grader};
pub use reference::ReferenceAnswer;
pub use report::{BatchSummary, GradeOutcome, GradeReport, PlotOutcome};
