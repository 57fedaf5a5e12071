//! Static screening
//!
//! Submission lifecycle types and the forbidden-import screener that gates
//! execution.

pub mod screener;
pub mod submission;

pub use screener::Screener;
pub use submission::{ForbiddenImport, ScreenedSubmission, Screening, Submission, Verdict};
