//! Execution control
//!
//! The [`Sandbox`] seam through which screened submissions are executed, the
//! supervised interpreter launch, and the Python implementation that drives
//! an embedded helper program inside a per-submission workspace.

pub mod launch;
pub mod python;

use crate::artifact::ExecutionResult;
use crate::config::types::Result;
use crate::screen::ScreenedSubmission;
use crate::verdict::ExecutionVerdict;

pub use python::PythonSandbox;

/// Why a submission produced no artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    pub verdict: ExecutionVerdict,
    /// `<ExceptionType>: <message>`, timeout text, or crash detail
    pub cause: String,
}

/// Outcome of executing one screened submission
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Completed(ExecutionResult),
    Failed(ExecutionFailure),
}

/// Capability-scoped execution of screened code.
///
/// Implementations run each submission's top-level code exactly once in a
/// fresh rendering context. `Err` is reserved for grader infrastructure
/// failures; anything the submission does wrong is an
/// [`ExecutionOutcome::Failed`].
pub trait Sandbox: Send + Sync {
    fn execute(&self, submission: ScreenedSubmission) -> Result<ExecutionOutcome>;
}
