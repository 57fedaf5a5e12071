//! Submission lifecycle types
//!
//! A [`Submission`] is raw, untrusted source. Only the screener can turn it
//! into a [`ScreenedSubmission`], and a sandbox consumes that value when it
//! executes it, so a submission cannot be executed twice or without passing
//! screening first.

use crate::config::types::Result;
use std::path::Path;

/// A forbidden import found in a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForbiddenImport {
    /// Full dotted module name as written
    pub module: String,
    /// 1-based source line
    pub line: usize,
}

/// Screening verdict: pass/fail plus ordered diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    pub ok: bool,
    pub diagnostics: Vec<String>,
    pub forbidden_imports: Vec<ForbiddenImport>,
    pub syntax_error: bool,
}

impl Verdict {
    pub fn has_forbidden_imports(&self) -> bool {
        !self.forbidden_imports.is_empty()
    }
}

/// Untrusted source identified by its file name
#[derive(Debug, Clone)]
pub struct Submission {
    name: String,
    source: Vec<u8>,
}

impl Submission {
    /// Read a submission from disk
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, source })
    }

    /// Submission held only in memory
    pub fn from_source(name: impl Into<String>, source: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }
}

/// A submission whose screening verdict allows execution.
///
/// Constructed only by [`crate::screen::Screener`]; consumed by
/// [`crate::exec::Sandbox::execute`].
#[derive(Debug)]
pub struct ScreenedSubmission {
    submission: Submission,
    verdict: Verdict,
}

impl ScreenedSubmission {
    pub(super) fn new(submission: Submission, verdict: Verdict) -> Self {
        Self {
            submission,
            verdict,
        }
    }

    pub fn name(&self) -> &str {
        self.submission.name()
    }

    /// The exact bytes that were screened
    pub fn source(&self) -> &[u8] {
        self.submission.source()
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }
}

/// Outcome of screening a submission
#[derive(Debug)]
pub enum Screening {
    Admitted(ScreenedSubmission),
    Rejected {
        submission: Submission,
        verdict: Verdict,
    },
}

impl Screening {
    pub fn verdict(&self) -> &Verdict {
        match self {
            Screening::Admitted(screened) => screened.verdict(),
            Screening::Rejected { verdict, .. } => verdict,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Screening::Admitted(screened) => screened.name(),
            Screening::Rejected { submission, .. } => submission.name(),
        }
    }
}
