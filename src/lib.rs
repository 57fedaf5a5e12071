//! plotgrade: automated grading of short data-analysis scripts
//! Screens untrusted Python submissions, runs them under supervision, and
//! scores the value they bind and the plots they draw against a reference.
//!
//! # Architecture
//!
//! ## Static Screening ([`screen`])
//! - [`screen::screener`]: Forbidden-import detection over a Python syntax tree
//! - [`screen::submission`]: Submission lifecycle types; only screened code can execute
//!
//! ## Execution Control ([`exec`])
//! - [`exec::launch`]: Supervised interpreter launch with wall-clock timeout
//! - [`exec::python`]: Python subprocess [`exec::Sandbox`] with an embedded driver
//!
//! ## Artifacts ([`artifact`])
//! - [`artifact::manifest`]: Driver manifest format
//! - [`artifact::extract`]: Result value, namespace and figures of a completed run
//!
//! ## Evidence & Verdict ([`verdict`])
//! - [`verdict::verdict`]: Evidence-backed classification of each run
//!
//! ## Comparison ([`compare`])
//! - [`compare::value`]: Broadcasting numeric comparison within an absolute tolerance
//! - [`compare::image`]: Luminance SSIM between candidate and reference plots
//!
//! ## Grading ([`judge`]) and Format Checks ([`validate`])
//! - [`judge::grader`]: Screen, execute, compare and report, one submission at a time
//! - [`judge::reference`]: Reference answer loading
//! - [`validate`]: Pre-submission contract checks
//!
//! ## Safety ([`safety`])
//! - [`safety::workspace`]: Run-scoped workspace directories
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: Structured grading audit events
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Grader configuration and the error type
//! - [`config::presets`]: Versioned interpreter runtime envelopes
//! - [`config::validator`]: Startup configuration validation
//!
//! ## Utilities ([`utils`])
//! - [`utils::env_hygiene`]: Child environment sanitization
//! - [`utils::output`]: Bounded output collection
//! - [`utils::npy`]: `.npy` array reading and writing

// Static Screening
pub mod screen;

// Execution Control
pub mod exec;

// Artifacts
pub mod artifact;

// Evidence & Verdict
pub mod verdict;

// Comparison
pub mod compare;

// Grading
pub mod judge;
pub mod validate;

// Safety
pub mod safety;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring shared by the auto_grade and check_format binaries.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
