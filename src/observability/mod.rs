//! Observability
//!
//! Structured audit events for grading decisions.

pub mod audit;
