//! Safety
//!
//! Run-scoped workspaces that isolate one submission's artifacts from the
//! next and are torn down after extraction.

pub mod workspace;
