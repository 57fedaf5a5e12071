//! Artifact extraction
//!
//! Turns a completed run's manifest and workspace files into an owned
//! [`ExecutionResult`]. Everything is read into memory before the workspace
//! is torn down.

use super::manifest::{Binding, Manifest, ResultRecord};
use crate::compare::value::StudentValue;
use crate::config::types::{GradeError, Result};
use crate::safety::workspace::Workspace;
use crate::utils::npy::read_npy;
use std::collections::BTreeMap;

/// Names bound by a submission's top-level code
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    bindings: BTreeMap<String, Binding>,
}

impl Namespace {
    pub fn new(bindings: BTreeMap<String, Binding>) -> Self {
        Self { bindings }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn is_callable(&self, name: &str) -> bool {
        self.bindings.get(name).is_some_and(|b| b.callable)
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Bind a name (used to build namespaces outside a real run)
    pub fn bind(&mut self, name: &str, kind: &str, callable: bool) {
        self.bindings.insert(
            name.to_string(),
            Binding {
                kind: kind.to_string(),
                callable,
            },
        );
    }
}

/// One rendered figure, PNG-encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Figure {
    /// 1-based creation order
    pub index: usize,
    pub png: Vec<u8>,
}

/// Everything a successful run produced
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub namespace: Namespace,
    pub result: StudentValue,
    pub plots: Vec<Figure>,
}

/// Collect the result value and figures named by `manifest`
pub fn extract(manifest: &Manifest, workspace: &Workspace) -> Result<ExecutionResult> {
    let result = match &manifest.result {
        ResultRecord::Saved { file } => {
            StudentValue::Present(read_npy(&workspace.artifact_path(file)?)?)
        }
        ResultRecord::Missing => StudentValue::Missing,
        ResultRecord::Unconvertible { detail } => StudentValue::Unconvertible(detail.clone()),
    };

    let plots = manifest
        .figures
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let path = workspace.artifact_path(name)?;
            let png = std::fs::read(&path).map_err(|e| {
                GradeError::Manifest(format!("figure {} unreadable: {}", name, e))
            })?;
            Ok(Figure { index: i + 1, png })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ExecutionResult {
        namespace: Namespace::new(manifest.bindings.clone()),
        result,
        plots,
    })
}
