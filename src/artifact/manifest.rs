//! Driver manifest
//!
//! The embedded driver reports what a submission left behind as
//! `manifest.json` in the run workspace. Array and image payloads live in
//! sibling files named by the manifest.

use crate::config::types::{GradeError, Result};
use crate::safety::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANIFEST_FILE: &str = "manifest.json";

/// A name bound in the submission's module namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Python type name of the bound value
    pub kind: String,
    pub callable: bool,
}

/// How the required result name was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResultRecord {
    /// Converted to float64 and saved as an `.npy` file
    Saved { file: String },
    Missing,
    Unconvertible { detail: String },
}

/// Exception raised by the submission's top-level code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub traceback: String,
}

impl ScriptError {
    /// `<ExceptionType>: <message>`, or just the type for an empty message
    pub fn cause(&self) -> String {
        if self.message.is_empty() {
            self.kind.clone()
        } else {
            format!("{}: {}", self.kind, self.message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub bindings: BTreeMap<String, Binding>,
    pub result: ResultRecord,
    /// Figure PNG files in creation order
    #[serde(default)]
    pub figures: Vec<String>,
    #[serde(default)]
    pub error: Option<ScriptError>,
    /// Set when the driver itself could not do its job
    #[serde(default)]
    pub driver_error: Option<String>,
}

impl Manifest {
    /// Read the manifest from a workspace, `None` if the driver never wrote one
    pub fn read(workspace: &Workspace) -> Result<Option<Self>> {
        let path = workspace.artifact_path(MANIFEST_FILE)?;
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let manifest = serde_json::from_slice(&raw)
            .map_err(|e| GradeError::Manifest(format!("malformed {}: {}", MANIFEST_FILE, e)))?;
        Ok(Some(manifest))
    }
}
