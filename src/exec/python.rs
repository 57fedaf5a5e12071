//! Python subprocess sandbox
//!
//! Each submission runs in a fresh `python3` process inside its own run
//! workspace. The interpreter executes an embedded driver that loads the
//! screened source as module `student_module`, renders figures with the Agg
//! backend, and writes a manifest the grader reads back.

use super::launch::{launch, LaunchRequest};
use super::{ExecutionFailure, ExecutionOutcome, Sandbox};
use crate::artifact::{extract, Manifest};
use crate::config::presets::{get_presets, ResolvedRuntime};
use crate::config::types::{ForbiddenImportPolicy, GradeError, GraderConfig, Result};
use crate::observability::audit::{log_grading_event, GradingEvent, GradingEventType};
use crate::safety::workspace::{Workspace, WorkspaceManager};
use crate::screen::ScreenedSubmission;
use crate::utils::env_hygiene::{validate_environment_safety, EnvHygiene};
use crate::verdict::{ExecutionVerdict, VerdictClassifier};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

const DRIVER_SOURCE: &str = include_str!("driver.py");
const DRIVER_FILE: &str = "driver.py";
const DRIVER_CONFIG_FILE: &str = "driver_config.json";
const MODULE_NAME: &str = "student_module";

#[derive(Serialize)]
struct DriverConfig<'a> {
    workspace: &'a Path,
    submission: &'a Path,
    module_name: &'a str,
    result_name: &'a str,
    forbidden_imports: &'a BTreeSet<String>,
}

/// Runs submissions with a real Python interpreter
pub struct PythonSandbox {
    runtime: ResolvedRuntime,
    workspaces: WorkspaceManager,
    result_name: String,
    /// Modules the driver refuses at import time; empty under the warn policy
    guarded_imports: BTreeSet<String>,
    hygiene: EnvHygiene,
}

impl PythonSandbox {
    pub fn new(config: &GraderConfig) -> Result<Self> {
        let runtime = get_presets().resolve(&config.runtime)?;
        let workspaces = WorkspaceManager::new(config.runtime.workspace_root())?;

        log::info!(
            "Python sandbox ready: envelope={} executable={} wall_limit={:?}",
            runtime.envelope_id,
            runtime.executable,
            runtime.wall_time_limit
        );

        let guarded_imports = match config.forbidden_import_policy {
            ForbiddenImportPolicy::Reject => config.forbidden_imports.clone(),
            ForbiddenImportPolicy::Warn => BTreeSet::new(),
        };

        Ok(Self {
            runtime,
            workspaces,
            result_name: config.result_name.clone(),
            guarded_imports,
            hygiene: EnvHygiene::default(),
        })
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn runtime(&self) -> &ResolvedRuntime {
        &self.runtime
    }

    pub fn guarded_imports(&self) -> &BTreeSet<String> {
        &self.guarded_imports
    }

    fn run(
        &self,
        submission: &ScreenedSubmission,
        workspace: &mut Workspace,
    ) -> Result<ExecutionOutcome> {
        // the executed bytes are exactly the screened bytes
        let source_path = workspace.create_source_file("py", submission.source())?;
        let driver_path = workspace.write_file(DRIVER_FILE, DRIVER_SOURCE.as_bytes())?;
        let driver_config = DriverConfig {
            workspace: workspace.run_dir(),
            submission: &source_path,
            module_name: MODULE_NAME,
            result_name: &self.result_name,
            forbidden_imports: &self.guarded_imports,
        };
        let config_path =
            workspace.write_file(DRIVER_CONFIG_FILE, &serde_json::to_vec(&driver_config)?)?;

        let mut command = vec![self.runtime.executable.clone()];
        command.extend(self.runtime.args.iter().cloned());
        command.push(driver_path.to_string_lossy().to_string());
        command.push(config_path.to_string_lossy().to_string());

        let environment = self
            .hygiene
            .sanitize_environment(workspace.run_dir(), &self.runtime.environment);
        let unsafe_vars = validate_environment_safety(&environment);
        if !unsafe_vars.is_empty() {
            for finding in &unsafe_vars {
                log::error!("{}: {}", submission.name(), finding);
            }
            return Err(GradeError::Execution(format!(
                "refusing to launch with {} unsafe environment variable(s)",
                unsafe_vars.len()
            )));
        }

        let request = LaunchRequest {
            command,
            environment,
            workdir: None,
            wall_time_limit: self.runtime.wall_time_limit,
            output_limits: self.runtime.output_limits.clone(),
        };
        let evidence = launch(&request)?;

        if !evidence.stdout.is_empty() {
            log::info!("{} stdout:\n{}", submission.name(), evidence.stdout);
        }

        let manifest = if evidence.timed_out {
            None
        } else {
            match Manifest::read(workspace) {
                Ok(manifest) => manifest,
                Err(e) => {
                    return Ok(ExecutionOutcome::Failed(ExecutionFailure {
                        verdict: ExecutionVerdict::InternalError,
                        cause: e.to_string(),
                    }))
                }
            }
        };

        let provenance =
            VerdictClassifier::classify(&evidence, manifest.as_ref(), self.runtime.wall_time_limit);
        log::debug!(
            "{}: verdict {} from {:?}",
            submission.name(),
            provenance.verdict,
            provenance.evidence_sources
        );

        let outcome = match (provenance.verdict, manifest) {
            (ExecutionVerdict::Completed, Some(manifest)) => match extract(&manifest, workspace) {
                Ok(result) => ExecutionOutcome::Completed(result),
                Err(e) => ExecutionOutcome::Failed(ExecutionFailure {
                    verdict: ExecutionVerdict::InternalError,
                    cause: format!("artifact extraction failed: {}", e),
                }),
            },
            (verdict, _) => ExecutionOutcome::Failed(ExecutionFailure {
                verdict,
                cause: provenance.cause.unwrap_or_else(|| verdict.to_string()),
            }),
        };
        Ok(outcome)
    }
}

impl Sandbox for PythonSandbox {
    fn execute(&self, submission: ScreenedSubmission) -> Result<ExecutionOutcome> {
        let mut workspace = self.workspaces.create_workspace()?;
        let run_id = workspace.run_id().to_string();

        log_grading_event(
            GradingEvent::new(
                GradingEventType::ExecutionStart,
                submission.name(),
                format!("workspace {}", workspace.run_dir().display()),
            )
            .with_run_id(&run_id)
            .with_source(submission.source())
            .with_envelope_id(&self.runtime.envelope_id)
            .with_envelope_metadata(self.runtime.metadata.clone()),
        );

        let outcome = self.run(&submission, &mut workspace);

        let (event_type, details) = match &outcome {
            Ok(ExecutionOutcome::Completed(result)) => (
                GradingEventType::ExecutionEnd,
                format!("completed with {} figure(s)", result.plots.len()),
            ),
            Ok(ExecutionOutcome::Failed(failure))
                if failure.verdict == ExecutionVerdict::TimedOut =>
            {
                (GradingEventType::ExecutionTimeout, failure.cause.clone())
            }
            Ok(ExecutionOutcome::Failed(failure)) => (
                GradingEventType::ExecutionFailure,
                format!("{}: {}", failure.verdict, failure.cause),
            ),
            Err(e) => (GradingEventType::ExecutionFailure, e.to_string()),
        };
        log_grading_event(
            GradingEvent::new(event_type, submission.name(), details)
                .with_run_id(&run_id)
                .with_source(submission.source()),
        );

        if let Err(e) = workspace.cleanup() {
            log::warn!("Failed to remove workspace {}: {}", run_id, e);
        }
        outcome
    }
}
