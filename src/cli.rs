use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::types::ForbiddenImportPolicy;
use crate::exec::PythonSandbox;
use crate::judge::{Grader, ReferenceAnswer};
use crate::validate::FormatValidator;

/// Workspaces older than this are left over from interrupted runs
const STALE_WORKSPACE_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CliMode {
    Grade,
    Check,
}

impl CliMode {
    fn primary_binary(self) -> &'static str {
        match self {
            Self::Grade => "auto_grade",
            Self::Check => "check_format",
        }
    }
}

#[derive(Parser)]
#[command(name = "auto_grade", author, version, about, long_about = None)]
struct GradeCli {
    /// JSON grader configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding expected_output.npy and expected_plot.png
    #[arg(long)]
    answers: Option<PathBuf>,
    /// Directory of submissions to grade
    #[arg(long)]
    submissions: Option<PathBuf>,
    /// Wall clock limit per submission in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Record forbidden imports but still execute the submission
    #[arg(long)]
    warn_only_imports: bool,
}

#[derive(Parser)]
#[command(name = "check_format", author, version, about, long_about = None)]
struct CheckCli {
    /// JSON grader configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Script to check
    files: Vec<PathBuf>,
}

/// Run one binary; returns the process exit code
pub fn run(mode: CliMode) -> Result<i32> {
    env_logger::init();

    match mode {
        CliMode::Grade => run_grade(GradeCli::parse()),
        CliMode::Check => {
            let cli = match CheckCli::try_parse() {
                Ok(cli) => cli,
                Err(e) => match e.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
                    _ => {
                        print_check_usage();
                        return Ok(1);
                    }
                },
            };
            run_check(cli)
        }
    }
}

fn print_check_usage() {
    println!("Usage: {} your_file.py", CliMode::Check.primary_binary());
}

fn run_grade(cli: GradeCli) -> Result<i32> {
    let mut config = crate::config::load_config(cli.config.as_deref())?;
    if let Some(answers) = cli.answers {
        config.answers_dir = answers;
    }
    if let Some(submissions) = cli.submissions {
        config.submissions_dir = submissions;
    }
    if let Some(timeout) = cli.timeout {
        config.runtime.wall_time_limit_ms = Some(timeout.saturating_mul(1000));
    }
    if cli.warn_only_imports {
        config.forbidden_import_policy = ForbiddenImportPolicy::Warn;
    }
    crate::config::validator::validate_config(&config)?;

    let reference = match ReferenceAnswer::load(&config.answers_dir) {
        Ok(reference) => reference,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(1);
        }
    };

    let sandbox = PythonSandbox::new(&config)?;
    match sandbox.workspaces().cleanup_old_workspaces(STALE_WORKSPACE_AGE) {
        Ok(0) => {}
        Ok(removed) => log::info!("Removed {} stale workspace(s)", removed),
        Err(e) => log::warn!("Stale workspace cleanup failed: {}", e),
    }

    let grader = Grader::new(&config, reference, sandbox);
    let summary = grader.grade_batch(
        &config.submissions_dir,
        &config.submission_extension,
        |report| println!("{}", report.render()),
    )?;

    log::info!(
        "{}: graded {}, rejected {}, execution failures {}, unreadable {}",
        CliMode::Grade.primary_binary(),
        summary.graded,
        summary.rejected,
        summary.execution_failures,
        summary.load_errors
    );
    Ok(0)
}

fn run_check(cli: CheckCli) -> Result<i32> {
    let [path] = cli.files.as_slice() else {
        print_check_usage();
        return Ok(1);
    };

    let config = crate::config::load_config(cli.config.as_deref())?;
    crate::config::validator::validate_config(&config)?;
    let validator = FormatValidator::new(&config, PythonSandbox::new(&config)?);
    let report = match validator.check(path) {
        Ok(report) => report,
        Err(e) => {
            println!("Error: {}", e);
            return Ok(1);
        }
    };

    println!("{}", report.message());
    Ok(if report.ok { 0 } else { 1 })
}
