/// Supervised interpreter launch
///
/// Spawns the interpreter in its own process group, drains its output on
/// reader threads, and polls it against the wall-clock limit. On expiry the
/// whole group is killed, so helper processes a script started die with it.
use crate::config::types::{GradeError, Result};
use crate::utils::output::{OutputCollector, OutputIntegrity, OutputLimits};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What to run and under which limits
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Complete child environment (nothing else is inherited)
    pub environment: HashMap<String, String>,
    /// Working directory; inherited when unset
    pub workdir: Option<PathBuf>,
    pub wall_time_limit: Duration,
    pub output_limits: OutputLimits,
}

/// Observed facts about one interpreter run
#[derive(Debug, Clone)]
pub struct LaunchEvidence {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    /// Killed by the supervisor at the wall limit
    pub timed_out: bool,
    pub wall_time_ms: u64,
    pub stdout: String,
    pub stderr: String,
    pub output_integrity: OutputIntegrity,
}

impl LaunchEvidence {
    pub fn exited_cleanly(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Run the request to completion or to its wall limit
pub fn launch(req: &LaunchRequest) -> Result<LaunchEvidence> {
    let Some((program, args)) = req.command.split_first() else {
        return Err(GradeError::Execution("empty launch command".to_string()));
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .env_clear()
        .envs(&req.environment)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    if let Some(workdir) = &req.workdir {
        cmd.current_dir(workdir);
    }

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|e| {
        GradeError::Execution(format!("failed to start interpreter '{}': {}", program, e))
    })?;
    let pgid = Pid::from_raw(child.id() as i32);

    let capture = OutputCollector::new(req.output_limits.clone())
        .start(child.stdout.take(), child.stderr.take());

    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() > req.wall_time_limit {
                    timed_out = true;
                    log::warn!(
                        "Wall limit {:?} exceeded by pid {}, killing process group",
                        req.wall_time_limit,
                        pgid
                    );
                    kill_group(pgid);
                    let _ = child.kill();
                    let status = child.wait().map_err(|e| {
                        GradeError::Execution(format!("wait after kill: {}", e))
                    })?;
                    break status;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill_group(pgid);
                return Err(GradeError::Execution(format!("wait: {}", e)));
            }
        }
    };
    let wall_time_ms = started.elapsed().as_millis() as u64;

    // Stragglers left in the group would hold the pipes open
    kill_group(pgid);
    let output = capture.finish();

    log::debug!(
        "Interpreter finished: exit={:?} signal={:?} timed_out={} wall={}ms",
        status.code(),
        status.signal(),
        timed_out,
        wall_time_ms
    );

    Ok(LaunchEvidence {
        exit_code: status.code(),
        signal: status.signal(),
        timed_out,
        wall_time_ms,
        output_integrity: output.combined_integrity(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

fn kill_group(pgid: Pid) {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => log::warn!("killpg({}) failed: {}", pgid, e),
    }
}
