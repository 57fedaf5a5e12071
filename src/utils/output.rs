/// Bounded output collection
///
/// Interpreter stdout/stderr are drained by reader threads while the
/// supervisor polls the child, so a chatty script can never block on a full
/// pipe. Bytes past the per-stream cap are read and discarded.
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::process::{ChildStderr, ChildStdout};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Output integrity classification
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputIntegrity {
    Complete,
    TruncatedByJudgeLimit,
    WriteError,
    /// Reader did not finish within the collection timeout
    Abandoned,
}

impl std::fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::TruncatedByJudgeLimit => write!(f, "truncated_by_judge_limit"),
            OutputIntegrity::WriteError => write!(f, "write_error"),
            OutputIntegrity::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Output limits configuration
#[derive(Debug, Clone)]
pub struct OutputLimits {
    /// Per-stream stdout limit (bytes)
    pub stdout_limit: usize,
    /// Per-stream stderr limit (bytes)
    pub stderr_limit: usize,
    /// How long to wait for readers after the child is gone (milliseconds)
    pub collection_timeout_ms: u64,
}

impl Default for OutputLimits {
    fn default() -> Self {
        OutputLimits {
            stdout_limit: 1024 * 1024,
            stderr_limit: 1024 * 1024,
            collection_timeout_ms: 2000,
        }
    }
}

/// Output collection result
#[derive(Debug, Clone)]
pub struct OutputResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_integrity: OutputIntegrity,
    pub stderr_integrity: OutputIntegrity,
}

impl OutputResult {
    /// Worst of the two stream states
    pub fn combined_integrity(&self) -> OutputIntegrity {
        use OutputIntegrity::*;
        let rank = |i: OutputIntegrity| match i {
            Complete => 0,
            TruncatedByJudgeLimit => 1,
            WriteError => 2,
            Abandoned => 3,
        };
        if rank(self.stdout_integrity) >= rank(self.stderr_integrity) {
            self.stdout_integrity
        } else {
            self.stderr_integrity
        }
    }
}

type StreamMessage = (Vec<u8>, OutputIntegrity);

/// Output collector with bounded collection
pub struct OutputCollector {
    limits: OutputLimits,
}

/// Reader threads attached to a running child
pub struct OutputCapture {
    stdout_rx: Option<Receiver<StreamMessage>>,
    stderr_rx: Option<Receiver<StreamMessage>>,
    collection_timeout: Duration,
}

impl OutputCollector {
    pub fn new(limits: OutputLimits) -> Self {
        OutputCollector { limits }
    }

    /// Start draining the child's pipes
    pub fn start(&self, stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> OutputCapture {
        OutputCapture {
            stdout_rx: stdout.map(|s| spawn_reader(s, self.limits.stdout_limit)),
            stderr_rx: stderr.map(|s| spawn_reader(s, self.limits.stderr_limit)),
            collection_timeout: Duration::from_millis(self.limits.collection_timeout_ms),
        }
    }
}

impl OutputCapture {
    /// Wait for both readers, sharing one collection deadline
    pub fn finish(self) -> OutputResult {
        let deadline = Instant::now() + self.collection_timeout;
        let (stdout, stdout_integrity) = receive(self.stdout_rx, deadline);
        let (stderr, stderr_integrity) = receive(self.stderr_rx, deadline);

        OutputResult {
            stdout,
            stderr,
            stdout_integrity,
            stderr_integrity,
        }
    }
}

fn receive(rx: Option<Receiver<StreamMessage>>, deadline: Instant) -> StreamMessage {
    let Some(rx) = rx else {
        return (Vec::new(), OutputIntegrity::Complete);
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(message) => message,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("Output reader did not finish in time; output abandoned");
            (Vec::new(), OutputIntegrity::Abandoned)
        }
        Err(RecvTimeoutError::Disconnected) => (Vec::new(), OutputIntegrity::WriteError),
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: R, limit: usize) -> Receiver<StreamMessage> {
    let (tx, rx) = channel();
    thread::spawn(move || collect_stream(stream, limit, tx));
    rx
}

/// Collect from a single stream with limit, draining past it
fn collect_stream<R: Read>(mut stream: R, limit: usize, tx: Sender<StreamMessage>) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut integrity = OutputIntegrity::Complete;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(buffer.len());
                if n > room {
                    buffer.extend_from_slice(&chunk[..room]);
                    integrity = OutputIntegrity::TruncatedByJudgeLimit;
                } else {
                    buffer.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => {
                integrity = OutputIntegrity::WriteError;
                break;
            }
        }
    }

    let _ = tx.send((buffer, integrity));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_collect_stream_within_limit() {
        let (tx, rx) = channel();
        collect_stream(Cursor::new(b"hello".to_vec()), 16, tx);
        let (data, integrity) = rx.recv().unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(integrity, OutputIntegrity::Complete);
    }

    #[test]
    fn test_collect_stream_truncates_and_drains() {
        let input = vec![b'x'; 50_000];
        let (tx, rx) = channel();
        collect_stream(Cursor::new(input), 100, tx);
        let (data, integrity) = rx.recv().unwrap();
        assert_eq!(data.len(), 100);
        assert_eq!(integrity, OutputIntegrity::TruncatedByJudgeLimit);
    }

    #[test]
    fn test_no_streams_is_complete() {
        let capture = OutputCollector::new(OutputLimits::default()).start(None, None);
        let result = capture.finish();
        assert!(result.stdout.is_empty());
        assert_eq!(result.combined_integrity(), OutputIntegrity::Complete);
    }

    #[test]
    fn test_combined_integrity_takes_worst() {
        let result = OutputResult {
            stdout: Vec::new(),
            stderr: Vec::new(),
            stdout_integrity: OutputIntegrity::Complete,
            stderr_integrity: OutputIntegrity::TruncatedByJudgeLimit,
        };
        assert_eq!(result.combined_integrity(), OutputIntegrity::TruncatedByJudgeLimit);
    }

    #[test]
    fn test_output_integrity_display() {
        assert_eq!(format!("{}", OutputIntegrity::Complete), "complete");
        assert_eq!(
            format!("{}", OutputIntegrity::TruncatedByJudgeLimit),
            "truncated_by_judge_limit"
        );
        assert_eq!(format!("{}", OutputIntegrity::Abandoned), "abandoned");
    }
}
