//! Running external tools with a timeout and cooperative cancellation.
//!
//! Callers always get a tagged result: a [`ToolOutput`] or a [`ToolError`].
//! A process that outlives its timeout, or whose run is cancelled, is killed
//! and reaped before the call returns.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use keel_common::CancellationToken;

use crate::error::ToolError;

/// How often a running process is checked for exit, timeout, and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A single external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Executable name or path.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Bytes written to standard input, which is then closed.
    pub stdin: Option<Vec<u8>>,
    /// Working directory; inherited when `None`.
    pub cwd: Option<PathBuf>,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
}

impl ToolInvocation {
    /// Creates an invocation with no arguments, input, or working directory.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            cwd: None,
            timeout,
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the bytes written to standard input.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Sets the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// Output of a process that ran to completion (successfully or not).
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit status.
    pub status: ExitStatus,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// Returns `true` if the process exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Converts an unsuccessful exit into [`ToolError::Failed`].
    pub fn into_success(self, command: &str) -> Result<Self, ToolError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ToolError::Failed {
                command: command.to_string(),
                status: self.status.to_string(),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs an invocation to completion, its timeout, or cancellation.
///
/// Standard input is fed and both output streams are drained on helper
/// threads so a chatty process can never block on a full pipe.
pub fn run_tool(
    invocation: &ToolInvocation,
    cancel: &CancellationToken,
) -> Result<ToolOutput, ToolError> {
    let command = invocation.program.clone();
    if cancel.is_cancelled() {
        return Err(ToolError::Cancelled { command });
    }

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &invocation.cwd {
        cmd.current_dir(dir);
    }

    tracing::debug!(program = %invocation.program, args = ?invocation.args, "spawning tool");
    let mut child = cmd.spawn().map_err(|e| ToolError::Spawn {
        command: command.clone(),
        source: Arc::new(e),
    })?;

    let writer = match (child.stdin.take(), invocation.stdin.clone()) {
        (Some(mut pipe), Some(input)) => Some(thread::spawn(move || {
            // The pipe closes when `pipe` drops at the end of the thread.
            pipe.write_all(&input)
        })),
        _ => None,
    };
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + invocation.timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                kill(&mut child);
                return Err(ToolError::Io { command, source: Arc::new(e) });
            }
        }
        if cancel.is_cancelled() {
            kill(&mut child);
            tracing::debug!(program = %command, "tool cancelled");
            return Err(ToolError::Cancelled { command });
        }
        if Instant::now() >= deadline {
            kill(&mut child);
            tracing::warn!(program = %command, "tool timed out");
            return Err(ToolError::Timeout {
                command,
                secs: invocation.timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    if let Some(writer) = writer {
        // A process may exit without reading all of its input; a broken pipe
        // then is not an error of ours.
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(ToolError::Io { command, source: Arc::new(e) }),
            Err(_) => {
                return Err(ToolError::Io {
                    command,
                    source: Arc::new(std::io::Error::other("stdin writer panicked")),
                })
            }
        }
    }

    let stdout = collect(stdout, &command)?;
    let stderr = collect(stderr, &command)?;
    Ok(ToolOutput {
        status,
        stdout,
        stderr,
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(
    handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    command: &str,
) -> Result<String, ToolError> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| std::io::Error::other("output reader panicked"))
        .and_then(|r| r)
        .map_err(|e| ToolError::Io {
            command: command.to_string(),
            source: Arc::new(e),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::warn!("failed to kill tool process: {e}");
    }
    // Reap so no zombie is left behind.
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> ToolInvocation {
        ToolInvocation::new("sh", timeout).arg("-c").arg(script)
    }

    #[test]
    fn captures_output_and_status() {
        let out = run_tool(
            &sh("echo out; echo err >&2; exit 3", Duration::from_secs(10)),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.status.code(), Some(3));
        assert!(!out.success());
    }

    #[test]
    fn feeds_stdin() {
        let out = run_tool(
            &ToolInvocation::new("cat", Duration::from_secs(10)).stdin("hello"),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(out.stdout, "hello");
        assert!(out.success());
    }

    #[test]
    fn large_output_does_not_deadlock() {
        let out = run_tool(
            &sh("head -c 1000000 /dev/zero", Duration::from_secs(10)),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(out.stdout.len(), 1_000_000);
    }

    #[test]
    fn timeout_kills_process() {
        let start = Instant::now();
        let err = run_tool(
            &sh("sleep 10", Duration::from_millis(100)),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancellation_kills_process() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });
        let err = run_tool(&sh("sleep 10", Duration::from_secs(30)), &cancel).unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, ToolError::Cancelled { .. }));
    }

    #[test]
    fn already_cancelled_never_spawns() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run_tool(
            &ToolInvocation::new("definitely-not-a-real-binary", Duration::from_secs(1)),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled { .. }));
    }

    #[test]
    fn missing_executable_is_spawn_error() {
        let err = run_tool(
            &ToolInvocation::new("definitely-not-a-real-binary", Duration::from_secs(1)),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[test]
    fn into_success_reports_stderr() {
        let out = run_tool(
            &sh("echo broken >&2; exit 1", Duration::from_secs(10)),
            &CancellationToken::new(),
        )
        .unwrap();
        let err = out.into_success("sh").unwrap_err();
        assert!(matches!(err, ToolError::Failed { ref stderr, .. } if stderr == "broken"));
    }
}
