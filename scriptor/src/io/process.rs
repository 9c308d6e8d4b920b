//! Child processes started by scripts (`exec`, `exec_output`).
//!
//! This is the one place where the merged environment leaves the engine: a
//! child process receives it as its own environment. The host process
//! environment is never modified.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::environment::EnvMap;

/// What to run and under which limits.
#[derive(Debug, Clone)]
pub struct ProcessRequest<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub env: &'a EnvMap,
    /// Kill the child after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub output_limit_bytes: usize,
}

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Exit code, or -1 when the child was killed by a signal or timed out.
    pub fn code(&self) -> i64 {
        if self.timed_out {
            return -1;
        }
        self.status.code().map_or(-1, i64::from)
    }
}

/// Run a child process with the merged environment layered over the inherited one.
///
/// Output is read concurrently while the child runs so full pipes cannot
/// deadlock it. Bytes beyond `output_limit_bytes` are drained and discarded.
#[instrument(skip_all, fields(program = request.program, timeout_secs = request.timeout.map(|t| t.as_secs())))]
pub fn run_process(request: &ProcessRequest<'_>) -> Result<CommandOutput> {
    let mut cmd = Command::new(request.program);
    cmd.args(request.args)
        .envs(request.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {}", request.program));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let limit = request.output_limit_bytes;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

    let mut timed_out = false;
    let status = match request.timeout {
        Some(timeout) => match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
        None => child.wait().context("wait for command")?,
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn request<'a>(program: &'a str, args: &'a [String], env: &'a EnvMap) -> ProcessRequest<'a> {
        ProcessRequest {
            program,
            args,
            env,
            timeout: Some(Duration::from_secs(10)),
            output_limit_bytes: 1024,
        }
    }

    #[test]
    fn child_sees_merged_environment() {
        let env = EnvMap::from([("SCRIPTOR_CHILD_VALUE".to_string(), "xyz".to_string())]);
        let args = vec!["-c".to_string(), "printf %s \"$SCRIPTOR_CHILD_VALUE\"".to_string()];
        let output = run_process(&request("sh", &args, &env)).expect("run");
        assert_eq!(output.code(), 0);
        assert_eq!(output.stdout_text(), "xyz");
        assert!(std::env::var("SCRIPTOR_CHILD_VALUE").is_err());
    }

    #[test]
    fn output_beyond_limit_is_counted_as_truncated() {
        let env = EnvMap::new();
        let args = vec!["-c".to_string(), "printf 0123456789".to_string()];
        let mut req = request("sh", &args, &env);
        req.output_limit_bytes = 4;
        let output = run_process(&req).expect("run");
        assert_eq!(output.stdout_text(), "0123");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn timeout_kills_child() {
        let env = EnvMap::new();
        let args = vec!["-c".to_string(), "sleep 5".to_string()];
        let mut req = request("sh", &args, &env);
        req.timeout = Some(Duration::from_millis(100));
        let output = run_process(&req).expect("run");
        assert!(output.timed_out);
        assert_eq!(output.code(), -1);
    }

    #[test]
    fn missing_program_is_an_error() {
        let env = EnvMap::new();
        let err = run_process(&request("scriptor-no-such-program", &[], &env)).unwrap_err();
        assert!(err.to_string().contains("spawn scriptor-no-such-program"));
    }
}
