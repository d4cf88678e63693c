//! Sandboxed execution of a single script under a named interpreter.
//!
//! Every run is a supervised external process: new process group, allow-listed
//! environment, a CPU-time rlimit (plus a virtual-memory rlimit where the OS
//! supports it), and a wall-clock race in the supervisor. Expiry always forces
//! a process-group kill (cancellation is never cooperative) followed by one
//! bounded best-effort drain of already-buffered output.
//!
//! Expected failures (missing interpreter, non-zero exit, timeout, resource
//! kill) are reported as [`ExecutionResult`] data; this function does not
//! raise for any expected failure category.

use std::io;
use std::path::Path;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time;
use tracing::warn;

use crate::types::ExecutionResult;

/// Environment variables propagated into the child. Everything else,
/// including ambient secrets, is stripped.
const SAFE_ENV_KEYS: &[&str] = &["PATH", "HOME", "LANG"];

/// Upper bound on the post-kill output drain.
const DRAIN_BOUND: Duration = Duration::from_secs(2);

/// Resource ceilings for one execution.
#[derive(Debug, Clone)]
pub struct ExecLimits {
    /// Wall-clock ceiling; also used as the CPU-time rlimit.
    pub timeout: Duration,
    /// Virtual-memory ceiling in bytes (enforced on Linux only).
    pub memory_bytes: u64,
    /// Per-stream capture ceiling in bytes.
    pub max_output_bytes: usize,
}

impl Default for ExecLimits {
    fn default() -> Self {
        ExecLimits {
            timeout: Duration::from_secs(30),
            memory_bytes: 256 * 1024 * 1024,
            max_output_bytes: 10_485_760,
        }
    }
}

impl ExecLimits {
    /// Override the wall-clock/CPU ceiling.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Execute `script` under `interpreter` with the given limits.
///
/// The working directory is the script's parent, and the interpreter's import
/// path is pointed at that directory so sibling imports resolve inside the
/// working copy. Resolves within `timeout` plus the drain bound, or
/// immediately on normal exit.
pub async fn execute(
    script: &Path,
    interpreter: &Path,
    stdin: Option<&str>,
    limits: &ExecLimits,
) -> ExecutionResult {
    let start = Instant::now();
    let cwd = match script.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut cmd = Command::new(interpreter);
    cmd.arg(script)
        .current_dir(cwd)
        .stdin(if stdin.is_some() {
            std::process::Stdio::piped()
        } else {
            std::process::Stdio::null()
        })
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    cmd.env_clear();
    for key in SAFE_ENV_KEYS {
        if let Ok(value) = std::env::var(key) {
            cmd.env(key, value);
        }
    }
    cmd.env("PYTHONPATH", cwd);

    apply_resource_limits(&mut cmd, limits);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return ExecutionResult::spawn_failure(
                format!("Interpreter not found: {}", interpreter.display()),
                elapsed_ms(start),
            );
        }
        Err(err) => {
            return ExecutionResult::spawn_failure(
                format!("Failed to start process: {}", err),
                elapsed_ms(start),
            );
        }
    };

    // Feed stdin from a detached task so a full pipe cannot deadlock the
    // supervisor before it starts reading output.
    if let Some(input) = stdin {
        if let Some(mut handle) = child.stdin.take() {
            let bytes = input.as_bytes().to_vec();
            tokio::spawn(async move {
                let _ = handle.write_all(&bytes).await;
                let _ = handle.shutdown().await;
            });
        }
    }

    // The collector owns both pipes and reads them to EOF.
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let mut collector = Box::pin(async move {
        tokio::join!(read_all(stdout_pipe), read_all(stderr_pipe))
    });

    let deadline = time::sleep(limits.timeout);
    tokio::pin!(deadline);

    let mut timed_out = false;
    let mut pending_kill = false;
    let mut exit_status: Option<io::Result<ExitStatus>> = None;
    let mut collected: Option<(Vec<u8>, Vec<u8>)> = None;

    loop {
        if pending_kill {
            pending_kill = false;
            kill_process_group(&mut child).await;
        }
        if exit_status.is_some() && collected.is_some() {
            break;
        }

        tokio::select! {
            () = &mut deadline => {
                if timed_out {
                    // Drain bound also expired; give up on buffered output.
                    break;
                }
                warn!(
                    "execution of {} timed out after {:?}, killing process group",
                    script.display(),
                    limits.timeout
                );
                timed_out = true;
                pending_kill = true;
                deadline.as_mut().reset(time::Instant::now() + DRAIN_BOUND);
            }
            status = child.wait(), if exit_status.is_none() => {
                exit_status = Some(status);
            }
            output = &mut collector, if collected.is_none() => {
                collected = Some(output);
            }
        }
    }

    let (stdout_bytes, stderr_bytes) = collected.unwrap_or_default();
    let exit_code = if timed_out {
        None
    } else {
        exit_status.and_then(|r| r.ok()).and_then(|s| s.code())
    };

    let (stdout, stdout_truncated) = cap_output(stdout_bytes, limits.max_output_bytes);
    let (stderr, stderr_truncated) = cap_output(stderr_bytes, limits.max_output_bytes);

    ExecutionResult {
        exit_code,
        stdout,
        stderr,
        elapsed_ms: elapsed_ms(start),
        timed_out,
        truncated: stdout_truncated || stderr_truncated,
    }
}

/// Read a pipe to EOF, swallowing read errors.
async fn read_all<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf).await;
    }
    buf
}

/// Truncate a captured stream at the byte ceiling and decode permissively.
fn cap_output(mut bytes: Vec<u8>, max: usize) -> (String, bool) {
    let truncated = bytes.len() > max;
    if truncated {
        bytes.truncate(max);
    }
    (String::from_utf8_lossy(&bytes).into_owned(), truncated)
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

// ============================================================================
// Platform: process groups and rlimits
// ============================================================================

#[cfg(unix)]
fn apply_resource_limits(cmd: &mut Command, limits: &ExecLimits) {
    let cpu_secs = limits.timeout.as_secs().max(1);
    #[cfg_attr(not(target_os = "linux"), allow(unused_variables))]
    let mem_bytes = limits.memory_bytes;

    // Runs in the forked child before exec: detach into a new session (and
    // process group) and apply the resource ceilings.
    unsafe {
        cmd.pre_exec(move || {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }

            let cpu = libc::rlimit {
                rlim_cur: cpu_secs,
                rlim_max: cpu_secs,
            };
            if libc::setrlimit(libc::RLIMIT_CPU, &cpu) != 0 {
                return Err(io::Error::last_os_error());
            }

            // RLIMIT_AS is only reliable on Linux; other platforms ignore or
            // reject it.
            #[cfg(target_os = "linux")]
            {
                let mem = libc::rlimit {
                    rlim_cur: mem_bytes,
                    rlim_max: mem_bytes,
                };
                if libc::setrlimit(libc::RLIMIT_AS, &mem) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn apply_resource_limits(_cmd: &mut Command, _limits: &ExecLimits) {}

/// Kill the child's entire process group, guaranteeing descendants die too.
#[cfg(unix)]
async fn kill_process_group(child: &mut Child) {
    if let Some(pid) = child.id() {
        // setsid in pre_exec made the child its own group leader.
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    } else {
        let _ = child.kill().await;
    }
}

#[cfg(not(unix))]
async fn kill_process_group(child: &mut Child) {
    let _ = child.kill().await;
}

// ============================================================================
// Tests
// ============================================================================
