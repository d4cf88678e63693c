//! Interpreter resolution and availability probing.
//!
//! A configured locator is either a filesystem path (used as-is) or a bare
//! name resolved on `$PATH`. Before an interpreter is trusted for a real run
//! it must answer its version-query flag successfully within the probe
//! timeout; an interpreter that cannot is reported unavailable, which is a
//! caller-facing failure rather than an execution result.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::{LiftError, LiftResult};

/// Default legacy-dialect interpreter locator.
pub const DEFAULT_LEGACY_INTERPRETER: &str = "python2";
/// Default target-dialect interpreter locator.
pub const DEFAULT_TARGET_INTERPRETER: &str = "python3";

/// How long a version probe may take before the interpreter is distrusted.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A resolved interpreter: the configured locator plus the path it resolved to.
#[derive(Debug, Clone)]
pub struct Interpreter {
    spec: String,
    path: PathBuf,
}

impl Interpreter {
    /// Resolve a locator. Specs containing a path separator are taken
    /// literally; bare names are looked up on `$PATH`.
    pub fn resolve(spec: &str) -> LiftResult<Interpreter> {
        let path = if spec.contains(std::path::MAIN_SEPARATOR) || spec.contains('/') {
            let path = PathBuf::from(spec);
            if !path.exists() {
                return Err(LiftError::interpreter_unavailable(spec, "path does not exist"));
            }
            path
        } else {
            which::which(spec).map_err(|err| {
                LiftError::interpreter_unavailable(spec, format!("not found on PATH: {}", err))
            })?
        };

        Ok(Interpreter {
            spec: spec.to_string(),
            path,
        })
    }

    /// The locator this interpreter was resolved from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// The resolved executable path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the version probe with the default timeout.
    pub fn verify(&self) -> LiftResult<String> {
        self.verify_within(PROBE_TIMEOUT)
    }

    /// Run `<interpreter> --version` and require success within `timeout`.
    /// Returns the reported version line.
    pub fn verify_within(&self, timeout: Duration) -> LiftResult<String> {
        let mut child = Command::new(&self.path)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                LiftError::interpreter_unavailable(&self.spec, format!("failed to start: {}", err))
            })?;

        match child.wait_timeout(timeout).map_err(LiftError::Io)? {
            Some(status) if status.success() => {
                // Legacy interpreters print the version line on stderr.
                let mut output = Vec::new();
                if let Some(mut stream) = child.stdout.take() {
                    let _ = std::io::Read::read_to_end(&mut stream, &mut output);
                }
                if output.iter().all(|b| b.is_ascii_whitespace()) {
                    if let Some(mut stream) = child.stderr.take() {
                        output.clear();
                        let _ = std::io::Read::read_to_end(&mut stream, &mut output);
                    }
                }
                let version = String::from_utf8_lossy(&output).trim().to_string();
                debug!("interpreter {} verified: {}", self.spec, version);
                Ok(version)
            }
            Some(status) => Err(LiftError::interpreter_unavailable(
                &self.spec,
                format!("version probe exited with {}", status),
            )),
            None => {
                // Probe hung; kill it and report unavailable.
                let _ = child.kill();
                let _ = child.wait();
                Err(LiftError::interpreter_unavailable(
                    &self.spec,
                    format!("version probe timed out after {:?}", timeout),
                ))
            }
        }
    }
}

/// Resolve the default (legacy, target) interpreter pair.
pub fn resolve_default_pair() -> LiftResult<(Interpreter, Interpreter)> {
    Ok((
        Interpreter::resolve(DEFAULT_LEGACY_INTERPRETER)?,
        Interpreter::resolve(DEFAULT_TARGET_INTERPRETER)?,
    ))
}

// ============================================================================
// Tests
// ============================================================================
