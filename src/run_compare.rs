//! Run-and-compare orchestration.
//!
//! Executes the legacy and migrated versions of one file under their
//! respective interpreters and compares the outputs. Both runs are spawned
//! before either is awaited, so total latency is bounded by the slower
//! timeout plus the drain bound, never their sum. Each run gets a private
//! working copy of its file tree; the copies are released on every exit path.
//!
//! Missing prerequisites (file never transformed, interpreter unavailable)
//! stop early with a caller-facing error; no partial result is produced.

use std::path::Path;
use std::time::Duration;

use crate::compare::{compare_outputs, prescan_source};
use crate::error::{LiftError, LiftResult};
use crate::exec::{execute, ExecLimits};
use crate::python::env::Interpreter;
use crate::sandbox::WorkCopy;
use crate::types::RunCompareOutcome;

/// Parameters for one run-and-compare call.
#[derive(Debug, Clone, Default)]
pub struct RunCompareRequest {
    /// Path of the file to run, relative to both roots.
    pub file: String,
    /// Optional text piped to both runs' stdin.
    pub stdin: Option<String>,
    /// Wall-clock ceiling per run; engine default when absent.
    pub timeout: Option<Duration>,
}

impl RunCompareRequest {
    pub fn for_file(file: impl Into<String>) -> Self {
        RunCompareRequest {
            file: file.into(),
            ..Default::default()
        }
    }
}

/// Run the legacy and migrated versions of `request.file` and compare them.
///
/// `source_root` holds the legacy tree, `migrated_root` the transformed tree;
/// the file must exist in both, and both interpreters must pass their version
/// probe, before any process is spawned.
pub async fn run_and_compare(
    source_root: &Path,
    migrated_root: &Path,
    legacy: &Interpreter,
    target: &Interpreter,
    request: &RunCompareRequest,
) -> LiftResult<RunCompareOutcome> {
    let source_file = source_root.join(&request.file);
    if !source_file.is_file() {
        return Err(LiftError::precondition(format!(
            "source file {} not found",
            request.file
        )));
    }
    if !migrated_root.join(&request.file).is_file() {
        return Err(LiftError::precondition(format!(
            "file {} has not been transformed yet; run transformation before comparing outputs",
            request.file
        )));
    }

    verify_blocking(legacy).await?;
    verify_blocking(target).await?;

    let source_text = std::fs::read_to_string(&source_file)?;
    let prescan_warnings = prescan_source(&source_text);

    // Private per-run copies so concurrent runs never observe each other's
    // filesystem side effects.
    let legacy_copy = WorkCopy::create(source_root)?;
    let target_copy = WorkCopy::create(migrated_root)?;

    let limits = match request.timeout {
        Some(timeout) => ExecLimits::default().with_timeout(timeout),
        None => ExecLimits::default(),
    };
    let stdin = request.stdin.as_deref();

    let legacy_file_path = legacy_copy.path_of(&request.file);
    let target_file_path = target_copy.path_of(&request.file);

    let (legacy_result, target_result) = tokio::join!(
        execute(
            &legacy_file_path,
            legacy.path(),
            stdin,
            &limits,
        ),
        execute(
            &target_file_path,
            target.path(),
            stdin,
            &limits,
        ),
    );

    let mut report = compare_outputs(&legacy_result, &target_result);
    let mut warnings = prescan_warnings;
    warnings.append(&mut report.warnings);
    report.warnings = warnings;

    Ok(RunCompareOutcome {
        file: request.file.clone(),
        legacy: legacy_result,
        target: target_result,
        report,
    })
}

/// Run the synchronous version probe off the async runtime's worker threads.
async fn verify_blocking(interpreter: &Interpreter) -> LiftResult<()> {
    let probe = interpreter.clone();
    tokio::task::spawn_blocking(move || probe.verify())
        .await
        .map_err(|err| LiftError::internal(format!("probe task failed: {}", err)))??;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
