//! Core data model for analysis and run-compare reporting.
//!
//! Analytical records (findings, graph nodes, assessments, plan steps) are
//! recomputed fresh on every analysis call and never cached. Execution and
//! comparison records are transient, owned by the caller of run-and-compare.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Classification Enums
// ============================================================================

/// Migration risk bucket for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// How much human review a transformation needs before being trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// Safe to apply automatically.
    Auto,
    /// Apply, then spot-check a sample.
    SpotCheck,
    /// Every change needs review.
    Review,
    /// Migrate by hand.
    Manual,
}

/// Kind of a collected definition (or an import, for dead-import findings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    Function,
    Method,
    Class,
    Import,
}

impl DefinitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Function => "function",
            DefinitionKind::Method => "method",
            DefinitionKind::Class => "class",
            DefinitionKind::Import => "import",
        }
    }
}

// ============================================================================
// Analysis Records
// ============================================================================

/// A definition or import flagged as unreferenced anywhere in the project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadCodeFinding {
    /// Project-relative path of the declaring file.
    pub file: String,
    /// Definition name; methods are qualified as `Class.method`.
    pub name: String,
    pub kind: DefinitionKind,
    /// 1-based line range of the definition.
    pub line_start: u32,
    pub line_end: u32,
    /// Human-readable explanation of why this was flagged.
    pub reason: String,
    /// Lines removable if the finding is acted on.
    pub lines_saved: u32,
}

/// One file's position in the project import graph.
///
/// Invariant: edges are symmetric: `b ∈ imports(a)` iff `a ∈ imported_by(b)`.
/// Self-imports are never recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyNode {
    /// Project-relative path of this file.
    pub file: String,
    /// In-project files this file imports.
    pub imports: Vec<String>,
    /// In-project files that import this file (reverse edges).
    pub imported_by: Vec<String>,
    /// Top-level package names that did not resolve inside the project.
    pub external_deps: Vec<String>,
    /// Topological migration rank; 0 migrates first. Always assigned,
    /// including for files on dependency cycles.
    pub migration_order: Option<u32>,
    /// Imports of this file that participate in a cycle with it.
    pub circular_deps: Vec<String>,
}

/// Heuristic migration-risk score and tier recommendation for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub file: String,
    pub level: RiskLevel,
    /// Additive score clamped to [0, 1], rounded to 3 decimals.
    pub score: f64,
    /// Ordered evidence strings explaining the score.
    pub factors: Vec<String>,
    /// "has_tests" or "no_tests_found".
    pub coverage_estimate: String,
    /// "low", "medium" or "high".
    pub complexity_estimate: String,
    pub recommended_tier: ConfidenceTier,
}

/// One step of the recommended migration plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationPlanStep {
    /// 1-based position in the recommended order.
    pub order: u32,
    pub file: String,
    pub risk_level: RiskLevel,
    /// Number of edits the injected proposer expects for this file.
    pub estimated_change_count: usize,
    /// In-project files this file imports (migrate these first).
    pub dependencies: Vec<String>,
    /// In-project files blocked behind this one.
    pub blocking: Vec<String>,
}

/// Result of one `analyze` call over a source tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Content-addressed id of the analyzed tree; identical input yields an
    /// identical id (and an identical report).
    pub snapshot: String,
    pub total_files: usize,
    pub total_lines: usize,
    pub dead_code: Vec<DeadCodeFinding>,
    pub dead_code_lines: u32,
    /// Percentage of total lines flagged dead, rounded to 1 decimal.
    pub dead_code_percentage: f64,
    pub dependency_graph: BTreeMap<String, DependencyNode>,
    pub risk_assessment: Vec<RiskAssessment>,
    pub migration_plan: Vec<MigrationPlanStep>,
    pub summary: String,
}

// ============================================================================
// Execution & Comparison Records
// ============================================================================

/// Outcome of one sandboxed execution.
///
/// Every expected failure category (missing interpreter, non-zero exit,
/// timeout, resource kill) is represented here rather than raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Process exit code; absent when the process was killed or never spawned.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock duration in milliseconds, rounded to 2 decimals.
    pub elapsed_ms: f64,
    /// True whenever the wall-clock timeout fired, regardless of whether the
    /// CPU ceiling also triggered.
    pub timed_out: bool,
    /// True when stdout or stderr was cut at the output byte ceiling.
    pub truncated: bool,
}

impl ExecutionResult {
    /// A result describing a process that could not be started.
    pub fn spawn_failure(stderr: impl Into<String>, elapsed_ms: f64) -> Self {
        ExecutionResult {
            exit_code: None,
            stdout: String::new(),
            stderr: stderr.into(),
            elapsed_ms,
            timed_out: false,
            truncated: false,
        }
    }
}

/// Result of comparing two execution results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Exact byte-equality of the two stdout streams. Agrees with
    /// `diff_lines.is_empty()`.
    pub outputs_match: bool,
    /// Line-oriented unified diff of stdout, without trailing newlines.
    pub diff_lines: Vec<String>,
    /// Character-alignment ratio in [0, 100], rounded to 2 decimals.
    /// 100 iff identical, 0 iff no alignment.
    pub similarity_pct: f64,
    /// Advisory only; never affects `outputs_match`.
    pub warnings: Vec<String>,
}

/// Everything a run-and-compare call produced: both raw execution results plus
/// the comparison over them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCompareOutcome {
    /// Project-relative path of the compared file.
    pub file: String,
    /// Result of the legacy-interpreter run.
    pub legacy: ExecutionResult,
    /// Result of the target-interpreter run.
    pub target: ExecutionResult,
    pub report: ComparisonReport,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::Critical).unwrap(),
            "\"critical\""
        );
    }

    #[test]
    fn confidence_tier_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ConfidenceTier::SpotCheck).unwrap(),
            "\"spot_check\""
        );
    }

    #[test]
    fn risk_level_orders_by_severity() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn spawn_failure_has_no_exit_code() {
        let result = ExecutionResult::spawn_failure("Interpreter not found: python9", 0.12);
        assert!(result.exit_code.is_none());
        assert!(!result.timed_out);
        assert!(result.stderr.contains("python9"));
    }

    #[test]
    fn execution_result_round_trips_through_json() {
        let result = ExecutionResult {
            exit_code: Some(0),
            stdout: "ok\n".to_string(),
            stderr: String::new(),
            elapsed_ms: 12.34,
            timed_out: false,
            truncated: false,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: ExecutionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.exit_code, Some(0));
        assert_eq!(back.stdout, "ok\n");
    }
}
