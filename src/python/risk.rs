//! Risk assessment engine for migration files.
//!
//! Scores each file by legacy-syntax density, semantic-risk patterns,
//! dependency fan-out, dynamic-feature usage, and test-coverage signals, then
//! recommends a confidence tier for the transformation approach. A pure
//! function of (source text, dependency graph): identical input yields
//! bit-identical scores and factor lists.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::python::files::SourceTree;
use crate::python::parse::{for_each_node, is_reference_identifier, node_text, parse_module};
use crate::types::{ConfidenceTier, DependencyNode, RiskAssessment, RiskLevel};

// ============================================================================
// Pattern Catalogues
// ============================================================================

/// One entry of an ordered pattern catalogue. Order is significant where
/// patterns overlap: earlier entries take precedence.
#[derive(Debug, Clone, Copy)]
pub struct PatternRecord {
    pub pattern: &'static str,
    pub description: &'static str,
}

/// Python 2 constructs that raise migration risk outright.
pub const LEGACY_SYNTAX_PATTERNS: &[PatternRecord] = &[
    PatternRecord { pattern: r"\bbasestring\b", description: "basestring usage (str/unicode split)" },
    PatternRecord { pattern: r"\bunicode\(", description: "explicit unicode() calls" },
    PatternRecord { pattern: r"\.encode\(.*\)\.decode\(", description: "encode/decode chains (bytes boundary)" },
    PatternRecord { pattern: r"\bexcept\s+\w+\s*,\s*\w+", description: "old-style except syntax" },
    PatternRecord { pattern: r#"\bexec\s+["']"#, description: "exec as statement" },
    PatternRecord { pattern: r"\braw_input\b", description: "raw_input (renamed to input)" },
    PatternRecord { pattern: r"\bxrange\b", description: "xrange (removed)" },
    PatternRecord { pattern: r"\.has_key\(", description: "dict.has_key() (removed)" },
    PatternRecord { pattern: r"\.iteritems\(", description: "dict.iteritems() (removed)" },
    PatternRecord { pattern: r"\.itervalues\(", description: "dict.itervalues() (removed)" },
    PatternRecord { pattern: r"\.iterkeys\(", description: "dict.iterkeys() (removed)" },
    PatternRecord { pattern: r"\breload\(", description: "reload() (moved to importlib)" },
    PatternRecord { pattern: r"\bapply\(", description: "apply() (removed)" },
    PatternRecord { pattern: r"\breduce\(", description: "reduce() (moved to functools)" },
    PatternRecord { pattern: r"__metaclass__\s*=", description: "__metaclass__ attribute (use metaclass= kwarg)" },
];

/// Constructs whose behavior changes silently between dialects.
pub const SEMANTIC_RISK_PATTERNS: &[PatternRecord] = &[
    PatternRecord { pattern: r"isinstance\(.*,\s*str\)", description: "isinstance str check (may miss bytes in py3)" },
    PatternRecord { pattern: r"type\(.*\)\s*(==|is)\s*str", description: "type comparison with str" },
    PatternRecord { pattern: r"__div__", description: "__div__ (truediv/floordiv split in py3)" },
    PatternRecord { pattern: r"sys\.maxint", description: "sys.maxint (removed in py3, use sys.maxsize)" },
    PatternRecord { pattern: r"cPickle", description: "cPickle (merged into pickle in py3)" },
    PatternRecord { pattern: r"cStringIO", description: "cStringIO (merged into io in py3)" },
    PatternRecord { pattern: r"thread\b", description: "thread module (renamed to _thread)" },
    PatternRecord { pattern: r"commands\.", description: "commands module (removed, use subprocess)" },
];

/// Signals that a migration has already started (lowers the score).
pub const MIGRATION_STARTED_PATTERNS: &[PatternRecord] = &[
    PatternRecord { pattern: r"from\s+__future__\s+import\s+", description: "future imports present (partial migration started)" },
];

static LEGACY_SYNTAX: Lazy<Vec<(Regex, &'static str)>> =
    Lazy::new(|| compile_catalogue(LEGACY_SYNTAX_PATTERNS));
static SEMANTIC_RISK: Lazy<Vec<(Regex, &'static str)>> =
    Lazy::new(|| compile_catalogue(SEMANTIC_RISK_PATTERNS));
static MIGRATION_STARTED: Lazy<Vec<(Regex, &'static str)>> =
    Lazy::new(|| compile_catalogue(MIGRATION_STARTED_PATTERNS));

fn compile_catalogue(records: &[PatternRecord]) -> Vec<(Regex, &'static str)> {
    records
        .iter()
        .map(|r| {
            (
                Regex::new(r.pattern).expect("catalogue patterns are valid"),
                r.description,
            )
        })
        .collect()
}

// ============================================================================
// Scoring Configuration
// ============================================================================

/// Scoring weights and thresholds.
///
/// The values are empirical constants carried over from production use; they
/// are exposed as configuration so they can be tuned without touching the
/// scoring logic.
#[derive(Debug, Clone)]
pub struct RiskWeights {
    pub legacy_hit: f64,
    pub legacy_cap: f64,
    pub semantic_hit: f64,
    pub semantic_cap: f64,
    pub migration_started_credit: f64,
    pub large_file_lines: usize,
    pub large_file: f64,
    pub medium_file_lines: usize,
    pub medium_file: f64,
    pub high_fan_out_edges: usize,
    pub high_fan_out: f64,
    pub moderate_fan_out_edges: usize,
    pub moderate_fan_out: f64,
    pub eval_exec: f64,
    pub reflection: f64,
    pub dynamic_import: f64,
    pub dynamic_cap: f64,
    pub missing_tests: f64,
    pub parse_failure: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        RiskWeights {
            legacy_hit: 0.08,
            legacy_cap: 0.3,
            semantic_hit: 0.12,
            semantic_cap: 0.35,
            migration_started_credit: 0.05,
            large_file_lines: 1000,
            large_file: 0.1,
            medium_file_lines: 500,
            medium_file: 0.05,
            high_fan_out_edges: 5,
            high_fan_out: 0.15,
            moderate_fan_out_edges: 2,
            moderate_fan_out: 0.05,
            eval_exec: 0.15,
            reflection: 0.05,
            dynamic_import: 0.1,
            dynamic_cap: 0.3,
            missing_tests: 0.1,
            parse_failure: 0.2,
        }
    }
}

// ============================================================================
// Assessment
// ============================================================================

/// Assess migration risk for each file in the graph, with default weights.
/// Results are sorted ascending by score.
pub fn assess_risks(
    tree: &SourceTree,
    graph: &BTreeMap<String, DependencyNode>,
) -> Vec<RiskAssessment> {
    assess_risks_weighted(tree, graph, &RiskWeights::default())
}

/// Assess migration risk with explicit weights.
pub fn assess_risks_weighted(
    tree: &SourceTree,
    graph: &BTreeMap<String, DependencyNode>,
    weights: &RiskWeights,
) -> Vec<RiskAssessment> {
    let mut results: Vec<RiskAssessment> = Vec::new();

    for (rel_path, node) in graph {
        let Some(file) = tree.get(rel_path) else {
            continue;
        };
        results.push(assess_file(rel_path, &file.source, node, graph, weights));
    }

    results.sort_by(|a, b| a.score.total_cmp(&b.score));
    results
}

fn assess_file(
    rel_path: &str,
    source: &str,
    node: &DependencyNode,
    graph: &BTreeMap<String, DependencyNode>,
    weights: &RiskWeights,
) -> RiskAssessment {
    let mut factors: Vec<String> = Vec::new();
    let mut score: f64 = 0.0;

    // Factor 1: dialect patterns
    let legacy_hits = scan_catalogue(source, &LEGACY_SYNTAX);
    let semantic_hits = scan_catalogue(source, &SEMANTIC_RISK);
    let positive_hits = scan_catalogue(source, &MIGRATION_STARTED);
    if !legacy_hits.is_empty() {
        factors.extend(legacy_hits.iter().map(|d| format!("Py2 pattern: {}", d)));
        score += (legacy_hits.len() as f64 * weights.legacy_hit).min(weights.legacy_cap);
    }
    if !semantic_hits.is_empty() {
        factors.extend(semantic_hits.iter().map(|d| format!("Semantic risk: {}", d)));
        score += (semantic_hits.len() as f64 * weights.semantic_hit).min(weights.semantic_cap);
    }
    if !positive_hits.is_empty() {
        factors.extend(positive_hits.iter().map(|d| format!("Positive signal: {}", d)));
        score = (score - weights.migration_started_credit).max(0.0);
    }

    // Factor 2: file size
    let lines = source.matches('\n').count() + 1;
    if lines > weights.large_file_lines {
        factors.push(format!("Large file ({} lines)", lines));
        score += weights.large_file;
    } else if lines > weights.medium_file_lines {
        score += weights.medium_file;
    }

    // Factor 3: dependency fan-out
    let fan_out = node.imported_by.len();
    if fan_out > weights.high_fan_out_edges {
        factors.push(format!("High dependency fan-out ({} dependents)", fan_out));
        score += weights.high_fan_out;
    } else if fan_out > weights.moderate_fan_out_edges {
        factors.push(format!(
            "Moderate dependency fan-out ({} dependents)",
            fan_out
        ));
        score += weights.moderate_fan_out;
    }

    // Factor 4: dynamic features
    match parse_module(source) {
        Some(parsed) => {
            let (dynamic_score, dynamic_factors) =
                check_dynamic_features(parsed.root_node(), source, weights);
            score += dynamic_score;
            factors.extend(dynamic_factors);
        }
        None => {
            factors.push("File has syntax errors (cannot parse AST)".to_string());
            score += weights.parse_failure;
        }
    }

    // Factor 5: test coverage signal
    let has_tests = has_test_file(rel_path, graph);
    let coverage_estimate = if has_tests { "has_tests" } else { "no_tests_found" };
    if !has_tests {
        factors.push("No corresponding test file found".to_string());
        score += weights.missing_tests;
    }

    // Clamp and classify
    score = score.min(1.0);
    let level = score_to_level(score);
    let tier = score_to_tier(score);
    let complexity = if !semantic_hits.is_empty() || score > 0.6 {
        "high"
    } else if score > 0.3 {
        "medium"
    } else {
        "low"
    };

    RiskAssessment {
        file: rel_path.to_string(),
        level,
        score: round3(score),
        factors,
        coverage_estimate: coverage_estimate.to_string(),
        complexity_estimate: complexity.to_string(),
        recommended_tier: tier,
    }
}

/// Descriptions of catalogue entries that match the source, in catalogue
/// order; each pattern counts at most once.
fn scan_catalogue(source: &str, catalogue: &[(Regex, &'static str)]) -> Vec<&'static str> {
    catalogue
        .iter()
        .filter(|(re, _)| re.is_match(source))
        .map(|(_, desc)| *desc)
        .collect()
}

/// Score reflection-style lookups, eval/exec, and dynamic imports found as
/// name reads in the parsed tree. Total contribution is capped.
fn check_dynamic_features(
    root: tree_sitter::Node<'_>,
    source: &str,
    weights: &RiskWeights,
) -> (f64, Vec<String>) {
    let mut score = 0.0;
    let mut factors: Vec<String> = Vec::new();

    for_each_node(root, &mut |node| {
        if !is_reference_identifier(node) {
            return;
        }
        match node_text(node, source) {
            "eval" => {
                factors.push("Uses eval()".to_string());
                score += weights.eval_exec;
            }
            "exec" => {
                factors.push("Uses exec()".to_string());
                score += weights.eval_exec;
            }
            "getattr" | "setattr" | "delattr" => {
                // Collapse adjacent reflection hits into one factor.
                let repeated = factors
                    .last()
                    .is_some_and(|f| f.contains("dynamic attribute"));
                if !repeated {
                    factors.push("Uses dynamic attribute access".to_string());
                    score += weights.reflection;
                }
            }
            "__import__" => {
                factors.push("Uses __import__() (dynamic imports)".to_string());
                score += weights.dynamic_import;
            }
            _ => {}
        }
    });

    (score.min(weights.dynamic_cap), factors)
}

fn has_test_file(file_path: &str, graph: &BTreeMap<String, DependencyNode>) -> bool {
    let base = Path::new(file_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let test_names = [
        format!("test_{}.py", base),
        format!("{}_test.py", base),
        format!("tests/test_{}.py", base),
    ];
    graph
        .keys()
        .any(|key| test_names.iter().any(|tn| key.contains(tn.as_str())))
}

fn score_to_level(score: f64) -> RiskLevel {
    if score >= 0.7 {
        RiskLevel::Critical
    } else if score >= 0.45 {
        RiskLevel::High
    } else if score >= 0.2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn score_to_tier(score: f64) -> ConfidenceTier {
    if score >= 0.7 {
        ConfidenceTier::Manual
    } else if score >= 0.45 {
        ConfidenceTier::Review
    } else if score >= 0.2 {
        ConfidenceTier::SpotCheck
    } else {
        ConfidenceTier::Auto
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// ============================================================================
// Tests
// ============================================================================
