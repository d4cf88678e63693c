//! Project analysis facade.
//!
//! Runs the analyzer passes in dependency order (dead code, dependency graph,
//! risk, migration plan) over a read-only [`SourceTree`] and assembles one
//! report. Synchronous, stateless, and idempotent: unchanged input yields an
//! identical report, down to the snapshot id.

use crate::capabilities::{edits_or_empty, EditProposer};
use crate::python::dead_code::detect_dead_code;
use crate::python::dep_graph::{build_dependency_graph, migration_order};
use crate::python::files::SourceTree;
use crate::python::risk::assess_risks;
use crate::types::{AnalysisReport, MigrationPlanStep, RiskLevel};

/// Analyze a source tree and produce the full pre-migration report.
///
/// The injected `proposer` is only consulted for per-file change-count
/// estimates; its failures are treated as empty proposals, never as a failed
/// analysis.
pub fn analyze(tree: &SourceTree, proposer: &dyn EditProposer) -> AnalysisReport {
    // Phase 1: dead code detection
    let dead_code = detect_dead_code(tree);
    let dead_code_lines: u32 = dead_code.iter().map(|d| d.lines_saved).sum();

    // Phase 2: dependency graph
    let dependency_graph = build_dependency_graph(tree);

    // Phase 3: risk assessment
    let risk_assessment = assess_risks(tree, &dependency_graph);

    // Phase 4: migration plan, in topological order
    let mut migration_plan = Vec::new();
    for (i, fpath) in migration_order(&dependency_graph).iter().enumerate() {
        let node = dependency_graph.get(fpath);
        let risk_level = risk_assessment
            .iter()
            .find(|r| &r.file == fpath)
            .map(|r| r.level)
            .unwrap_or(RiskLevel::Medium);

        let estimated_change_count = tree
            .get(fpath)
            .map(|f| edits_or_empty(proposer, &f.source, fpath).len())
            .unwrap_or(0);

        migration_plan.push(MigrationPlanStep {
            order: i as u32 + 1,
            file: fpath.clone(),
            risk_level,
            estimated_change_count,
            dependencies: node.map(|n| n.imports.clone()).unwrap_or_default(),
            blocking: node.map(|n| n.imported_by.clone()).unwrap_or_default(),
        });
    }

    let total_files = dependency_graph.len();
    let total_lines = tree.total_lines();
    let dead_code_percentage =
        round1(dead_code_lines as f64 / total_lines.max(1) as f64 * 100.0);

    let summary = build_summary(
        total_files,
        total_lines,
        dead_code_lines,
        dead_code_percentage,
        &risk_assessment,
    );

    AnalysisReport {
        snapshot: tree.snapshot_id().to_string(),
        total_files,
        total_lines,
        dead_code,
        dead_code_lines,
        dead_code_percentage,
        dependency_graph,
        risk_assessment,
        migration_plan,
        summary,
    }
}

fn build_summary(
    total_files: usize,
    total_lines: usize,
    dead_lines: u32,
    dead_pct: f64,
    risks: &[crate::types::RiskAssessment],
) -> String {
    let mut critical = 0;
    let mut high = 0;
    let mut medium = 0;
    let mut low = 0;
    for r in risks {
        match r.level {
            RiskLevel::Critical => critical += 1,
            RiskLevel::High => high += 1,
            RiskLevel::Medium => medium += 1,
            RiskLevel::Low => low += 1,
        }
    }

    format!(
        "Project has {} files with {} total lines. {} lines ({}%) detected as dead code, \
         recommended for removal before migration. Risk distribution: {} critical, {} high, \
         {} medium, {} low risk files.",
        total_files, total_lines, dead_lines, dead_pct, critical, high, medium, low
    )
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{NoProposals, SyntaxRuleProposer};

    fn fixture_tree() -> SourceTree {
        SourceTree::from_files(vec![
            (
                "util.py".to_string(),
                "def fetch():\n    return 1\n\ndef _stale():\n    pass\n".to_string(),
            ),
            (
                "app.py".to_string(),
                "import util\n\ndef main():\n    print(util.fetch())\n    for i in xrange(3):\n        raw_input()\n"
                    .to_string(),
            ),
        ])
    }

    #[test]
    fn report_covers_all_phases() {
        let tree = fixture_tree();
        let report = analyze(&tree, &SyntaxRuleProposer);

        assert_eq!(report.total_files, 2);
        assert!(report.dead_code.iter().any(|d| d.name == "_stale"));
        assert!(report.dependency_graph.contains_key("app.py"));
        assert_eq!(report.risk_assessment.len(), 2);
        assert_eq!(report.migration_plan.len(), 2);
        assert!(report.summary.contains("2 files"));
    }

    #[test]
    fn plan_follows_dependency_order() {
        let tree = fixture_tree();
        let report = analyze(&tree, &NoProposals);

        let plan_files: Vec<&str> = report
            .migration_plan
            .iter()
            .map(|s| s.file.as_str())
            .collect();
        assert_eq!(plan_files, vec!["util.py", "app.py"]);
        assert_eq!(report.migration_plan[0].order, 1);
        assert_eq!(report.migration_plan[1].order, 2);
        assert_eq!(
            report.migration_plan[1].dependencies,
            vec!["util.py".to_string()]
        );
        assert_eq!(
            report.migration_plan[0].blocking,
            vec!["app.py".to_string()]
        );
    }

    #[test]
    fn change_counts_come_from_the_proposer() {
        let tree = fixture_tree();
        let report = analyze(&tree, &SyntaxRuleProposer);

        let app_step = report
            .migration_plan
            .iter()
            .find(|s| s.file == "app.py")
            .unwrap();
        // The xrange and raw_input calls each propose one edit.
        assert_eq!(app_step.estimated_change_count, 2);

        let util_step = report
            .migration_plan
            .iter()
            .find(|s| s.file == "util.py")
            .unwrap();
        assert_eq!(util_step.estimated_change_count, 0);
    }

    #[test]
    fn analysis_is_idempotent_for_unchanged_input() {
        let tree = fixture_tree();
        let first = analyze(&tree, &SyntaxRuleProposer);
        let second = analyze(&tree, &SyntaxRuleProposer);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn dead_code_percentage_is_rounded_to_one_decimal() {
        let tree = fixture_tree();
        let report = analyze(&tree, &NoProposals);
        let pct = report.dead_code_percentage;
        assert_eq!(pct, (pct * 10.0).round() / 10.0);
        assert!(pct > 0.0);
    }

    #[test]
    fn empty_tree_produces_empty_report() {
        let tree = SourceTree::from_files(vec![]);
        let report = analyze(&tree, &NoProposals);
        assert_eq!(report.total_files, 0);
        assert_eq!(report.total_lines, 0);
        assert!(report.dead_code.is_empty());
        assert!(report.migration_plan.is_empty());
        assert_eq!(report.dead_code_percentage, 0.0);
    }
}
