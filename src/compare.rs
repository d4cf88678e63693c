//! Output comparison and migration-gap detection for run-and-compare.
//!
//! `compare_outputs` diffs two execution results and classifies differences:
//! `outputs_match` is strict byte equality of stdout, while the warnings are
//! heuristic advisories separating real regressions from benign dialect
//! rendering artifacts. `prescan_source` inspects source text before a run
//! for patterns that make byte-exact comparison unreliable.

use once_cell::sync::Lazy;
use regex::Regex;
use similar::TextDiff;

use crate::types::{ComparisonReport, ExecutionResult};

// ============================================================================
// Catalogues
// ============================================================================

/// Builtins that exist only in the legacy dialect; a NameError naming one in
/// the target run's stderr means the symbol was never converted.
const PY2_ONLY_BUILTINS: &[&str] = &[
    "reduce",
    "raw_input",
    "xrange",
    "basestring",
    "cmp",
    "long",
    "execfile",
    "reload",
];

/// Modules renamed between dialects, with their replacements.
const PY2_RENAMED_MODULES: &[(&str, &str)] = &[
    ("cPickle", "pickle"),
    ("cStringIO", "io.StringIO"),
    ("ConfigParser", "configparser"),
    ("Queue", "queue"),
    ("HTMLParser", "html.parser"),
];

static BUILTIN_GAP_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    PY2_ONLY_BUILTINS
        .iter()
        .map(|name| {
            (
                Regex::new(&format!(r"NameError.*\b{}\b", name)).expect("builtin gap pattern"),
                *name,
            )
        })
        .collect()
});

static MODULE_GAP_PATTERNS: Lazy<Vec<(Regex, &'static str, &'static str)>> = Lazy::new(|| {
    PY2_RENAMED_MODULES
        .iter()
        .map(|(old, new)| {
            (
                Regex::new(&format!(
                    r"(?:ModuleNotFoundError|ImportError).*\b{}\b",
                    old
                ))
                .expect("module gap pattern"),
                *old,
                *new,
            )
        })
        .collect()
});

static DICT_REPR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[{].*:.*[}]").expect("regex"));
static UNICODE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"u['"]"#).expect("regex"));
static TYPE_REPR: Lazy<Regex> = Lazy::new(|| Regex::new(r"<type\s+'").expect("regex"));
static CLASS_REPR: Lazy<Regex> = Lazy::new(|| Regex::new(r"<class\s+'").expect("regex"));
static ANY_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\b").expect("regex"));
static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\.\d+\b").expect("regex"));

// ============================================================================
// Comparison
// ============================================================================

/// Compare two execution results.
///
/// `legacy` is the original-dialect run, `target` the migrated run; the
/// migration-gap scan reads the target run's stderr.
pub fn compare_outputs(legacy: &ExecutionResult, target: &ExecutionResult) -> ComparisonReport {
    let diff = TextDiff::from_lines(legacy.stdout.as_str(), target.stdout.as_str());
    let diff_text = diff
        .unified_diff()
        .header("python2 stdout", "python3 stdout")
        .to_string();
    let diff_lines: Vec<String> = if diff_text.is_empty() {
        Vec::new()
    } else {
        diff_text.lines().map(str::to_string).collect()
    };

    let similarity = TextDiff::from_chars(legacy.stdout.as_str(), target.stdout.as_str()).ratio() as f64;
    let similarity_pct = round2(similarity * 100.0);

    let outputs_match = legacy.stdout == target.stdout;

    let mut warnings = benign_difference_warnings(&legacy.stdout, &target.stdout, &diff_text);
    warnings.extend(migration_gap_warnings(&target.stderr));

    ComparisonReport {
        outputs_match,
        diff_lines,
        similarity_pct,
        warnings,
    }
}

/// Static scan of source text for patterns that may cause trouble at runtime:
/// interactive input calls that hang without piped stdin, and non-determinism
/// sources that defeat byte-exact comparison even for a correct migration.
pub fn prescan_source(source: &str) -> Vec<String> {
    static RAW_INPUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\braw_input\s*\(").expect("regex"));
    static INPUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\binput\s*\(").expect("regex"));
    static RANDOM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bimport\s+random\b").expect("regex"));
    static NOW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdatetime\.now\s*\(").expect("regex"));
    static TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btime\.time\s*\(").expect("regex"));

    let mut warnings = Vec::new();
    if RAW_INPUT.is_match(source) {
        warnings.push("File uses raw_input() -- execution may hang without stdin input.".to_string());
    }
    if INPUT.is_match(source) {
        warnings.push("File uses input() -- execution may hang without stdin input.".to_string());
    }
    if RANDOM.is_match(source) {
        warnings.push("File imports random -- output may be non-deterministic.".to_string());
    }
    if NOW.is_match(source) {
        warnings.push("File calls datetime.now() -- output may be non-deterministic.".to_string());
    }
    if TIME.is_match(source) {
        warnings.push("File calls time.time() -- output may be non-deterministic.".to_string());
    }
    warnings
}

// ============================================================================
// Heuristics
// ============================================================================

/// Warnings for common benign rendering differences between the dialects.
/// Advisory only; these never change `outputs_match`.
fn benign_difference_warnings(
    legacy_stdout: &str,
    target_stdout: &str,
    diff_text: &str,
) -> Vec<String> {
    let mut warnings = Vec::new();

    // Mapping ordering: the legacy dialect renders dicts unordered.
    if DICT_REPR.is_match(diff_text)
        && DICT_REPR.is_match(legacy_stdout)
        && DICT_REPR.is_match(target_stdout)
    {
        warnings.push(
            "Outputs contain dict repr -- ordering may differ between Python 2 (unordered) \
             and Python 3 (insertion-ordered)."
                .to_string(),
        );
    }

    // Text/binary string-prefix markers are cosmetic.
    if UNICODE_PREFIX.is_match(diff_text) || UNICODE_PREFIX.is_match(legacy_stdout) {
        warnings.push(
            "Unicode prefix difference detected (u\"...\" vs \"...\") -- likely cosmetic, \
             not a behavioral change."
                .to_string(),
        );
    }

    // <type '...'> vs <class '...'> rendering.
    if TYPE_REPR.is_match(diff_text) || CLASS_REPR.is_match(diff_text) {
        warnings.push(
            "Type representation difference detected (<type '...'> vs <class '...'>) -- \
             cosmetic difference between Py2 and Py3."
                .to_string(),
        );
    }

    // Integer output on one side, decimal on the other: likely the
    // floor-vs-true division change.
    if ANY_INT.is_match(diff_text)
        && ANY_INT.is_match(legacy_stdout)
        && DECIMAL.is_match(target_stdout)
    {
        warnings.push(
            "Possible integer division difference -- Python 2 uses floor division for / \
             on ints, Python 3 uses true division."
                .to_string(),
        );
    }

    warnings
}

/// Scan the migrated run's stderr against the fixed catalogue of removed
/// symbols and renamed modules.
fn migration_gap_warnings(target_stderr: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    for (pattern, builtin) in BUILTIN_GAP_PATTERNS.iter() {
        if pattern.is_match(target_stderr) {
            warnings.push(format!(
                "Migration gap: NameError for '{}' -- this Python 2 builtin was not \
                 converted for Python 3.",
                builtin
            ));
        }
    }

    for (pattern, old, new) in MODULE_GAP_PATTERNS.iter() {
        if pattern.is_match(target_stderr) {
            warnings.push(format!(
                "Migration gap: '{}' import failed -- convert to '{}' for Python 3.",
                old, new
            ));
        }
    }

    warnings
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(stdout: &str, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            elapsed_ms: 1.0,
            timed_out: false,
            truncated: false,
        }
    }

    #[test]
    fn identical_outputs_match_exactly() {
        let a = result_with("line one\nline two\n", "");
        let report = compare_outputs(&a, &a);

        assert!(report.outputs_match);
        assert!(report.diff_lines.is_empty());
        assert_eq!(report.similarity_pct, 100.0);
    }

    #[test]
    fn disjoint_outputs_have_zero_similarity() {
        let a = result_with("abc", "");
        let b = result_with("", "");
        let report = compare_outputs(&a, &b);

        assert!(!report.outputs_match);
        assert_eq!(report.similarity_pct, 0.0);
        assert!(!report.diff_lines.is_empty());
    }

    #[test]
    fn diff_is_unified_format() {
        let a = result_with("alpha\nbeta\n", "");
        let b = result_with("alpha\ngamma\n", "");
        let report = compare_outputs(&a, &b);

        assert!(report.diff_lines.iter().any(|l| l.starts_with("---")));
        assert!(report.diff_lines.iter().any(|l| l.starts_with("+++")));
        assert!(report.diff_lines.iter().any(|l| l == "-beta"));
        assert!(report.diff_lines.iter().any(|l| l == "+gamma"));
    }

    #[test]
    fn outputs_match_agrees_with_empty_diff() {
        let cases = [("", ""), ("x\n", "x\n"), ("x\n", "y\n"), ("a", "")];
        for (left, right) in cases {
            let report = compare_outputs(&result_with(left, ""), &result_with(right, ""));
            assert_eq!(report.outputs_match, report.diff_lines.is_empty());
            assert_eq!(report.outputs_match, left == right);
        }
    }

    #[test]
    fn unconverted_builtin_in_stderr_is_named() {
        let legacy = result_with("ok\n", "");
        let target = result_with(
            "",
            "Traceback (most recent call last):\n  File \"x.py\", line 3\nNameError: name 'reduce' is not defined\n",
        );
        let report = compare_outputs(&legacy, &target);

        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("'reduce'") && w.contains("not") && w.contains("converted")));
    }

    #[test]
    fn renamed_module_suggests_replacement() {
        let legacy = result_with("ok\n", "");
        let target = result_with("", "ModuleNotFoundError: No module named 'cPickle'\n");
        let report = compare_outputs(&legacy, &target);

        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("'cPickle'") && w.contains("'pickle'")));
    }

    #[test]
    fn dict_rendering_difference_is_advisory_only() {
        let legacy = result_with("{'b': 2, 'a': 1}\n", "");
        let target = result_with("{'a': 1, 'b': 2}\n", "");
        let report = compare_outputs(&legacy, &target);

        assert!(!report.outputs_match);
        assert!(report.warnings.iter().any(|w| w.contains("dict repr")));
    }

    #[test]
    fn unicode_prefix_is_flagged_cosmetic() {
        let legacy = result_with("u'hello'\n", "");
        let target = result_with("'hello'\n", "");
        let report = compare_outputs(&legacy, &target);

        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("Unicode prefix")));
    }

    #[test]
    fn type_repr_difference_is_flagged_cosmetic() {
        let legacy = result_with("<type 'int'>\n", "");
        let target = result_with("<class 'int'>\n", "");
        let report = compare_outputs(&legacy, &target);

        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("Type representation")));
    }

    #[test]
    fn integer_vs_decimal_suggests_division_change() {
        let legacy = result_with("2\n", "");
        let target = result_with("2.5\n", "");
        let report = compare_outputs(&legacy, &target);

        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("integer division")));
    }

    #[test]
    fn matching_outputs_with_gap_free_stderr_warn_nothing() {
        let a = result_with("fine\n", "some ordinary logging\n");
        let report = compare_outputs(&a, &a);
        assert!(report.warnings.is_empty());
    }

    mod prescan {
        use super::*;

        #[test]
        fn interactive_input_is_flagged() {
            let warnings = prescan_source("name = raw_input('who? ')\n");
            assert!(warnings.iter().any(|w| w.contains("raw_input()")));
        }

        #[test]
        fn nondeterminism_sources_are_flagged() {
            let warnings = prescan_source(
                "import random\nfrom datetime import datetime\nprint(datetime.now())\n",
            );
            assert!(warnings.iter().any(|w| w.contains("random")));
            assert!(warnings.iter().any(|w| w.contains("datetime.now()")));
        }

        #[test]
        fn clean_source_produces_no_warnings() {
            assert!(prescan_source("def f():\n    return 1\n").is_empty());
        }

        #[test]
        fn prescan_is_pure_text_inspection() {
            // Even unparsable text is scanned; no parsing is involved.
            let warnings = prescan_source("def broken(:\n    time.time()\n");
            assert!(warnings.iter().any(|w| w.contains("time.time()")));
        }
    }
}
