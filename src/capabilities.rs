//! Injected edit/test proposal capabilities.
//!
//! The transformation engine itself is an external collaborator; this core
//! only consumes two opaque capabilities, each taking (source text, file
//! identifier) and returning zero or more structured records. A failing
//! capability is treated as having returned nothing; it never fails an
//! analysis. The traits make deterministic fakes trivial in tests.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LiftResult;

// ============================================================================
// Records
// ============================================================================

/// A single proposed source edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedEdit {
    pub file: String,
    /// 1-based line the edit applies to.
    pub line: u32,
    /// Original line, trimmed.
    pub original: String,
    /// Proposed replacement line, trimmed.
    pub proposed: String,
    pub description: String,
    /// "syntax" or "semantic".
    pub change_type: String,
}

/// A single proposed snapshot test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedTest {
    pub file: String,
    pub test_name: String,
    pub test_code: String,
    pub covers: Vec<String>,
}

// ============================================================================
// Capability Traits
// ============================================================================

/// "Propose edits" capability.
pub trait EditProposer {
    fn propose_edits(&self, source: &str, file: &str) -> LiftResult<Vec<ProposedEdit>>;
}

/// "Propose tests" capability.
pub trait TestProposer {
    fn propose_tests(&self, source: &str, file: &str) -> LiftResult<Vec<ProposedTest>>;
}

/// Apply the failure-is-empty contract to an edit proposal.
pub fn edits_or_empty(proposer: &dyn EditProposer, source: &str, file: &str) -> Vec<ProposedEdit> {
    match proposer.propose_edits(source, file) {
        Ok(edits) => edits,
        Err(err) => {
            debug!("edit proposer failed for {}, treating as empty: {}", file, err);
            Vec::new()
        }
    }
}

/// A capability that proposes nothing. Useful as a stand-in where no
/// transformer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProposals;

impl EditProposer for NoProposals {
    fn propose_edits(&self, _source: &str, _file: &str) -> LiftResult<Vec<ProposedEdit>> {
        Ok(Vec::new())
    }
}

impl TestProposer for NoProposals {
    fn propose_tests(&self, _source: &str, _file: &str) -> LiftResult<Vec<ProposedTest>> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Deterministic Rule Proposer
// ============================================================================

/// One mechanical rewrite rule: `(pattern, replacement, description, kind)`.
/// Order is load-bearing: the redirect-style print rule must be tried before
/// the general print rule, which would otherwise mis-match it.
struct RewriteRule {
    pattern: &'static str,
    replacement: &'static str,
    description: &'static str,
    change_type: &'static str,
}

const REWRITE_RULES: &[RewriteRule] = &[
    RewriteRule { pattern: r"\bprint\s*>>\s*(\w+)\s*,\s*(.*?)$", replacement: "print(${2}, file=${1})", description: "print >> to print(file=)", change_type: "syntax" },
    RewriteRule { pattern: r"\bprint\s+([^(].*?)$", replacement: "print(${1})", description: "print statement to function", change_type: "syntax" },
    RewriteRule { pattern: r"\bxrange\s*\(", replacement: "range(", description: "xrange to range", change_type: "syntax" },
    RewriteRule { pattern: r"\braw_input\s*\(", replacement: "input(", description: "raw_input to input", change_type: "syntax" },
    RewriteRule { pattern: r"([\w.]+)\.has_key\(([^)]+)\)", replacement: "${2} in ${1}", description: "dict.has_key() to 'in' operator", change_type: "syntax" },
    RewriteRule { pattern: r#"(^|[^"\w])long\b"#, replacement: "${1}int", description: "long type to int", change_type: "syntax" },
    RewriteRule { pattern: r#"(^|[^"\w])unicode\b"#, replacement: "${1}str", description: "unicode to str", change_type: "syntax" },
    RewriteRule { pattern: r#"(^|[^"\w])basestring\b"#, replacement: "${1}str", description: "basestring to str", change_type: "syntax" },
    RewriteRule { pattern: r"\.iteritems\(\)", replacement: ".items()", description: "dict.iteritems() to items()", change_type: "syntax" },
    RewriteRule { pattern: r"\.itervalues\(\)", replacement: ".values()", description: "dict.itervalues() to values()", change_type: "syntax" },
    RewriteRule { pattern: r"\.iterkeys\(\)", replacement: ".keys()", description: "dict.iterkeys() to keys()", change_type: "syntax" },
    RewriteRule { pattern: r"\.viewitems\(\)", replacement: ".items()", description: "dict.viewitems() to items()", change_type: "syntax" },
    RewriteRule { pattern: r"\.viewvalues\(\)", replacement: ".values()", description: "dict.viewvalues() to values()", change_type: "syntax" },
    RewriteRule { pattern: r"\.viewkeys\(\)", replacement: ".keys()", description: "dict.viewkeys() to keys()", change_type: "syntax" },
    RewriteRule { pattern: r"\braise\s+(\w+)\s*,\s*(.*?)$", replacement: "raise ${1}(${2})", description: "old-style raise to new raise", change_type: "syntax" },
    RewriteRule { pattern: r"\bexcept\s+(\w+)\s*,\s*(\w+)\s*:", replacement: "except ${1} as ${2}:", description: "old except syntax", change_type: "syntax" },
    RewriteRule { pattern: r"from\s+itertools\s+import\s+izip\b", replacement: "from builtins import zip", description: "izip to zip", change_type: "syntax" },
    RewriteRule { pattern: r"\bizip\(", replacement: "zip(", description: "izip to zip", change_type: "syntax" },
    RewriteRule { pattern: r"\bimap\(", replacement: "map(", description: "imap to map", change_type: "syntax" },
    RewriteRule { pattern: r"\bifilter\(", replacement: "filter(", description: "ifilter to filter", change_type: "syntax" },
    RewriteRule { pattern: r"\bsys\.maxint\b", replacement: "sys.maxsize", description: "sys.maxint to sys.maxsize", change_type: "syntax" },
    RewriteRule { pattern: r"(^|[^\w.])cmp\(", replacement: "${1}(lambda a, b: (a > b) - (a < b))(", description: "cmp() replacement", change_type: "semantic" },
    RewriteRule { pattern: r"import\s+cPickle", replacement: "import pickle", description: "cPickle to pickle", change_type: "syntax" },
    RewriteRule { pattern: r"from\s+cPickle\s+import", replacement: "from pickle import", description: "cPickle to pickle", change_type: "syntax" },
    RewriteRule { pattern: r"import\s+cStringIO", replacement: "import io", description: "cStringIO to io", change_type: "syntax" },
    RewriteRule { pattern: r"from\s+cStringIO\s+import\s+StringIO", replacement: "from io import StringIO", description: "cStringIO to io", change_type: "syntax" },
];

static COMPILED_RULES: Lazy<Vec<(Regex, &'static RewriteRule)>> = Lazy::new(|| {
    REWRITE_RULES
        .iter()
        .map(|rule| {
            (
                Regex::new(rule.pattern).expect("rewrite rules are valid"),
                rule,
            )
        })
        .collect()
});

/// Deterministic rule-based proposer: mechanical line rewrites only.
///
/// Also serves as the reference fake for tests, since its output depends on
/// nothing but the input text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxRuleProposer;

impl EditProposer for SyntaxRuleProposer {
    fn propose_edits(&self, source: &str, file: &str) -> LiftResult<Vec<ProposedEdit>> {
        let mut edits = Vec::new();

        for (idx, line) in source.lines().enumerate() {
            let line_no = idx as u32 + 1;
            for (regex, rule) in COMPILED_RULES.iter() {
                if !regex.is_match(line) {
                    continue;
                }
                // The general print rule cannot handle statements continued
                // across lines; leave those to a smarter capability.
                if rule.description == "print statement to function"
                    && line.matches('(').count() > line.matches(')').count()
                {
                    continue;
                }
                let rewritten = regex.replace_all(line, rule.replacement);
                if rewritten != line {
                    edits.push(ProposedEdit {
                        file: file.to_string(),
                        line: line_no,
                        original: line.trim().to_string(),
                        proposed: rewritten.trim().to_string(),
                        description: rule.description.to_string(),
                        change_type: rule.change_type.to_string(),
                    });
                }
            }
        }

        Ok(edits)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LiftError;

    fn propose(source: &str) -> Vec<ProposedEdit> {
        SyntaxRuleProposer
            .propose_edits(source, "sample.py")
            .unwrap()
    }

    #[test]
    fn redirect_print_takes_precedence_over_general_print() {
        let edits = propose("print >> log, 'oops'\n");
        let descriptions: Vec<&str> = edits.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions[0], "print >> to print(file=)");
        assert!(edits[0].proposed.starts_with("print("));
        assert!(edits[0].proposed.contains("file=log"));
    }

    #[test]
    fn print_statement_is_rewritten() {
        let edits = propose("print 'hello'\n");
        assert!(edits
            .iter()
            .any(|e| e.description == "print statement to function"));
    }

    #[test]
    fn multiline_print_is_left_alone() {
        let edits = propose("print 'started: %s' % (\n");
        assert!(!edits
            .iter()
            .any(|e| e.description == "print statement to function"));
    }

    #[test]
    fn xrange_and_has_key_are_rewritten() {
        let edits = propose("for i in xrange(10):\n    if d.has_key(i):\n        pass\n");
        assert!(edits.iter().any(|e| e.proposed.contains("range(")));
        assert!(edits.iter().any(|e| e.proposed.contains("i in d")));
    }

    #[test]
    fn long_inside_string_literal_is_not_rewritten() {
        let edits = propose("label = \"longitude\"\n");
        assert!(edits.is_empty());
    }

    #[test]
    fn clean_source_proposes_nothing() {
        let edits = propose("def f():\n    return 1\n");
        assert!(edits.is_empty());
    }

    #[test]
    fn line_numbers_are_one_based() {
        let edits = propose("x = 1\ny = xrange(3)\n");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].line, 2);
    }

    #[test]
    fn failing_capability_is_treated_as_empty() {
        struct Failing;
        impl EditProposer for Failing {
            fn propose_edits(&self, _: &str, _: &str) -> LiftResult<Vec<ProposedEdit>> {
                Err(LiftError::internal("backend offline"))
            }
        }
        let edits = edits_or_empty(&Failing, "xrange(1)\n", "a.py");
        assert!(edits.is_empty());
    }

    #[test]
    fn no_proposals_capability_returns_empty() {
        assert!(NoProposals.propose_edits("xrange(1)\n", "a.py").unwrap().is_empty());
        assert!(NoProposals.propose_tests("def f(): pass\n", "a.py").unwrap().is_empty());
    }
}
