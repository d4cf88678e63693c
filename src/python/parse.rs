//! tree-sitter bridge for Python sources.
//!
//! Parsing is strict by convention: a module whose tree contains any syntax
//! error is treated as a parse failure (`None`) and skipped by the analyzer
//! passes, the way a non-tolerant AST parser would reject it.
//!
//! Also hosts the shared notion of a *reference-position identifier*: an
//! identifier that reads a name, as opposed to one that binds it (definition
//! names, parameters, keyword-argument labels, import clauses). Dead-code
//! liveness and dynamic-feature detection both match names at these positions.

use tree_sitter::{Node, Parser, Tree};

/// Parse a Python module, returning `None` when the grammar reports errors.
pub fn parse_module(source: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .ok()?;
    let tree = parser.parse(source, None)?;
    if tree.root_node().has_error() {
        return None;
    }
    Some(tree)
}

/// Source text covered by a node.
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    source.get(node.byte_range()).unwrap_or_default()
}

/// 1-based first line of a node.
pub fn line_start(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based last line of a node.
pub fn line_end(node: Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}

/// Depth-first preorder visit of every node under `root`, `root` included.
pub fn for_each_node<'t>(root: Node<'t>, f: &mut dyn FnMut(Node<'t>)) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        f(node);
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                stack.push(child);
            }
        }
    }
}

/// Whether an identifier node reads a name rather than binding one.
///
/// Binding positions that are excluded: the name of a `def`/`class`, function
/// parameters, keyword-argument labels, `global`/`nonlocal` declarations, the
/// alias after `as` in an `except` clause, and anything inside an import
/// statement (imports are collected separately).
pub fn is_reference_identifier(node: Node<'_>) -> bool {
    if node.kind() != "identifier" {
        return false;
    }
    let Some(parent) = node.parent() else {
        return true;
    };
    match parent.kind() {
        "function_definition" | "class_definition" | "keyword_argument" => {
            parent.child_by_field_name("name") != Some(node)
        }
        "default_parameter" | "typed_default_parameter" => {
            // The name binds; the default value is an ordinary expression.
            parent.child_by_field_name("name") != Some(node)
        }
        "parameters" | "lambda_parameters" | "typed_parameter" => false,
        "global_statement" | "nonlocal_statement" => false,
        "attribute" => parent.child_by_field_name("attribute") != Some(node),
        "except_clause" => node.prev_sibling().map_or(true, |s| s.kind() != "as"),
        // `with open() as f` binds f as an ordinary name; the alias in
        // `except E as e` does not produce a name node.
        "as_pattern_target" => parent
            .parent()
            .and_then(|p| p.parent())
            .map_or(true, |ctx| ctx.kind() != "except_clause"),
        _ => !in_import_statement(node),
    }
}

/// Whether a node sits anywhere inside an import statement.
pub fn in_import_statement(node: Node<'_>) -> bool {
    let mut cur = node.parent();
    while let Some(n) = cur {
        match n.kind() {
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                return true
            }
            "module" | "block" => return false,
            _ => cur = n.parent(),
        }
    }
    false
}

// ============================================================================
// Tests
// ============================================================================
