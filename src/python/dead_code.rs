//! Dead code detection over parsed Python sources.
//!
//! Two project-wide passes. Pass 1 collects, per file, the top-level
//! definitions (methods qualified as `Class.method`), every name read in both
//! bare and file-qualified form, and alias-aware import records. Pass 2 flags
//! definitions and imports whose names are never used.
//!
//! Liveness is matched by *name*, not by resolved type, so the detector is
//! deliberately biased toward false negatives: anything referenced by name
//! anywhere in the project stays alive, even outside its defining scope.
//! Attribute reads contribute an additional lexical `Object.attr` candidate
//! reference when the object is a simple local name. This is the documented
//! approximation that keeps `Class.method` definitions alive without a type
//! resolver.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::python::files::SourceTree;
use crate::python::parse::{
    for_each_node, is_reference_identifier, line_end, line_start, node_text, parse_module,
};
use crate::types::{DeadCodeFinding, DefinitionKind};

/// Definition names that plausibly have no in-project callers.
const ENTRYPOINT_NAMES: &[&str] = &[
    "main",
    "setup",
    "teardown",
    "run",
    "cli",
    "app",
    "create_app",
];

// ============================================================================
// Per-File Collection
// ============================================================================

#[derive(Debug)]
struct Definition {
    name: String,
    kind: DefinitionKind,
    line_start: u32,
    line_end: u32,
}

#[derive(Debug)]
struct ImportRecord {
    name: String,
    line: u32,
}

struct FileFacts {
    definitions: Vec<Definition>,
    imports: Vec<ImportRecord>,
}

/// Collect definitions, references, and imports from one parsed file.
/// References go straight into the shared project-wide set, in both bare and
/// `file:name` qualified form.
fn analyze_file(root: Node<'_>, source: &str, rel_path: &str, refs: &mut HashSet<String>) -> FileFacts {
    let mut definitions = Vec::new();
    let mut imports = Vec::new();

    // Top-level definitions, with methods qualified by their class.
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let node = unwrap_decorated(child);
        match node.kind() {
            "function_definition" => {
                if let Some(def) = definition_of(node, source, None, DefinitionKind::Function) {
                    definitions.push(def);
                }
            }
            "class_definition" => {
                let Some(class_name) = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                else {
                    continue;
                };
                definitions.push(Definition {
                    name: class_name.clone(),
                    kind: DefinitionKind::Class,
                    line_start: line_start(node),
                    line_end: line_end(node),
                });
                if let Some(body) = node.child_by_field_name("body") {
                    let mut body_cursor = body.walk();
                    for item in body.named_children(&mut body_cursor) {
                        let item = unwrap_decorated(item);
                        if item.kind() == "function_definition" {
                            if let Some(def) = definition_of(
                                item,
                                source,
                                Some(&class_name),
                                DefinitionKind::Method,
                            ) {
                                definitions.push(def);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    // References and imports, via a full tree walk.
    for_each_node(root, &mut |node| match node.kind() {
        "identifier" => {
            if is_reference_identifier(node) {
                add_ref(refs, rel_path, node_text(node, source));
            }
        }
        "attribute" => {
            if let Some(attr) = node.child_by_field_name("attribute") {
                let attr_name = node_text(attr, source);
                add_ref(refs, rel_path, attr_name);
                // Lexical candidate: `Name.attr` when the object is a bare name.
                if let Some(object) = node.child_by_field_name("object") {
                    if object.kind() == "identifier" {
                        let qualified = format!("{}.{}", node_text(object, source), attr_name);
                        add_ref(refs, rel_path, &qualified);
                    }
                }
            }
        }
        "import_statement" => {
            let line = line_start(node);
            let mut cursor = node.walk();
            for name in node.named_children(&mut cursor) {
                match name.kind() {
                    "dotted_name" => imports.push(ImportRecord {
                        name: node_text(name, source).to_string(),
                        line,
                    }),
                    "aliased_import" => {
                        if let Some(alias) = name.child_by_field_name("alias") {
                            imports.push(ImportRecord {
                                name: node_text(alias, source).to_string(),
                                line,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            let line = line_start(node);
            let module = node.child_by_field_name("module_name");
            let mut cursor = node.walk();
            for name in node.named_children(&mut cursor) {
                if Some(name) == module {
                    continue;
                }
                match name.kind() {
                    "dotted_name" => imports.push(ImportRecord {
                        name: node_text(name, source).to_string(),
                        line,
                    }),
                    "aliased_import" => {
                        if let Some(alias) = name.child_by_field_name("alias") {
                            imports.push(ImportRecord {
                                name: node_text(alias, source).to_string(),
                                line,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    });

    FileFacts {
        definitions,
        imports,
    }
}

fn unwrap_decorated(node: Node<'_>) -> Node<'_> {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition").unwrap_or(node)
    } else {
        node
    }
}

fn definition_of(
    node: Node<'_>,
    source: &str,
    class_name: Option<&str>,
    kind: DefinitionKind,
) -> Option<Definition> {
    let name = node_text(node.child_by_field_name("name")?, source);
    let name = match class_name {
        Some(class) => format!("{}.{}", class, name),
        None => name.to_string(),
    };
    Some(Definition {
        name,
        kind,
        line_start: line_start(node),
        line_end: line_end(node),
    })
}

fn add_ref(refs: &mut HashSet<String>, rel_path: &str, name: &str) {
    refs.insert(name.to_string());
    refs.insert(format!("{}:{}", rel_path, name));
}

// ============================================================================
// Project-Wide Detection
// ============================================================================

/// Scan all files in the tree and find dead code across the project.
///
/// Deterministic and read-only; files that fail to parse are skipped silently.
pub fn detect_dead_code(tree: &SourceTree) -> Vec<DeadCodeFinding> {
    let mut all_facts: Vec<(String, FileFacts)> = Vec::new();
    let mut references: HashSet<String> = HashSet::new();

    for file in tree.files() {
        let Some(parsed) = parse_module(&file.source) else {
            continue;
        };
        let facts = analyze_file(parsed.root_node(), &file.source, &file.path, &mut references);
        all_facts.push((file.path.clone(), facts));
    }

    let mut dead: Vec<DeadCodeFinding> = Vec::new();

    for (fpath, facts) in &all_facts {
        for def in &facts.definitions {
            if def.name.starts_with('_') && !def.name.starts_with("__") {
                // Private names only need to be referenced within their own file.
                let own_file_ref = format!("{}:{}", fpath, def.name);
                if !references.contains(&own_file_ref) {
                    dead.push(DeadCodeFinding {
                        file: fpath.clone(),
                        name: def.name.clone(),
                        kind: def.kind,
                        line_start: def.line_start,
                        line_end: def.line_end,
                        reason: format!(
                            "Private {} '{}' is never referenced in its file",
                            def.kind.as_str(),
                            def.name
                        ),
                        lines_saved: def.line_end - def.line_start + 1,
                    });
                }
            } else if !references.contains(&def.name) && !is_entrypoint(&def.name) {
                dead.push(DeadCodeFinding {
                    file: fpath.clone(),
                    name: def.name.clone(),
                    kind: def.kind,
                    line_start: def.line_start,
                    line_end: def.line_end,
                    reason: format!(
                        "{} '{}' is defined but never used anywhere in the project",
                        title_case(def.kind.as_str()),
                        def.name
                    ),
                    lines_saved: def.line_end - def.line_start + 1,
                });
            }
        }
    }

    for (fpath, facts) in &all_facts {
        for imp in &facts.imports {
            let own_file_ref = format!("{}:{}", fpath, imp.name);
            if !references.contains(&own_file_ref) && !references.contains(&imp.name) {
                dead.push(DeadCodeFinding {
                    file: fpath.clone(),
                    name: imp.name.clone(),
                    kind: DefinitionKind::Import,
                    line_start: imp.line,
                    line_end: imp.line,
                    reason: format!("Import '{}' is never used", imp.name),
                    lines_saved: 1,
                });
            }
        }
    }

    dead
}

fn is_entrypoint(name: &str) -> bool {
    ENTRYPOINT_NAMES.contains(&name) || name.starts_with("__") || name.starts_with("test_")
}

fn title_case(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
