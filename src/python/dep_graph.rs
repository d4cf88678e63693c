//! Dependency graph analysis for migration ordering.
//!
//! Resolves imports to in-project files and computes a cycle-tolerant
//! topological migration order: leaf modules first, core modules last, so an
//! incremental migration breaks as little as possible at each step.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::warn;
use tree_sitter::Node;

use crate::python::files::SourceTree;
use crate::python::parse::{for_each_node, node_text, parse_module};
use crate::types::DependencyNode;

/// Rank used when sorting files that somehow lack one; ranks are always
/// assigned, so this is a sorting guard, not an expected state.
const UNRANKED: u32 = 9999;

// ============================================================================
// Graph Construction
// ============================================================================

/// Build the full dependency graph and compute migration order.
///
/// Files that fail to parse contribute no edges but still appear as nodes.
pub fn build_dependency_graph(tree: &SourceTree) -> BTreeMap<String, DependencyNode> {
    let module_map = build_module_map(tree);

    let mut imports_map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut imported_by_map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut external_deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for file in tree.files() {
        let Some(parsed) = parse_module(&file.source) else {
            continue;
        };
        for target in import_targets(parsed.root_node(), &file.source) {
            resolve_import(
                &target,
                &file.path,
                &module_map,
                &mut imports_map,
                &mut imported_by_map,
                &mut external_deps,
            );
        }
    }

    let all_files: Vec<String> = tree.files().iter().map(|f| f.path.clone()).collect();
    let (order, circular) = topological_sort(&all_files, &imports_map);

    if !circular.is_empty() {
        warn!(
            "circular dependencies detected among {} files: {}",
            circular.len(),
            circular.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }

    let mut graph = BTreeMap::new();
    for path in &all_files {
        let imports = imports_map.get(path).cloned().unwrap_or_default();
        let circular_deps = if circular.contains(path) {
            imports.intersection(&circular).cloned().collect()
        } else {
            Vec::new()
        };
        graph.insert(
            path.clone(),
            DependencyNode {
                file: path.clone(),
                imports: imports.into_iter().collect(),
                imported_by: imported_by_map
                    .get(path)
                    .map(|s| s.iter().cloned().collect())
                    .unwrap_or_default(),
                external_deps: external_deps
                    .get(path)
                    .map(|s| s.iter().cloned().collect())
                    .unwrap_or_default(),
                migration_order: order.get(path).copied(),
                circular_deps,
            },
        );
    }

    graph
}

/// Files in recommended migration order (leaves first, ties broken by path).
pub fn migration_order(graph: &BTreeMap<String, DependencyNode>) -> Vec<String> {
    let mut nodes: Vec<&DependencyNode> = graph.values().collect();
    nodes.sort_by(|a, b| {
        (a.migration_order.unwrap_or(UNRANKED), a.file.as_str())
            .cmp(&(b.migration_order.unwrap_or(UNRANKED), b.file.as_str()))
    });
    nodes.into_iter().map(|n| n.file.clone()).collect()
}

// ============================================================================
// Import Extraction & Resolution
// ============================================================================

/// Map module dotted paths to project-relative file paths.
/// `utils/helpers.py` becomes `utils.helpers`; a package's `__init__.py`
/// collapses to the package itself.
fn build_module_map(tree: &SourceTree) -> BTreeMap<String, String> {
    let mut module_map = BTreeMap::new();
    for file in tree.files() {
        let module = file
            .path
            .strip_suffix(".py")
            .unwrap_or(&file.path)
            .replace('/', ".");
        let module = module
            .strip_suffix(".__init__")
            .map(str::to_string)
            .unwrap_or(module);
        module_map.insert(module, file.path.clone());
    }
    module_map
}

/// Dotted module targets imported by a parsed file, in source order.
fn import_targets(root: Node<'_>, source: &str) -> Vec<String> {
    let mut targets = Vec::new();
    for_each_node(root, &mut |node| match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => targets.push(node_text(child, source).to_string()),
                    "aliased_import" => {
                        if let Some(name) = child.child_by_field_name("name") {
                            targets.push(node_text(name, source).to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                match module.kind() {
                    "dotted_name" => targets.push(node_text(module, source).to_string()),
                    "relative_import" => {
                        // `from .mod import x` probes `mod`; a bare
                        // `from . import x` names no module and is skipped.
                        let mut cursor = module.walk();
                        for part in module.named_children(&mut cursor) {
                            if part.kind() == "dotted_name" {
                                targets.push(node_text(part, source).to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    });
    targets
}

/// Probe successively shorter dotted prefixes against the module map; the
/// first match becomes an internal edge, otherwise the leading component is
/// recorded as an external dependency. Self-imports are dropped.
fn resolve_import(
    module_name: &str,
    current_file: &str,
    module_map: &BTreeMap<String, String>,
    imports_map: &mut BTreeMap<String, BTreeSet<String>>,
    imported_by_map: &mut BTreeMap<String, BTreeSet<String>>,
    external_deps: &mut BTreeMap<String, BTreeSet<String>>,
) {
    let parts: Vec<&str> = module_name.split('.').collect();
    for i in (1..=parts.len()).rev() {
        let candidate = parts[..i].join(".");
        if let Some(target) = module_map.get(&candidate) {
            if target != current_file {
                imports_map
                    .entry(current_file.to_string())
                    .or_default()
                    .insert(target.clone());
                imported_by_map
                    .entry(target.clone())
                    .or_default()
                    .insert(current_file.to_string());
            }
            return;
        }
    }

    external_deps
        .entry(current_file.to_string())
        .or_default()
        .insert(parts[0].to_string());
}

// ============================================================================
// Topological Ordering
// ============================================================================

/// Kahn's algorithm over internal edges.
///
/// Returns the migration rank per file (0 migrates first) and the set of
/// files left on cycles. Files on cycles receive continuing ranks in
/// sorted-path order, so the order is always total and never raises.
fn topological_sort(
    files: &[String],
    imports_map: &BTreeMap<String, BTreeSet<String>>,
) -> (BTreeMap<String, u32>, BTreeSet<String>) {
    let mut in_degree: BTreeMap<&str, usize> = files.iter().map(|f| (f.as_str(), 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (file, deps) in imports_map {
        for dep in deps {
            if in_degree.contains_key(dep.as_str()) {
                *in_degree.get_mut(file.as_str()).expect("file is in graph") += 1;
                dependents.entry(dep.as_str()).or_default().push(file.as_str());
            }
        }
    }

    // Seed the queue in discovery (sorted-path) order for determinism.
    let mut queue: VecDeque<&str> = files
        .iter()
        .map(String::as_str)
        .filter(|f| in_degree[f] == 0)
        .collect();

    let mut order: BTreeMap<String, u32> = BTreeMap::new();
    let mut rank: u32 = 0;

    while let Some(node) = queue.pop_front() {
        order.insert(node.to_string(), rank);
        rank += 1;
        if let Some(importers) = dependents.get(node) {
            for &importer in importers {
                let degree = in_degree.get_mut(importer).expect("importer is in graph");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(importer);
                }
            }
        }
    }

    // Whatever remains sits on a cycle; rank it deterministically.
    let circular: BTreeSet<String> = files
        .iter()
        .filter(|f| !order.contains_key(*f))
        .cloned()
        .collect();
    for file in &circular {
        order.insert(file.clone(), rank);
        rank += 1;
    }

    (order, circular)
}

// ============================================================================
// Tests
// ============================================================================
