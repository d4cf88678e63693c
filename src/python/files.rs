//! Python project tree discovery.
//!
//! A [`SourceTree`] is the read-only snapshot every analysis pass consumes:
//! project-relative paths plus raw text, content-hashed into a stable
//! snapshot id. Analysis never mutates the tree; a single unreadable file is
//! skipped with a warning and never aborts the pass.

use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for source tree loading.
#[derive(Debug, Error)]
pub enum FileError {
    /// The project root itself is missing or not a directory.
    #[error("project root not found: {path}")]
    RootNotFound { path: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for file operations.
pub type FileResult<T> = Result<T, FileError>;

// ============================================================================
// Source Files
// ============================================================================

/// One project file: relative path and raw text.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the project root, with `/` separators.
    pub path: String,
    /// Raw file text.
    pub source: String,
}

/// Read-only snapshot of a project's Python files, sorted by path.
#[derive(Debug, Clone)]
pub struct SourceTree {
    files: Vec<SourceFile>,
    snapshot_id: String,
}

impl SourceTree {
    /// Load all Python files under `root`.
    ///
    /// Respects standard exclusion patterns (hidden directories,
    /// `__pycache__`, `node_modules`, `venv`, `target`). Files that cannot be
    /// read as text are skipped with a warning.
    pub fn load(root: &Path) -> FileResult<SourceTree> {
        if !root.is_dir() {
            return Err(FileError::RootNotFound {
                path: root.display().to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            // Filter on workspace-relative components only; the absolute
            // prefix may contain temp-dir names like .tmpXXX.
            let rel_path = match path.strip_prefix(root) {
                Ok(p) => p,
                Err(_) => continue,
            };

            if rel_path
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            {
                continue;
            }
            if rel_path.components().any(|c| {
                let name = c.as_os_str().to_string_lossy();
                name == "__pycache__" || name == "node_modules" || name == "venv" || name == "target"
            }) {
                continue;
            }

            if path.extension().is_some_and(|ext| ext == "py") {
                let rel = rel_path
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                match fs::read_to_string(path) {
                    Ok(source) => files.push(SourceFile { path: rel, source }),
                    Err(err) => {
                        warn!("skipping unreadable file {}: {}", rel, err);
                        continue;
                    }
                }
            }
        }

        Ok(SourceTree::from_files(
            files.into_iter().map(|f| (f.path, f.source)).collect(),
        ))
    }

    /// Build a tree from in-memory `(path, source)` pairs.
    pub fn from_files(files: Vec<(String, String)>) -> SourceTree {
        let mut files: Vec<SourceFile> = files
            .into_iter()
            .map(|(path, source)| SourceFile { path, source })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let snapshot_id = compute_snapshot_id(&files);
        SourceTree { files, snapshot_id }
    }

    /// All files, sorted by path.
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Look up one file by its project-relative path.
    pub fn get(&self, path: &str) -> Option<&SourceFile> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    /// Content-addressed identity of this snapshot.
    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    /// Total line count across all files.
    pub fn total_lines(&self) -> usize {
        self.files.iter().map(|f| line_count(&f.source)).sum()
    }
}

/// Line count convention shared by every pass: trailing-newline-agnostic,
/// zero for an empty file.
pub fn line_count(source: &str) -> usize {
    if source.is_empty() {
        0
    } else {
        source.matches('\n').count() + 1
    }
}

fn compute_snapshot_id(files: &[SourceFile]) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.path.as_bytes());
        hasher.update([0]);
        hasher.update(file.source.as_bytes());
        hasher.update([0]);
    }
    let digest = hasher.finalize();
    format!("snap_{}", &hex::encode(digest)[..16])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_workspace() -> TempDir {
        let dir = TempDir::new().unwrap();

        let src_dir = dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();

        File::create(src_dir.join("main.py"))
            .unwrap()
            .write_all(b"def main():\n    pass\n")
            .unwrap();

        File::create(src_dir.join("utils.py"))
            .unwrap()
            .write_all(b"def helper():\n    return 42\n")
            .unwrap();

        let cache_dir = dir.path().join("__pycache__");
        fs::create_dir_all(&cache_dir).unwrap();
        File::create(cache_dir.join("main.cpython-311.pyc"))
            .unwrap()
            .write_all(b"compiled")
            .unwrap();

        dir
    }

    #[test]
    fn load_finds_python_files() {
        let workspace = create_test_workspace();
        let tree = SourceTree::load(workspace.path()).unwrap();

        let paths: Vec<&str> = tree.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/main.py", "src/utils.py"]);
    }

    #[test]
    fn load_excludes_pycache() {
        let workspace = create_test_workspace();
        let tree = SourceTree::load(workspace.path()).unwrap();
        assert!(!tree.files().iter().any(|f| f.path.contains("__pycache__")));
    }

    #[test]
    fn load_skips_unreadable_file() {
        let workspace = create_test_workspace();
        // Invalid UTF-8 cannot be read as text; the rest of the tree survives.
        fs::write(workspace.path().join("src/binary.py"), [0xff, 0xfe, 0x00]).unwrap();

        let tree = SourceTree::load(workspace.path()).unwrap();
        let paths: Vec<&str> = tree.files().iter().map(|f| f.path.as_str()).collect();
        assert!(!paths.contains(&"src/binary.py"));
        assert!(paths.contains(&"src/main.py"));
    }

    #[test]
    fn load_missing_root_is_an_error() {
        let result = SourceTree::load(Path::new("/nonexistent/liftover-test"));
        assert!(matches!(result, Err(FileError::RootNotFound { .. })));
    }

    #[test]
    fn snapshot_id_is_stable_for_identical_content() {
        let a = SourceTree::from_files(vec![("a.py".into(), "x = 1\n".into())]);
        let b = SourceTree::from_files(vec![("a.py".into(), "x = 1\n".into())]);
        assert_eq!(a.snapshot_id(), b.snapshot_id());
    }

    #[test]
    fn snapshot_id_changes_with_content() {
        let a = SourceTree::from_files(vec![("a.py".into(), "x = 1\n".into())]);
        let b = SourceTree::from_files(vec![("a.py".into(), "x = 2\n".into())]);
        assert_ne!(a.snapshot_id(), b.snapshot_id());
    }

    #[test]
    fn get_finds_file_by_path() {
        let tree = SourceTree::from_files(vec![
            ("b.py".into(), "y = 2\n".into()),
            ("a.py".into(), "x = 1\n".into()),
        ]);
        assert!(tree.get("a.py").is_some());
        assert!(tree.get("c.py").is_none());
    }

    #[test]
    fn line_count_conventions() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("x = 1"), 1);
        assert_eq!(line_count("x = 1\n"), 2);
        assert_eq!(line_count("a\nb\n"), 3);
    }
}
