//! Working-directory isolation for sandboxed runs.
//!
//! Each execution gets its own private copy of the relevant file tree, so
//! concurrent runs never observe each other's filesystem side effects. The
//! copy lives in a temp directory that is released on every exit path,
//! success or failure.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directories never copied into a working copy.
const EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    ".venv",
    "venv",
    "node_modules",
    "target",
    ".tox",
    ".nox",
    ".hypothesis",
];

/// File patterns never copied.
const EXCLUDE_PATTERNS: &[&str] = &["*.pyc", "*.pyo", "*.so", "*.log", "*.tmp"];

fn should_exclude(path: &Path) -> bool {
    for component in path.components() {
        if let std::path::Component::Normal(name) = component {
            let name_str = name.to_string_lossy();
            if EXCLUDE_DIRS.contains(&name_str.as_ref()) {
                return true;
            }
            for pattern in EXCLUDE_PATTERNS {
                if let Some(suffix) = pattern.strip_prefix('*') {
                    if name_str.ends_with(suffix) {
                        return true;
                    }
                }
            }
        }
    }
    false
}

// ============================================================================
// Working Copy
// ============================================================================

/// A private, disposable copy of a file tree.
///
/// The backing temp directory is deleted when the handle drops, which makes
/// cleanup unconditional: early returns, errors, and panics in the supervising
/// task all release the copy.
pub struct WorkCopy {
    /// Owns the directory lifetime; cleanup happens on drop.
    _temp_dir: TempDir,
    workspace_dir: PathBuf,
    copied_files: Vec<String>,
}

impl WorkCopy {
    /// Copy `source_root` into a fresh temp directory.
    ///
    /// Symlinks are skipped with a warning rather than followed; a run
    /// observes only regular files that live inside the tree.
    pub fn create(source_root: &Path) -> io::Result<WorkCopy> {
        let temp_dir = TempDir::with_prefix("liftover_run_")?;
        let workspace_dir = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace_dir)?;

        let mut copied_files = Vec::new();

        for entry in WalkDir::new(source_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !should_exclude(e.path()))
        {
            let entry = entry?;
            let source_path = entry.path();
            if source_path == source_root {
                continue;
            }

            let relative_path = source_path
                .strip_prefix(source_root)
                .map_err(io::Error::other)?;
            let dest_path = workspace_dir.join(relative_path);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest_path)?;
                continue;
            }
            if source_path.is_symlink() {
                warn!("skipping symlink in working copy: {}", source_path.display());
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(source_path, &dest_path)?;
            copied_files.push(relative_path.to_string_lossy().to_string());
            debug!("copied into working copy: {}", relative_path.display());
        }

        Ok(WorkCopy {
            _temp_dir: temp_dir,
            workspace_dir,
            copied_files,
        })
    }

    /// Root of the copied tree.
    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Absolute path of a copied file, by its tree-relative path.
    pub fn path_of(&self, relative: &str) -> PathBuf {
        self.workspace_dir.join(relative)
    }

    /// Relative paths of every copied file.
    pub fn copied_files(&self) -> &[String] {
        &self.copied_files
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn create_source_tree() -> TempDir {
        let dir = TempDir::new().unwrap();

        let src_dir = dir.path().join("pkg");
        fs::create_dir_all(&src_dir).unwrap();
        File::create(src_dir.join("main.py"))
            .unwrap()
            .write_all(b"print('hello')\n")
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
    fn copies_nested_files() {
        let source = create_source_tree();
        let copy = WorkCopy::create(source.path()).unwrap();

        assert!(copy.path_of("pkg/main.py").exists());
        assert!(copy.copied_files().contains(&"pkg/main.py".to_string()));
    }

    #[test]
    fn excludes_pycache() {
        let source = create_source_tree();
        let copy = WorkCopy::create(source.path()).unwrap();
        assert!(!copy.workspace_dir().join("__pycache__").exists());
    }

    #[test]
    fn working_copy_is_independent_of_source() {
        let source = create_source_tree();
        let copy = WorkCopy::create(source.path()).unwrap();

        // Mutating the copy leaves the source untouched.
        fs::write(copy.path_of("pkg/main.py"), b"changed\n").unwrap();
        let original = fs::read_to_string(source.path().join("pkg/main.py")).unwrap();
        assert_eq!(original, "print('hello')\n");
    }

    #[test]
    fn cleans_up_on_drop() {
        let source = create_source_tree();
        let workspace;
        {
            let copy = WorkCopy::create(source.path()).unwrap();
            workspace = copy.workspace_dir().to_path_buf();
            assert!(workspace.exists());
        }
        assert!(!workspace.exists());
    }

    #[test]
    fn should_exclude_matches_dirs_and_patterns() {
        assert!(should_exclude(Path::new(".git/config")));
        assert!(should_exclude(Path::new("a/__pycache__/x.pyc")));
        assert!(should_exclude(Path::new("lib/module.pyc")));
        assert!(!should_exclude(Path::new("src/main.py")));
    }
}
