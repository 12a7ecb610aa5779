use std::path::{Path, PathBuf};

/// Find the git root directory by walking upward from the given path
pub fn find_git_root(path: &Path) -> Option<PathBuf> {
  let mut current = path.to_path_buf();

  loop {
    if current.join(".git").exists() {
      return Some(current);
    }

    if !current.pop() {
      return None;
    }
  }
}

/// Get the project root path, preferring git root over the given path
pub fn resolve_project_path(path: &Path) -> PathBuf {
  let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
  find_git_root(&canonical).unwrap_or(canonical)
}

/// Per-project state directory. Holds config, the change ledger, the
/// indexing lock, the reindex trigger sentinel, and the LanceDB data.
pub fn semantica_dir(project_root: &Path) -> PathBuf {
  project_root.join(".semantica")
}
