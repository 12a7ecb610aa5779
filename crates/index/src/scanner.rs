use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use semantica_core::{ConfigError, IndexingConfig, Language, parse_byte_size};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ScanError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Invalid glob pattern: {0}")]
  Pattern(#[from] globset::Error),
  #[error("Config error: {0}")]
  Config(#[from] ConfigError),
}

/// A candidate file for indexing
#[derive(Debug, Clone)]
pub struct FileRecord {
  pub absolute_path: PathBuf,
  /// Project-relative, `/`-separated on every platform
  pub relative_path: String,
  pub extension: String,
  pub language: Language,
  pub size: u64,
  /// Unix seconds
  pub last_modified: u64,
}

/// File enumerator: walks the project respecting gitignore rules and a
/// `.semanticaignore` file, applies include/exclude globs (exclude
/// beats include), the language table, and the size cap. Symlinks are
/// not followed.
pub struct Scanner {
  root: PathBuf,
  include: GlobSet,
  exclude: GlobSet,
  max_file_size: u64,
}

impl Scanner {
  pub fn new(root: &Path, config: &IndexingConfig) -> Result<Self, ScanError> {
    let include = build_globset(&config.include)?;
    let exclude = build_globset(&config.exclude)?;
    let max_file_size = parse_byte_size(&config.max_file_size)?;

    Ok(Self {
      root: root.to_path_buf(),
      include,
      exclude,
      max_file_size,
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Enumerate candidate files, ordered by relative path
  pub fn scan(&self) -> Vec<FileRecord> {
    let walker = WalkBuilder::new(&self.root)
      .follow_links(false)
      .hidden(true)
      .git_ignore(true)
      .git_global(true)
      .git_exclude(true)
      .add_custom_ignore_filename(".semanticaignore")
      .build();

    let mut files = Vec::new();

    for entry in walker.filter_map(|e| e.ok()) {
      if entry.file_type().is_none_or(|ft| !ft.is_file()) {
        continue;
      }
      if let Some(record) = self.scan_file(entry.path()) {
        files.push(record);
      }
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!(files = files.len(), root = %self.root.display(), "Scan complete");
    files
  }

  /// Apply the per-file filters to a single path
  pub fn scan_file(&self, path: &Path) -> Option<FileRecord> {
    let relative_path = normalize_relative(path, &self.root);

    if self.exclude.is_match(&relative_path) {
      return None;
    }
    if !self.include.is_empty() && !self.include.is_match(&relative_path) {
      return None;
    }

    // Unsupported extensions are skipped silently, never an error.
    let extension = path.extension()?.to_str()?.to_string();
    let language = Language::from_extension(&extension)?;

    let metadata = path.symlink_metadata().ok()?;
    if !metadata.is_file() {
      return None;
    }
    if metadata.len() == 0 {
      return None;
    }
    if metadata.len() > self.max_file_size {
      warn!(
        file = %relative_path,
        size = metadata.len(),
        limit = self.max_file_size,
        "Skipping oversized file"
      );
      return None;
    }

    let last_modified = metadata
      .modified()
      .ok()?
      .duration_since(UNIX_EPOCH)
      .ok()?
      .as_secs();

    Some(FileRecord {
      absolute_path: path.to_path_buf(),
      relative_path,
      extension,
      language,
      size: metadata.len(),
      last_modified,
    })
  }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
  let mut builder = GlobSetBuilder::new();
  for pattern in patterns {
    builder.add(Glob::new(pattern)?);
  }
  builder.build()
}

fn normalize_relative(path: &Path, root: &Path) -> String {
  let relative = path.strip_prefix(root).unwrap_or(path);
  let mut normalized = relative.to_string_lossy().to_string();
  if normalized.contains('\\') {
    normalized = normalized.replace('\\', "/");
  }
  normalized
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn scanner_with(root: &Path, config: IndexingConfig) -> Scanner {
    Scanner::new(root, &config).unwrap()
  }

  fn default_scanner(root: &Path) -> Scanner {
    scanner_with(root, IndexingConfig::default())
  }

  #[test]
  fn test_scan_filters_unsupported_extensions() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

    let files = default_scanner(dir.path()).scan();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].language, Language::Rust);
    assert_eq!(files[0].relative_path, "main.rs");
  }

  #[test]
  fn test_scan_respects_gitignore() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    std::fs::write(dir.path().join(".gitignore"), "generated/\n").unwrap();
    std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
    std::fs::create_dir(dir.path().join("generated")).unwrap();
    std::fs::write(dir.path().join("generated/out.rs"), "fn out() {}").unwrap();

    let files = default_scanner(dir.path()).scan();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].relative_path, "main.rs");
  }

  #[test]
  fn test_scan_respects_semanticaignore() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".semanticaignore"), "skipme.rs\n").unwrap();
    std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
    std::fs::write(dir.path().join("skipme.rs"), "fn nope() {}").unwrap();

    let files = default_scanner(dir.path()).scan();
    let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["main.rs"]);
  }

  #[test]
  fn test_exclude_beats_include() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/lib.rs"), "pub fn a() {}").unwrap();
    std::fs::write(dir.path().join("src/gen.rs"), "pub fn g() {}").unwrap();

    let config = IndexingConfig {
      include: vec!["src/**".to_string()],
      exclude: vec!["**/gen.rs".to_string()],
      ..Default::default()
    };
    let files = scanner_with(dir.path(), config).scan();
    let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["src/lib.rs"]);
  }

  #[test]
  fn test_include_narrows_scan() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::create_dir(dir.path().join("scripts")).unwrap();
    std::fs::write(dir.path().join("src/lib.rs"), "pub fn a() {}").unwrap();
    std::fs::write(dir.path().join("scripts/tool.py"), "x = 1").unwrap();

    let config = IndexingConfig {
      include: vec!["src/**".to_string()],
      ..Default::default()
    };
    let files = scanner_with(dir.path(), config).scan();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].relative_path, "src/lib.rs");
  }

  #[test]
  fn test_scan_skips_oversized_and_empty() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("small.rs"), "fn s() {}").unwrap();
    std::fs::write(dir.path().join("big.rs"), "x".repeat(4096)).unwrap();
    std::fs::write(dir.path().join("empty.rs"), "").unwrap();

    let config = IndexingConfig {
      max_file_size: "1KB".to_string(),
      ..Default::default()
    };
    let files = scanner_with(dir.path(), config).scan();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].relative_path, "small.rs");
  }

  #[test]
  fn test_invalid_size_is_config_error() {
    let dir = TempDir::new().unwrap();
    let config = IndexingConfig {
      max_file_size: "lots".to_string(),
      ..Default::default()
    };
    assert!(matches!(
      Scanner::new(dir.path(), &config),
      Err(ScanError::Config(ConfigError::InvalidSize(_)))
    ));
  }

  #[test]
  fn test_output_sorted_by_relative_path() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("zeta.rs"), "fn z() {}").unwrap();
    std::fs::write(dir.path().join("alpha.rs"), "fn a() {}").unwrap();

    let files = default_scanner(dir.path()).scan();
    let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["alpha.rs", "zeta.rs"]);
  }

  #[cfg(unix)]
  #[test]
  fn test_symlinks_not_followed() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("real.rs"), "fn r() {}").unwrap();
    std::os::unix::fs::symlink(outside.path().join("real.rs"), dir.path().join("link.rs")).unwrap();
    std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

    let files = default_scanner(dir.path()).scan();
    let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["main.rs"]);
  }
}
