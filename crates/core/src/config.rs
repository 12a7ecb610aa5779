//! Per-project configuration, stored at `<project>/.semantica/config.json`.
//!
//! Loading order: read the file, substitute `${NAME}` environment
//! references, deep-merge the result over the built-in defaults
//! (objects merge recursively, arrays replace), then deserialize.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Malformed config: {0}")]
  Malformed(#[from] serde_json::Error),
  #[error("Invalid size string: {0:?}")]
  InvalidSize(String),
}

/// Which embedding backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
  #[default]
  Local,
  Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingConfig {
  pub provider: EmbeddingProviderKind,

  /// Model name (e.g., "nomic-embed-text", "voyage-code-2")
  pub model: String,

  /// Embedding dimensions (must match model output)
  pub dimensions: usize,

  /// Base URL of the local embedding daemon (local provider only)
  pub base_url: String,

  /// API key for the remote provider; `${NAME}` references are
  /// substituted from the environment at load time
  #[serde(skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,

  /// Chunks per embedding request
  pub batch_size: usize,

  /// Maximum embedding batches in flight
  pub concurrency: usize,

  /// Per-request timeout in seconds
  pub request_timeout_secs: u64,

  /// Provider-side context window in tokens
  pub max_tokens: usize,
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    Self {
      provider: EmbeddingProviderKind::Local,
      model: "nomic-embed-text".to_string(),
      dimensions: 768,
      base_url: "http://localhost:11434".to_string(),
      api_key: None,
      batch_size: 32,
      concurrency: 4,
      request_timeout_secs: 60,
      max_tokens: 8192,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexingConfig {
  /// Include globs, project-relative
  pub include: Vec<String>,

  /// Exclude globs; exclude beats include
  pub exclude: Vec<String>,

  /// Maximum file size as a human-readable string ("1MB", "500KB")
  pub max_file_size: String,

  /// Chunk size ceiling in approximate tokens
  pub max_tokens: usize,

  /// Merge floor: groups smaller than this stay candidates for merging
  pub min_tokens: usize,

  /// Consolidate small adjacent sibling chunks
  pub merge_siblings: bool,
}

impl Default for IndexingConfig {
  fn default() -> Self {
    Self {
      include: vec!["**/*".to_string()],
      exclude: vec![
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/.git/**".to_string(),
        "**/dist/**".to_string(),
        "**/vendor/**".to_string(),
      ],
      max_file_size: "1MB".to_string(),
      max_tokens: 250,
      min_tokens: 30,
      merge_siblings: true,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
  #[default]
  Hybrid,
  Vector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
  Snippet,
  Context,
  #[default]
  Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchConfig {
  pub strategy: SearchStrategy,
  pub max_results: usize,
  pub min_score: f32,
  pub result_format: ResultFormat,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      strategy: SearchStrategy::Hybrid,
      max_results: 10,
      min_score: 0.7,
      result_format: ResultFormat::Hybrid,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub embedding: EmbeddingConfig,
  pub indexing: IndexingConfig,
  pub search: SearchConfig,
}

impl Config {
  /// Path of the config file for a project
  pub fn path_for_project(project_root: &Path) -> std::path::PathBuf {
    crate::semantica_dir(project_root).join("config.json")
  }

  /// Whether a config file exists for the project
  pub fn exists_for_project(project_root: &Path) -> bool {
    Self::path_for_project(project_root).exists()
  }

  /// Load config for a project. A missing file yields the defaults; a
  /// present but malformed file is a hard error.
  pub fn load_for_project(project_root: &Path) -> Result<Self, ConfigError> {
    let path = Self::path_for_project(project_root);
    if !path.exists() {
      return Ok(Self::default());
    }

    let raw = std::fs::read_to_string(&path)?;
    Self::from_json(&raw)
  }

  /// Parse a config document: env substitution, then deep merge over
  /// defaults, then deserialize.
  pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
    let substituted = substitute_env(raw);
    let user: serde_json::Value = serde_json::from_str(&substituted)?;
    let mut base = serde_json::to_value(Self::default())?;
    deep_merge(&mut base, user);
    let config: Self = serde_json::from_value(base)?;
    // Surface bad size strings at load time, not mid-pipeline
    parse_byte_size(&config.indexing.max_file_size)?;
    Ok(config)
  }

  /// Parsed max file size in bytes
  pub fn max_file_size_bytes(&self) -> Result<u64, ConfigError> {
    parse_byte_size(&self.indexing.max_file_size)
  }
}

/// Replace `${NAME}` references with environment values. Unknown names
/// substitute to the empty string.
fn substitute_env(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  let mut rest = raw;

  while let Some(start) = rest.find("${") {
    out.push_str(&rest[..start]);
    let after = &rest[start + 2..];
    match after.find('}') {
      Some(end) => {
        let name = &after[..end];
        if let Ok(value) = std::env::var(name) {
          out.push_str(&value);
        }
        rest = &after[end + 1..];
      }
      None => {
        out.push_str(&rest[start..]);
        rest = "";
      }
    }
  }

  out.push_str(rest);
  out
}

/// Deep merge: objects merge recursively, everything else (including
/// arrays) replaces.
fn deep_merge(base: &mut serde_json::Value, overlay: serde_json::Value) {
  match (base, overlay) {
    (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
      for (key, value) in overlay_map {
        match base_map.get_mut(&key) {
          Some(existing) => deep_merge(existing, value),
          None => {
            base_map.insert(key, value);
          }
        }
      }
    }
    (base_slot, overlay_value) => *base_slot = overlay_value,
  }
}

/// Parse a human-readable byte size ("1MB", "500KB", "1.5GB", "2048B",
/// bare digits = bytes). Units are 1024-based.
pub fn parse_byte_size(s: &str) -> Result<u64, ConfigError> {
  let trimmed = s.trim();
  if trimmed.is_empty() {
    return Err(ConfigError::InvalidSize(s.to_string()));
  }

  let upper = trimmed.to_ascii_uppercase();
  let split = upper
    .find(|c: char| c.is_ascii_alphabetic())
    .unwrap_or(upper.len());
  let (number_part, unit_part) = upper.split_at(split);

  let number: f64 = number_part
    .trim()
    .parse()
    .map_err(|_| ConfigError::InvalidSize(s.to_string()))?;
  if number < 0.0 || !number.is_finite() {
    return Err(ConfigError::InvalidSize(s.to_string()));
  }

  let multiplier: u64 = match unit_part.trim() {
    "" | "B" => 1,
    "KB" | "K" => 1024,
    "MB" | "M" => 1024 * 1024,
    "GB" | "G" => 1024 * 1024 * 1024,
    _ => return Err(ConfigError::InvalidSize(s.to_string())),
  };

  Ok((number * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_parse_byte_size() {
    assert_eq!(parse_byte_size("1MB").unwrap(), 1_048_576);
    assert_eq!(parse_byte_size("500KB").unwrap(), 512_000);
    assert_eq!(parse_byte_size("1.5GB").unwrap(), 1_610_612_736);
    assert_eq!(parse_byte_size("2048").unwrap(), 2048);
    assert_eq!(parse_byte_size("2048B").unwrap(), 2048);
  }

  #[test]
  fn test_parse_byte_size_invalid() {
    assert!(parse_byte_size("").is_err());
    assert!(parse_byte_size("MB").is_err());
    assert!(parse_byte_size("12XB").is_err());
    assert!(parse_byte_size("-1MB").is_err());
  }

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Local);
    assert_eq!(config.embedding.dimensions, 768);
    assert_eq!(config.indexing.max_tokens, 250);
    assert!(config.indexing.merge_siblings);
    assert_eq!(config.search.min_score, 0.7);
    assert_eq!(config.search.result_format, ResultFormat::Hybrid);
  }

  #[test]
  fn test_load_missing_gives_defaults() {
    let temp = TempDir::new().unwrap();
    let config = Config::load_for_project(temp.path()).unwrap();
    assert_eq!(config.search.max_results, 10);
  }

  #[test]
  fn test_deep_merge_objects_merge_arrays_replace() {
    let raw = r#"{
      "embedding": { "provider": "remote", "model": "voyage-code-2" },
      "indexing": { "exclude": ["**/build/**"] }
    }"#;
    let config = Config::from_json(raw).unwrap();

    // merged: provider changed, dimensions kept from defaults
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Remote);
    assert_eq!(config.embedding.model, "voyage-code-2");
    assert_eq!(config.embedding.dimensions, 768);

    // replaced: the default exclude list is gone
    assert_eq!(config.indexing.exclude, vec!["**/build/**".to_string()]);
    // untouched section keeps defaults
    assert_eq!(config.indexing.max_tokens, 250);
  }

  #[test]
  fn test_env_substitution() {
    unsafe {
      std::env::set_var("SEMANTICA_TEST_KEY", "sk-test-123");
    }
    let raw = r#"{ "embedding": { "apiKey": "${SEMANTICA_TEST_KEY}" } }"#;
    let config = Config::from_json(raw).unwrap();
    assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test-123"));
    unsafe {
      std::env::remove_var("SEMANTICA_TEST_KEY");
    }
  }

  #[test]
  fn test_malformed_config_is_error() {
    assert!(Config::from_json("{ not json").is_err());
  }

  #[test]
  fn test_bad_size_string_rejected_at_load() {
    let raw = r#"{ "indexing": { "maxFileSize": "huge" } }"#;
    assert!(matches!(Config::from_json(raw), Err(ConfigError::InvalidSize(_))));
  }

  #[test]
  fn test_load_from_file() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join(".semantica");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
      dir.join("config.json"),
      r#"{ "search": { "maxResults": 25, "minScore": 0.5 } }"#,
    )
    .unwrap();

    let config = Config::load_for_project(temp.path()).unwrap();
    assert_eq!(config.search.max_results, 25);
    assert_eq!(config.search.min_score, 0.5);
  }
}
