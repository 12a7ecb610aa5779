//! Pre-flight estimator: before a full run, gauge scope, time, and
//! cost, and probe the collaborators the pipeline depends on.

use crate::Scanner;
use embedding::EmbeddingProvider;
use semantica_core::{Config, Language, semantica_dir};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use store::VectorStore;
use tracing::debug;

/// Estimated tokens per chunk when projecting cost
const TOKENS_PER_CHUNK: u64 = 175;

/// Fixed startup/teardown buffer in seconds
const TIME_BUFFER_SECS: f64 = 10.0;

/// Files scanned per second during discovery and parsing
const FILES_PER_SEC: f64 = 700.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightChecks {
  pub config_exists: bool,
  #[serde(rename = "vectorDBHealthy")]
  pub vector_db_healthy: bool,
  pub embedding_healthy: bool,
  pub disk_space_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightReport {
  pub files_count: usize,
  pub estimated_chunks: usize,
  #[serde(rename = "estimatedTime")]
  pub estimated_time_secs: f64,
  #[serde(rename = "estimatedCost")]
  pub estimated_cost_usd: f64,
  pub checks: PreflightChecks,
  pub warnings: Vec<String>,
}

/// Estimate a full index run and probe collaborators.
pub async fn preflight(
  project_root: &Path,
  config: &Config,
  provider: &dyn EmbeddingProvider,
  store: &dyn VectorStore,
) -> Result<PreflightReport, crate::ScanError> {
  let scanner = Scanner::new(project_root, &config.indexing)?;
  let files = scanner.scan();
  let files_count = files.len();

  // Chunks per file keyed off the dominant language
  let mut by_language: HashMap<Language, usize> = HashMap::new();
  for file in &files {
    *by_language.entry(file.language).or_insert(0) += 1;
  }
  let dominant = by_language.iter().max_by_key(|(_, count)| **count).map(|(lang, _)| *lang);
  let chunks_per_file = chunks_per_file(dominant);
  let estimated_chunks = (files_count as f64 * chunks_per_file).round() as usize;

  let rate = embed_rate(provider.name(), config.embedding.concurrency);
  let estimated_time_secs = estimated_chunks as f64 / rate + files_count as f64 / FILES_PER_SEC + TIME_BUFFER_SECS;

  let estimated_cost_usd = provider.estimate_cost(estimated_chunks as u64 * TOKENS_PER_CHUNK);

  let checks = PreflightChecks {
    config_exists: semantica_core::Config::exists_for_project(project_root),
    vector_db_healthy: store.health_check().await,
    embedding_healthy: provider.health_check().await,
    disk_space_available: disk_writable(project_root),
  };

  let mut warnings = Vec::new();
  if files_count == 0 {
    warnings.push("No files match the include patterns; nothing to index".to_string());
  }
  if files_count > 10_000 {
    warnings.push(format!("Large project ({} files); indexing may take a while", files_count));
  }
  if !checks.vector_db_healthy {
    warnings.push("Vector store is not reachable".to_string());
  }
  if !checks.embedding_healthy {
    warnings.push("Embedding provider is not reachable".to_string());
  }

  debug!(
    files = files_count,
    chunks = estimated_chunks,
    time = estimated_time_secs,
    cost = estimated_cost_usd,
    "Pre-flight estimate"
  );

  Ok(PreflightReport {
    files_count,
    estimated_chunks,
    estimated_time_secs,
    estimated_cost_usd,
    checks,
    warnings,
  })
}

/// Average chunks per file by primary language
fn chunks_per_file(language: Option<Language>) -> f64 {
  match language {
    Some(Language::TypeScript | Language::Tsx | Language::JavaScript | Language::Jsx) => 6.0,
    Some(Language::Ruby) => 3.5,
    Some(Language::Python) => 4.5,
    _ => 4.0,
  }
}

/// Chunks embedded per second: a flat rate for the local daemon, and a
/// concurrency-dependent rate for the remote API.
fn embed_rate(provider_name: &str, concurrency: usize) -> f64 {
  if provider_name == "local" {
    return 28.0;
  }
  match concurrency {
    c if c >= 5 => 85.0,
    4 => 70.0,
    3 => 50.0,
    _ => 35.0,
  }
}

/// Cheap probe: the state directory is writable
fn disk_writable(project_root: &Path) -> bool {
  let dir = semantica_dir(project_root);
  if std::fs::create_dir_all(&dir).is_err() {
    return false;
  }
  let probe = dir.join(".disk-probe");
  let ok = std::fs::write(&probe, b"ok").is_ok();
  let _ = std::fs::remove_file(&probe);
  ok
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_chunks_per_file_table() {
    assert_eq!(chunks_per_file(Some(Language::TypeScript)), 6.0);
    assert_eq!(chunks_per_file(Some(Language::JavaScript)), 6.0);
    assert_eq!(chunks_per_file(Some(Language::Ruby)), 3.5);
    assert_eq!(chunks_per_file(Some(Language::Python)), 4.5);
    assert_eq!(chunks_per_file(Some(Language::Rust)), 4.0);
    assert_eq!(chunks_per_file(None), 4.0);
  }

  #[test]
  fn test_embed_rate_table() {
    assert_eq!(embed_rate("local", 8), 28.0);
    assert_eq!(embed_rate("remote", 5), 85.0);
    assert_eq!(embed_rate("remote", 6), 85.0);
    assert_eq!(embed_rate("remote", 4), 70.0);
    assert_eq!(embed_rate("remote", 3), 50.0);
    assert_eq!(embed_rate("remote", 2), 35.0);
    assert_eq!(embed_rate("remote", 1), 35.0);
  }

  #[test]
  fn test_disk_probe() {
    let dir = tempfile::TempDir::new().unwrap();
    assert!(disk_writable(dir.path()));
  }
}
