use crate::format::format_snippet;
use crate::query::{classify_query, expand_variants, extract_query_keywords, preprocess};
use embedding::{EmbeddingError, EmbeddingProvider};
use semantica_core::{SearchConfig, SearchStrategy};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use store::{SearchHit, SearchOptions, StoreError, VectorStore};
use tracing::{debug, info};

/// min_score multiplier for synonym-variant fallback passes
const FALLBACK_SCORE_SCALE: f32 = 0.8;

/// Floor used by the last-resort retry of the primary query
const FALLBACK_FLOOR: f32 = 0.3;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
  #[error("Empty query")]
  EmptyQuery,
  #[error("Invalid path pattern: {0}")]
  InvalidPathPattern(#[from] regex::Error),
  #[error("Embedding error: {0}")]
  Embedding(#[from] EmbeddingError),
  #[error("Store error: {0}")]
  Store(#[from] StoreError),
}

/// Per-request options; unset fields fall back to the search config
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
  pub max_results: Option<usize>,
  pub min_score: Option<f32>,
  pub language: Option<String>,
  pub path_pattern: Option<String>,
}

/// One formatted search result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
  pub rank: usize,
  pub score: f32,
  pub file_path: String,
  pub language: String,
  pub lines: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub symbol_name: Option<String>,
  pub snippet: String,
}

/// Scored hit mid-pipeline, before formatting
struct Ranked {
  hit: SearchHit,
  vector_score: f32,
  final_score: f32,
}

/// Query engine over one collection. Holds the configured provider and
/// store; per-call state is just the query.
pub struct SearchEngine {
  provider: Arc<dyn EmbeddingProvider>,
  store: Arc<dyn VectorStore>,
  collection: String,
  config: SearchConfig,
}

impl SearchEngine {
  pub fn new(
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    collection: impl Into<String>,
    config: SearchConfig,
  ) -> Self {
    Self {
      provider,
      store,
      collection: collection.into(),
      config,
    }
  }

  /// Full query pipeline: preprocess, vector pass, hybrid re-rank,
  /// fallback ladder, path post-filter, formatting.
  pub async fn search(&self, query: &str, request: &SearchRequest) -> Result<Vec<SearchResultItem>, SearchError> {
    if query.trim().is_empty() {
      return Err(SearchError::EmptyQuery);
    }

    // Compile early so a bad pattern fails before any network work
    let path_filter = match &request.path_pattern {
      Some(pattern) => Some(regex::RegexBuilder::new(pattern).case_insensitive(true).build()?),
      None => None,
    };

    let limit = request.max_results.unwrap_or(self.config.max_results).max(1);
    let min_score = request.min_score.unwrap_or(self.config.min_score);
    let preprocessed = preprocess(query);
    debug!(query, %preprocessed, limit, min_score, "Search start");

    // Primary pass
    let mut hits = self.vector_pass(&preprocessed, limit, Some(min_score), &request.language).await?;

    // Fallback ladder
    if hits.is_empty() {
      hits = self.fallback(&preprocessed, limit, min_score, &request.language).await?;
    }

    // Hybrid re-rank; weights come from the raw query's shape
    let mut ranked = match self.config.strategy {
      SearchStrategy::Hybrid => rerank(query, &preprocessed, hits),
      SearchStrategy::Vector => hits
        .into_iter()
        .map(|hit| Ranked {
          vector_score: hit.score,
          final_score: hit.score,
          hit,
        })
        .collect(),
    };

    sort_ranked(&mut ranked);

    // Path post-filter
    if let Some(regex) = &path_filter {
      ranked.retain(|r| regex.is_match(&r.hit.chunk.metadata.file_path));
    }

    ranked.truncate(limit);
    info!(results = ranked.len(), "Search complete");

    Ok(
      ranked
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
          let meta = &r.hit.chunk.metadata;
          SearchResultItem {
            rank: i + 1,
            score: r.final_score,
            file_path: meta.file_path.clone(),
            language: meta.language.as_str().to_string(),
            lines: format!("{}-{}", meta.start_line, meta.end_line),
            symbol_name: meta.symbol_name.clone(),
            snippet: format_snippet(&r.hit.chunk.content, self.config.result_format),
          }
        })
        .collect(),
    )
  }

  async fn vector_pass(
    &self,
    query: &str,
    limit: usize,
    min_score: Option<f32>,
    language: &Option<String>,
  ) -> Result<Vec<SearchHit>, SearchError> {
    let vector = self.provider.embed(query).await?;

    let mut filters = Vec::new();
    if let Some(language) = language {
      filters.push(("language".to_string(), language.to_lowercase()));
    }

    let options = SearchOptions {
      limit,
      min_score,
      filters,
    };
    Ok(self.store.search(&self.collection, &vector, &options).await?)
  }

  /// Fallback ladder: each synonym variant at a scaled threshold,
  /// first non-empty wins; then the primary query again at the floor.
  async fn fallback(
    &self,
    preprocessed: &str,
    limit: usize,
    min_score: f32,
    language: &Option<String>,
  ) -> Result<Vec<SearchHit>, SearchError> {
    let scaled = min_score * FALLBACK_SCORE_SCALE;

    for variant in expand_variants(preprocessed) {
      debug!(%variant, scaled, "Fallback variant pass");
      let hits = self.vector_pass(&variant, limit, Some(scaled), language).await?;
      if !hits.is_empty() {
        return Ok(hits);
      }
    }

    debug!(floor = FALLBACK_FLOOR, "Fallback floor pass");
    self.vector_pass(preprocessed, limit, Some(FALLBACK_FLOOR), language).await
  }
}

/// Combine vector similarity with keyword overlap under dynamic weights
fn rerank(raw_query: &str, preprocessed: &str, hits: Vec<SearchHit>) -> Vec<Ranked> {
  let weights = classify_query(raw_query);
  let query_keywords: HashSet<String> = extract_query_keywords(preprocessed).into_iter().collect();

  hits
    .into_iter()
    .map(|hit| {
      let keyword_score = if query_keywords.is_empty() {
        0.0
      } else {
        let overlap = hit
          .chunk
          .metadata
          .keywords
          .iter()
          .filter(|k| query_keywords.contains(k.as_str()))
          .count();
        overlap as f32 / query_keywords.len() as f32
      };

      let final_score = weights.vector * hit.score + weights.keyword * keyword_score;
      Ranked {
        vector_score: hit.score,
        final_score,
        hit,
      }
    })
    .collect()
}

/// finalScore descending, ties broken by vector score then id
fn sort_ranked(ranked: &mut [Ranked]) {
  ranked.sort_by(|a, b| {
    b.final_score
      .partial_cmp(&a.final_score)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then_with(|| {
        b.vector_score
          .partial_cmp(&a.vector_score)
          .unwrap_or(std::cmp::Ordering::Equal)
      })
      .then_with(|| a.hit.chunk.id.cmp(&b.hit.chunk.id))
  });
}
