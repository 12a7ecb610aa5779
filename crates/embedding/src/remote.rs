use crate::{EmbeddingError, EmbeddingProvider, price_per_million_tokens};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const DEFAULT_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;
const DEFAULT_MAX_TOKENS: usize = 8191;
const DEFAULT_CONCURRENCY: usize = 4;

/// Hard cap on texts per request imposed by the batch endpoint.
pub const MAX_BATCH_TEXTS: usize = 2048;

/// Embedding provider backed by a remote batch API (OpenAI wire shape).
/// Oversized batches are split into sub-batches of at most
/// [`MAX_BATCH_TEXTS`] and the outputs concatenated in input order;
/// sub-batch requests run under a concurrency ceiling.
#[derive(Debug, Clone)]
pub struct RemoteProvider {
  client: reqwest::Client,
  endpoint: String,
  api_key: String,
  model: String,
  dimensions: usize,
  max_tokens: usize,
  request_limit: Arc<Semaphore>,
}

impl RemoteProvider {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      endpoint: DEFAULT_URL.to_string(),
      api_key: api_key.into(),
      model: DEFAULT_MODEL.to_string(),
      dimensions: DEFAULT_DIMENSIONS,
      max_tokens: DEFAULT_MAX_TOKENS,
      request_limit: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
    }
  }

  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into();
    self
  }

  pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
    self.model = model.into();
    self.dimensions = dimensions;
    self
  }

  pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
    self.max_tokens = max_tokens;
    self
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.request_limit = Arc::new(Semaphore::new(concurrency.max(1)));
    self
  }

  /// One request against the batch endpoint. Results are sorted by the
  /// response's index field before returning.
  async fn request_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let request = BatchRequest {
      model: &self.model,
      input: texts,
    };

    debug!(texts = texts.len(), "Embedding batch with remote API");

    let response = self
      .client
      .post(&self.endpoint)
      .header("Authorization", format!("Bearer {}", self.api_key))
      .header("Content-Type", "application/json")
      .json(&request)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      warn!(status, "Remote embedding request failed");
      return Err(EmbeddingError::from_status(status, body));
    }

    let mut result: BatchResponse = response.json().await?;

    if result.data.len() != texts.len() {
      return Err(EmbeddingError::Provider(format!(
        "expected {} embeddings, got {}",
        texts.len(),
        result.data.len()
      )));
    }

    result.data.sort_by_key(|d| d.index);
    Ok(result.data.into_iter().map(|d| d.embedding).collect())
  }
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
  model: &'a str,
  input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
  data: Vec<BatchEntry>,
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
  index: usize,
  embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
  fn name(&self) -> &str {
    "remote"
  }

  fn model_id(&self) -> &str {
    &self.model
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  fn max_tokens(&self) -> usize {
    self.max_tokens
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let mut vectors = self.embed_batch(&[text]).await?;
    vectors
      .pop()
      .ok_or_else(|| EmbeddingError::Provider("no embedding in response".into()))
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if texts.is_empty() {
      return Ok(Vec::new());
    }

    if texts.len() <= MAX_BATCH_TEXTS {
      let _permit = self
        .request_limit
        .acquire()
        .await
        .map_err(|_| EmbeddingError::Provider("request limiter closed".into()))?;
      return self.request_batch(texts).await;
    }

    // Split into sub-batches; join preserves sub-batch order, so the
    // concatenated output stays aligned with the input.
    let futures: Vec<_> = texts
      .chunks(MAX_BATCH_TEXTS)
      .map(|sub| {
        let limit = self.request_limit.clone();
        async move {
          let _permit = limit
            .acquire()
            .await
            .map_err(|_| EmbeddingError::Provider("request limiter closed".into()))?;
          self.request_batch(sub).await
        }
      })
      .collect();

    let results = futures::future::join_all(futures).await;

    let mut vectors = Vec::with_capacity(texts.len());
    for result in results {
      vectors.extend(result?);
    }
    Ok(vectors)
  }

  async fn health_check(&self) -> bool {
    // Cloud endpoint; a usable configuration means a non-empty key.
    !self.api_key.is_empty()
  }

  fn estimate_cost(&self, tokens: u64) -> f64 {
    tokens as f64 * price_per_million_tokens(&self.model) / 1e6
  }
}
