use crate::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "nomic-embed-text";
const DEFAULT_DIMENSIONS: usize = 768;
const DEFAULT_MAX_TOKENS: usize = 8192;

/// Embedding provider backed by a local daemon (Ollama wire shape).
/// One request per text; batches are a sequential loop. Cost is zero.
#[derive(Debug, Clone)]
pub struct LocalProvider {
  client: reqwest::Client,
  base_url: String,
  model: String,
  dimensions: usize,
  max_tokens: usize,
}

impl Default for LocalProvider {
  fn default() -> Self {
    Self::new()
  }
}

impl LocalProvider {
  pub fn new() -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: DEFAULT_URL.to_string(),
      model: DEFAULT_MODEL.to_string(),
      dimensions: DEFAULT_DIMENSIONS,
      max_tokens: DEFAULT_MAX_TOKENS,
    }
  }

  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.base_url = url.into();
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

  fn embeddings_url(&self) -> String {
    format!("{}/api/embeddings", self.base_url)
  }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
  model: &'a str,
  prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
  embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
  fn name(&self) -> &str {
    "local"
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
    let request = EmbeddingRequest {
      model: &self.model,
      prompt: text,
    };

    debug!(chars = text.len(), "Embedding text with local daemon");

    let response = self.client.post(self.embeddings_url()).json(&request).send().await?;

    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      warn!(status, "Local embedding request failed");
      return Err(EmbeddingError::from_status(status, body));
    }

    let result: EmbeddingResponse = response.json().await?;

    if result.embedding.len() != self.dimensions {
      warn!(
        got = result.embedding.len(),
        expected = self.dimensions,
        "Unexpected embedding dimensions"
      );
    }

    Ok(result.embedding)
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    // The daemon has no batch endpoint; embed sequentially so output
    // order trivially matches input order.
    let mut results = Vec::with_capacity(texts.len());
    for text in texts {
      results.push(self.embed(text).await?);
    }
    Ok(results)
  }

  async fn health_check(&self) -> bool {
    match self
      .client
      .get(&self.base_url)
      .timeout(std::time::Duration::from_secs(5))
      .send()
      .await
    {
      Ok(response) => response.status().is_success(),
      Err(_) => false,
    }
  }

  fn estimate_cost(&self, _tokens: u64) -> f64 {
    0.0
  }
}
