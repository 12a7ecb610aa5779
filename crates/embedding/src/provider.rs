use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
  /// 401 from the backend. Fatal, never retried.
  #[error("Authentication failed: {0}")]
  Auth(String),
  /// The configured model does not exist on the backend. Fatal.
  #[error("Model unavailable: {0}")]
  ModelUnavailable(String),
  /// 429 from the backend. Retryable.
  #[error("Rate limited: {0}")]
  RateLimited(String),
  /// 5xx from the backend. Retryable.
  #[error("Server error {status}: {body}")]
  Server { status: u16, body: String },
  /// Transport-level failure. Retryable.
  #[error("Request failed: {0}")]
  Request(#[from] reqwest::Error),
  /// Non-retryable provider-side rejection (bad input etc.)
  #[error("Provider error: {0}")]
  Provider(String),
  #[error("Request timed out")]
  Timeout,
}

impl EmbeddingError {
  /// Classify a non-success HTTP response into the error taxonomy.
  pub fn from_status(status: u16, body: String) -> Self {
    match status {
      401 | 403 => EmbeddingError::Auth(body),
      404 => EmbeddingError::ModelUnavailable(body),
      429 => EmbeddingError::RateLimited(body),
      500..=599 => EmbeddingError::Server { status, body },
      _ => EmbeddingError::Provider(format!("status {}: {}", status, body)),
    }
  }

  /// Fatal errors abort the whole operation instead of becoming
  /// batch-level entries in the result's error list.
  pub fn is_fatal(&self) -> bool {
    matches!(self, EmbeddingError::Auth(_) | EmbeddingError::ModelUnavailable(_))
  }
}

/// A text-to-vector backend.
///
/// Contract: for every successful `embed_batch` of N texts, output\[i\]
/// is the vector for input\[i\]. Implementations receiving indexed
/// results must sort by index before returning.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
  fn name(&self) -> &str;
  fn model_id(&self) -> &str;
  fn dimensions(&self) -> usize;
  fn max_tokens(&self) -> usize;

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
  async fn health_check(&self) -> bool;

  /// Estimated USD cost of embedding `tokens` tokens.
  fn estimate_cost(&self, tokens: u64) -> f64;

  /// Release any held connections. Must be safe to call more than once;
  /// the pipeline calls this unconditionally, including on failure.
  async fn close(&self) {}
}
