// Retry wrapper for embedding providers.
//
// Policy: up to 3 retries with exponential backoff (base 1s, factor 2).
// Retryable: network errors, timeouts, 429, 5xx. Auth failures and
// missing models are fatal and returned immediately.

use crate::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
  pub backoff_multiplier: f64,
  pub request_timeout: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      initial_backoff: Duration::from_secs(1),
      max_backoff: Duration::from_secs(30),
      backoff_multiplier: 2.0,
      request_timeout: Duration::from_secs(60),
    }
  }
}

impl RetryConfig {
  /// Backoff before retry number `attempt` (0-based)
  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
    Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()))
  }
}

/// Whether an error is worth retrying
pub fn is_retryable_error(error: &EmbeddingError) -> bool {
  match error {
    EmbeddingError::RateLimited(_) => true,
    EmbeddingError::Server { .. } => true,
    EmbeddingError::Request(_) => true,
    EmbeddingError::Timeout => true,
    EmbeddingError::Auth(_) | EmbeddingError::ModelUnavailable(_) | EmbeddingError::Provider(_) => false,
  }
}

/// Wraps a provider with per-request timeout and retry/backoff. Batch
/// calls are retried as a whole so one transient 429 does not surface
/// as a batch-level error.
pub struct ResilientProvider<P: EmbeddingProvider> {
  inner: P,
  config: RetryConfig,
}

impl<P: EmbeddingProvider> ResilientProvider<P> {
  pub fn new(provider: P) -> Self {
    Self {
      inner: provider,
      config: RetryConfig::default(),
    }
  }

  pub fn with_config(provider: P, config: RetryConfig) -> Self {
    Self {
      inner: provider,
      config,
    }
  }

  async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, EmbeddingError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EmbeddingError>>,
  {
    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let backoff = self.config.backoff_for_attempt(attempt - 1);
        debug!(attempt, ?backoff, "Retrying embedding request");
        sleep(backoff).await;
      }

      match tokio::time::timeout(self.config.request_timeout, call()).await {
        Ok(Ok(result)) => return Ok(result),
        Ok(Err(e)) => {
          if is_retryable_error(&e) && attempt < self.config.max_retries {
            warn!(attempt = attempt + 1, error = %e, "Retryable embedding error");
            last_error = Some(e);
            continue;
          }
          return Err(e);
        }
        Err(_) => {
          warn!(attempt = attempt + 1, "Embedding request timed out");
          last_error = Some(EmbeddingError::Timeout);
        }
      }
    }

    Err(last_error.unwrap_or_else(|| EmbeddingError::Provider("retries exhausted".to_string())))
  }
}

#[async_trait]
impl<P: EmbeddingProvider + Send + Sync> EmbeddingProvider for ResilientProvider<P> {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn model_id(&self) -> &str {
    self.inner.model_id()
  }

  fn dimensions(&self) -> usize {
    self.inner.dimensions()
  }

  fn max_tokens(&self) -> usize {
    self.inner.max_tokens()
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    self.with_retry(|| self.inner.embed(text)).await
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    self.with_retry(|| self.inner.embed_batch(texts)).await
  }

  async fn health_check(&self) -> bool {
    self.inner.health_check().await
  }

  fn estimate_cost(&self, tokens: u64) -> f64 {
    self.inner.estimate_cost(tokens)
  }

  async fn close(&self) {
    self.inner.close().await
  }
}

/// Wrap any embedding provider with the default retry policy
pub fn wrap_resilient<P: EmbeddingProvider>(provider: P) -> ResilientProvider<P> {
  ResilientProvider::new(provider)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  #[test]
  fn test_retry_config_defaults() {
    let config = RetryConfig::default();
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.initial_backoff, Duration::from_secs(1));
  }

  #[test]
  fn test_backoff_calculation() {
    let config = RetryConfig::default();
    assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(1));
    assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(2));
    assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(4));
  }

  #[test]
  fn test_backoff_respects_max() {
    let config = RetryConfig {
      max_backoff: Duration::from_secs(5),
      ..Default::default()
    };
    assert_eq!(config.backoff_for_attempt(10), Duration::from_secs(5));
  }

  #[test]
  fn test_retryable_classification() {
    assert!(is_retryable_error(&EmbeddingError::RateLimited("429".into())));
    assert!(is_retryable_error(&EmbeddingError::Server {
      status: 503,
      body: String::new()
    }));
    assert!(is_retryable_error(&EmbeddingError::Timeout));
    assert!(!is_retryable_error(&EmbeddingError::Auth("401".into())));
    assert!(!is_retryable_error(&EmbeddingError::ModelUnavailable("404".into())));
    assert!(!is_retryable_error(&EmbeddingError::Provider("bad input".into())));
  }

  /// Provider that rate-limits the first `failures` calls, then succeeds.
  struct FlakyProvider {
    calls: AtomicU32,
    failures: u32,
  }

  impl FlakyProvider {
    fn new(failures: u32) -> Self {
      Self {
        calls: AtomicU32::new(0),
        failures,
      }
    }
  }

  #[async_trait]
  impl EmbeddingProvider for FlakyProvider {
    fn name(&self) -> &str {
      "flaky"
    }
    fn model_id(&self) -> &str {
      "flaky-model"
    }
    fn dimensions(&self) -> usize {
      4
    }
    fn max_tokens(&self) -> usize {
      512
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
      let call = self.calls.fetch_add(1, Ordering::SeqCst);
      if call < self.failures {
        Err(EmbeddingError::RateLimited("slow down".into()))
      } else {
        Ok(vec![0.5; 4])
      }
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
      let call = self.calls.fetch_add(1, Ordering::SeqCst);
      if call < self.failures {
        Err(EmbeddingError::RateLimited("slow down".into()))
      } else {
        Ok(vec![vec![0.5; 4]; texts.len()])
      }
    }

    async fn health_check(&self) -> bool {
      true
    }

    fn estimate_cost(&self, _tokens: u64) -> f64 {
      0.0
    }
  }

  fn fast_retry() -> RetryConfig {
    RetryConfig {
      initial_backoff: Duration::from_millis(1),
      max_backoff: Duration::from_millis(4),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn test_retry_recovers_from_rate_limit() {
    let provider = ResilientProvider::with_config(FlakyProvider::new(1), fast_retry());
    let vectors = provider.embed_batch(&["a", "b"]).await.unwrap();
    assert_eq!(vectors.len(), 2);
  }

  #[tokio::test]
  async fn test_retries_exhausted() {
    let provider = ResilientProvider::with_config(FlakyProvider::new(10), fast_retry());
    let result = provider.embed_batch(&["a"]).await;
    assert!(matches!(result, Err(EmbeddingError::RateLimited(_))));
    // initial attempt + 3 retries
    assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 4);
  }

  /// Auth failures must not be retried.
  struct AuthFailProvider {
    calls: AtomicU32,
  }

  #[async_trait]
  impl EmbeddingProvider for AuthFailProvider {
    fn name(&self) -> &str {
      "authfail"
    }
    fn model_id(&self) -> &str {
      "m"
    }
    fn dimensions(&self) -> usize {
      4
    }
    fn max_tokens(&self) -> usize {
      512
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Err(EmbeddingError::Auth("invalid key".into()))
    }

    async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Err(EmbeddingError::Auth("invalid key".into()))
    }

    async fn health_check(&self) -> bool {
      false
    }

    fn estimate_cost(&self, _tokens: u64) -> f64 {
      0.0
    }
  }

  #[tokio::test]
  async fn test_auth_error_not_retried() {
    let provider = ResilientProvider::with_config(
      AuthFailProvider {
        calls: AtomicU32::new(0),
      },
      fast_retry(),
    );
    let result = provider.embed_batch(&["a"]).await;
    assert!(matches!(result, Err(EmbeddingError::Auth(_))));
    assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
  }
}
