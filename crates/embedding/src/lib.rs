//! Embedding providers: a local HTTP daemon and a remote batch API,
//! both behind one trait, with retry/backoff wrapping.

mod local;
mod pricing;
mod provider;
mod remote;
mod resilient;

pub use local::LocalProvider;
pub use pricing::price_per_million_tokens;
pub use provider::{EmbeddingError, EmbeddingProvider};
pub use remote::RemoteProvider;
pub use resilient::{ResilientProvider, RetryConfig, is_retryable_error, wrap_resilient};

use semantica_core::{EmbeddingConfig, EmbeddingProviderKind};
use std::sync::Arc;
use std::time::Duration;

/// Build the configured provider, wrapped with retry logic. The
/// concrete variant is resolved here, at config time, and passed
/// around as a value from then on.
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
  let retry = RetryConfig {
    request_timeout: Duration::from_secs(config.request_timeout_secs),
    ..RetryConfig::default()
  };

  match config.provider {
    EmbeddingProviderKind::Local => {
      let provider = LocalProvider::new()
        .with_url(&config.base_url)
        .with_model(&config.model, config.dimensions)
        .with_max_tokens(config.max_tokens);
      Ok(Arc::new(ResilientProvider::with_config(provider, retry)))
    }
    EmbeddingProviderKind::Remote => {
      let api_key = config.api_key.clone().unwrap_or_default();
      if api_key.is_empty() {
        return Err(EmbeddingError::Auth("remote provider requires an API key".into()));
      }
      let provider = RemoteProvider::new(api_key)
        .with_model(&config.model, config.dimensions)
        .with_max_tokens(config.max_tokens)
        .with_concurrency(config.concurrency);
      Ok(Arc::new(ResilientProvider::with_config(provider, retry)))
    }
  }
}
