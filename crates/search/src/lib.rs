//! Query path: preprocessing and expansion, vector search, hybrid
//! re-ranking with dynamic weights, progressive fallback, and result
//! formatting.

mod engine;
mod format;
mod query;

pub use engine::{SearchEngine, SearchError, SearchRequest, SearchResultItem};
pub use format::format_snippet;
pub use query::{QueryWeights, classify_query, expand_variants, extract_query_keywords, preprocess};
