//! Vector storage behind a backend-agnostic trait, with a LanceDB
//! implementation. Chunk content and metadata are co-stored in each
//! row so search responses render without re-reading source files.

mod error;
mod lance;
mod provider;
mod schema;

pub use error::{Result, StoreError};
pub use lance::LanceStore;
pub use provider::{CollectionStats, SearchHit, SearchOptions, VectorStore};
