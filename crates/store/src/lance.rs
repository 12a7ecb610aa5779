use crate::provider::{CollectionStats, SearchHit, SearchOptions, VectorStore};
use crate::schema::{chunks_schema, vector_dim_of};
use crate::{Result, StoreError};
use arrow_array::{
  Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array,
  UInt64Array,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, connect};
use semantica_core::{Chunk, ChunkMetadata, ChunkType, Language};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// LanceDB-backed vector store. One database directory per project,
/// one table per collection.
pub struct LanceStore {
  connection: Connection,
  path: std::path::PathBuf,
}

impl LanceStore {
  /// Open or create a database at the given directory
  pub async fn connect(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    info!(path = %path.display(), "Opening LanceDB");
    let connection = connect(path.to_string_lossy().as_ref())
      .execute()
      .await
      .map_err(|e| StoreError::Connection(e.to_string()))?;

    Ok(Self {
      connection,
      path: path.to_path_buf(),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  async fn open_table(&self, name: &str) -> Result<lancedb::Table> {
    if !self.collection_exists(name).await? {
      return Err(StoreError::CollectionNotFound(name.to_string()));
    }
    Ok(self.connection.open_table(name).execute().await?)
  }

  async fn table_dim(&self, table: &lancedb::Table) -> Result<usize> {
    let schema = table.schema().await?;
    vector_dim_of(&schema).ok_or_else(|| StoreError::MalformedRow("collection has no vector column".into()))
  }
}

#[async_trait]
impl VectorStore for LanceStore {
  async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
    if self.collection_exists(name).await? {
      return Err(StoreError::CollectionExists(name.to_string()));
    }

    debug!(collection = name, dimensions, "Creating collection");
    self
      .connection
      .create_empty_table(name, chunks_schema(dimensions))
      .execute()
      .await?;
    Ok(())
  }

  async fn delete_collection(&self, name: &str) -> Result<()> {
    if !self.collection_exists(name).await? {
      return Err(StoreError::CollectionNotFound(name.to_string()));
    }
    self.connection.drop_table(name).await?;
    info!(collection = name, "Dropped collection");
    Ok(())
  }

  async fn collection_exists(&self, name: &str) -> Result<bool> {
    let names = self.connection.table_names().execute().await?;
    Ok(names.contains(&name.to_string()))
  }

  async fn insert(&self, name: &str, chunks: &[Chunk]) -> Result<usize> {
    if chunks.is_empty() {
      return Ok(0);
    }

    let table = self.open_table(name).await?;
    let dim = self.table_dim(&table).await?;

    for chunk in chunks {
      if let Some(vector) = &chunk.embedding
        && vector.len() != dim
      {
        return Err(StoreError::DimensionMismatch {
          expected: dim,
          got: vector.len(),
        });
      }
    }

    // Same id replaces the row: clear previous versions first.
    let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    table.delete(&id_predicate(&ids)).await?;

    let batches: Vec<_> = chunks.iter().map(|chunk| chunk_to_batch(chunk, dim)).collect::<Result<_>>()?;
    let iter = RecordBatchIterator::new(batches.into_iter().map(Ok), chunks_schema(dim));
    table.add(Box::new(iter)).execute().await?;

    debug!(collection = name, rows = chunks.len(), "Inserted chunks");
    Ok(chunks.len())
  }

  async fn search(&self, name: &str, vector: &[f32], options: &SearchOptions) -> Result<Vec<SearchHit>> {
    let table = self.open_table(name).await?;

    let mut query = table
      .vector_search(vector.to_vec())?
      .distance_type(DistanceType::Cosine)
      .limit(options.limit.max(1));

    if let Some(predicate) = filter_predicate(&options.filters) {
      query = query.only_if(predicate);
    }

    let results: Vec<RecordBatch> = query.execute().await?.try_collect().await?;

    let mut hits = Vec::new();
    for batch in results {
      for row in 0..batch.num_rows() {
        let chunk = batch_to_chunk(&batch, row)?;
        let distance = batch
          .column_by_name("_distance")
          .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
          .map(|arr| arr.value(row))
          .unwrap_or(0.0);
        // Cosine distance is in [0, 2]; map to a [0, 1] similarity.
        let score = (1.0 - distance).clamp(0.0, 1.0);
        hits.push(SearchHit { chunk, score });
      }
    }

    if let Some(min_score) = options.min_score {
      hits.retain(|hit| hit.score >= min_score);
    }

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(options.limit.max(1));

    Ok(hits)
  }

  async fn delete(&self, name: &str, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
      return Ok(());
    }
    let table = self.open_table(name).await?;
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    table.delete(&id_predicate(&refs)).await?;
    Ok(())
  }

  async fn delete_by_file(&self, name: &str, file_path: &str) -> Result<()> {
    let table = self.open_table(name).await?;
    debug!(collection = name, file = file_path, "Deleting chunks for file");
    table
      .delete(&format!("file_path = '{}'", escape_sql(file_path)))
      .await?;
    Ok(())
  }

  async fn stats(&self, name: &str) -> Result<CollectionStats> {
    let table = self.open_table(name).await?;
    let row_count = table.count_rows(None).await?;
    let dimensions = self.table_dim(&table).await?;

    Ok(CollectionStats {
      name: name.to_string(),
      row_count,
      dimensions,
    })
  }

  async fn health_check(&self) -> bool {
    self.connection.table_names().execute().await.is_ok()
  }

  async fn close(&self) {
    // Connection drops cleanly; nothing to flush beyond insert-time.
    debug!(path = %self.path.display(), "Closing store");
  }
}

fn escape_sql(value: &str) -> String {
  value.replace('\'', "''")
}

fn id_predicate(ids: &[&str]) -> String {
  let list = ids
    .iter()
    .map(|id| format!("'{}'", escape_sql(id)))
    .collect::<Vec<_>>()
    .join(", ");
  format!("id IN ({})", list)
}

/// Conjunctive equality predicate from metadata filters
fn filter_predicate(filters: &[(String, String)]) -> Option<String> {
  if filters.is_empty() {
    return None;
  }
  Some(
    filters
      .iter()
      .map(|(field, value)| format!("{} = '{}'", field, escape_sql(value)))
      .collect::<Vec<_>>()
      .join(" AND "),
  )
}

fn chunk_to_batch(chunk: &Chunk, vector_dim: usize) -> Result<RecordBatch> {
  let meta = &chunk.metadata;

  let id = StringArray::from(vec![chunk.id.clone()]);
  let file_path = StringArray::from(vec![meta.file_path.clone()]);
  let absolute_path = StringArray::from(vec![meta.absolute_path.clone()]);
  let content = StringArray::from(vec![chunk.content.clone()]);
  let language = StringArray::from(vec![meta.language.as_str()]);
  let chunk_type = StringArray::from(vec![meta.chunk_type.as_str()]);
  let granularity = StringArray::from(vec![meta.granularity.clone()]);
  let symbol_name = StringArray::from(vec![meta.symbol_name.clone()]);
  let keywords = StringArray::from(vec![serde_json::to_string(&meta.keywords)?]);
  let dependencies = StringArray::from(vec![
    meta
      .dependencies
      .as_ref()
      .map(|d| serde_json::to_string(d))
      .transpose()?,
  ]);
  let start_line = UInt32Array::from(vec![meta.start_line]);
  let end_line = UInt32Array::from(vec![meta.end_line]);
  let start_char = UInt64Array::from(vec![meta.start_char as u64]);
  let end_char = UInt64Array::from(vec![meta.end_char as u64]);
  let token_count = UInt32Array::from(vec![meta.token_count]);
  let last_modified = Int64Array::from(vec![meta.last_modified as i64]);

  let field = Arc::new(arrow_schema::Field::new("item", arrow_schema::DataType::Float32, true));
  let vector_list = match &chunk.embedding {
    Some(vector) => {
      let values = Float32Array::from(vector.clone());
      FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values), None)?
    }
    None => {
      let values = Float32Array::from(vec![0.0f32; vector_dim]);
      FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values), Some(vec![false].into()))?
    }
  };

  let batch = RecordBatch::try_new(
    chunks_schema(vector_dim),
    vec![
      Arc::new(id),
      Arc::new(file_path),
      Arc::new(absolute_path),
      Arc::new(content),
      Arc::new(language),
      Arc::new(chunk_type),
      Arc::new(granularity),
      Arc::new(symbol_name),
      Arc::new(keywords),
      Arc::new(dependencies),
      Arc::new(start_line),
      Arc::new(end_line),
      Arc::new(start_char),
      Arc::new(end_char),
      Arc::new(token_count),
      Arc::new(last_modified),
      Arc::new(vector_list),
    ],
  )?;

  Ok(batch)
}

fn batch_to_chunk(batch: &RecordBatch, row: usize) -> Result<Chunk> {
  let get_string = |name: &str| -> Result<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
      .ok_or_else(|| StoreError::MalformedRow(format!("column {}", name)))
  };

  let get_opt_string = |name: &str| -> Option<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .and_then(|a| if a.is_null(row) { None } else { Some(a.value(row).to_string()) })
  };

  let get_u32 = |name: &str| -> Result<u32> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| StoreError::MalformedRow(format!("column {}", name)))
  };

  let get_u64 = |name: &str| -> Result<u64> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| StoreError::MalformedRow(format!("column {}", name)))
  };

  let language = Language::from_str_loose(&get_string("language")?)
    .ok_or_else(|| StoreError::MalformedRow("unknown language".into()))?;
  let chunk_type = ChunkType::from_str_loose(&get_string("chunk_type")?);
  let keywords: Vec<String> = serde_json::from_str(&get_string("keywords")?)?;
  let dependencies: Option<Vec<String>> = get_opt_string("dependencies")
    .map(|raw| serde_json::from_str(&raw))
    .transpose()?;

  let token_count = batch
    .column_by_name("token_count")
    .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
    .and_then(|a| if a.is_null(row) { None } else { Some(a.value(row)) });

  let last_modified = batch
    .column_by_name("last_modified")
    .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
    .map(|a| a.value(row))
    .unwrap_or(0) as u64;

  let metadata = ChunkMetadata {
    file_path: get_string("file_path")?,
    absolute_path: get_string("absolute_path")?,
    language,
    start_line: get_u32("start_line")?,
    end_line: get_u32("end_line")?,
    start_char: get_u64("start_char")? as usize,
    end_char: get_u64("end_char")? as usize,
    chunk_type,
    granularity: get_string("granularity")?,
    symbol_name: get_opt_string("symbol_name"),
    keywords,
    dependencies,
    token_count,
    last_modified,
  };

  Ok(Chunk {
    id: get_string("id")?,
    content: get_string("content")?,
    embedding: None,
    metadata,
  })
}
