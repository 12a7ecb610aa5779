use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Schema for a chunk collection. Content and all chunk metadata are
/// co-stored with the vector; `keywords` is a JSON-encoded array.
pub fn chunks_schema(vector_dim: usize) -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("file_path", DataType::Utf8, false),
    Field::new("absolute_path", DataType::Utf8, false),
    Field::new("content", DataType::Utf8, false),
    Field::new("language", DataType::Utf8, false),
    Field::new("chunk_type", DataType::Utf8, false),
    Field::new("granularity", DataType::Utf8, false),
    Field::new("symbol_name", DataType::Utf8, true),
    Field::new("keywords", DataType::Utf8, false),
    Field::new("dependencies", DataType::Utf8, true),
    Field::new("start_line", DataType::UInt32, false),
    Field::new("end_line", DataType::UInt32, false),
    Field::new("start_char", DataType::UInt64, false),
    Field::new("end_char", DataType::UInt64, false),
    Field::new("token_count", DataType::UInt32, true),
    Field::new("last_modified", DataType::Int64, false),
    Field::new(
      "vector",
      DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_dim as i32),
      true,
    ),
  ]))
}

/// Extract the vector dimension from a collection schema.
pub fn vector_dim_of(schema: &Schema) -> Option<usize> {
  schema.fields().iter().find_map(|field| {
    if field.name() == "vector" {
      match field.data_type() {
        DataType::FixedSizeList(_, size) => Some(*size as usize),
        _ => None,
      }
    } else {
      None
    }
  })
}
