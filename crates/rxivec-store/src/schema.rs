//! Arrow schemas for the three pipeline tables.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

use crate::error::{Result, StoreError};

pub const COL_ID: &str = "id";
pub const COL_TITLE: &str = "Title";
pub const COL_AUTHORS: &str = "Authors";
pub const COL_ABSTRACT: &str = "Abstract";
pub const COL_URL: &str = "URL";
pub const COL_VECTOR: &str = "vector";
/// The `$meta` side-channel column consumed by the vector database.
pub const COL_META: &str = "$meta";

pub fn metadata_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(COL_ID, DataType::Utf8, false),
        Field::new(COL_TITLE, DataType::Utf8, false),
        Field::new(COL_AUTHORS, DataType::Utf8, false),
        Field::new(COL_ABSTRACT, DataType::Utf8, false),
        Field::new(COL_URL, DataType::Utf8, false),
    ]))
}

fn vector_field(dim: usize) -> Field {
    Field::new(
        COL_VECTOR,
        DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), dim as i32),
        false,
    )
}

pub fn embeddings_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(COL_ID, DataType::Utf8, false),
        vector_field(dim),
    ]))
}

pub fn merged_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(COL_ID, DataType::Utf8, false),
        vector_field(dim),
        Field::new(COL_META, DataType::Utf8, false),
    ]))
}

/// Read the vector dimensionality back out of a persisted schema.
pub fn vector_dimension(schema: &Schema) -> Result<usize> {
    let field = schema
        .field_with_name(COL_VECTOR)
        .map_err(|_| StoreError::MissingColumn(COL_VECTOR.to_string()))?;
    match field.data_type() {
        DataType::FixedSizeList(_, dim) => Ok(*dim as usize),
        other => Err(StoreError::Schema(format!(
            "column {COL_VECTOR} is {other}, expected FixedSizeList<Float32>"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_dimension_round_trips() {
        assert_eq!(vector_dimension(&embeddings_schema(1024)).unwrap(), 1024);
        assert_eq!(vector_dimension(&merged_schema(768)).unwrap(), 768);
    }

    #[test]
    fn test_metadata_schema_has_no_vector() {
        assert!(vector_dimension(&metadata_schema()).is_err());
    }
}
