//! Record ↔ Arrow batch conversion and Parquet file I/O.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchReader, StringArray};
use arrow_schema::{DataType, Field};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use rxivec_common::{ArticleRecord, EmbeddingRecord, MergedRecord};

use crate::error::{Result, StoreError};
use crate::schema::{
    self, embeddings_schema, merged_schema, metadata_schema, COL_ABSTRACT, COL_AUTHORS, COL_ID,
    COL_TITLE, COL_URL, COL_VECTOR,
};

// ── Batch construction ────────────────────────────────────────────────────────

pub fn metadata_to_batch(records: &[ArticleRecord]) -> Result<RecordBatch> {
    let id = StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()));
    let title = StringArray::from_iter_values(records.iter().map(|r| r.title.as_str()));
    let authors = StringArray::from_iter_values(records.iter().map(|r| r.authors.as_str()));
    let abstract_text =
        StringArray::from_iter_values(records.iter().map(|r| r.abstract_text.as_str()));
    let url = StringArray::from_iter_values(records.iter().map(|r| r.url.as_str()));

    RecordBatch::try_new(
        metadata_schema(),
        vec![
            Arc::new(id) as Arc<dyn Array>,
            Arc::new(title),
            Arc::new(authors),
            Arc::new(abstract_text),
            Arc::new(url),
        ],
    )
    .map_err(|e| StoreError::Arrow(e.to_string()))
}

pub fn embeddings_to_batch(records: &[EmbeddingRecord], dim: usize) -> Result<RecordBatch> {
    let id = StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()));
    let vector = vectors_to_list(records.iter().map(|r| r.vector.as_slice()), dim)?;

    RecordBatch::try_new(
        embeddings_schema(dim),
        vec![Arc::new(id) as Arc<dyn Array>, Arc::new(vector)],
    )
    .map_err(|e| StoreError::Arrow(e.to_string()))
}

pub fn merged_to_batch(records: &[MergedRecord], dim: usize) -> Result<RecordBatch> {
    let id = StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()));
    let vector = vectors_to_list(records.iter().map(|r| r.vector.as_slice()), dim)?;
    let meta = StringArray::from_iter_values(records.iter().map(|r| r.meta.as_str()));

    RecordBatch::try_new(
        merged_schema(dim),
        vec![Arc::new(id) as Arc<dyn Array>, Arc::new(vector), Arc::new(meta)],
    )
    .map_err(|e| StoreError::Arrow(e.to_string()))
}

/// Flatten fixed-dimension vectors into one `FixedSizeList` column.
fn vectors_to_list<'a>(
    vectors: impl Iterator<Item = &'a [f32]>,
    dim: usize,
) -> Result<FixedSizeListArray> {
    let mut flat: Vec<f32> = Vec::new();
    for vector in vectors {
        if vector.len() != dim {
            return Err(StoreError::InvalidVectorDimension {
                expected: dim,
                actual: vector.len(),
            });
        }
        flat.extend_from_slice(vector);
    }

    let item = Arc::new(Field::new("item", DataType::Float32, false));
    FixedSizeListArray::try_new(item, dim as i32, Arc::new(Float32Array::from(flat)), None)
        .map_err(|e| StoreError::Arrow(e.to_string()))
}

// ── Batch readers ─────────────────────────────────────────────────────────────

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::MissingColumn(name.to_string()))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::Schema(format!("column {name} is not Utf8")))
}

fn vector_column<'a>(batch: &'a RecordBatch) -> Result<&'a FixedSizeListArray> {
    batch
        .column_by_name(COL_VECTOR)
        .ok_or_else(|| StoreError::MissingColumn(COL_VECTOR.to_string()))?
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| StoreError::Schema(format!("column {COL_VECTOR} is not FixedSizeList")))
}

pub fn batch_to_metadata(batch: &RecordBatch) -> Result<Vec<ArticleRecord>> {
    let id = string_column(batch, COL_ID)?;
    let title = string_column(batch, COL_TITLE)?;
    let authors = string_column(batch, COL_AUTHORS)?;
    let abstract_text = string_column(batch, COL_ABSTRACT)?;
    let url = string_column(batch, COL_URL)?;

    Ok((0..batch.num_rows())
        .map(|row| ArticleRecord {
            id: id.value(row).to_string(),
            title: title.value(row).to_string(),
            authors: authors.value(row).to_string(),
            abstract_text: abstract_text.value(row).to_string(),
            url: url.value(row).to_string(),
        })
        .collect())
}

pub fn batch_to_embeddings(batch: &RecordBatch) -> Result<Vec<EmbeddingRecord>> {
    let id = string_column(batch, COL_ID)?;
    let vectors = vector_column(batch)?;

    (0..batch.num_rows())
        .map(|row| {
            let values = vectors.value(row);
            let floats = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| StoreError::Schema("vector items are not Float32".to_string()))?;
            Ok(EmbeddingRecord {
                id: id.value(row).to_string(),
                vector: floats.values().to_vec(),
            })
        })
        .collect()
}

// ── Parquet I/O ───────────────────────────────────────────────────────────────

pub fn write_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch.map_err(|e| StoreError::Arrow(e.to_string()))?);
    }
    Ok(batches)
}

/// Persist one run's metadata table, overwriting any previous file.
pub fn write_metadata(path: &Path, records: &[ArticleRecord]) -> Result<()> {
    write_batch(path, &metadata_to_batch(records)?)
}

pub fn read_metadata(path: &Path) -> Result<Vec<ArticleRecord>> {
    let mut records = Vec::new();
    for batch in read_batches(path)? {
        records.extend(batch_to_metadata(&batch)?);
    }
    Ok(records)
}

/// Persist one run's embeddings table, overwriting any previous file.
pub fn write_embeddings(path: &Path, records: &[EmbeddingRecord], dim: usize) -> Result<()> {
    write_batch(path, &embeddings_to_batch(records, dim)?)
}

/// Read an embeddings table; the dimensionality comes from the file schema.
pub fn read_embeddings(path: &Path) -> Result<(Vec<EmbeddingRecord>, usize)> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let dim = schema::vector_dimension(&reader.schema())?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| StoreError::Arrow(e.to_string()))?;
        records.extend(batch_to_embeddings(&batch)?);
    }
    Ok((records, dim))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> Vec<ArticleRecord> {
        vec![
            ArticleRecord::new(
                "10.1101/a".to_string(),
                "First".to_string(),
                "Jane Doe, John Smith".to_string(),
                "Abstract one.".to_string(),
            ),
            ArticleRecord::new(
                "10.1101/b".to_string(),
                "Second".to_string(),
                String::new(),
                "Abstract two.".to_string(),
            ),
        ]
    }

    #[test]
    fn test_metadata_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.parquet");

        let records = sample_metadata();
        write_metadata(&path, &records).unwrap();
        let back = read_metadata(&path).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_embeddings_round_trip_keeps_dim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.parquet");

        let records = vec![
            EmbeddingRecord { id: "10.1101/a".to_string(), vector: vec![0.1, 0.2, 0.3] },
            EmbeddingRecord { id: "10.1101/b".to_string(), vector: vec![0.4, 0.5, 0.6] },
        ];
        write_embeddings(&path, &records, 3).unwrap();

        let (back, dim) = read_embeddings(&path).unwrap();
        assert_eq!(dim, 3);
        assert_eq!(back, records);
    }

    #[test]
    fn test_empty_tables_are_valid() {
        let dir = tempfile::tempdir().unwrap();

        let meta_path = dir.path().join("metadata.parquet");
        write_metadata(&meta_path, &[]).unwrap();
        assert!(read_metadata(&meta_path).unwrap().is_empty());

        let emb_path = dir.path().join("embeddings.parquet");
        write_embeddings(&emb_path, &[], 4).unwrap();
        let (records, dim) = read_embeddings(&emb_path).unwrap();
        assert!(records.is_empty());
        assert_eq!(dim, 4);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let records = vec![EmbeddingRecord { id: "x".to_string(), vector: vec![0.1, 0.2] }];
        let err = embeddings_to_batch(&records, 3).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidVectorDimension { expected: 3, actual: 2 }
        ));
    }
}
