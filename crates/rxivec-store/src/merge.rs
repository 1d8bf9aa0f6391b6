//! Inner join of the embeddings and metadata tables.
//!
//! Output is the vector-database load file: `[id, vector, $meta]` where
//! `$meta` packs Title, Authors, Abstract and URL into one JSON string
//! with exactly that key order. Ids present in only one input table are
//! silently dropped; that asymmetry is the contract, not an accident.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};

use rxivec_common::{ArticleRecord, EmbeddingRecord, MergedRecord};

use crate::error::Result;
use crate::tables::{merged_to_batch, read_embeddings, read_metadata, write_batch};

/// `$meta` payload. Field order here is the key order in the output JSON.
#[derive(Serialize)]
struct MetaFields<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Authors")]
    authors: &'a str,
    #[serde(rename = "Abstract")]
    abstract_text: &'a str,
    #[serde(rename = "URL")]
    url: &'a str,
}

fn meta_json(record: &ArticleRecord) -> Result<String> {
    let fields = MetaFields {
        title: &record.title,
        authors: &record.authors,
        abstract_text: &record.abstract_text,
        url: &record.url,
    };
    Ok(serde_json::to_string(&fields)?)
}

#[derive(Debug, Clone)]
pub struct MergeSummary {
    pub embeddings_rows: usize,
    pub metadata_rows: usize,
    pub merged_rows: usize,
}

/// Inner-join records on id, keeping the embeddings table's row order so
/// repeated merges of the same inputs produce identical files.
pub fn join_records(
    embeddings: &[EmbeddingRecord],
    metadata: &[ArticleRecord],
) -> Result<Vec<MergedRecord>> {
    let by_id: HashMap<&str, &ArticleRecord> =
        metadata.iter().map(|m| (m.id.as_str(), m)).collect();

    embeddings
        .iter()
        .filter_map(|e| {
            by_id.get(e.id.as_str()).map(|m| {
                Ok(MergedRecord {
                    id: e.id.clone(),
                    vector: e.vector.clone(),
                    meta: meta_json(m)?,
                })
            })
        })
        .collect()
}

/// Read both tables, join, and write the merged table.
#[instrument]
pub fn merge_files(
    embeddings_path: &Path,
    metadata_path: &Path,
    output_path: &Path,
) -> Result<MergeSummary> {
    let (embeddings, dim) = read_embeddings(embeddings_path)?;
    let metadata = read_metadata(metadata_path)?;

    let merged = join_records(&embeddings, &metadata)?;
    write_batch(output_path, &merged_to_batch(&merged, dim)?)?;

    let summary = MergeSummary {
        embeddings_rows: embeddings.len(),
        metadata_rows: metadata.len(),
        merged_rows: merged.len(),
    };
    info!(
        embeddings = summary.embeddings_rows,
        metadata = summary.metadata_rows,
        merged = summary.merged_rows,
        "Merge complete"
    );
    Ok(summary)
}
