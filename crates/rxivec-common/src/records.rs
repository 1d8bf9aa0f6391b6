//! Record types flowing through the pipeline.
//!
//! All three records are immutable once built: a run collects them into a
//! `Vec` and persists the whole table in one shot. The only "update" the
//! pipeline knows is a whole-file overwrite.

use serde::{Deserialize, Serialize};

use crate::corpus::DOI_URL_PREFIX;

/// Metadata extracted from one article document, keyed by DOI.
///
/// Exists only when both the abstract and the DOI were located; a document
/// missing either produces no record at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// DOI, the unique key joining metadata and embeddings.
    pub id: String,
    pub title: String,
    /// Author display names joined ", " in document order.
    pub authors: String,
    pub abstract_text: String,
    /// Resolver URL, always `https://doi.org/` + `id`.
    pub url: String,
}

impl ArticleRecord {
    pub fn new(id: String, title: String, authors: String, abstract_text: String) -> Self {
        let url = format!("{DOI_URL_PREFIX}{id}");
        Self { id, title, authors, abstract_text, url }
    }
}

/// One abstract embedding, keyed by the article's DOI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    /// Dense vector with the model's fixed dimensionality.
    pub vector: Vec<f32>,
}

/// Joined row shaped for vector-database bulk insert: exactly
/// `{id, vector, $meta}`, where `$meta` is the metadata encoded as one
/// JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub meta: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_record_url_is_derived_from_doi() {
        let rec = ArticleRecord::new(
            "10.1101/2024.01.01.573742".to_string(),
            "A title".to_string(),
            "Jane Doe".to_string(),
            "An abstract.".to_string(),
        );
        assert_eq!(rec.url, "https://doi.org/10.1101/2024.01.01.573742");
    }
}
