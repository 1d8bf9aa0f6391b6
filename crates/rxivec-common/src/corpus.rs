//! File-naming conventions for a preprint corpus.
//!
//! A corpus is identified by its server prefix ("bio" for bioRxiv, "med"
//! for medRxiv). Every artifact of a run derives its default name from
//! that prefix, so the bio and med pipelines can share one output
//! directory without colliding.

/// Prefix of every synthesized article URL.
pub const DOI_URL_PREFIX: &str = "https://doi.org/";

/// Default input directory holding the XML dump, e.g. `biorxiv-xml-dump`.
pub fn xml_dump_dir(prefix: &str) -> String {
    format!("{prefix}rxiv-xml-dump")
}

pub fn metadata_file(prefix: &str) -> String {
    format!("{prefix}rxiv_metadata.parquet")
}

pub fn embeddings_file(prefix: &str) -> String {
    format!("{prefix}rxiv_embeddings.parquet")
}

/// The merged `[id, vector, $meta]` table, the artifact a vector database
/// bulk-loads.
pub fn merged_file(prefix: &str) -> String {
    format!("{prefix}rxiv_embeddings_metadata.parquet")
}

pub fn metadata_error_log(prefix: &str) -> String {
    format!("{prefix}rxiv_metadata_errors.txt")
}

pub fn embed_error_log(prefix: &str) -> String {
    format!("{prefix}rxiv_embed_errors.txt")
}
