//! rxivec-store — columnar persistence for pipeline artifacts.
//!
//! Three Parquet tables, written whole once per run:
//!
//! - metadata:   `[id, Title, Authors, Abstract, URL]`
//! - embeddings: `[id, vector]` (fixed-size Float32 list)
//! - merged:     `[id, vector, $meta]`, the exact three-column shape a
//!   vector database bulk-insert expects
//!
//! Batches are built in one shot from an in-memory record `Vec`; there is
//! no incremental append.

pub mod error;
pub mod merge;
pub mod schema;
pub mod tables;

pub use error::{Result, StoreError};
pub use merge::{merge_files, MergeSummary};
pub use schema::{embeddings_schema, merged_schema, metadata_schema};
pub use tables::{read_embeddings, read_metadata, write_embeddings, write_metadata};
