//! rxivec-common — Shared record types and corpus conventions used across all rxivec crates.

pub mod corpus;
pub mod records;

// Re-export commonly used types
pub use records::{ArticleRecord, EmbeddingRecord, MergedRecord};
