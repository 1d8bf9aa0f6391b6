//! rxivec-extract — JATS article parsing.
//!
//! Turns one preprint XML document into an [`ArticleRecord`]
//! (DOI, title, authors, abstract, resolver URL). Extraction is a pure
//! function of the file bytes: the same document always yields the same
//! record, and a document missing its abstract or DOI yields an error
//! instead of a partial record.

pub mod error;
pub mod jats;

pub use error::{ExtractError, Result};
pub use jats::{extract_file, parse_article};

pub use rxivec_common::ArticleRecord;
