//! Extraction error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Abstract or DOI could not be located; the record is dropped whole.
    #[error("required field missing: {0}")]
    MissingField(&'static str),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
