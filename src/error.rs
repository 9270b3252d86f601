//! Typed errors for the normalization, chunking, and document-reading core.
//!
//! The CLI layer wraps these in `anyhow` with additional context; library
//! callers can match on the variant.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A raw grid whose rows disagree on width, or whose merge regions
    /// fall outside its bounds.
    #[error("invalid grid: {0}")]
    Grid(String),

    #[error("unsupported document type: {0}")]
    UnsupportedFormat(String),

    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),

    /// A chunk file name that does not follow the `{base}_{sheet}_{tag}.json`
    /// convention.
    #[error("invalid chunk file name '{name}': {reason}")]
    FileName { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Ooxml(e.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Ooxml(e.to_string())
    }
}
