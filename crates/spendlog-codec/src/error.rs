//! Error types for spendlog-codec

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Syntax error at {location}: {message}")]
    SyntaxError { location: String, message: String },

    #[error("No balanced object found in reply")]
    NoObject,

    #[error("Field '{key}' is not a scalar value")]
    NotFlat { key: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error")]
    IoError(#[from] io::Error),
}
