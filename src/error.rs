//! Crate-wide error taxonomy.
//!
//! Kinds mirror the ones named in the design: malformed input, labels
//! missing from a hierarchy, mismatched Bloom filter lengths, and I/O
//! failures. Every fallible public operation returns `Result<T, LinkError>`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("unknown label {label:?} in hierarchy for attribute {attribute:?}")]
    UnknownLabel { attribute: String, label: String },

    #[error("bloom filter size mismatch: expected {expected} bits, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV failure: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;

impl LinkError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        LinkError::InvalidInput { message: message.into() }
    }

    pub fn unknown_label(attribute: impl Into<String>, label: impl Into<String>) -> Self {
        LinkError::UnknownLabel { attribute: attribute.into(), label: label.into() }
    }
}
