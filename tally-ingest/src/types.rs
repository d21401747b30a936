use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do when no header matches a canonical column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderFallback {
    /// Guess: first column is the description, second is the amount
    #[default]
    Positional,
    /// No guessing; missing columns stay absent (description becomes blank)
    Skip,
    /// Missing description or amount header is an error
    Strict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardizeOptions {
    pub header_fallback: HeaderFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub header_fallback: HeaderFallback,
    /// Retry an undecodable file once, dropping invalid UTF-8 sequences
    pub lossy_decode: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            header_fallback: HeaderFallback::Positional,
            lossy_decode: true,
        }
    }
}

impl LoadOptions {
    pub fn standardize(&self) -> StandardizeOptions {
        StandardizeOptions {
            header_fallback: self.header_fallback,
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid UTF-8 at byte {offset}")]
    Decode { offset: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed CSV: line {line} has {found} fields, header has {expected}")]
    Malformed {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("CSV output is not valid UTF-8: {0}")]
    Encode(#[from] std::string::FromUtf8Error),

    #[error("No header row")]
    EmptyInput,

    #[error("Missing required column: {0}")]
    MissingHeader(&'static str),
}

pub type Result<T> = std::result::Result<T, IngestError>;
