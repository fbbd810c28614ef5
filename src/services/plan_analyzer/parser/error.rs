//! Parser error types for binary plan analysis

use thiserror::Error;

/// Errors that can occur while decoding or parsing a binary plan
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid base64 payload: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Invalid snappy stream: {0}")]
    SnappyError(#[from] snap::Error),

    #[error("Invalid protobuf payload: {0}")]
    ProtobufError(#[from] prost::DecodeError),

    #[error("Invalid plan payload: {0}")]
    PayloadError(String),

    #[error("Invalid execution info '{input}': {reason}")]
    ExecInfoError { input: String, reason: String },

    #[error("Failed to parse number: {0}")]
    ParseNumberError(String),

    #[error("Failed to parse duration: {0}")]
    ParseDurationError(String),

    #[error("Failed to parse percentage: {0}")]
    ParsePercentageError(String),
}

impl ParseError {
    pub fn exec_info(input: &str, reason: impl Into<String>) -> Self {
        Self::ExecInfoError { input: input.to_string(), reason: reason.into() }
    }
}

/// Result type alias for parser operations
pub type ParseResult<T> = Result<T, ParseError>;
