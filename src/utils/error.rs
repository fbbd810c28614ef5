//! Crate level error type

use crate::services::plan_analyzer::parser::ParseError;
use thiserror::Error;

/// Errors surfaced by the public analysis entry points
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Plan parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
