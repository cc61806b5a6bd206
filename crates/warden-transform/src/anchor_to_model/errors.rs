use thiserror::Error;
use warden_core::{ModelError, ParseError, SourceSpan};
use warden_core::source_location::SourceLocationError;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: u32,
        column: u32,
        message: String,
        span: SourceSpan,
    },

    #[error("Invalid attribute at line {line}, column {column}: {message}")]
    InvalidAttribute {
        line: u32,
        column: u32,
        message: String,
        span: SourceSpan,
    },

    #[error("Missing required field: {field} in {node_type}")]
    MissingField { field: String, node_type: String },

    #[error("Language error: {0}")]
    Language(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Source error: {0}")]
    Source(#[from] SourceLocationError),
}

impl TransformError {
    pub fn missing(field: &str, node_type: &str) -> Self {
        TransformError::MissingField {
            field: field.to_string(),
            node_type: node_type.to_string(),
        }
    }
}

impl From<TransformError> for ParseError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::ParseError {
                line,
                column,
                message,
                span,
            }
            | TransformError::InvalidAttribute {
                line,
                column,
                message,
                span,
            } => ParseError {
                message,
                span,
                line,
                column,
            },
            other => ParseError {
                message: other.to_string(),
                span: SourceSpan::default(),
                line: 0,
                column: 0,
            },
        }
    }
}

impl From<TransformError> for warden_core::WardenError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::Model(e) => warden_core::WardenError::Model(e),
            TransformError::Source(e) => warden_core::WardenError::Source(e),
            other => warden_core::WardenError::Parse(other.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
