use crate::builder::ModelError;
use crate::config::ConfigError;
use crate::finding::FindingId;
use crate::source_location::{SourceLocationError, SourceSpan};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed source. Fatal for the file being analyzed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub span: SourceSpan,
    pub line: u32,
    pub column: u32,
}

/// A rule predicate failed; that rule contributes no findings for this run.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("rule {rule_id} failed: {message}")]
pub struct RuleEvaluationError {
    pub rule_id: String,
    pub message: String,
}

/// A planned edit no longer matches the source it was computed against.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("source drifted at byte {}: expected {expected:?}, found {found:?}", .span.start)]
pub struct ModelDriftError {
    pub span: SourceSpan,
    pub expected: String,
    pub found: String,
    pub finding_refs: Vec<FindingId>,
}

/// Two correlation rules issued incompatible directives for one finding.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("conflicting directives for {finding}: {kept_rule} ({kept}) wins over {suppressed_rule} ({suppressed})")]
pub struct CorrelationConflictUnresolved {
    pub finding: FindingId,
    pub kept_rule: String,
    pub kept: String,
    pub suppressed_rule: String,
    pub suppressed: String,
}

#[derive(Error, Debug)]
pub enum WardenError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    RuleEvaluation(#[from] RuleEvaluationError),
    #[error(transparent)]
    ModelDrift(#[from] ModelDriftError),
    #[error(transparent)]
    CorrelationConflict(#[from] CorrelationConflictUnresolved),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Source error: {0}")]
    Source(#[from] SourceLocationError),
}

impl WardenError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WardenError::Parse(_) => "parse_error",
            WardenError::RuleEvaluation(_) => "rule_evaluation_error",
            WardenError::ModelDrift(_) => "model_drift_error",
            WardenError::CorrelationConflict(_) => "correlation_conflict_unresolved",
            WardenError::Config(_) => "config_error",
            WardenError::Model(_) => "model_error",
            WardenError::Source(_) => "source_error",
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let line = match self {
            WardenError::Parse(e) => Some(e.line),
            _ => None,
        };
        Diagnostic {
            kind: self.kind().to_string(),
            message: self.to_string(),
            line,
        }
    }
}

/// Structured error object surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl From<&WardenError> for Diagnostic {
    fn from(err: &WardenError) -> Self {
        err.to_diagnostic()
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
