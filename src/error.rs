use thiserror::Error;

use crate::inference::Stage;

#[derive(Error, Debug)]
pub enum GradeError {
    #[error("Missing required columns: {}", .missing.join(", "))]
    Schema {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("Input is empty: a header row is required")]
    EmptyInput,

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Batch insert failed, no rows persisted: {0}")]
    StoreWrite(String),

    #[error("No identifier left above the largest stored id")]
    IdentifierSpaceExhausted,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Prediction pipeline not available, missing artifacts: {}", .missing.join(", "))]
    PipelineUnavailable { missing: Vec<String> },

    #[error("Transform stage '{stage}' failed: {reason}")]
    TransformFailure { stage: Stage, reason: String },

    #[error("No grade values stored, baseline unavailable")]
    NoBaselineData,

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for GradeError {
    fn from(e: rusqlite::Error) -> Self {
        GradeError::Storage(e.to_string())
    }
}

impl GradeError {
    /// Short stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GradeError::Schema { .. } => "schema",
            GradeError::EmptyInput => "empty_input",
            GradeError::Csv(_) => "csv",
            GradeError::StoreWrite(_) => "store_write",
            GradeError::IdentifierSpaceExhausted => "identifier_space_exhausted",
            GradeError::Storage(_) => "storage",
            GradeError::PipelineUnavailable { .. } => "pipeline_unavailable",
            GradeError::TransformFailure { .. } => "transform_failure",
            GradeError::NoBaselineData => "no_baseline_data",
            GradeError::Json(_) => "json",
            GradeError::Toml(_) => "toml",
            GradeError::Io(_) => "io",
            GradeError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, GradeError>;
