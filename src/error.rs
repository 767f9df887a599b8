//! Error types for the mapping pipeline.
//!
//! Collaborator failures (data source, language model) are typed here and
//! wrapped in a single [`PipelineError`] that names the stage which failed.
//! Parser anomalies and validation failures are not errors; see
//! [`crate::agent::parser`] and [`crate::models::validate_suggestions`].

use crate::agent::orchestrator::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of the data source provider.
#[derive(Debug, Error)]
pub enum SourceDataError {
    #[error("Failed to read data source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed data source document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a language-model call.
#[derive(Debug, Error)]
pub enum ModelInvocationError {
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Cannot connect to model endpoint at {url}")]
    Connect { url: String },

    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("Model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode model response: {0}")]
    InvalidResponse(String),
}

/// Top-level orchestration failure. Always identifies the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    SourceData {
        stage: Stage,
        #[source]
        source: SourceDataError,
    },

    #[error("{stage} stage failed: {source}")]
    ModelInvocation {
        stage: Stage,
        #[source]
        source: ModelInvocationError,
    },
}

impl PipelineError {
    pub fn source_data(stage: Stage, source: SourceDataError) -> Self {
        PipelineError::SourceData { stage, source }
    }

    pub fn model(stage: Stage, source: ModelInvocationError) -> Self {
        PipelineError::ModelInvocation { stage, source }
    }

    /// The stage that was running when the failure happened.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::SourceData { stage, .. } => *stage,
            PipelineError::ModelInvocation { stage, .. } => *stage,
        }
    }
}
