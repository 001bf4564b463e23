use core::fmt;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("No Gemini api key is configured")]
    MissingApiKey,

    #[error("Http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Api error: {0} - {1}")]
    ApiError(StatusCode, String),

    #[error("Model response contained no text")]
    EmptyResponse,

    #[error("Model output is not valid JSON: {source}. Raw output: {raw}")]
    MalformedOutput {
        source: serde_json::Error,
        raw: String,
    },

    #[error("Model output does not match the quiz schema: {0}")]
    SchemaMismatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    MissingApiKey,
    Upstream,
    MalformedOutput,
    SchemaMismatch,
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationErrorKind::MissingApiKey => write!(f, "missing_api_key"),
            GenerationErrorKind::Upstream => write!(f, "upstream"),
            GenerationErrorKind::MalformedOutput => write!(f, "malformed_output"),
            GenerationErrorKind::SchemaMismatch => write!(f, "schema_mismatch"),
        }
    }
}

impl GenerationError {
    pub fn kind(&self) -> GenerationErrorKind {
        match self {
            GenerationError::MissingApiKey => GenerationErrorKind::MissingApiKey,
            GenerationError::Http(_)
            | GenerationError::ApiError(_, _)
            | GenerationError::EmptyResponse => GenerationErrorKind::Upstream,
            GenerationError::MalformedOutput { .. } => GenerationErrorKind::MalformedOutput,
            GenerationError::SchemaMismatch(_) => GenerationErrorKind::SchemaMismatch,
        }
    }
}
