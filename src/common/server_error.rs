use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::ALLOW},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::{client::gemini_client_error::GenerationError, saved::store::StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Quiz generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Failed to save quiz: {0}")]
    Save(StoreError),

    #[error("Failed to load quizzes: {0}")]
    Load(StoreError),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Http client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub static REQUIRED_FIELDS_MSG: &str = "Topic and numQuestions are required";
pub static GENERATION_FAILED_MSG: &str = "Failed to generate quiz. See logs.";
pub static SAVE_FIELDS_MSG: &str = "Topic and quiz are required";
pub static SAVE_FAILED_MSG: &str = "Failed to save quiz";
pub static LOAD_FAILED_MSG: &str = "Failed to load quizzes";

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::MethodNotAllowed => {
                let body = Json(ErrorBody::new("Method Not Allowed"));
                let mut response = (StatusCode::METHOD_NOT_ALLOWED, body).into_response();
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("POST"));
                return response;
            }
            ServerError::Validation(msg) => {
                warn!("Rejected request: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            ServerError::Generation(e) => {
                error!("Error generating quiz ({}): {}", e.kind(), e);
                (StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED_MSG.into())
            }
            ServerError::Save(e) => {
                error!("Error saving quiz: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, SAVE_FAILED_MSG.into())
            }
            ServerError::Load(e) => {
                error!("Error loading quizzes: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, LOAD_FAILED_MSG.into())
            }
            ServerError::Sqlx(e) => {
                error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
            ServerError::Migrate(e) => {
                error!("Migration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
            ServerError::Http(e) => {
                error!("Http client error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
