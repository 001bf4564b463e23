use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use tracing::{info, warn};

use crate::{
    common::{
        app_state::AppState,
        server_error::{REQUIRED_FIELDS_MSG, ServerError},
    },
    quiz::models::{GenerateQuizRequest, QuizRequest},
};

pub fn quiz_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/generate-quiz",
            post(generate_quiz).fallback(method_not_allowed),
        )
        .route("/generate", post(generate_quiz).fallback(method_not_allowed))
        .with_state(state)
}

async fn method_not_allowed() -> ServerError {
    ServerError::MethodNotAllowed
}

async fn generate_quiz(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GenerateQuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServerError> {
    let Json(body) = body.map_err(|e| {
        warn!("Unreadable generate body: {}", e);
        ServerError::Validation(REQUIRED_FIELDS_MSG.into())
    })?;

    let request = QuizRequest::try_from(body)?;
    info!(
        "Generating {} questions about '{}'",
        request.question_count, request.topic
    );

    let quiz = state
        .get_gemini()
        .generate_quiz(state.get_client(), &request)
        .await?;

    Ok((StatusCode::OK, Json(quiz)))
}
