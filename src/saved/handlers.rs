use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures::{Stream, stream};
use tracing::{error, info, warn};

use crate::{
    auth::models::Subject,
    common::{
        app_state::AppState,
        server_error::{LOAD_FAILED_MSG, SAVE_FIELDS_MSG, ServerError},
    },
    quiz::models::Quiz,
    saved::{models::SaveQuizRequest, store::Subscription},
};

pub static RECORDS_EVENT: &str = "records";
pub static ERROR_EVENT: &str = "error";

pub fn saved_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_saved_quizzes).post(save_quiz))
        .route("/subscribe", get(subscribe_saved_quizzes))
        .with_state(state)
}

async fn save_quiz(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    body: Result<Json<SaveQuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServerError> {
    let Json(request) = body.map_err(|e| {
        warn!("Unreadable save body: {}", e);
        ServerError::Validation(SAVE_FIELDS_MSG.into())
    })?;

    let quiz = request
        .quiz
        .into_iter()
        .enumerate()
        .map(|(idx, q)| q.validated(idx))
        .collect::<Result<Quiz, String>>()
        .map_err(ServerError::Validation)?;

    if subject.is_degraded() {
        info!("Saving under a local fallback id, the record will not be shared");
    }

    let record = state
        .get_store()
        .save(&subject.user_id(), &request.topic, &quiz)
        .await
        .map_err(ServerError::Save)?;

    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_saved_quizzes(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
) -> Result<impl IntoResponse, ServerError> {
    let records = state
        .get_store()
        .list(&subject.user_id())
        .await
        .map_err(ServerError::Load)?;

    Ok((StatusCode::OK, Json(records)))
}

async fn subscribe_saved_quizzes(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.get_store().subscribe(subject.user_id());

    Sse::new(record_events(subscription))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Each full record set becomes one `records` event. A failed feed sends a
/// final `error` event and closes the stream. The subscription is dropped
/// with the stream when the client disconnects.
fn record_events(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some(subscription), |state| async move {
        let mut subscription = state?;

        match subscription.next().await? {
            Ok(records) => {
                let event = match Event::default().event(RECORDS_EVENT).json_data(&records) {
                    Ok(event) => event,
                    Err(e) => {
                        error!("Failed to encode saved quizzes: {}", e);
                        failure_event()
                    }
                };
                Some((Ok(event), Some(subscription)))
            }
            Err(e) => {
                error!("Saved quiz feed failed: {}", e);
                Some((Ok(failure_event()), None))
            }
        }
    })
}

fn failure_event() -> Event {
    Event::default().event(ERROR_EVENT).data(LOAD_FAILED_MSG)
}
