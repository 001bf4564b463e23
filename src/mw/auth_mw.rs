use axum::{
    body::Body,
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::models::Subject;

pub static GUEST_AUTHENTICATION: &str = "X-Guest-Authentication";

/// Resolves the caller's guest id. A missing or malformed id degrades to a
/// fresh local id instead of rejecting the request.
pub async fn auth_mw(mut req: Request<Body>, next: Next) -> Response {
    let subject = match extract_header(GUEST_AUTHENTICATION, req.headers()) {
        Some(value) => match value.trim().parse::<Uuid>() {
            Ok(id) => Subject::Guest(id),
            Err(_) => {
                warn!("Guest id has invalid format, using a local fallback id");
                Subject::Local(Uuid::new_v4())
            }
        },
        None => {
            warn!("Missing guest id, using a local fallback id");
            Subject::Local(Uuid::new_v4())
        }
    };

    debug!("Request by subject: {:?}", subject);
    req.extensions_mut().insert(subject);

    next.run(req).await
}

fn extract_header(key: &str, header_map: &HeaderMap) -> Option<String> {
    header_map
        .get(key)
        .and_then(|header| header.to_str().ok())
        .map(|s| s.to_owned())
}
