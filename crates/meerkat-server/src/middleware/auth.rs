use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use meerkat_core::gate::{API_KEY_HEADER, TIMESTAMP_HEADER};
use meerkat_runtime::{AuditSink, SchemaAdmin};
use std::sync::Arc;

/// Axum middleware enforcing the shared key and replay window.
///
/// Runs before the body is read and before any database session exists.
pub async fn require_api_key<A, S>(
    State(state): State<Arc<AppState<A, S>>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    A: SchemaAdmin + 'static,
    S: AuditSink + 'static,
{
    let headers = req.headers();
    let now_ms = chrono::Utc::now().timestamp_millis();
    state.gate.check(
        header(headers, API_KEY_HEADER),
        header(headers, TIMESTAMP_HEADER),
        now_ms,
    )?;

    Ok(next.run(req).await)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}
