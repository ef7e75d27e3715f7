//! Route definitions.

use crate::handlers;
use crate::middleware::{auth, request_id};
use crate::state::AppState;
use axum::{
    Router,
    extract::Request,
    middleware,
    routing::{get, post},
};
use meerkat_core::config::HEALTH_PATH;
use meerkat_runtime::{AuditSink, SchemaAdmin};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the router: the authenticated automation endpoint at
/// `endpoint_path` and the open health route.
pub fn create_router<A, S>(state: Arc<AppState<A, S>>, endpoint_path: &str) -> Router
where
    A: SchemaAdmin + 'static,
    S: AuditSink + 'static,
{
    let automation = Router::new()
        .route(endpoint_path, post(handlers::automation::<A, S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key::<A, S>,
        ));

    Router::new()
        .route(HEALTH_PATH, get(handlers::healthz))
        .merge(automation)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            let id = req
                .extensions()
                .get::<request_id::RequestId>()
                .map(|id| id.0.as_str())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                request_id = id,
                method = %req.method(),
                uri = %req.uri(),
            )
        }))
        .layer(middleware::from_fn(request_id::assign_request_id))
}
