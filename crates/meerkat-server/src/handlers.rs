use crate::error::ApiError;
use crate::middleware::request_id::RequestId;
use crate::state::AppState;
use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
};
use meerkat_core::GatewayError;
use meerkat_runtime::{AuditSink, SchemaAdmin};
use serde_json::{Value, json};
use std::sync::Arc;

/// The automation endpoint. The body is decoded here rather than with the
/// `Json` extractor so malformed input still gets the JSON error envelope.
pub async fn automation<A, S>(
    State(state): State<Arc<AppState<A, S>>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<Value>, ApiError>
where
    A: SchemaAdmin + 'static,
    S: AuditSink + 'static,
{
    let body: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "malformed request body");
        GatewayError::bad_request(format!("Invalid JSON body: {e}"), None)
    })?;

    let response = state.dispatcher.dispatch(&request_id, body).await?;
    Ok(Json(response))
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true, "service": "meerkat-server" }))
}
