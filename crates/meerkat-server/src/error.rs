//! HTTP rendering of gateway errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use meerkat_core::GatewayError;

/// Wraps [`GatewayError`] so handlers and middleware can return it directly.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.to_body())).into_response()
    }
}
