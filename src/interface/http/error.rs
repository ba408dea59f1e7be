use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::shared::error::WebhookError;

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            WebhookError::MissingConfiguration(_) | WebhookError::Internal(_) => {
                log::error!("[http] webhook failed: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
