use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::interface::http::{AppState, SignedForm};
use crate::protocol::document::empty_acknowledgement;
use crate::shared::error::WebhookError;

fn xml(body: String) -> Response {
    ([(CONTENT_TYPE, "text/xml")], body).into_response()
}

pub(super) async fn receive_call(
    State(state): State<AppState>,
    signed: SignedForm,
) -> Result<Response, WebhookError> {
    let document = state
        .webhooks
        .receive_call(&signed.form, &signed.query, signed.host.as_deref())?;
    Ok(xml(document.render()))
}

pub(super) async fn refer_callback(State(state): State<AppState>, signed: SignedForm) -> Response {
    state.webhooks.refer_callback(&signed.query, &signed.form);
    xml(empty_acknowledgement())
}

pub(super) async fn status_callback(State(state): State<AppState>, signed: SignedForm) -> StatusCode {
    state.webhooks.status_callback(&signed.form);
    StatusCode::OK
}
