use axum::extract::{FromRequest, Request};
use axum::http::header::HOST;

use crate::interface::http::AppState;
use crate::protocol::auth::{verify_webhook_request, SIGNATURE_HEADER};
use crate::protocol::form::FormParams;
use crate::shared::error::WebhookError;

const MAX_WEBHOOK_BODY: usize = 64 * 1024;

/// Form body and query of a webhook whose carrier signature checked out.
/// Rejects with `Unauthorized` before any handler code runs.
#[derive(Debug, Clone)]
pub struct SignedForm {
    pub form: FormParams,
    pub query: FormParams,
    pub host: Option<String>,
}

#[axum::async_trait]
impl FromRequest<AppState> for SignedForm {
    type Rejection = WebhookError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let host = header(HOST.as_str());
        let signature = header(SIGNATURE_HEADER);
        let path = parts.uri.path();
        let raw_query = parts.uri.query();

        // 署名検証前に本文をパースしてもログには出さない
        let bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY)
            .await
            .map_err(|_| WebhookError::Unauthorized)?;
        let form = FormParams::parse(&bytes);

        let Some(host) = host else {
            log::warn!("[http] webhook without Host header path={}", path);
            return Err(WebhookError::Unauthorized);
        };
        if !verify_webhook_request(
            &host,
            path,
            raw_query,
            form.pairs(),
            signature.as_deref(),
            state.config.webhook_secret(),
        ) {
            log::warn!("[http] webhook signature rejected path={}", path);
            return Err(WebhookError::Unauthorized);
        }

        Ok(Self {
            form,
            query: FormParams::parse(raw_query.unwrap_or_default().as_bytes()),
            host: Some(host),
        })
    }
}
