use thiserror::Error;

/// Session-token generation / verification input errors.
///
/// `MissingSecret` is the missing-configuration case: no signing secret was
/// configured, so nothing can be generated or accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("session token secret is not configured")]
    MissingSecret,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("missing configuration: {0}")]
    MissingConfiguration(&'static str),
    #[error("carrier rejected transfer request: status={status}")]
    Rejected { status: u16, body: String },
    #[error("transfer request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("malformed stream event: {0}")]
    MalformedEvent(String),
}

/// Webhook failures as seen by the carrier. Detail stays in the logs; the
/// HTTP layer renders only a generic body per kind.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("missing configuration: {0}")]
    MissingConfiguration(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SignatureError> for WebhookError {
    fn from(value: SignatureError) -> Self {
        match value {
            SignatureError::MissingSecret => WebhookError::MissingConfiguration("session token secret"),
            SignatureError::MissingField(field) => {
                WebhookError::Internal(format!("cannot sign session: missing {}", field))
            }
        }
    }
}
