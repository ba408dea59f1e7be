//! Carrier webhook signatures and the application session token that
//! authenticates media-stream startup.

pub mod session_token;
pub mod webhook;

pub use session_token::{canonical_payload, generate_session_token, verify_session_token};
pub use webhook::{
    compute_webhook_signature, decoded_webhook_url, verify_webhook_request, verify_webhook_signature,
    webhook_url, SIGNATURE_HEADER,
};
