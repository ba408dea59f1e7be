use std::future::Future;
use std::pin::Pin;

use crate::shared::entities::CallSid;
use crate::shared::error::TransferError;

pub type CallControlFuture = Pin<Box<dyn Future<Output = Result<(), TransferError>> + Send>>;

/// Carrier call-control API: replaces the live call's flow with `document`.
pub trait CallControlPort: Send + Sync {
    fn update_call(&self, call_sid: &CallSid, document: String) -> CallControlFuture;
}

/// Used when no call-control credentials are configured; every command
/// fails with `MissingConfiguration`.
#[derive(Clone, Debug, Default)]
pub struct UnconfiguredCallControl;

impl UnconfiguredCallControl {
    pub fn new() -> Self {
        Self
    }
}

impl CallControlPort for UnconfiguredCallControl {
    fn update_call(&self, _call_sid: &CallSid, _document: String) -> CallControlFuture {
        Box::pin(async move {
            Err(TransferError::MissingConfiguration(
                "VOICECALL_ACCOUNT_SID / VOICECALL_AUTH_TOKEN",
            ))
        })
    }
}
