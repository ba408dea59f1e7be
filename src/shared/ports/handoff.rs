use std::future::Future;
use std::pin::Pin;

use crate::shared::entities::{CallSid, ChatId};
use crate::shared::error::TransferError;

pub type HandoffFuture = Pin<Box<dyn Future<Output = Result<(), TransferError>> + Send>>;

/// Entry point the media-stream session uses to escalate a call to a human
/// agent. Resolves once the redirect command is accepted or rejected, not
/// when the transfer itself completes.
pub trait AgentHandoffPort: Send + Sync {
    fn request_handoff(&self, call_sid: CallSid, chat_id: ChatId) -> HandoffFuture;
}
