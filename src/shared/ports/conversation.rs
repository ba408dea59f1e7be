use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::shared::entities::CallSession;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation backend failed: {0}")]
    Failed(String),
}

pub type ConversationFuture = Pin<Box<dyn Future<Output = Result<(), ConversationError>> + Send>>;

/// One inbound audio frame, still carrier-encoded (base64 payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    pub track: Option<String>,
    pub timestamp: Option<String>,
    pub payload: String,
}

/// Boundary to the conversational backend that answers the caller.
pub trait ConversationPort: Send + Sync {
    fn session_started(&self, session: CallSession) -> ConversationFuture;
    fn forward_media(&self, session: CallSession, chunk: MediaChunk) -> ConversationFuture;
    fn session_closed(&self, session: CallSession) -> ConversationFuture;
}

#[derive(Clone, Debug, Default)]
pub struct NoopConversation;

impl NoopConversation {
    pub fn new() -> Self {
        Self
    }
}

impl ConversationPort for NoopConversation {
    fn session_started(&self, _session: CallSession) -> ConversationFuture {
        Box::pin(async move { Ok(()) })
    }

    fn forward_media(&self, _session: CallSession, _chunk: MediaChunk) -> ConversationFuture {
        Box::pin(async move { Ok(()) })
    }

    fn session_closed(&self, _session: CallSession) -> ConversationFuture {
        Box::pin(async move { Ok(()) })
    }
}
