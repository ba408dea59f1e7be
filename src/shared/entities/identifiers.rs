use std::fmt;

use thiserror::Error;

/// Placeholder chat identity used until chat-id minting is wired to the
/// conversation backend.
pub const PLACEHOLDER_CHAT_ID: &str = "ChatID";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("{0} is empty")]
    Empty(&'static str),
}

/// Carrier-issued call identifier (`CallSid`). Authoritative for the call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSid(String);

impl CallSid {
    pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(IdentifierError::Empty("CallSid"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallSid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application-level conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(IdentifierError::Empty("ChatId"));
        }
        Ok(Self(value))
    }

    pub fn placeholder() -> Self {
        Self(PLACEHOLDER_CHAT_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 内部セッション識別子（websocket 接続ごと、ログ用）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamSessionId(uuid::Uuid);

impl StreamSessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for StreamSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
