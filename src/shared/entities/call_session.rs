use std::collections::HashMap;

pub const DEFAULT_LANGUAGE: &str = "en-US";

pub const PARAM_CHAT_ID: &str = "chat_id";
pub const PARAM_LANGUAGE: &str = "language";
pub const PARAM_MODE: &str = "mode";
pub const PARAM_TOOLS: &str = "tools";
pub const PARAM_AGENT_TYPE: &str = "agent_type";
pub const PARAM_MOBILE: &str = "mobile";
/// Stream parameter carrying the session token.
pub const PARAM_SESSION_TOKEN: &str = "X-Fluid-Signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// Carrier direction values: `inbound`, `outbound-api`, `outbound-dial`.
    /// Anything that is not outbound-initiated is treated as inbound.
    pub fn from_carrier(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().to_ascii_lowercase().starts_with("outbound") => Direction::Outbound,
            _ => Direction::Inbound,
        }
    }
}

/// Opaque routing hints passed through to the conversation backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingHints {
    pub mode: Option<String>,
    pub tools: Option<String>,
    pub agent_type: Option<String>,
}

/// One phone call as seen by this gateway.
///
/// Built from the call-received webhook (to emit the stream parameters) and
/// again from `start.customParameters` on the media stream, where it is owned
/// by the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    pub call_sid: String,
    pub chat_id: String,
    pub mobile: String,
    pub direction: Option<Direction>,
    pub language: String,
    pub routing: RoutingHints,
    authenticated: bool,
}

impl CallSession {
    pub fn new(
        call_sid: impl Into<String>,
        chat_id: impl Into<String>,
        mobile: impl Into<String>,
    ) -> Self {
        Self {
            call_sid: call_sid.into(),
            chat_id: chat_id.into(),
            mobile: mobile.into(),
            direction: None,
            language: DEFAULT_LANGUAGE.to_string(),
            routing: RoutingHints::default(),
            authenticated: false,
        }
    }

    /// Rebuild the session from the stream `start` message. Returns the
    /// session together with the presented token, if any. Missing values are
    /// left empty so token verification rejects them.
    pub fn from_stream_parameters(
        call_sid: &str,
        params: &HashMap<String, String>,
    ) -> (Self, Option<String>) {
        let get = |key: &str| params.get(key).map(|v| v.trim().to_string());
        let optional = |key: &str| get(key).filter(|v| !v.is_empty());

        let session = Self {
            call_sid: call_sid.trim().to_string(),
            chat_id: get(PARAM_CHAT_ID).unwrap_or_default(),
            mobile: get(PARAM_MOBILE).unwrap_or_default(),
            direction: None,
            language: optional(PARAM_LANGUAGE).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            routing: RoutingHints {
                mode: optional(PARAM_MODE),
                tools: optional(PARAM_TOOLS),
                agent_type: optional(PARAM_AGENT_TYPE),
            },
            authenticated: false,
        };
        (session, optional(PARAM_SESSION_TOKEN))
    }

    /// Stream parameters in emission order: chat id, language, routing
    /// hints when present, mobile, then the session token.
    pub fn stream_parameters(&self, session_token: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            (PARAM_CHAT_ID, self.chat_id.clone()),
            (PARAM_LANGUAGE, self.language.clone()),
        ];
        if let Some(mode) = &self.routing.mode {
            params.push((PARAM_MODE, mode.clone()));
        }
        if let Some(tools) = &self.routing.tools {
            params.push((PARAM_TOOLS, tools.clone()));
        }
        if let Some(agent_type) = &self.routing.agent_type {
            params.push((PARAM_AGENT_TYPE, agent_type.clone()));
        }
        params.push((PARAM_MOBILE, self.mobile.clone()));
        params.push((PARAM_SESSION_TOKEN, session_token.to_string()));
        params
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }
}
