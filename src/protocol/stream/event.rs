use std::collections::HashMap;

use serde::Deserialize;

use crate::shared::error::StreamError;

/// One JSON message on the carrier media stream, tagged by `event`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },
    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        start: StartPayload,
    },
    Media {
        media: MediaPayload,
    },
    Dtmf {
        dtmf: DtmfPayload,
    },
    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },
    /// Event types this gateway does not act on (e.g. `mark`).
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartPayload {
    #[serde(rename = "callSid")]
    pub call_sid: String,
    #[serde(rename = "streamSid", default)]
    pub stream_sid: Option<String>,
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaPayload {
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DtmfPayload {
    #[serde(default)]
    pub track: Option<String>,
    pub digit: String,
}

impl StreamEvent {
    /// A message without `event`, or missing the fields its type requires,
    /// is a `MalformedEvent`.
    pub fn parse(text: &str) -> Result<Self, StreamError> {
        serde_json::from_str(text).map_err(|e| StreamError::MalformedEvent(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Start { .. } => "start",
            StreamEvent::Media { .. } => "media",
            StreamEvent::Dtmf { .. } => "dtmf",
            StreamEvent::Stop { .. } => "stop",
            StreamEvent::Unknown => "unknown",
        }
    }
}
