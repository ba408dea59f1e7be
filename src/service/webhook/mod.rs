//! Business side of the three carrier webhooks. Signature checks happen in
//! the HTTP layer before anything here runs.

use std::sync::Arc;

use crate::protocol::auth::generate_session_token;
use crate::protocol::document::CallFlowDocument;
use crate::protocol::form::FormParams;
use crate::service::handoff::{QUERY_CHAT_ID, QUERY_DESTINATION};
use crate::shared::config::Config;
use crate::shared::entities::call_session::DEFAULT_LANGUAGE;
use crate::shared::entities::{
    CallSession, ChatId, Direction, RoutingHints, TransferOutcome, TransferStatus,
};
use crate::shared::error::WebhookError;
use crate::shared::ports::{TransferKey, TransferLedger};
use crate::shared::utils::mask_phone;

pub const STATIC_PATH: &str = "/static";
pub const STREAM_PATH: &str = "/ws";
/// Greeting played before the stream connects, whatever the caller language.
pub const GREETING_FILE: &str = "welcome_en-US.mp3";

#[derive(Clone)]
pub struct WebhookDispatcher {
    config: Arc<Config>,
    ledger: Arc<dyn TransferLedger>,
}

impl WebhookDispatcher {
    pub fn new(config: Arc<Config>, ledger: Arc<dyn TransferLedger>) -> Self {
        Self { config, ledger }
    }

    /// Greeting plus a media stream whose parameters carry a session token
    /// bound to this call.
    pub fn receive_call(
        &self,
        form: &FormParams,
        query: &FormParams,
        request_host: Option<&str>,
    ) -> Result<CallFlowDocument, WebhookError> {
        let host = self
            .config
            .public_host
            .as_deref()
            .or(request_host)
            .ok_or(WebhookError::MissingConfiguration("PUBLIC_HOST"))?;

        let call_sid = form
            .get_non_empty("CallSid")
            .ok_or_else(|| WebhookError::Internal("missing CallSid".to_string()))?;
        let direction = Direction::from_carrier(form.get("Direction"));
        let mobile_field = match direction {
            Direction::Outbound => "To",
            Direction::Inbound => "From",
        };
        let mobile = form
            .get_non_empty(mobile_field)
            .ok_or_else(|| WebhookError::Internal(format!("missing {}", mobile_field)))?;

        let chat_id = ChatId::placeholder();
        let mut session = CallSession::new(call_sid, chat_id.as_str(), mobile);
        session.direction = Some(direction);
        session.language = query
            .get_non_empty("language")
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string();
        session.routing = RoutingHints {
            mode: query.get_non_empty("mode").map(str::to_string),
            tools: query.get_non_empty("tools").map(str::to_string),
            agent_type: query.get_non_empty("agent_type").map(str::to_string),
        };

        let token = generate_session_token(
            &session.chat_id,
            &session.call_sid,
            &session.mobile,
            self.config.session_secret(),
        )?;

        log::info!(
            "[webhook] receive-call call_sid={} direction={:?} mobile={} language={} stream={}",
            session.call_sid,
            direction,
            mask_phone(&session.mobile),
            session.language,
            query.get_non_empty("stream").unwrap_or("-")
        );

        Ok(CallFlowDocument::new()
            .play(format!("https://{}{}/{}", host, STATIC_PATH, GREETING_FILE))
            .connect_stream(
                format!("wss://{}{}", host, STREAM_PATH),
                session.stream_parameters(&token),
            ))
    }

    /// Records the refer outcome. Accepted with or without a prior request
    /// entry; never retried.
    pub fn refer_callback(&self, query: &FormParams, form: &FormParams) -> TransferStatus {
        let key = TransferKey::new(
            query.get(QUERY_CHAT_ID).unwrap_or_default(),
            query.get(QUERY_DESTINATION).unwrap_or_default(),
        );
        let field = |name: &str| form.get_non_empty(name).map(str::to_string);
        let outcome = TransferOutcome {
            refer_call_status: field("ReferCallStatus"),
            refer_sip_response_code: field("ReferSipResponseCode"),
            notify_sip_response_code: field("NotifySipResponseCode"),
        };
        let status = self.ledger.record_outcome(&key, &outcome);

        if status == TransferStatus::Succeeded {
            log::info!(
                "[webhook] transfer succeeded chat_id={} destination={}",
                key.chat_id,
                key.destination
            );
        } else {
            log::warn!(
                "[webhook] transfer failed chat_id={} destination={} refer_status={} refer_sip={} notify_sip={}",
                key.chat_id,
                key.destination,
                outcome.refer_call_status.as_deref().unwrap_or("-"),
                outcome.refer_sip_response_code.as_deref().unwrap_or("-"),
                outcome.notify_sip_response_code.as_deref().unwrap_or("-")
            );
        }
        status
    }

    pub fn status_callback(&self, form: &FormParams) {
        log::info!(
            "[webhook] status-callback call_sid={} status={} direction={}",
            form.get("CallSid").unwrap_or("-"),
            form.get("CallStatus").unwrap_or("-"),
            form.get("Direction").unwrap_or("-")
        );
    }
}
