//! Agent handoff: redirect an in-progress call to a human agent over SIP
//! and leave a ledger entry the refer callback can complete later.

use std::sync::Arc;

use url::Url;

use crate::protocol::document::CallFlowDocument;
use crate::shared::entities::{CallSid, ChatId};
use crate::shared::error::TransferError;
use crate::shared::ports::{
    AgentHandoffPort, CallControlPort, HandoffFuture, TransferKey, TransferLedger,
};

pub const REFER_CALLBACK_PATH: &str = "/webhook/refer-callback";
pub const QUERY_CHAT_ID: &str = "chat_id";
pub const QUERY_DESTINATION: &str = "destination_address";

const SIP_TRANSPORT_SUFFIX: &str = "?transport=udp";

#[derive(Clone)]
pub struct HandoffOrchestrator {
    call_control: Arc<dyn CallControlPort>,
    ledger: Arc<dyn TransferLedger>,
    public_host: Option<String>,
    destination: String,
}

impl HandoffOrchestrator {
    pub fn new(
        call_control: Arc<dyn CallControlPort>,
        ledger: Arc<dyn TransferLedger>,
        public_host: Option<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            call_control,
            ledger,
            public_host,
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Issue the refer for `call_sid`. Resolves when the carrier accepted or
    /// refused the call update; the transfer result arrives later on the
    /// refer callback. Never retried.
    pub async fn transfer_to_agent(
        &self,
        call_sid: &CallSid,
        chat_id: &ChatId,
        destination: &str,
    ) -> Result<(), TransferError> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(TransferError::MissingConfiguration("TRANSFER_DESTINATION_URI"));
        }
        let host = self
            .public_host
            .as_deref()
            .ok_or(TransferError::MissingConfiguration("PUBLIC_HOST"))?;

        let action = refer_callback_url(host, chat_id.as_str(), destination)?;
        let document = CallFlowDocument::new()
            .refer(action, format!("{}{}", destination, SIP_TRANSPORT_SUFFIX))
            .render();

        let key = TransferKey::new(chat_id.as_str(), destination);
        self.ledger.record_requested(&key, call_sid.as_str());
        log::info!(
            "[handoff] refer call_sid={} chat_id={} destination={}",
            call_sid,
            chat_id,
            destination
        );

        match self.call_control.update_call(call_sid, document).await {
            Ok(()) => {
                log::info!("[handoff] call update accepted call_sid={}", call_sid);
                Ok(())
            }
            Err(err) => {
                log::error!("[handoff] call update failed call_sid={}: {}", call_sid, err);
                self.ledger.record_request_failed(&key, call_sid.as_str());
                Err(err)
            }
        }
    }
}

impl AgentHandoffPort for HandoffOrchestrator {
    fn request_handoff(&self, call_sid: CallSid, chat_id: ChatId) -> HandoffFuture {
        let this = self.clone();
        Box::pin(async move {
            let destination = this.destination.clone();
            this.transfer_to_agent(&call_sid, &chat_id, &destination)
                .await
        })
    }
}

/// `https://<host>/webhook/refer-callback?chat_id=<>&destination_address=<>`
pub fn refer_callback_url(
    host: &str,
    chat_id: &str,
    destination: &str,
) -> Result<String, TransferError> {
    let base = format!("https://{}{}", host, REFER_CALLBACK_PATH);
    let url = Url::parse_with_params(
        &base,
        &[(QUERY_CHAT_ID, chat_id), (QUERY_DESTINATION, destination)],
    )
    .map_err(|_| TransferError::MissingConfiguration("PUBLIC_HOST"))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::protocol::auth::{compute_webhook_signature, verify_webhook_request};
    use crate::shared::entities::TransferStatus;
    use crate::shared::ports::{CallControlFuture, InMemoryTransferLedger, UnconfiguredCallControl};

    #[derive(Default)]
    struct CapturingCallControl {
        updates: Mutex<Vec<(String, String)>>,
        reject_with: Option<u16>,
    }

    impl CallControlPort for CapturingCallControl {
        fn update_call(&self, call_sid: &CallSid, document: String) -> CallControlFuture {
            self.updates
                .lock()
                .unwrap()
                .push((call_sid.as_str().to_string(), document));
            let reject_with = self.reject_with;
            Box::pin(async move {
                match reject_with {
                    Some(status) => Err(TransferError::Rejected {
                        status,
                        body: "{}".to_string(),
                    }),
                    None => Ok(()),
                }
            })
        }
    }

    const DEST: &str = "sip:agent@pbx.example.com";

    fn ids() -> (CallSid, ChatId) {
        (CallSid::new("CA77").unwrap(), ChatId::placeholder())
    }

    #[tokio::test]
    async fn transfer_sends_refer_document_and_records_request() {
        let control = Arc::new(CapturingCallControl::default());
        let ledger = Arc::new(InMemoryTransferLedger::new());
        let orchestrator = HandoffOrchestrator::new(
            control.clone(),
            ledger.clone(),
            Some("voice.example.com".to_string()),
            DEST,
        );
        let (call_sid, chat_id) = ids();

        orchestrator
            .transfer_to_agent(&call_sid, &chat_id, DEST)
            .await
            .unwrap();

        let updates = control.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        let (sid, document) = &updates[0];
        assert_eq!(sid, "CA77");
        assert!(document.contains(
            r#"<Refer action="https://voice.example.com/webhook/refer-callback?chat_id=ChatID&amp;destination_address=sip%3Aagent%40pbx.example.com" method="POST">"#
        ));
        assert!(document.contains("<Sip>sip:agent@pbx.example.com?transport=udp</Sip>"));

        let latest = ledger.latest(&TransferKey::new("ChatID", DEST)).unwrap();
        assert_eq!(latest.status, TransferStatus::Requested);
        assert_eq!(latest.call_sid.as_deref(), Some("CA77"));
    }

    #[tokio::test]
    async fn missing_public_host_fails_before_any_request() {
        let control = Arc::new(CapturingCallControl::default());
        let orchestrator = HandoffOrchestrator::new(
            control.clone(),
            Arc::new(InMemoryTransferLedger::new()),
            None,
            DEST,
        );
        let (call_sid, chat_id) = ids();
        let err = orchestrator
            .transfer_to_agent(&call_sid, &chat_id, DEST)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::MissingConfiguration("PUBLIC_HOST")));
        assert!(control.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn carrier_rejection_is_surfaced_once() {
        let control = Arc::new(CapturingCallControl {
            reject_with: Some(404),
            ..Default::default()
        });
        let orchestrator = HandoffOrchestrator::new(
            control.clone(),
            Arc::new(InMemoryTransferLedger::new()),
            Some("voice.example.com".to_string()),
            DEST,
        );
        let (call_sid, chat_id) = ids();
        let err = orchestrator
            .request_handoff(call_sid, chat_id)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Rejected { status: 404, .. }));
        assert_eq!(control.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_credentials_surface_missing_configuration() {
        let ledger = Arc::new(InMemoryTransferLedger::new());
        let orchestrator = HandoffOrchestrator::new(
            Arc::new(UnconfiguredCallControl::new()),
            ledger.clone(),
            Some("voice.example.com".to_string()),
            DEST,
        );
        let (call_sid, chat_id) = ids();
        let err = orchestrator.request_handoff(call_sid, chat_id).await.unwrap_err();
        assert!(matches!(err, TransferError::MissingConfiguration(_)));

        let history = ledger.history(&TransferKey::new("ChatID", DEST));
        let statuses: Vec<TransferStatus> = history.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![TransferStatus::Requested, TransferStatus::RequestFailed]);
    }

    #[tokio::test]
    async fn rejected_update_leaves_no_pending_request() {
        let ledger = Arc::new(InMemoryTransferLedger::new());
        let orchestrator = HandoffOrchestrator::new(
            Arc::new(CapturingCallControl {
                reject_with: Some(400),
                ..Default::default()
            }),
            ledger.clone(),
            Some("voice.example.com".to_string()),
            DEST,
        );
        let (call_sid, chat_id) = ids();
        assert!(orchestrator.transfer_to_agent(&call_sid, &chat_id, DEST).await.is_err());

        let latest = ledger.latest(&TransferKey::new("ChatID", DEST)).unwrap();
        assert_eq!(latest.status, TransferStatus::RequestFailed);
        assert_eq!(latest.call_sid.as_deref(), Some("CA77"));
    }

    #[test]
    fn carrier_signed_callback_url_passes_the_webhook_gate() {
        let action = refer_callback_url("voice.example.com", "ChatID", DEST).unwrap();
        let params = vec![
            ("NotifySipResponseCode".to_string(), "200".to_string()),
            ("ReferCallStatus".to_string(), "in-progress".to_string()),
            ("ReferSipResponseCode".to_string(), "202".to_string()),
        ];
        // キャリアは渡された action URL をそのまま署名する
        let signature = compute_webhook_signature(&action, &params, "auth-token");

        let rest = action.strip_prefix("https://voice.example.com").unwrap();
        let (path, query) = rest.split_once('?').unwrap();
        assert_eq!(path, REFER_CALLBACK_PATH);
        assert!(verify_webhook_request(
            "voice.example.com",
            path,
            Some(query),
            &params,
            signature.as_deref(),
            Some("auth-token"),
        ));
    }

    #[test]
    fn callback_url_encodes_query_values() {
        let url = refer_callback_url("voice.example.com", "chat 1", "sip:a@b").unwrap();
        assert_eq!(
            url,
            "https://voice.example.com/webhook/refer-callback?chat_id=chat+1&destination_address=sip%3Aa%40b"
        );
    }
}
