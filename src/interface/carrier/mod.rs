use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::shared::config::Config;
use crate::shared::entities::CallSid;
use crate::shared::error::TransferError;
use crate::shared::ports::{CallControlFuture, CallControlPort, UnconfiguredCallControl};

/// Call-update REST client. One instance per process, shared through
/// `AppState`.
#[derive(Clone)]
pub struct CarrierRestClient {
    client: Client,
    api_base_url: String,
    account_sid: String,
    auth_token: String,
}

impl CarrierRestClient {
    pub fn new(
        api_base_url: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransferError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransferError::Request(e.to_string()))?;
        Ok(Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        })
    }

    pub fn call_url(&self, call_sid: &CallSid) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.api_base_url, self.account_sid, call_sid
        )
    }
}

impl CallControlPort for CarrierRestClient {
    fn update_call(&self, call_sid: &CallSid, document: String) -> CallControlFuture {
        let client = self.client.clone();
        let url = self.call_url(call_sid);
        let account_sid = self.account_sid.clone();
        let auth_token = self.auth_token.clone();
        let call_sid = call_sid.clone();
        Box::pin(async move {
            log::debug!("[carrier] POST call update call_sid={}", call_sid);
            let resp = client
                .post(&url)
                .basic_auth(account_sid, Some(auth_token))
                .form(&[("Twiml", document.as_str())])
                .send()
                .await
                .map_err(|e| TransferError::Request(e.to_string()))?;

            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if !status.is_success() {
                log::warn!(
                    "[carrier] call update rejected call_sid={} status={}",
                    call_sid,
                    status
                );
                return Err(TransferError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(())
        })
    }
}

/// REST client when credentials are configured, otherwise an adapter that
/// fails every handoff with `MissingConfiguration`.
pub fn build_call_control(config: &Config) -> Arc<dyn CallControlPort> {
    let Some((account_sid, auth_token)) = config.carrier.credentials() else {
        log::warn!("[carrier] call-control credentials not configured; agent handoff disabled");
        return Arc::new(UnconfiguredCallControl::new());
    };
    match CarrierRestClient::new(
        config.carrier.api_base_url.clone(),
        account_sid,
        auth_token,
        config.timeouts.carrier_http,
    ) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            log::error!("[carrier] failed to build http client: {}", err);
            Arc::new(UnconfiguredCallControl::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn call_url_follows_account_layout() {
        let client = CarrierRestClient::new(
            "https://api.example.com/",
            "AC123",
            "token",
            Duration::from_secs(1),
        )
        .unwrap();
        let sid = CallSid::new("CA9").unwrap();
        assert_eq!(
            client.call_url(&sid),
            "https://api.example.com/2010-04-01/Accounts/AC123/Calls/CA9.json"
        );
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        use axum::http::StatusCode;
        use axum::routing::post;
        use axum::Router;

        let app = Router::new().route(
            "/2010-04-01/Accounts/AC1/Calls/CA1.json",
            post(|| async { (StatusCode::NOT_FOUND, "no such call") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = CarrierRestClient::new(
            format!("http://{}", addr),
            "AC1",
            "token",
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client
            .update_call(&CallSid::new("CA1").unwrap(), "<Response/>".to_string())
            .await
            .unwrap_err();
        server.abort();

        match err {
            TransferError::Rejected { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such call");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
