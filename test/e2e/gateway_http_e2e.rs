use std::fs;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use voicecall_gateway::auth::{compute_webhook_signature, generate_session_token, SIGNATURE_HEADER};
use voicecall_gateway::config::{CarrierConfig, Config, Timeouts};
use voicecall_gateway::entities::{CallSid, TransferStatus};
use voicecall_gateway::handoff::refer_callback_url;
use voicecall_gateway::http::{self, AppState};
use voicecall_gateway::logging;
use voicecall_gateway::ports::{
    CallControlFuture, CallControlPort, InMemoryTransferLedger, NoopConversation, TransferKey,
    TransferLedger,
};

const WEBHOOK_SECRET: &str = "carrier-auth-token";
const SESSION_SECRET: &str = "session-secret";
const PUBLIC_HOST: &str = "voice.example.com";
const DESTINATION: &str = "sip:agent@pbx.example.com";

struct ServerGuard(tokio::task::JoinHandle<()>);

impl Drop for ServerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Default)]
struct RecordingCallControl {
    updates: Mutex<Vec<(String, String)>>,
}

impl CallControlPort for RecordingCallControl {
    fn update_call(&self, call_sid: &CallSid, document: String) -> CallControlFuture {
        self.updates
            .lock()
            .unwrap()
            .push((call_sid.as_str().to_string(), document));
        Box::pin(async move { Ok(()) })
    }
}

struct Gateway {
    addr: SocketAddr,
    call_control: Arc<RecordingCallControl>,
    ledger: Arc<InMemoryTransferLedger>,
    _assets: tempfile::TempDir,
    _guard: ServerGuard,
}

async fn start_gateway(stream_start: Duration) -> Result<Gateway, Box<dyn std::error::Error>> {
    logging::init();
    let assets = tempdir()?;
    fs::write(assets.path().join("welcome_en-US.mp3"), b"ID3-greeting")?;

    let config = Config {
        http_bind_addr: "127.0.0.1:0".parse()?,
        public_host: Some(PUBLIC_HOST.to_string()),
        assets_dir: assets.path().to_path_buf(),
        carrier: CarrierConfig {
            account_sid: Some("AC-test".to_string()),
            auth_token: Some(WEBHOOK_SECRET.to_string()),
            api_base_url: "http://127.0.0.1:9".to_string(),
        },
        session_token_secret: Some(SESSION_SECRET.to_string()),
        transfer_destination: DESTINATION.to_string(),
        timeouts: Timeouts {
            carrier_http: Duration::from_secs(1),
            stream_start,
        },
    };

    let call_control = Arc::new(RecordingCallControl::default());
    let ledger = Arc::new(InMemoryTransferLedger::new());
    let state = AppState::new(
        Arc::new(config),
        call_control.clone(),
        ledger.clone(),
        Arc::new(NoopConversation::new()),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = http::spawn_gateway_server_with_listener(listener, state);

    Ok(Gateway {
        addr,
        call_control,
        ledger,
        _assets: assets,
        _guard: ServerGuard(handle),
    })
}

fn signed_post(
    client: &reqwest::Client,
    addr: SocketAddr,
    path_and_query: &str,
    form: &[(&str, &str)],
    secret: &str,
) -> reqwest::RequestBuilder {
    let pairs: Vec<(String, String)> = form
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    // キャリアは設定された URL を受け取ったままの形で署名する
    let signed_url = format!("https://{}{}", addr, path_and_query);
    let signature = compute_webhook_signature(&signed_url, &pairs, secret).unwrap();
    client
        .post(format!("http://{}{}", addr, path_and_query))
        .header(SIGNATURE_HEADER, signature)
        .form(form)
}

async fn drain_until_closed(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> bool {
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    closed.is_ok()
}

#[tokio::test]
async fn liveness_and_static_assets_need_no_auth() -> Result<(), Box<dyn std::error::Error>> {
    let gw = start_gateway(Duration::from_secs(5)).await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("http://{}/is-alive", gw.addr)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await?, "Alive");

    let res = client
        .get(format!("http://{}/static/welcome_en-US.mp3", gw.addr))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await?.as_ref(), b"ID3-greeting");
    Ok(())
}

#[tokio::test]
async fn webhooks_without_valid_signature_are_unauthorized() -> Result<(), Box<dyn std::error::Error>> {
    let gw = start_gateway(Duration::from_secs(5)).await?;
    let client = reqwest::Client::new();
    let form = [("CallSid", "CA1"), ("Direction", "inbound"), ("From", "+15550001111")];

    let res = client
        .post(format!("http://{}/webhook/receive-call", gw.addr))
        .form(&form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = signed_post(&client, gw.addr, "/webhook/receive-call", &form, "wrong-secret")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = signed_post(
        &client,
        gw.addr,
        "/webhook/refer-callback?chat_id=ChatID&destination_address=sip%3Aagent%40pbx.example.com",
        &[("ReferCallStatus", "in-progress")],
        "wrong-secret",
    )
    .send()
    .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(gw
        .ledger
        .history(&TransferKey::new("ChatID", DESTINATION))
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn signed_receive_call_returns_stream_document() -> Result<(), Box<dyn std::error::Error>> {
    let gw = start_gateway(Duration::from_secs(5)).await?;
    let client = reqwest::Client::new();
    let form = [
        ("CallSid", "CA200"),
        ("Direction", "inbound"),
        ("From", "+15550001111"),
        ("To", "+15559990000"),
    ];

    let res = signed_post(
        &client,
        gw.addr,
        "/webhook/receive-call?language=en-US&stream=true",
        &form,
        WEBHOOK_SECRET,
    )
    .send()
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("text/xml")
    );

    let body = res.text().await?;
    let token = generate_session_token("ChatID", "CA200", "+15550001111", Some(SESSION_SECRET))?;
    assert!(body.contains("<Play>https://voice.example.com/static/welcome_en-US.mp3</Play>"));
    assert!(body.contains(r#"<Stream url="wss://voice.example.com/ws">"#));
    assert!(body.contains(&format!(r#"<Parameter name="X-Fluid-Signature" value="{}"/>"#, token)));
    Ok(())
}

#[tokio::test]
async fn refer_and_status_callbacks_are_acknowledged() -> Result<(), Box<dyn std::error::Error>> {
    let gw = start_gateway(Duration::from_secs(5)).await?;
    let client = reqwest::Client::new();

    let res = signed_post(
        &client,
        gw.addr,
        "/webhook/refer-callback?chat_id=ChatID&destination_address=sip%3Aagent%40pbx.example.com",
        &[
            ("ReferCallStatus", "in-progress"),
            ("ReferSipResponseCode", "202"),
            ("NotifySipResponseCode", "200"),
        ],
        WEBHOOK_SECRET,
    )
    .send()
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await?, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let latest = gw
        .ledger
        .latest(&TransferKey::new("ChatID", DESTINATION))
        .ok_or("missing ledger entry")?;
    assert_eq!(latest.status, TransferStatus::Succeeded);

    let res = signed_post(
        &client,
        gw.addr,
        "/webhook/status-callback",
        &[("CallSid", "CA200"), ("CallStatus", "completed"), ("Direction", "inbound")],
        WEBHOOK_SECRET,
    )
    .send()
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn refer_callback_signed_over_issued_action_url_is_accepted(
) -> Result<(), Box<dyn std::error::Error>> {
    let gw = start_gateway(Duration::from_secs(5)).await?;
    let client = reqwest::Client::new();

    // the action URL exactly as the handoff hands it to the carrier
    let action = refer_callback_url(&gw.addr.to_string(), "ChatID", DESTINATION)?;
    assert!(action.contains("destination_address=sip%3Aagent%40pbx.example.com"));
    let form = [
        ("ReferCallStatus", "in-progress"),
        ("ReferSipResponseCode", "202"),
        ("NotifySipResponseCode", "486"),
    ];
    let pairs: Vec<(String, String)> = form
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let signature = compute_webhook_signature(&action, &pairs, WEBHOOK_SECRET).ok_or("sign")?;
    let path_and_query = action
        .strip_prefix(&format!("https://{}", gw.addr))
        .ok_or("unexpected action host")?;

    let res = client
        .post(format!("http://{}{}", gw.addr, path_and_query))
        .header(SIGNATURE_HEADER, signature)
        .form(&form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let latest = gw
        .ledger
        .latest(&TransferKey::new("ChatID", DESTINATION))
        .ok_or("missing ledger entry")?;
    assert_eq!(latest.status, TransferStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn media_stream_escalates_on_hash() -> Result<(), Box<dyn std::error::Error>> {
    let gw = start_gateway(Duration::from_secs(5)).await?;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", gw.addr)).await?;

    let token = generate_session_token("ChatID", "CA300", "+15550001111", Some(SESSION_SECRET))?;
    let start = serde_json::json!({
        "event": "start",
        "streamSid": "MZ300",
        "start": {
            "callSid": "CA300",
            "streamSid": "MZ300",
            "customParameters": {
                "chat_id": "ChatID",
                "language": "en-US",
                "mobile": "+15550001111",
                "X-Fluid-Signature": token,
            }
        }
    });
    for frame in [
        r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#.to_string(),
        start.to_string(),
        r#"{"event":"media","media":{"track":"inbound","timestamp":"20","payload":"AAAA"}}"#.to_string(),
        r##"{"event":"dtmf","dtmf":{"track":"inbound_track","digit":"#"}}"##.to_string(),
        r#"{"event":"stop","streamSid":"MZ300"}"#.to_string(),
    ] {
        ws.send(Message::Text(frame)).await?;
    }
    assert!(drain_until_closed(&mut ws).await);

    let updates = gw.call_control.updates.lock().unwrap().clone();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "CA300");
    assert!(updates[0].1.contains("<Sip>sip:agent@pbx.example.com?transport=udp</Sip>"));

    let latest = gw
        .ledger
        .latest(&TransferKey::new("ChatID", DESTINATION))
        .ok_or("missing ledger entry")?;
    assert_eq!(latest.status, TransferStatus::Requested);
    Ok(())
}

#[tokio::test]
async fn media_stream_rejects_traffic_before_start() -> Result<(), Box<dyn std::error::Error>> {
    let gw = start_gateway(Duration::from_secs(5)).await?;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", gw.addr)).await?;

    ws.send(Message::Text(
        r##"{"event":"dtmf","dtmf":{"track":"inbound_track","digit":"#"}}"##.to_string(),
    ))
    .await?;
    assert!(drain_until_closed(&mut ws).await);
    assert!(gw.call_control.updates.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn media_stream_without_start_times_out() -> Result<(), Box<dyn std::error::Error>> {
    let gw = start_gateway(Duration::from_millis(200)).await?;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", gw.addr)).await?;

    ws.send(Message::Text(
        r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#.to_string(),
    ))
    .await?;
    assert!(drain_until_closed(&mut ws).await);
    Ok(())
}
