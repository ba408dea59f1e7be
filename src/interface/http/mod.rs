//! HTTP surface: signed carrier webhooks, the media-stream websocket, a
//! liveness probe and the static greeting assets.

pub mod error;
mod signed;
mod webhook;
mod ws;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

use crate::interface::carrier::build_call_control;
use crate::protocol::stream::StreamContext;
use crate::service::handoff::{HandoffOrchestrator, REFER_CALLBACK_PATH};
use crate::service::webhook::{WebhookDispatcher, STATIC_PATH, STREAM_PATH};
use crate::shared::config::Config;
use crate::shared::ports::{
    CallControlPort, ConversationPort, InMemoryTransferLedger, NoopConversation, TransferLedger,
};

pub use signed::SignedForm;

pub const RECEIVE_CALL_PATH: &str = "/webhook/receive-call";
pub const STATUS_CALLBACK_PATH: &str = "/webhook/status-callback";
pub const IS_ALIVE_PATH: &str = "/is-alive";

/// Everything the handlers share. Built once at startup; cloning only
/// bumps reference counts.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ledger: Arc<dyn TransferLedger>,
    pub webhooks: WebhookDispatcher,
    pub handoff: HandoffOrchestrator,
    pub stream: StreamContext,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        call_control: Arc<dyn CallControlPort>,
        ledger: Arc<dyn TransferLedger>,
        conversation: Arc<dyn ConversationPort>,
    ) -> Self {
        let handoff = HandoffOrchestrator::new(
            call_control,
            ledger.clone(),
            config.public_host.clone(),
            config.transfer_destination.clone(),
        );
        let stream = StreamContext {
            session_secret: config.session_token_secret.clone(),
            handoff: Arc::new(handoff.clone()),
            conversation,
        };
        Self {
            webhooks: WebhookDispatcher::new(config.clone(), ledger.clone()),
            config,
            ledger,
            handoff,
            stream,
        }
    }

    /// Production wiring: REST call control (when credentials exist), an
    /// in-memory ledger and no conversation backend.
    pub fn from_config(config: Config) -> Self {
        let call_control = build_call_control(&config);
        Self::new(
            Arc::new(config),
            call_control,
            Arc::new(InMemoryTransferLedger::new()),
            Arc::new(NoopConversation::new()),
        )
    }
}

pub fn router(state: AppState) -> Router {
    let assets = ServeDir::new(state.config.assets_dir.clone());
    Router::new()
        .route(IS_ALIVE_PATH, get(is_alive))
        .route(RECEIVE_CALL_PATH, post(webhook::receive_call))
        .route(REFER_CALLBACK_PATH, post(webhook::refer_callback))
        .route(STATUS_CALLBACK_PATH, post(webhook::status_callback))
        .route(STREAM_PATH, get(ws::stream_upgrade))
        .nest_service(STATIC_PATH, assets)
        .with_state(state)
}

async fn is_alive() -> &'static str {
    "Alive"
}

pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    log::info!("[http] gateway listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub fn spawn_gateway_server_with_listener(listener: TcpListener, state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve(listener, state, std::future::pending()).await {
            log::error!("[http] gateway server error: {:?}", e);
        }
    })
}
