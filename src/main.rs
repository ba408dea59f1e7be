use tokio::net::TcpListener;

use voicecall_gateway::http::{self, AppState};
use voicecall_gateway::{config, logging};

/// Starts the gateway: loads configuration, binds the HTTP listener and
/// serves webhooks and media streams until ctrl-c.
///
/// Missing carrier or session secrets do not stop startup; the affected
/// webhooks fail closed and handoff reports `MissingConfiguration`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cfg = config::Config::from_env()?;
    log::info!("[main] starting with {:?}", cfg);
    if cfg.public_host.is_none() {
        log::warn!("[main] PUBLIC_HOST not set; webhook responses use the request Host header");
    }

    let listener = TcpListener::bind(cfg.http_bind_addr).await?;
    let state = AppState::from_config(cfg);

    http::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("[main] ctrl_c listener failed: {}", e);
        }
        log::info!("[main] shutdown requested");
    })
    .await?;

    log::info!("[main] stopped");
    Ok(())
}
