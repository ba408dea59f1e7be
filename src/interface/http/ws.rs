use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::time::Instant;

use crate::interface::http::AppState;
use crate::protocol::stream::{Flow, StreamContext, StreamSession, StreamState};

pub(super) async fn stream_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let ctx = state.stream.clone();
    let start_timeout = state.config.timeouts.stream_start;
    ws.on_upgrade(move |socket| run_stream(socket, ctx, start_timeout))
}

/// One task per connection. Frames are handled strictly in arrival order and
/// the socket is closed on every exit path.
async fn run_stream(mut socket: WebSocket, ctx: StreamContext, start_timeout: Duration) {
    let mut session = StreamSession::new(ctx);
    let start_deadline = Instant::now() + start_timeout;
    log::info!("[stream] session={} connected", session.id());

    loop {
        let next = if session.state() == StreamState::AwaitingStart {
            match tokio::time::timeout_at(start_deadline, socket.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    log::warn!(
                        "[stream] session={} no start within {:?}",
                        session.id(),
                        start_timeout
                    );
                    break;
                }
            }
        } else {
            socket.recv().await
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(err)) => {
                log::warn!("[stream] session={} transport error: {}", session.id(), err);
                break;
            }
            None => break,
        };

        let flow = match message {
            Message::Text(text) => session.handle_text(&text).await.unwrap_or(Flow::Close),
            Message::Close(_) => Flow::Close,
            Message::Binary(_) => {
                log::debug!("[stream] session={} ignoring binary frame", session.id());
                Flow::Continue
            }
            Message::Ping(_) | Message::Pong(_) => Flow::Continue,
        };
        if flow == Flow::Close {
            break;
        }
    }

    session.handle_disconnect().await;
    let _ = socket.close().await;
    log::info!(
        "[stream] session={} finished state={} stream_sid={} handoffs={}",
        session.id(),
        session.state().as_str(),
        session.stream_sid().unwrap_or("-"),
        session.handoffs_requested()
    );
}
