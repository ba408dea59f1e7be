use std::collections::VecDeque;
use std::sync::Arc;

use crate::protocol::auth::verify_session_token;
use crate::protocol::stream::event::StreamEvent;
use crate::protocol::stream::state_machine::StreamStateMachine;
use crate::protocol::stream::types::{StreamCommand, StreamInput, StreamState};
use crate::shared::entities::{CallSession, CallSid, ChatId, StreamSessionId};
use crate::shared::error::{SignatureError, StreamError};
use crate::shared::ports::{AgentHandoffPort, ConversationPort, MediaChunk};
use crate::shared::utils::mask_phone;

/// What the transport should do after a message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Process-wide collaborators every stream session needs. Cheap to clone.
#[derive(Clone)]
pub struct StreamContext {
    pub session_secret: Option<String>,
    pub handoff: Arc<dyn AgentHandoffPort>,
    pub conversation: Arc<dyn ConversationPort>,
}

/// One media-stream connection. Owned by the task serving that connection;
/// nothing here is shared with other sessions.
pub struct StreamSession {
    id: StreamSessionId,
    ctx: StreamContext,
    machine: StreamStateMachine,
    call: Option<CallSession>,
    stream_sid: Option<String>,
    handoffs_requested: u32,
}

impl StreamSession {
    pub fn new(ctx: StreamContext) -> Self {
        Self {
            id: StreamSessionId::new(),
            ctx,
            machine: StreamStateMachine::new(),
            call: None,
            stream_sid: None,
            handoffs_requested: 0,
        }
    }

    pub fn id(&self) -> &StreamSessionId {
        &self.id
    }

    pub fn state(&self) -> StreamState {
        self.machine.state()
    }

    pub fn call(&self) -> Option<&CallSession> {
        self.call.as_ref()
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn handoffs_requested(&self) -> u32 {
        self.handoffs_requested
    }

    /// Parse and handle one text frame. A malformed frame closes this
    /// session and is returned as `MalformedEvent`.
    pub async fn handle_text(&mut self, text: &str) -> Result<Flow, StreamError> {
        let event = match StreamEvent::parse(text) {
            Ok(event) => event,
            Err(err) => {
                log::warn!("[stream] session={} dropping connection: {}", self.id, err);
                self.handle_disconnect().await;
                return Err(err);
            }
        };
        Ok(self.handle_event(&event).await)
    }

    pub async fn handle_event(&mut self, event: &StreamEvent) -> Flow {
        log::debug!(
            "[stream] session={} event={} state={}",
            self.id,
            event.name(),
            self.state().as_str()
        );
        let commands = self.machine.process_event(StreamInput::Event(event));
        self.run(commands, Some(event)).await
    }

    /// Transport went away (or never sent `start` in time).
    pub async fn handle_disconnect(&mut self) {
        let commands = self.machine.process_event(StreamInput::Disconnected);
        if !commands.is_empty() {
            log::info!(
                "[stream] session={} disconnected in state={}",
                self.id,
                self.state().as_str()
            );
        }
        self.run(commands, None).await;
    }

    async fn run(&mut self, commands: Vec<StreamCommand>, event: Option<&StreamEvent>) -> Flow {
        let mut queue: VecDeque<StreamCommand> = commands.into();
        let mut flow = Flow::Continue;
        while let Some(command) = queue.pop_front() {
            match command {
                StreamCommand::Transition(next) => self.transition(next).await,
                StreamCommand::Authenticate => {
                    let accepted = self.authenticate(event);
                    queue.extend(
                        self.machine
                            .process_event(StreamInput::AuthDecision(accepted)),
                    );
                }
                StreamCommand::ForwardMedia => self.forward_media(event).await,
                StreamCommand::RequestHandoff => self.request_handoff().await,
                StreamCommand::CloseConnection => flow = Flow::Close,
            }
        }
        if self.state().is_terminal() {
            Flow::Close
        } else {
            flow
        }
    }

    async fn transition(&mut self, next: StreamState) {
        let prev = self.state();
        self.machine.apply_commands(&[StreamCommand::Transition(next)]);
        log::info!(
            "[stream] session={} call_sid={} {} -> {}",
            self.id,
            self.call.as_ref().map(|c| c.call_sid.as_str()).unwrap_or("-"),
            prev.as_str(),
            next.as_str()
        );

        match (prev, next) {
            (_, StreamState::Authenticated) => {
                if let Some(call) = self.call.as_mut() {
                    call.mark_authenticated();
                    let call = call.clone();
                    if let Err(err) = self.ctx.conversation.session_started(call).await {
                        log::warn!("[stream] session={} conversation start failed: {}", self.id, err);
                    }
                }
            }
            (StreamState::Authenticated, StreamState::Closed) => {
                if let Some(call) = self.call.clone() {
                    if let Err(err) = self.ctx.conversation.session_closed(call).await {
                        log::warn!("[stream] session={} conversation close failed: {}", self.id, err);
                    }
                }
            }
            _ => {}
        }
    }

    /// Exactly one decision per session; every error is a rejection.
    fn authenticate(&mut self, event: Option<&StreamEvent>) -> bool {
        let Some(StreamEvent::Start { stream_sid, start }) = event else {
            return false;
        };
        let (call, token) = CallSession::from_stream_parameters(&start.call_sid, &start.custom_parameters);
        self.stream_sid = stream_sid.clone().or_else(|| start.stream_sid.clone());
        log::info!(
            "[stream] session={} start call_sid={} stream_sid={} chat_id={} mobile={} language={}",
            self.id,
            call.call_sid,
            self.stream_sid.as_deref().unwrap_or("-"),
            call.chat_id,
            mask_phone(&call.mobile),
            call.language
        );

        let result = match token.as_deref() {
            Some(token) => verify_session_token(
                &call.chat_id,
                &call.call_sid,
                &call.mobile,
                token,
                self.ctx.session_secret.as_deref(),
            ),
            None => Err(SignatureError::MissingField("session_token")),
        };
        self.call = Some(call);

        match result {
            Ok(true) => true,
            Ok(false) => {
                log::warn!("[stream] session={} session token mismatch", self.id);
                false
            }
            Err(err) => {
                log::warn!("[stream] session={} session token rejected: {}", self.id, err);
                false
            }
        }
    }

    async fn forward_media(&self, event: Option<&StreamEvent>) {
        let (Some(StreamEvent::Media { media }), Some(call)) = (event, self.call.as_ref()) else {
            return;
        };
        let chunk = MediaChunk {
            track: media.track.clone(),
            timestamp: media.timestamp.clone(),
            payload: media.payload.clone(),
        };
        if let Err(err) = self.ctx.conversation.forward_media(call.clone(), chunk).await {
            log::warn!("[stream] session={} media forward failed: {}", self.id, err);
        }
    }

    async fn request_handoff(&mut self) {
        let Some(call) = self.call.as_ref() else {
            return;
        };
        let ids = (
            CallSid::new(call.call_sid.clone()),
            ChatId::new(call.chat_id.clone()),
        );
        let (call_sid, chat_id) = match ids {
            (Ok(call_sid), Ok(chat_id)) => (call_sid, chat_id),
            (Err(err), _) | (_, Err(err)) => {
                log::error!("[stream] session={} cannot hand off: {}", self.id, err);
                return;
            }
        };

        self.handoffs_requested += 1;
        log::info!(
            "[stream] session={} escalation digit received, handing off call_sid={} chat_id={}",
            self.id,
            call_sid,
            chat_id
        );
        match self.ctx.handoff.request_handoff(call_sid.clone(), chat_id).await {
            Ok(()) => log::info!("[stream] session={} handoff requested call_sid={}", self.id, call_sid),
            Err(err) => log::error!(
                "[stream] session={} handoff failed call_sid={}: {}",
                self.id,
                call_sid,
                err
            ),
        }
    }
}
