use crate::protocol::stream::event::StreamEvent;

/// DTMF digit that escalates the call to a human agent.
pub const ESCALATION_DIGIT: &str = "#";

/// Media-stream connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    AwaitingStart,
    Authenticating,
    Authenticated,
    /// No further traffic is processed; only the release to `Closed` remains.
    Rejected,
    Closed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Rejected | StreamState::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamState::AwaitingStart => "awaiting_start",
            StreamState::Authenticating => "authenticating",
            StreamState::Authenticated => "authenticated",
            StreamState::Rejected => "rejected",
            StreamState::Closed => "closed",
        }
    }
}

/// Inputs to the state machine: carrier events plus the two things the
/// session driver reports back.
#[derive(Debug, Clone, Copy)]
pub enum StreamInput<'a> {
    Event(&'a StreamEvent),
    /// Result of verifying the session token presented in `start`.
    AuthDecision(bool),
    /// Transport closed, errored, or the start deadline passed.
    Disconnected,
}

impl<'a> From<&'a StreamEvent> for StreamInput<'a> {
    fn from(value: &'a StreamEvent) -> Self {
        StreamInput::Event(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCommand {
    Transition(StreamState),
    /// Verify the session token carried by the current `start` event.
    Authenticate,
    ForwardMedia,
    RequestHandoff,
    CloseConnection,
}

/// Transition table. Returns the commands to run for `input` in `state`;
/// no I/O happens here.
pub fn next_stream_commands(state: StreamState, input: StreamInput<'_>) -> Vec<StreamCommand> {
    use StreamCommand::*;
    use StreamState::*;

    match (state, input) {
        (Closed, _) => Vec::new(),
        (_, StreamInput::Disconnected) => vec![Transition(Closed)],

        (Authenticating, StreamInput::AuthDecision(true)) => vec![Transition(Authenticated)],
        (Authenticating, StreamInput::AuthDecision(false)) => {
            vec![Transition(Rejected), CloseConnection]
        }
        // 認証判定は Authenticating 中の一回だけ
        (_, StreamInput::AuthDecision(_)) => Vec::new(),

        (_, StreamInput::Event(StreamEvent::Stop { .. })) => vec![Transition(Closed)],
        (Rejected, StreamInput::Event(_)) => Vec::new(),

        (_, StreamInput::Event(StreamEvent::Connected { .. })) => Vec::new(),
        (_, StreamInput::Event(StreamEvent::Unknown)) => Vec::new(),

        (AwaitingStart, StreamInput::Event(StreamEvent::Start { .. })) => {
            vec![Transition(Authenticating), Authenticate]
        }
        // A second `start` would mean a second authentication decision.
        (_, StreamInput::Event(StreamEvent::Start { .. })) => {
            vec![Transition(Rejected), CloseConnection]
        }

        (Authenticated, StreamInput::Event(StreamEvent::Media { .. })) => vec![ForwardMedia],
        (Authenticated, StreamInput::Event(StreamEvent::Dtmf { dtmf })) => {
            if dtmf.digit.trim() == ESCALATION_DIGIT {
                vec![RequestHandoff]
            } else {
                Vec::new()
            }
        }
        // Payload traffic before authentication.
        (_, StreamInput::Event(StreamEvent::Media { .. } | StreamEvent::Dtmf { .. })) => {
            vec![Transition(Rejected), CloseConnection]
        }
    }
}
