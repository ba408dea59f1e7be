//! Carrier media stream: event decoding, the per-connection state machine
//! and the session driver that runs its commands.

pub mod event;
pub mod session;
pub mod state_machine;
pub mod types;

pub use event::{DtmfPayload, MediaPayload, StartPayload, StreamEvent};
pub use session::{Flow, StreamContext, StreamSession};
pub use state_machine::StreamStateMachine;
pub use types::{next_stream_commands, StreamCommand, StreamInput, StreamState, ESCALATION_DIGIT};
