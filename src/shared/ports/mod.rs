pub mod call_control;
pub mod conversation;
pub mod handoff;
pub mod transfer_ledger;

pub use call_control::{CallControlFuture, CallControlPort, UnconfiguredCallControl};
pub use conversation::{ConversationError, ConversationFuture, ConversationPort, MediaChunk, NoopConversation};
pub use handoff::{AgentHandoffPort, HandoffFuture};
pub use transfer_ledger::{InMemoryTransferLedger, TransferKey, TransferLedger, TransferRecord};
