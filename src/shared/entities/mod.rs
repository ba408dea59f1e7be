pub mod call_session;
pub mod identifiers;
pub mod transfer;

pub use call_session::{CallSession, Direction, RoutingHints};
pub use identifiers::{CallSid, ChatId, IdentifierError, StreamSessionId};
pub use transfer::{TransferOutcome, TransferStatus};
