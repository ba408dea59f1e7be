pub mod interface;
pub mod protocol;
pub mod service;
pub mod shared;

pub use interface::{carrier, http};
pub use protocol::{auth, stream};
pub use service::{handoff, webhook};
pub use shared::{config, entities, error, logging, ports, utils};
