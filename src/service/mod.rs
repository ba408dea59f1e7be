pub mod handoff;
pub mod webhook;
