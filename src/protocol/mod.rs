pub mod auth;
pub mod document;
pub mod form;
pub mod stream;

pub use document::{empty_acknowledgement, CallFlowDocument, Verb};
pub use form::FormParams;
