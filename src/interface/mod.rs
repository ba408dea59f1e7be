pub mod carrier;
pub mod http;
