pub mod arguments;
pub mod backend;
pub mod call_stream;
pub mod config;
pub mod constants;
pub mod correlator;
pub mod inspector;
pub mod session;
