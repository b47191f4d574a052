//! mcp-inspector invokes MCP tools through a capability proxy and follows
//! the events each call emits until it settles.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the call lifecycle: sessions, dispatch, event-stream
//!   subscriptions, the event reducer and cancellation.
//! - [`api`] defines the wire payloads exchanged with the proxy.
//! - [`cli`] parses arguments and drives the engine from a terminal.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
