//! rpcbase transport layer
//!
//! Line-delimited JSON-RPC over TCP. The transport only moves bytes: it
//! hands each payload to a [`RequestHandler`] together with the
//! connection's [`rpcbase_protocol::RequestContext`] and writes back
//! whatever reply the handler produced.

pub mod client;
pub mod server;

pub use client::ClientConnection;
pub use server::{RequestHandler, TransportConfig, TransportError, TransportServer};
