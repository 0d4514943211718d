//! rpcbase server — the JSON-RPC 2.0 dispatch core.
//!
//! Owns the method registry, validates request envelopes and parameters,
//! routes calls to handlers, and builds single or batch responses. It is
//! transport-agnostic; [`JsonRpcService`] also implements the transport's
//! `RequestHandler` for connection-scoped metadata.

pub mod config;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod router;
pub mod schema;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use registry::{MethodEntry, MethodRegistry};
pub use router::{JsonRpcService, Reply};
pub use schema::{MethodSchema, ServiceSchema};
