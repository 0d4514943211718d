//! rpcbase protocol types
//!
//! JSON-RPC 2.0 wire types shared by the dispatcher and the transport.
//! This crate is the single source of truth for error codes, their
//! canonical messages, and the failure taxonomy of the pipeline.

pub mod context;
pub mod error;
pub mod jsonrpc;
pub mod methods;

pub use context::RequestContext;
pub use error::{ErrorCode, ErrorObject, Failure, MethodError, SERVER_ERROR_RANGE};
pub use jsonrpc::{
    ErrorResponse, HandlerResult, JSONRPC_VERSION, Request, RequestId, Response,
    SuccessResponse,
};
pub use methods::{Methods, is_reserved};
