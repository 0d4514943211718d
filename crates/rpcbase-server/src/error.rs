//! Configuration faults.
//!
//! These never become JSON-RPC responses: they indicate a bug in the
//! embedding application and are returned to it as-is.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("duplicate method name for JSON-RPC service: '{0}'")]
    DuplicateMethodName(String),

    #[error("method name '{0}' is reserved")]
    ReservedMethodName(String),

    #[error(
        "invalid server error code {code} from method '{method}'; must be in the range -32000 to -32099"
    )]
    InvalidServerErrorCode { method: String, code: i32 },

    #[error("invalid JSON-Schema for '{method}': {details}")]
    InvalidSchema { method: String, details: String },

    #[error("a service schema is already attached")]
    SchemaAlreadySet,

    #[error("result of '{method}' violates its result schema: {details}")]
    ResultSchemaViolation { method: String, details: String },
}
