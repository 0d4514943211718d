//! Envelope validation — the request shape rules of JSON-RPC 2.0,
//! independent of any method schema.
//!
//! Checks run in a fixed order and the first failure wins:
//! object, `jsonrpc`, `method`, `id`, `params`.

use rpcbase_protocol::{Failure, Request, RequestId};
use serde_json::Value;

use crate::config::ServiceConfig;

pub const NOT_AN_OBJECT: &str = "Request must be a non-empty JSON object";
pub const MISSING_METHOD: &str = "Missing the \"method\" field";
pub const METHOD_TYPE: &str = "Invalid type for the \"method\" field; must be a string";
pub const EMPTY_METHOD: &str = "The \"method\" field must not be empty";
pub const ID_TYPE: &str = "Invalid type for the `id` field";
pub const PARAMS_TYPE: &str = "Invalid type for the `params` field";
pub const EMPTY_BATCH: &str = "Batch request array is empty";

/// An envelope that failed validation, with the id to answer under.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// The request's own id when it is a usable string or integer, else `null`.
    pub id: RequestId,
    pub failure: Failure,
}

impl Rejection {
    fn new(id: RequestId, details: impl Into<String>) -> Self {
        Self {
            id,
            failure: Failure::InvalidRequest(details.into()),
        }
    }
}

pub fn version_mismatch(config: &ServiceConfig) -> String {
    format!("Invalid jsonrpc version; expected \"{}\"", config.version)
}

/// Validate one decoded request value.
pub fn validate(value: Value, config: &ServiceConfig) -> Result<Request, Rejection> {
    let mut obj = match value {
        Value::Object(obj) if !obj.is_empty() => obj,
        _ => return Err(Rejection::new(RequestId::Null, NOT_AN_OBJECT)),
    };

    let reply_id = obj
        .get("id")
        .and_then(RequestId::from_value)
        .unwrap_or(RequestId::Null);

    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == config.version => {}
        None if config.allow_missing_version => {}
        _ => return Err(Rejection::new(reply_id, version_mismatch(config))),
    }

    let method = match obj.remove("method") {
        Some(Value::String(m)) if !m.is_empty() => m,
        Some(Value::String(_)) => return Err(Rejection::new(reply_id, EMPTY_METHOD)),
        Some(_) => return Err(Rejection::new(reply_id, METHOD_TYPE)),
        None => return Err(Rejection::new(reply_id, MISSING_METHOD)),
    };

    let id = match obj.remove("id") {
        None => None,
        Some(raw) => match RequestId::from_value(&raw) {
            Some(id) => Some(id),
            None => return Err(Rejection::new(RequestId::Null, ID_TYPE)),
        },
    };

    let params = match obj.remove("params") {
        None => None,
        Some(p @ (Value::Object(_) | Value::Array(_))) => Some(p),
        Some(_) => return Err(Rejection::new(reply_id, PARAMS_TYPE)),
    };

    Ok(Request {
        jsonrpc: config.version.to_string(),
        method,
        params,
        id,
    })
}
