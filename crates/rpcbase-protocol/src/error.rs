//! JSON-RPC 2.0 error codes, wire error objects, and the failure taxonomy.
//!
//! Every pipeline stage reports problems as a [`Failure`]. The only place a
//! failure becomes a wire [`ErrorObject`] is [`Failure::into_error_object`].

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Codes reserved for implementation-defined server errors.
pub const SERVER_ERROR_RANGE: RangeInclusive<i32> = -32099..=-32000;

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Any code in [`SERVER_ERROR_RANGE`]; `-32000` is the default.
    ServerError(i32),
}

impl ErrorCode {
    pub const DEFAULT_SERVER_ERROR: i32 = -32000;

    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError(c) => *c,
        }
    }

    /// Canonical message for the code. These strings are fixed.
    pub fn message(&self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError(_) => "Server error",
        }
    }

    /// Map a numeric code back to a known code. Returns `None` for codes
    /// outside the protocol-defined set and the server error sub-range.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(Self::ParseError),
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32602 => Some(Self::InvalidParams),
            -32603 => Some(Self::InternalError),
            c if SERVER_ERROR_RANGE.contains(&c) => Some(Self::ServerError(c)),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Build an error object carrying the canonical message for `code`.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<ErrorObject> for Value {
    fn from(error: ErrorObject) -> Self {
        let mut obj = Map::new();
        obj.insert("code".into(), json!(error.code));
        obj.insert("message".into(), Value::String(error.message));
        if let Some(data) = error.data {
            obj.insert("data".into(), data);
        }
        Value::Object(obj)
    }
}

impl std::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error [{}]: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorObject {}

/// Error returned by a method handler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MethodError {
    /// The handler failed. Answered as a Server Error with `code`, or
    /// `-32000` when no code is declared.
    #[error("{message}")]
    Server {
        code: Option<i32>,
        message: String,
        data: Option<Value>,
    },
    /// The handler rejected the shape of its arguments.
    #[error("invalid params: {0}")]
    InvalidParams(String),
}

impl MethodError {
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            code: None,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    /// Declare a custom server error code. Must lie in [`SERVER_ERROR_RANGE`];
    /// the dispatcher refuses to answer with anything else.
    pub fn with_code(self, code: i32) -> Self {
        match self {
            Self::Server { message, data, .. } => Self::Server {
                code: Some(code),
                message,
                data,
            },
            other => other,
        }
    }

    pub fn with_data(self, data: Value) -> Self {
        match self {
            Self::Server { code, message, .. } => Self::Server {
                code,
                message,
                data: Some(data),
            },
            other => other,
        }
    }
}

/// A protocol-level failure, recovered locally into an error response.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The payload is not valid JSON.
    Parse(String),
    /// The payload is not a valid request envelope or batch.
    InvalidRequest(String),
    /// No method is registered under the requested name.
    MethodNotFound { available: Vec<String> },
    /// `params` violated the method's schema or argument contract.
    InvalidParams(String),
    /// The handler failed; `code` is already known to be in range.
    Server {
        code: i32,
        method: String,
        details: String,
        context: Option<Value>,
    },
    /// Invariant violation inside the pipeline itself.
    Internal(String),
}

impl Failure {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Parse(_) => ErrorCode::ParseError,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::MethodNotFound { .. } => ErrorCode::MethodNotFound,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::Server { code, .. } => ErrorCode::ServerError(*code),
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Failures detected before a request could be read are answered even
    /// when no `id` is known.
    pub fn always_answered(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::InvalidRequest(_))
    }

    pub fn into_error_object(self) -> ErrorObject {
        let error = ErrorObject::new(self.error_code());
        let data = match self {
            Self::Parse(details)
            | Self::InvalidRequest(details)
            | Self::InvalidParams(details)
            | Self::Internal(details) => json!({ "details": details }),
            Self::MethodNotFound { available } => json!({ "available_methods": available }),
            Self::Server {
                method,
                details,
                context,
                ..
            } => {
                let mut data = json!({ "method": method, "details": details });
                if let Some(context) = context {
                    data["context"] = context;
                }
                data
            }
        };
        error.with_data(data)
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.error_code();
        match self {
            Self::Parse(d) | Self::InvalidRequest(d) | Self::InvalidParams(d) | Self::Internal(d) => {
                write!(f, "{code}: {d}")
            }
            Self::MethodNotFound { .. } => write!(f, "{code}"),
            Self::Server { method, details, .. } => write!(f, "{code}: {method}: {details}"),
        }
    }
}
