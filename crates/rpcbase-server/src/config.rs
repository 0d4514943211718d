//! Dispatcher configuration, fixed at construction.

use rpcbase_protocol::JSONRPC_VERSION;

/// Options for a [`crate::JsonRpcService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Version literal required in requests and echoed in responses.
    pub version: &'static str,
    /// Validate handler results against their result schema.
    pub debug: bool,
    /// Treat a request with no `jsonrpc` field as the current version.
    /// An explicitly wrong value is rejected regardless.
    pub allow_missing_version: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: JSONRPC_VERSION,
            debug: false,
            allow_missing_version: false,
        }
    }
}

impl ServiceConfig {
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_missing_version_allowed(mut self, allow: bool) -> Self {
        self.allow_missing_version = allow;
        self
    }
}
