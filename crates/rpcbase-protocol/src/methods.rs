//! Reserved method names.

/// Method names with protocol-defined meaning.
pub struct Methods;

impl Methods {
    /// Returns the service description document.
    pub const RPC_DISCOVER: &str = "rpc.discover";

    /// Prefix reserved by JSON-RPC 2.0 for rpc-internal methods.
    pub const RESERVED_PREFIX: &str = "rpc.";
}

/// Whether `name` falls in the reserved `rpc.` namespace.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(Methods::RESERVED_PREFIX)
}
