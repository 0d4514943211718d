//! Request context — per-connection state handed to handlers as metadata.
//!
//! The dispatch core never looks inside it. The transport builds one per
//! connection and every handler receives it untouched.

/// Context for a single request, carrying connection-level state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Unique identifier for the client connection.
    pub client_id: String,
    /// Remote address of the connection, when known.
    pub peer_addr: Option<String>,
}

impl RequestContext {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            peer_addr: None,
        }
    }

    pub fn with_peer_addr(mut self, addr: impl Into<String>) -> Self {
        self.peer_addr = Some(addr.into());
        self
    }
}
