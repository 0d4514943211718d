//! Client connection state tracking.

use std::net::SocketAddr;
use std::time::Instant;

use rpcbase_protocol::RequestContext;

/// Represents a connected client.
#[derive(Debug)]
pub struct ClientConnection {
    /// Unique client ID
    pub id: String,
    /// Remote address
    pub peer: SocketAddr,
    /// When the client connected
    pub connected_at: Instant,
    /// Last time we received a payload from this client
    pub last_activity: Instant,
    /// Number of payloads received
    pub payloads: u64,
}

impl ClientConnection {
    pub fn new(id: String, peer: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            peer,
            connected_at: now,
            last_activity: now,
            payloads: 0,
        }
    }

    /// Metadata handed to every handler invoked for this connection.
    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.id.clone()).with_peer_addr(self.peer.to_string())
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.payloads += 1;
    }
}
