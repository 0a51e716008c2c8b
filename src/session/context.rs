//! Session context
//!
//! Identity of the connection driving a publish or play session, carried
//! into log fields and session reports.

use std::net::SocketAddr;

/// Read-only information about the connection behind a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address, when the transport has one
    pub peer_addr: Option<SocketAddr>,
}

impl SessionContext {
    /// Create a context for a network connection
    pub fn new(session_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr: Some(peer_addr),
        }
    }

    /// Create a context for an in-process transport with no peer address
    pub fn detached(session_id: u64) -> Self {
        Self {
            session_id,
            peer_addr: None,
        }
    }
}

impl std::fmt::Display for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.peer_addr {
            Some(addr) => write!(f, "#{} ({})", self.session_id, addr),
            None => write!(f, "#{}", self.session_id),
        }
    }
}
