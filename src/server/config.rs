//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default port for publisher/viewer stream connections
pub const DEFAULT_STREAM_PORT: u16 = 1935;

/// Default port for the query API
pub const DEFAULT_HTTP_PORT: u16 = 8083;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the stream listener binds to
    pub bind_addr: SocketAddr,

    /// Address the query API binds to
    pub http_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// The request line must arrive within this time
    pub request_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Directory for scratch recordings (None = OS temp dir)
    pub scratch_dir: Option<PathBuf>,

    /// Lifetime of presigned archive URLs
    pub presign_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_STREAM_PORT)),
            http_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            max_connections: 0, // Unlimited
            request_timeout: Duration::from_secs(10),
            tcp_nodelay: true, // Important for low latency
            scratch_dir: None,
            presign_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the stream listener address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the query API address
    pub fn http_bind(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set request line timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set the scratch recording directory
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Set presigned URL lifetime
    pub fn presign_ttl(mut self, ttl: Duration) -> Self {
        self.presign_ttl = ttl;
        self
    }
}
