//! Stream server listener
//!
//! Handles the TCP accept loop and spawns one task per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::archive::Archiver;
use crate::error::Result;
use crate::registry::StreamRegistry;
use crate::server::config::ServerConfig;
use crate::server::connection::{serve, SessionReport};
use crate::session::{SessionContext, SessionServices};

/// Publisher/viewer stream server
pub struct StreamServer {
    config: ServerConfig,
    services: SessionServices,
    next_session_id: Arc<AtomicU64>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl StreamServer {
    /// Create a server sharing `registry` with the rest of the process
    pub fn new(config: ServerConfig, registry: Arc<StreamRegistry>, archiver: Archiver) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let mut services = SessionServices::new(registry, archiver);
        services.scratch_dir = config.scratch_dir.clone();

        Self {
            config,
            services,
            next_session_id: Arc::new(AtomicU64::new(1)),
            connection_semaphore,
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.services.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve forever
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.accept_loop(&listener).await
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve an already bound listener until `shutdown` resolves
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Stream server listening");
        Ok(listener)
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = match self.acquire_permit() {
            Ok(permit) => permit,
            Err(()) => {
                tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                return;
            }
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let services = self.services.clone();
        let request_timeout = self.config.request_timeout;

        tokio::spawn(async move {
            let _permit = permit;
            let ctx = SessionContext::new(session_id, peer_addr);

            match serve(&ctx, socket, &services, request_timeout).await {
                Ok(SessionReport::Publish(report)) => {
                    tracing::debug!(session_id = session_id, stream = %report.key, exit = %report.exit, "Publisher connection finished");
                }
                Ok(SessionReport::Play(report)) => {
                    tracing::debug!(session_id = session_id, stream = %report.key, exit = %report.exit, "Viewer connection finished");
                }
                Err(e) if e.is_disconnect() => {
                    tracing::debug!(session_id = session_id, error = %e, "Peer disconnected");
                }
                Err(e) => {
                    tracing::warn!(session_id = session_id, error = %e, "Connection error");
                }
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    fn acquire_permit(&self) -> std::result::Result<Option<OwnedSemaphorePermit>, ()> {
        match &self.connection_semaphore {
            Some(sem) => Arc::clone(sem).try_acquire_owned().map(Some).map_err(|_| ()),
            None => Ok(None),
        }
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
