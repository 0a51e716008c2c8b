//! Read-only query API
//!
//! ```text
//! GET /health                         {"status":"ok"}
//! GET /streams                        {"streams":[...]}
//! GET /streams/{key}/object           {"object":..., "url":...}
//! GET /objects/{bucket}/{object}?expires=..&signature=..
//! ```
//!
//! The `/objects` route serves presigned URLs issued by [`FsObjectStore`]
//! and is only mounted when one is configured.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::archive::{Archiver, FsObjectStore};
use crate::registry::StreamRegistry;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StreamRegistry>,
    pub archiver: Archiver,
    pub presign_ttl: Duration,
    /// Local object store, when presigned URLs point back at this server
    pub objects: Option<Arc<FsObjectStore>>,
}

impl AppState {
    pub fn new(registry: Arc<StreamRegistry>, archiver: Archiver, presign_ttl: Duration) -> Self {
        Self {
            registry,
            archiver,
            presign_ttl,
            objects: None,
        }
    }

    pub fn with_objects(mut self, store: Arc<FsObjectStore>) -> Self {
        self.objects = Some(store);
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/streams", get(handlers::list_streams))
        .route("/streams/*rest", get(handlers::stream_object));

    if state.objects.is_some() {
        router = router.route("/objects/:bucket/*object", get(handlers::get_object));
    }

    router.with_state(state)
}

/// Serve the query API on `addr` until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Query API listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
