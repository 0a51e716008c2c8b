//! livehub: live FLV stream hub
//!
//! One publisher per stream key fans packets out to any number of viewers:
//! - Bounded per-viewer queues that drop on overflow, so a slow viewer never
//!   stalls the publisher or other viewers
//! - Codec headers delivered to every viewer before its first packet
//! - Each publish session recorded to a scratch file and archived to object
//!   storage when the publisher leaves
//! - A read-only JSON query API for live streams and presigned archive URLs
//!
//! # Example: Server
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use livehub::archive::{Archiver, FsObjectStore};
//! use livehub::{ServerConfig, StreamRegistry, StreamServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FsObjectStore::new("./data", "http://localhost:8083", "secret"));
//!     let archiver = Archiver::new(store, "videos");
//!     archiver.prepare().await?;
//!
//!     let registry = Arc::new(StreamRegistry::new());
//!     let server = StreamServer::new(ServerConfig::default(), registry, archiver);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod error;
pub mod http;
pub mod media;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use registry::{RegistryConfig, RepublishPolicy, StreamHub, StreamKey, StreamRegistry};
pub use server::config::ServerConfig;
pub use server::listener::StreamServer;
pub use session::{run_play, run_publish, MediaSink, MediaSource, SessionContext, SessionServices};
