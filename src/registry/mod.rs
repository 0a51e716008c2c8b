//! Stream registry and broadcast hubs
//!
//! The registry indexes live streams by key. Each stream is a [`StreamHub`]
//! that fans packets from one publisher out to many bounded subscriber
//! queues.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRegistry>
//!                     ┌─────────────────────────┐
//!                     │ streams: HashMap<Key,   │
//!                     │   Arc<StreamHub> {      │
//!                     │     headers,            │
//!                     │     queues: id -> Tx,   │
//!                     │     closed: watch,      │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Publisher]            [Subscription]          [Subscription]
//!    read_packet()          sub.recv()              sub.recv()
//!         │                       │                       │
//!         └──► hub.broadcast() ──► write_packet() ──► TCP
//!              (try_send, drop on full)
//! ```
//!
//! # Zero-Copy Design
//!
//! `bytes::Bytes` uses reference counting, so all subscribers share the same
//! payload allocation. Each queue receives a cloned `Packet`, but only the
//! reference count of its data is touched.

pub mod config;
pub mod error;
pub mod frame;
pub mod hub;
pub mod store;

pub use config::{RegistryConfig, RepublishPolicy, DEFAULT_QUEUE_CAPACITY};
pub use error::RegistryError;
pub use frame::{CodecHeader, CodecHeaders, Packet, StreamKey};
pub use hub::{Received, StreamHub, Subscription};
pub use store::StreamRegistry;
