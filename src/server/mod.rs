//! Stream server
//!
//! Accepts publisher and viewer connections over TCP and dispatches each to
//! a publish or play session.

pub mod config;
pub mod connection;
pub mod listener;
pub mod transport;

pub use config::ServerConfig;
pub use connection::{parse_request_line, read_request, serve, Request, SessionReport};
pub use listener::StreamServer;
pub use transport::{FlvSink, FlvSource};
