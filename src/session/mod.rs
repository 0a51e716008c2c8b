//! Publish and play sessions
//!
//! A session drives one connection against the [`StreamRegistry`]:
//!
//! - [`run_publish`] ingests packets from a [`MediaSource`], records them to
//!   a scratch file, fans them out through a new hub, and archives the
//!   recording when the publisher leaves.
//! - [`run_play`] relays a live hub's packets to a [`MediaSink`] until the
//!   queue or hub closes or the viewer goes away.
//!
//! The transport is abstract: anything that can produce or consume codec
//! headers and packets can drive a session.
//!
//! [`StreamRegistry`]: crate::registry::StreamRegistry

pub mod context;
pub mod play;
pub mod publish;
pub mod recorder;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::error::Result;
use crate::registry::{CodecHeaders, Packet};

pub use context::SessionContext;
pub use play::run_play;
pub use publish::{run_publish, SessionServices};
pub use recorder::{Recorder, Recording};
pub use state::{PlayExit, PlayReport, PublishExit, PublishReport};

/// Publisher side of a protocol connection
#[async_trait]
pub trait MediaSource: Send {
    /// Target path the connection addressed
    fn path(&self) -> &str;

    /// Codec headers announced before the first media packet
    async fn stream_headers(&mut self) -> Result<CodecHeaders>;

    /// Next packet, or `None` once the publisher ends the stream
    async fn read_packet(&mut self) -> Result<Option<Packet>>;
}

/// Viewer side of a protocol connection
#[async_trait]
pub trait MediaSink: Send {
    /// Target path the connection addressed
    fn path(&self) -> &str;

    async fn write_header(&mut self, headers: &CodecHeaders) -> Result<()>;

    async fn write_packet(&mut self, packet: &Packet) -> Result<()>;
}
