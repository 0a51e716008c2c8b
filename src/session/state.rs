//! Session termination
//!
//! Both session kinds run until a single terminating condition and then
//! report why they stopped along with their counters.

use crate::archive::ArchivedObject;
use crate::registry::StreamKey;
use crate::stats::SessionStats;

/// Why a play session stopped relaying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayExit {
    /// The subscriber queue was closed
    QueueClosed,
    /// The hub signalled closure
    HubClosed,
    /// Writing to the viewer failed
    SinkFailed,
}

/// Why a publish session stopped ingesting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishExit {
    /// The publisher ended its stream cleanly
    EndOfStream,
    /// Reading from the publisher failed
    SourceFailed,
    /// Writing to the scratch recording failed
    RecorderFailed,
}

impl PlayExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayExit::QueueClosed => "queue closed",
            PlayExit::HubClosed => "hub closed",
            PlayExit::SinkFailed => "sink failed",
        }
    }
}

impl PublishExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishExit::EndOfStream => "end of stream",
            PublishExit::SourceFailed => "source failed",
            PublishExit::RecorderFailed => "recorder failed",
        }
    }
}

impl std::fmt::Display for PlayExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for PublishExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a finished play session
#[derive(Debug, Clone)]
pub struct PlayReport {
    pub key: StreamKey,
    pub exit: PlayExit,
    /// Packets relayed to the viewer
    pub stats: SessionStats,
}

/// Outcome of a finished publish session
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub key: StreamKey,
    pub exit: PublishExit,
    /// Packets read from the publisher
    pub stats: SessionStats,
    /// The uploaded recording, if archival succeeded
    pub archived: Option<ArchivedObject>,
}
