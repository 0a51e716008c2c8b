//! Statistics for sessions and hubs

use std::time::{Duration, Instant};

use crate::media::flv::FlvTagType;
use crate::registry::Packet;

/// Per-session packet counters
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Packets handled (read for publishers, sent for viewers)
    pub packets: u64,
    /// Payload bytes handled
    pub bytes: u64,
    pub video_packets: u64,
    pub audio_packets: u64,
    pub keyframes: u64,
    /// Timestamp of the last packet handled
    pub last_timestamp: u32,
    /// Session start
    pub started_at: Instant,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            packets: 0,
            bytes: 0,
            video_packets: 0,
            audio_packets: 0,
            keyframes: 0,
            last_timestamp: 0,
            started_at: Instant::now(),
        }
    }

    /// Account for one packet
    pub fn on_packet(&mut self, packet: &Packet) {
        self.packets += 1;
        self.bytes += packet.size() as u64;
        self.last_timestamp = packet.timestamp;

        match packet.track {
            FlvTagType::Video => {
                self.video_packets += 1;
                if packet.is_keyframe {
                    self.keyframes += 1;
                }
            }
            FlvTagType::Audio => self.audio_packets += 1,
            FlvTagType::Script => {}
        }
    }

    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average bitrate in bits per second over the session so far
    pub fn bitrate(&self) -> u64 {
        bitrate(self.bytes, self.duration())
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a hub's fan-out counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Currently subscribed queues
    pub subscribers: usize,
    /// Packets passed to `broadcast`
    pub packets_broadcast: u64,
    /// Per-subscriber deliveries dropped because a queue was full
    pub packets_dropped: u64,
    /// Whether the hub has been closed
    pub closed: bool,
}

fn bitrate(bytes: u64, duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if secs > 0 {
        (bytes * 8) / secs
    } else {
        0
    }
}
