//! Stream keys, packets and codec headers
//!
//! These are the values that flow between a publisher and its viewers.
//! Payloads are `Bytes`, so fanning one packet out to many queues only bumps
//! a reference count.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::media::flv::{FlvTag, FlvTagType};

use super::error::RegistryError;

/// Identifier grouping one publisher with its viewers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    /// Key used when a connection addresses an empty path
    pub const DEFAULT: &'static str = "default";

    /// Create a key, falling back to [`StreamKey::DEFAULT`] when empty
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        if key.is_empty() {
            Self(Self::DEFAULT.to_string())
        } else {
            Self(key)
        }
    }

    /// Derive a key from a connection's target path (`/live/cam1` -> `live/cam1`)
    pub fn from_path(path: &str) -> Self {
        Self::new(path.strip_prefix('/').unwrap_or(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// One unit of media produced by a publisher
///
/// Cheap to clone: the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Audio, video or script track
    pub track: FlvTagType,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    /// Position in the publisher's packet sequence, starting at 0
    pub sequence: u64,
    /// Whether this is a video keyframe
    pub is_keyframe: bool,
    /// FLV tag body
    pub data: Bytes,
}

impl Packet {
    pub fn video(sequence: u64, timestamp: u32, data: Bytes) -> Self {
        Self::from_flv_tag(sequence, FlvTag::video(timestamp, data))
    }

    pub fn audio(sequence: u64, timestamp: u32, data: Bytes) -> Self {
        Self::from_flv_tag(sequence, FlvTag::audio(timestamp, data))
    }

    pub fn from_flv_tag(sequence: u64, tag: FlvTag) -> Self {
        Self {
            is_keyframe: tag.is_keyframe(),
            track: tag.tag_type,
            timestamp: tag.timestamp,
            sequence,
            data: tag.data,
        }
    }

    pub fn to_flv_tag(&self) -> FlvTag {
        FlvTag::new(self.track, self.timestamp, self.data.clone())
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// One out-of-band codec descriptor (sequence header or metadata)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecHeader {
    pub track: FlvTagType,
    pub data: Bytes,
}

impl CodecHeader {
    pub fn new(track: FlvTagType, data: Bytes) -> Self {
        Self { track, data }
    }

    /// Headers are always emitted at timestamp 0
    pub fn to_flv_tag(&self) -> FlvTag {
        FlvTag::new(self.track, 0, self.data.clone())
    }
}

impl From<FlvTag> for CodecHeader {
    fn from(tag: FlvTag) -> Self {
        Self::new(tag.tag_type, tag.data)
    }
}

/// Ordered, non-empty, immutable set of codec descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecHeaders(Arc<[CodecHeader]>);

impl CodecHeaders {
    /// Build a header set. Fails if `headers` is empty.
    pub fn new(headers: Vec<CodecHeader>) -> Result<Self, RegistryError> {
        if headers.is_empty() {
            return Err(RegistryError::EmptyHeaders);
        }
        Ok(Self(headers.into()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodecHeader> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[CodecHeader] {
        &self.0
    }

    pub fn has_audio(&self) -> bool {
        self.iter().any(|h| h.track == FlvTagType::Audio)
    }

    pub fn has_video(&self) -> bool {
        self.iter().any(|h| h.track == FlvTagType::Video)
    }

    /// Whether both values share the same allocation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_key_from_path() {
        assert_eq!(StreamKey::from_path("/live").as_str(), "live");
        assert_eq!(StreamKey::from_path("/live/cam1").as_str(), "live/cam1");
        assert_eq!(StreamKey::from_path("live").as_str(), "live");
        assert_eq!(StreamKey::from_path("/").as_str(), StreamKey::DEFAULT);
        assert_eq!(StreamKey::from_path("").as_str(), StreamKey::DEFAULT);
        // Only one leading slash is stripped
        assert_eq!(StreamKey::from_path("//x").as_str(), "/x");
    }

    #[test]
    fn test_stream_key_serializes_as_string() {
        let json = serde_json::to_string(&StreamKey::new("live/a")).unwrap();
        assert_eq!(json, "\"live/a\"");
    }

    #[test]
    fn test_packet_from_tag() {
        let packet = Packet::video(3, 40, Bytes::from_static(&[0x17, 0x01]));
        assert_eq!(packet.track, FlvTagType::Video);
        assert_eq!(packet.sequence, 3);
        assert!(packet.is_keyframe);

        let tag = packet.to_flv_tag();
        assert_eq!(tag.timestamp, 40);
        assert_eq!(tag.data, packet.data);

        let audio = Packet::audio(4, 41, Bytes::from_static(&[0xAF, 0x01]));
        assert!(!audio.is_keyframe);
    }

    #[test]
    fn test_codec_headers_non_empty() {
        assert!(matches!(
            CodecHeaders::new(vec![]),
            Err(RegistryError::EmptyHeaders)
        ));

        let headers = CodecHeaders::new(vec![CodecHeader::new(
            FlvTagType::Video,
            Bytes::from_static(&[0x17, 0x00]),
        )])
        .unwrap();
        assert_eq!(headers.len(), 1);
        assert!(!headers.is_empty());
        assert!(headers.has_video());
        assert!(!headers.has_audio());

        let copy = headers.clone();
        assert!(copy.ptr_eq(&headers));
    }
}
