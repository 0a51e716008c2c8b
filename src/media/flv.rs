//! FLV tag model
//!
//! Every packet that moves through the hub is an FLV tag body: the first byte
//! carries the codec/frame-type nibbles, the rest is codec data.
//!
//! Video tag body:
//! ```text
//! +----------+----------+
//! | FrameType| CodecID  | AVCPacketType | CodecData...
//! | (4 bits) | (4 bits) |    (8 bits)   |
//! +----------+----------+
//! ```
//!
//! Audio tag body:
//! ```text
//! +-----------+----------+----------+----------+
//! |SoundFormat|SoundRate |SoundSize |SoundType | AACPacketType | AudioData...
//! | (4 bits)  | (2 bits) | (1 bit)  | (1 bit)  |    (8 bits)   |
//! +-----------+----------+----------+----------+
//! ```

use bytes::Bytes;

/// FLV tag type byte for audio tags
pub const TAG_TYPE_AUDIO: u8 = 8;
/// FLV tag type byte for video tags
pub const TAG_TYPE_VIDEO: u8 = 9;
/// FLV tag type byte for script data (onMetaData)
pub const TAG_TYPE_SCRIPT: u8 = 18;

/// FLV tag type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlvTagType {
    Audio,
    Video,
    Script,
}

impl FlvTagType {
    /// Decode the tag type byte. The upper three bits (filter/reserved) are ignored.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x1F {
            TAG_TYPE_AUDIO => Some(FlvTagType::Audio),
            TAG_TYPE_VIDEO => Some(FlvTagType::Video),
            TAG_TYPE_SCRIPT => Some(FlvTagType::Script),
            _ => None,
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            FlvTagType::Audio => TAG_TYPE_AUDIO,
            FlvTagType::Video => TAG_TYPE_VIDEO,
            FlvTagType::Script => TAG_TYPE_SCRIPT,
        }
    }
}

/// Video frame type (upper 4 bits of first byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFrameType {
    Keyframe = 1,
    InterFrame = 2,
    DisposableInterFrame = 3,
    GeneratedKeyframe = 4,
    VideoInfoFrame = 5,
}

impl VideoFrameType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match (b >> 4) & 0x07 {
            1 => Some(VideoFrameType::Keyframe),
            2 => Some(VideoFrameType::InterFrame),
            3 => Some(VideoFrameType::DisposableInterFrame),
            4 => Some(VideoFrameType::GeneratedKeyframe),
            5 => Some(VideoFrameType::VideoInfoFrame),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(
            self,
            VideoFrameType::Keyframe | VideoFrameType::GeneratedKeyframe
        )
    }
}

/// Video codec ID (lower 4 bits of first byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    SorensonH263 = 2,
    ScreenVideo = 3,
    Vp6 = 4,
    Vp6Alpha = 5,
    ScreenVideoV2 = 6,
    Avc = 7,
    /// HEVC under the legacy (non-FourCC) codec id used by most encoders
    Hevc = 12,
    Av1 = 13,
}

impl VideoCodec {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x0F {
            2 => Some(VideoCodec::SorensonH263),
            3 => Some(VideoCodec::ScreenVideo),
            4 => Some(VideoCodec::Vp6),
            5 => Some(VideoCodec::Vp6Alpha),
            6 => Some(VideoCodec::ScreenVideoV2),
            7 => Some(VideoCodec::Avc),
            12 => Some(VideoCodec::Hevc),
            13 => Some(VideoCodec::Av1),
            _ => None,
        }
    }

    /// Codecs whose packets carry a packet-type byte with 0 = sequence header
    fn has_sequence_header(&self) -> bool {
        matches!(self, VideoCodec::Avc | VideoCodec::Hevc | VideoCodec::Av1)
    }
}

/// Audio format (upper 4 bits of first byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    LinearPcmPlatform = 0,
    Adpcm = 1,
    Mp3 = 2,
    LinearPcmLe = 3,
    Nellymoser16kMono = 4,
    Nellymoser8kMono = 5,
    Nellymoser = 6,
    G711ALaw = 7,
    G711MuLaw = 8,
    Aac = 10,
    Speex = 11,
    Mp38k = 14,
    DeviceSpecific = 15,
}

impl AudioFormat {
    pub fn from_byte(b: u8) -> Option<Self> {
        match (b >> 4) & 0x0F {
            0 => Some(AudioFormat::LinearPcmPlatform),
            1 => Some(AudioFormat::Adpcm),
            2 => Some(AudioFormat::Mp3),
            3 => Some(AudioFormat::LinearPcmLe),
            4 => Some(AudioFormat::Nellymoser16kMono),
            5 => Some(AudioFormat::Nellymoser8kMono),
            6 => Some(AudioFormat::Nellymoser),
            7 => Some(AudioFormat::G711ALaw),
            8 => Some(AudioFormat::G711MuLaw),
            10 => Some(AudioFormat::Aac),
            11 => Some(AudioFormat::Speex),
            14 => Some(AudioFormat::Mp38k),
            15 => Some(AudioFormat::DeviceSpecific),
            _ => None,
        }
    }
}

/// One FLV tag: type, timestamp and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvTag {
    pub tag_type: FlvTagType,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    /// Raw tag body (including the codec header byte)
    pub data: Bytes,
}

impl FlvTag {
    pub fn new(tag_type: FlvTagType, timestamp: u32, data: Bytes) -> Self {
        Self {
            tag_type,
            timestamp,
            data,
        }
    }

    pub fn video(timestamp: u32, data: Bytes) -> Self {
        Self::new(FlvTagType::Video, timestamp, data)
    }

    pub fn audio(timestamp: u32, data: Bytes) -> Self {
        Self::new(FlvTagType::Audio, timestamp, data)
    }

    pub fn script(data: Bytes) -> Self {
        Self::new(FlvTagType::Script, 0, data)
    }

    pub fn is_video(&self) -> bool {
        self.tag_type == FlvTagType::Video
    }

    pub fn is_audio(&self) -> bool {
        self.tag_type == FlvTagType::Audio
    }

    pub fn video_frame_type(&self) -> Option<VideoFrameType> {
        match self.data.first() {
            Some(&b) if self.is_video() => VideoFrameType::from_byte(b),
            _ => None,
        }
    }

    pub fn video_codec(&self) -> Option<VideoCodec> {
        match self.data.first() {
            Some(&b) if self.is_video() => VideoCodec::from_byte(b),
            _ => None,
        }
    }

    pub fn audio_format(&self) -> Option<AudioFormat> {
        match self.data.first() {
            Some(&b) if self.is_audio() => AudioFormat::from_byte(b),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        self.video_frame_type()
            .map(|ft| ft.is_keyframe())
            .unwrap_or(false)
    }

    /// AVC/HEVC/AV1 decoder configuration record
    pub fn is_video_sequence_header(&self) -> bool {
        match (self.video_codec(), self.data.get(1)) {
            (Some(codec), Some(&packet_type)) => codec.has_sequence_header() && packet_type == 0,
            _ => false,
        }
    }

    /// AAC AudioSpecificConfig
    pub fn is_aac_sequence_header(&self) -> bool {
        self.audio_format() == Some(AudioFormat::Aac) && self.data.get(1) == Some(&0)
    }

    /// Whether this tag describes the stream rather than carrying media.
    ///
    /// Script data (onMetaData) and codec sequence headers are codec headers;
    /// everything else is a media packet.
    pub fn is_codec_header(&self) -> bool {
        self.tag_type == FlvTagType::Script
            || self.is_video_sequence_header()
            || self.is_aac_sequence_header()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}
