//! Media handling
//!
//! This module provides:
//! - FLV tag classification (codec headers vs. media packets)
//! - An async FLV demuxer/muxer used by the stream transport and the
//!   scratch recorder

pub mod codec;
pub mod flv;

pub use codec::{FlvHeader, FlvReader, FlvWriter};
pub use flv::{AudioFormat, FlvTag, FlvTagType, VideoCodec, VideoFrameType};
