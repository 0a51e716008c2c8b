//! FLV byte-stream demuxer and muxer
//!
//! FLV File Format:
//! ```text
//! +============+==================+==============+==================+
//! | FLV Header | PrevTagSize0 (0) | Tag 1        | PrevTagSize1 ... |
//! | (9 bytes)  | (4 bytes)        | (11+N bytes) | (4 bytes)        |
//! +============+==================+==============+==================+
//! ```
//!
//! Tag header (11 bytes): Type(1) + DataSize(3 BE) + Timestamp(3 BE + 1 ext)
//! + StreamID(3, always 0).

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, FlvError, Result};

use super::flv::{FlvTag, FlvTagType};

/// FLV file signature: "FLV" in ASCII
const FLV_SIGNATURE: [u8; 3] = *b"FLV";

const FLV_VERSION: u8 = 0x01;

/// FLV header is always 9 bytes
const FLV_HEADER_SIZE: u32 = 9;

const FLAG_AUDIO: u8 = 0x04;
const FLAG_VIDEO: u8 = 0x01;

const TAG_HEADER_SIZE: usize = 11;

/// Upper bound on the header padding we are willing to skip
const MAX_HEADER_PADDING: u32 = 1024;

/// Largest payload the 24-bit tag size field can describe
pub const MAX_TAG_DATA_SIZE: usize = 0x00FF_FFFF;

/// Default tag payload limit (the 24-bit size field allows up to 16 MiB)
pub const DEFAULT_MAX_TAG_SIZE: usize = 8 * 1024 * 1024;

/// Stream flags from the FLV file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvHeader {
    pub has_audio: bool,
    pub has_video: bool,
}

/// Reads FLV tags from an async byte stream
pub struct FlvReader<R> {
    inner: R,
    max_tag_size: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> FlvReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_tag_size: DEFAULT_MAX_TAG_SIZE,
            eof: false,
        }
    }

    /// Set the largest tag payload accepted before failing with `TagTooLarge`
    pub fn max_tag_size(mut self, size: usize) -> Self {
        self.max_tag_size = size;
        self
    }

    /// Read and validate the file header and PreviousTagSize0
    pub async fn read_header(&mut self) -> Result<FlvHeader> {
        let mut header = [0u8; FLV_HEADER_SIZE as usize];
        if !self.read_full_or_eof(&mut header).await? {
            return Err(FlvError::Truncated.into());
        }

        if header[0..3] != FLV_SIGNATURE {
            return Err(FlvError::InvalidSignature.into());
        }
        if header[3] != FLV_VERSION {
            return Err(FlvError::UnsupportedVersion(header[3]).into());
        }

        let flags = header[4];
        let data_offset = u32::from_be_bytes([header[5], header[6], header[7], header[8]]);
        if !(FLV_HEADER_SIZE..=FLV_HEADER_SIZE + MAX_HEADER_PADDING).contains(&data_offset) {
            return Err(FlvError::InvalidHeaderLength(data_offset).into());
        }

        let mut skip = vec![0u8; (data_offset - FLV_HEADER_SIZE) as usize + 4];
        if !self.read_full_or_eof(&mut skip).await? {
            return Err(FlvError::Truncated.into());
        }

        Ok(FlvHeader {
            has_audio: flags & FLAG_AUDIO != 0,
            has_video: flags & FLAG_VIDEO != 0,
        })
    }

    /// Read the next tag.
    ///
    /// Returns `Ok(None)` on a clean end of stream at a tag boundary. Tags of
    /// unknown type are skipped.
    pub async fn read_tag(&mut self) -> Result<Option<FlvTag>> {
        loop {
            if self.eof {
                return Ok(None);
            }

            let mut header = [0u8; TAG_HEADER_SIZE];
            if !self.read_full_or_eof(&mut header).await? {
                self.eof = true;
                return Ok(None);
            }

            let data_size = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
            let timestamp = u32::from_be_bytes([header[7], header[4], header[5], header[6]]);

            if data_size > self.max_tag_size {
                return Err(FlvError::TagTooLarge(data_size).into());
            }

            let mut data = BytesMut::zeroed(data_size);
            if data_size > 0 && !self.read_full_or_eof(&mut data).await? {
                return Err(FlvError::Truncated.into());
            }

            // Some encoders close the stream right after the last tag body
            let mut prev_tag_size = [0u8; 4];
            if !self.read_full_or_eof(&mut prev_tag_size).await? {
                self.eof = true;
            }

            match FlvTagType::from_byte(header[0]) {
                Some(tag_type) => return Ok(Some(FlvTag::new(tag_type, timestamp, data.freeze()))),
                None => {
                    tracing::trace!(tag_type = header[0], size = data_size, "Skipping unknown FLV tag");
                }
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Fill `buf` completely. Returns `false` if the stream ended before the
    /// first byte, and `Truncated` if it ended part-way.
    async fn read_full_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.inner.read(&mut buf[filled..]).await?;
            if n == 0 {
                return if filled == 0 {
                    Ok(false)
                } else {
                    Err(Error::Flv(FlvError::Truncated))
                };
            }
            filled += n;
        }
        Ok(true)
    }
}

/// Writes FLV header and tags to an async byte sink
pub struct FlvWriter<W> {
    inner: W,
    bytes_written: u64,
}

impl<W: AsyncWrite + Unpin> FlvWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Write the 9-byte file header plus PreviousTagSize0
    pub async fn write_header(&mut self, header: FlvHeader) -> std::io::Result<()> {
        let mut flags = 0u8;
        if header.has_audio {
            flags |= FLAG_AUDIO;
        }
        if header.has_video {
            flags |= FLAG_VIDEO;
        }

        let mut buf = BytesMut::with_capacity(FLV_HEADER_SIZE as usize + 4);
        buf.put_slice(&FLV_SIGNATURE);
        buf.put_u8(FLV_VERSION);
        buf.put_u8(flags);
        buf.put_u32(FLV_HEADER_SIZE);
        buf.put_u32(0);

        self.write_buf(buf.freeze()).await
    }

    /// Write one tag followed by its PreviousTagSize.
    ///
    /// Fails with `InvalidInput` if the payload does not fit the 24-bit size
    /// field; nothing is written in that case.
    pub async fn write_tag(&mut self, tag: &FlvTag) -> std::io::Result<()> {
        if tag.data.len() > MAX_TAG_DATA_SIZE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("FLV tag payload of {} bytes exceeds 24-bit size", tag.data.len()),
            ));
        }
        let data_size = tag.data.len() as u32;
        let ts = tag.timestamp;

        let mut buf = BytesMut::with_capacity(TAG_HEADER_SIZE + tag.data.len() + 4);
        buf.put_u8(tag.tag_type.as_byte());
        // 24-bit data size
        buf.put_slice(&data_size.to_be_bytes()[1..]);
        // Lower 24 bits of the timestamp, then the extension byte
        buf.put_slice(&ts.to_be_bytes()[1..]);
        buf.put_u8((ts >> 24) as u8);
        buf.put_slice(&[0, 0, 0]);
        buf.put_slice(&tag.data);
        buf.put_u32(TAG_HEADER_SIZE as u32 + data_size);

        self.write_buf(buf.freeze()).await
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush().await
    }

    /// Flush and hand back the underlying sink
    pub async fn finish(mut self) -> std::io::Result<W> {
        self.inner.flush().await?;
        Ok(self.inner)
    }

    /// Total bytes written so far, header included
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    async fn write_buf(&mut self, buf: Bytes) -> std::io::Result<()> {
        self.inner.write_all(&buf).await?;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }
}
