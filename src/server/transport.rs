//! FLV-over-TCP media transport
//!
//! [`FlvSource`] demuxes a publisher's FLV byte stream into codec headers and
//! packets. [`FlvSink`] muxes a hub's headers and packets back into FLV for a
//! viewer.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{ProtocolError, Result};
use crate::media::{FlvHeader, FlvReader, FlvTag, FlvWriter};
use crate::registry::{CodecHeader, CodecHeaders, Packet};
use crate::session::{MediaSink, MediaSource};

/// Publisher side: reads an FLV stream
pub struct FlvSource<R> {
    path: String,
    reader: FlvReader<R>,
    headers: Option<CodecHeaders>,
    /// First media tag, read while probing for headers
    pending: Option<FlvTag>,
    next_sequence: u64,
}

impl<R: AsyncRead + Unpin + Send> FlvSource<R> {
    pub fn new(path: impl Into<String>, reader: R) -> Self {
        Self::with_reader(path, FlvReader::new(reader))
    }

    pub fn with_reader(path: impl Into<String>, reader: FlvReader<R>) -> Self {
        Self {
            path: path.into(),
            reader,
            headers: None,
            pending: None,
            next_sequence: 0,
        }
    }

    /// Read the file header and every codec header tag before the first
    /// media tag
    async fn probe_headers(&mut self) -> Result<CodecHeaders> {
        self.reader.read_header().await?;

        let mut headers = Vec::new();
        while let Some(tag) = self.reader.read_tag().await? {
            if tag.is_codec_header() {
                headers.push(CodecHeader::from(tag));
            } else {
                self.pending = Some(tag);
                break;
            }
        }

        CodecHeaders::new(headers).map_err(|_| ProtocolError::MissingHeaders.into())
    }

    fn next_packet(&mut self, tag: FlvTag) -> Packet {
        let packet = Packet::from_flv_tag(self.next_sequence, tag);
        self.next_sequence += 1;
        packet
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> MediaSource for FlvSource<R> {
    fn path(&self) -> &str {
        &self.path
    }

    async fn stream_headers(&mut self) -> Result<CodecHeaders> {
        if let Some(headers) = &self.headers {
            return Ok(headers.clone());
        }
        let headers = self.probe_headers().await?;
        self.headers = Some(headers.clone());
        Ok(headers)
    }

    async fn read_packet(&mut self) -> Result<Option<Packet>> {
        if self.headers.is_none() {
            self.stream_headers().await?;
        }

        let tag = match self.pending.take() {
            Some(tag) => tag,
            None => match self.reader.read_tag().await? {
                Some(tag) => tag,
                None => return Ok(None),
            },
        };

        Ok(Some(self.next_packet(tag)))
    }
}

/// Viewer side: writes an FLV stream, flushing after every tag
pub struct FlvSink<W> {
    path: String,
    writer: FlvWriter<W>,
}

impl<W: AsyncWrite + Unpin + Send> FlvSink<W> {
    pub fn new(path: impl Into<String>, writer: W) -> Self {
        Self {
            path: path.into(),
            writer: FlvWriter::new(writer),
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.writer.bytes_written()
    }

    pub fn into_inner(self) -> FlvWriter<W> {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MediaSink for FlvSink<W> {
    fn path(&self) -> &str {
        &self.path
    }

    async fn write_header(&mut self, headers: &CodecHeaders) -> Result<()> {
        self.writer
            .write_header(FlvHeader {
                has_audio: headers.has_audio(),
                has_video: headers.has_video(),
            })
            .await?;
        for header in headers.iter() {
            self.writer.write_tag(&header.to_flv_tag()).await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        self.writer.write_tag(&packet.to_flv_tag()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
