//! In-memory collaborators for session tests

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::archive::{ObjectStore, StorageError};
use crate::error::{Error, ProtocolError, Result};
use crate::media::flv::FlvTagType;
use crate::registry::{CodecHeader, CodecHeaders, Packet};

use super::{MediaSink, MediaSource};

pub fn headers() -> CodecHeaders {
    CodecHeaders::new(vec![CodecHeader::new(
        FlvTagType::Video,
        Bytes::from_static(&[0x17, 0x00, 0x00, 0x00, 0x00, 0x01]),
    )])
    .unwrap()
}

enum Feed {
    Scripted(VecDeque<Packet>),
    Channel(mpsc::Receiver<Packet>),
}

/// Source that replays a fixed packet list or whatever a test feeds it
pub struct ScriptedSource {
    path: String,
    headers: Option<CodecHeaders>,
    feed: Feed,
    fail_at_end: bool,
}

impl ScriptedSource {
    pub fn new(path: &str, headers: Option<CodecHeaders>, packets: Vec<Packet>) -> Self {
        Self {
            path: path.to_string(),
            headers,
            feed: Feed::Scripted(packets.into()),
            fail_at_end: false,
        }
    }

    pub fn channel(path: &str, headers: CodecHeaders) -> (Self, mpsc::Sender<Packet>) {
        let (tx, rx) = mpsc::channel(16);
        let source = Self {
            path: path.to_string(),
            headers: Some(headers),
            feed: Feed::Channel(rx),
            fail_at_end: false,
        };
        (source, tx)
    }

    /// Report a connection reset instead of a clean end of stream
    pub fn fail_after_packets(mut self) -> Self {
        self.fail_at_end = true;
        self
    }
}

#[async_trait]
impl MediaSource for ScriptedSource {
    fn path(&self) -> &str {
        &self.path
    }

    async fn stream_headers(&mut self) -> Result<CodecHeaders> {
        self.headers
            .clone()
            .ok_or(Error::Protocol(ProtocolError::MissingHeaders))
    }

    async fn read_packet(&mut self) -> Result<Option<Packet>> {
        let next = match &mut self.feed {
            Feed::Scripted(packets) => packets.pop_front(),
            Feed::Channel(rx) => rx.recv().await,
        };

        match next {
            Some(packet) => Ok(Some(packet)),
            None if self.fail_at_end => Err(Error::Io(std::io::ErrorKind::ConnectionReset.into())),
            None => Ok(None),
        }
    }
}

/// Sink that keeps everything written to it
#[derive(Default)]
pub struct CollectingSink {
    pub path: String,
    pub headers: Vec<CodecHeaders>,
    pub packets: Vec<Packet>,
    /// Fail the write of the packet at this index
    pub fail_at: Option<usize>,
    pub fail_header: bool,
}

impl CollectingSink {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl MediaSink for CollectingSink {
    fn path(&self) -> &str {
        &self.path
    }

    async fn write_header(&mut self, headers: &CodecHeaders) -> Result<()> {
        if self.fail_header {
            return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
        }
        self.headers.push(headers.clone());
        Ok(())
    }

    async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        if self.fail_at == Some(self.packets.len()) {
            return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
        }
        self.packets.push(packet.clone());
        Ok(())
    }
}

type Put = (String, String, String, u64);

/// Object store that records uploads instead of storing them
#[derive(Default)]
pub struct MemoryStore {
    puts: Mutex<Vec<Put>>,
    attempts: Mutex<usize>,
    fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn puts(&self) -> Vec<Put> {
        self.puts.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn ensure_bucket(&self, _bucket: &str) -> std::result::Result<(), StorageError> {
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        name: &str,
        path: &Path,
        content_type: &str,
    ) -> std::result::Result<(), StorageError> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }

        let size = tokio::fs::metadata(path).await?.len();
        self.puts.lock().unwrap().push((
            bucket.to_string(),
            name.to_string(),
            content_type.to_string(),
            size,
        ));
        Ok(())
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        name: &str,
        _ttl: Duration,
    ) -> std::result::Result<String, StorageError> {
        Ok(format!("mem://{}/{}", bucket, name))
    }
}
