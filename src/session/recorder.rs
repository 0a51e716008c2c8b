//! Scratch recording of a live stream
//!
//! A [`Recorder`] captures one publish session into a temporary FLV file.
//! The file lives behind a `TempPath`, so it is removed when the recorder or
//! the finished [`Recording`] is dropped, whichever way the session ends.

use std::path::Path;

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::media::{FlvHeader, FlvWriter};
use crate::registry::{CodecHeaders, Packet};

const SCRATCH_PREFIX: &str = "livehub-";
const SCRATCH_SUFFIX: &str = ".flv";

/// Append-only FLV sink backed by a temporary file
pub struct Recorder {
    writer: FlvWriter<BufWriter<File>>,
    path: TempPath,
    first_timestamp: Option<u32>,
    packets: u64,
}

/// A finalized scratch recording awaiting upload
#[derive(Debug)]
pub struct Recording {
    path: TempPath,
    /// Media packets written after the headers
    pub packets: u64,
    /// File size in bytes
    pub bytes: u64,
}

impl Recorder {
    /// Create a scratch file in `dir` (or the OS temp dir) and write the
    /// FLV header plus `headers` to it.
    pub async fn create(dir: Option<&Path>, headers: &CodecHeaders) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX).suffix(SCRATCH_SUFFIX);
        let named = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let (file, path) = named.into_parts();

        let mut writer = FlvWriter::new(BufWriter::new(File::from_std(file)));
        writer
            .write_header(FlvHeader {
                has_audio: headers.has_audio(),
                has_video: headers.has_video(),
            })
            .await?;
        for header in headers.iter() {
            writer.write_tag(&header.to_flv_tag()).await?;
        }

        tracing::debug!(path = %path.display(), "Scratch recording opened");

        Ok(Self {
            writer,
            path,
            first_timestamp: None,
            packets: 0,
        })
    }

    /// Append one packet, rebasing timestamps so the recording starts at 0
    pub async fn write_packet(&mut self, packet: &Packet) -> std::io::Result<()> {
        let base = *self.first_timestamp.get_or_insert(packet.timestamp);

        let mut tag = packet.to_flv_tag();
        tag.timestamp = packet.timestamp.saturating_sub(base);

        self.writer.write_tag(&tag).await?;
        self.packets += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file
    pub async fn finish(self) -> std::io::Result<Recording> {
        let bytes = self.writer.bytes_written();
        let file = self.writer.finish().await?;
        let file = file.into_inner();
        file.sync_all().await?;
        drop(file);

        Ok(Recording {
            path: self.path,
            packets: self.packets,
            bytes,
        })
    }
}

impl Recording {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the scratch file now, reporting any failure
    pub fn remove(self) -> std::io::Result<()> {
        self.path.close()
    }
}
