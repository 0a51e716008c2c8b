//! Publish session
//!
//! Lifecycle of one publisher connection:
//!
//! ```text
//! stream_headers() ──► register hub ──► open scratch recording
//!                                             │
//!        ┌────────────────────────────────────┘
//!        ▼
//!   read_packet() ──► recorder.write_packet() ──► hub.broadcast()
//!        │                     │
//!   EOF / error          write error
//!        └──────────┬──────────┘
//!                   ▼
//!   finish recording ──► upload ──► remove hub ──► close hub
//! ```
//!
//! Every exit after the hub is registered goes through the same teardown.

use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::{ArchivedObject, Archiver};
use crate::error::Result;
use crate::registry::{StreamHub, StreamKey, StreamRegistry};
use crate::stats::SessionStats;

use super::context::SessionContext;
use super::recorder::Recorder;
use super::state::{PublishExit, PublishReport};
use super::MediaSource;

/// What a session needs from the rest of the process
#[derive(Clone)]
pub struct SessionServices {
    pub registry: Arc<StreamRegistry>,
    pub archiver: Archiver,
    /// Directory for scratch recordings; the OS temp dir when `None`
    pub scratch_dir: Option<PathBuf>,
}

impl SessionServices {
    pub fn new(registry: Arc<StreamRegistry>, archiver: Archiver) -> Self {
        Self {
            registry,
            archiver,
            scratch_dir: None,
        }
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}

/// Drive one publisher until its stream ends.
///
/// Fails without touching the registry when the source has no codec headers
/// or the key is taken under [`RepublishPolicy::Reject`]. Transport and
/// recording failures after that end the session normally and are reported
/// through [`PublishReport::exit`].
///
/// [`RepublishPolicy::Reject`]: crate::registry::RepublishPolicy::Reject
pub async fn run_publish<S>(
    ctx: &SessionContext,
    source: &mut S,
    services: &SessionServices,
) -> Result<PublishReport>
where
    S: MediaSource + ?Sized,
{
    let key = StreamKey::from_path(source.path());
    let registry = &services.registry;

    let headers = match source.stream_headers().await {
        Ok(headers) => headers,
        Err(e) => {
            tracing::warn!(
                session_id = ctx.session_id,
                stream = %key,
                error = %e,
                "Publish aborted, no codec headers"
            );
            return Err(e);
        }
    };

    let hub = Arc::new(StreamHub::with_capacity(
        key.clone(),
        headers.clone(),
        registry.config().queue_capacity,
    ));

    if let Some(evicted) = registry.register(&key, Arc::clone(&hub)).await? {
        tracing::info!(
            session_id = ctx.session_id,
            stream = %key,
            subscribers = evicted.subscriber_count(),
            "Evicting previous publisher's hub"
        );
        evicted.close();
    }

    tracing::info!(
        session_id = ctx.session_id,
        stream = %key,
        headers = headers.len(),
        "Publish started"
    );

    let mut recorder = match Recorder::create(services.scratch_dir.as_deref(), &headers).await {
        Ok(recorder) => recorder,
        Err(e) => {
            tracing::warn!(
                session_id = ctx.session_id,
                stream = %key,
                error = %e,
                "Failed to open scratch recording"
            );
            teardown(registry, &key, &hub).await;
            return Err(e.into());
        }
    };

    let mut stats = SessionStats::new();

    let exit = loop {
        let packet = match source.read_packet().await {
            Ok(Some(packet)) => packet,
            Ok(None) => break PublishExit::EndOfStream,
            Err(e) => {
                if e.is_disconnect() {
                    tracing::debug!(session_id = ctx.session_id, stream = %key, error = %e, "Publisher disconnected");
                } else {
                    tracing::warn!(session_id = ctx.session_id, stream = %key, error = %e, "Publisher read failed");
                }
                break PublishExit::SourceFailed;
            }
        };

        if let Err(e) = recorder.write_packet(&packet).await {
            tracing::warn!(
                session_id = ctx.session_id,
                stream = %key,
                error = %e,
                "Scratch recording write failed"
            );
            break PublishExit::RecorderFailed;
        }

        stats.on_packet(&packet);
        hub.broadcast(packet);
    };

    let archived = archive(ctx, &key, recorder, services, &hub).await;

    teardown(registry, &key, &hub).await;

    tracing::info!(
        session_id = ctx.session_id,
        stream = %key,
        exit = %exit,
        packets = stats.packets,
        video = stats.video_packets,
        audio = stats.audio_packets,
        keyframes = stats.keyframes,
        bytes = stats.bytes,
        bitrate = stats.bitrate(),
        duration_ms = stats.duration().as_millis() as u64,
        archived = archived.is_some(),
        "Publish ended"
    );

    Ok(PublishReport {
        key,
        exit,
        stats,
        archived,
    })
}

/// Finish the scratch recording and upload it. The scratch file is gone when
/// this returns.
async fn archive(
    ctx: &SessionContext,
    key: &StreamKey,
    recorder: Recorder,
    services: &SessionServices,
    hub: &StreamHub,
) -> Option<ArchivedObject> {
    let recording = match recorder.finish().await {
        Ok(recording) => recording,
        Err(e) => {
            tracing::warn!(session_id = ctx.session_id, stream = %key, error = %e, "Failed to finalize recording");
            return None;
        }
    };

    if recording.packets == 0 {
        tracing::debug!(session_id = ctx.session_id, stream = %key, "Recording holds codec headers only");
    }

    let uploaded = services
        .archiver
        .upload(key, recording.path(), recording.bytes)
        .await;

    if let Err(e) = recording.remove() {
        tracing::debug!(session_id = ctx.session_id, stream = %key, error = %e, "Failed to remove scratch recording");
    }

    match uploaded {
        Ok(object) => {
            hub.set_last_archive(object.clone());
            services.registry.record_archive(key, object.clone()).await;
            Some(object)
        }
        Err(e) => {
            tracing::warn!(
                session_id = ctx.session_id,
                stream = %key,
                bucket = services.archiver.bucket(),
                error = %e,
                "Archive upload failed"
            );
            None
        }
    }
}

async fn teardown(registry: &StreamRegistry, key: &StreamKey, hub: &Arc<StreamHub>) {
    if !registry.remove_if_current(key, hub).await {
        tracing::debug!(stream = %key, "Hub already replaced, leaving registry entry");
    }
    hub.close();
}
