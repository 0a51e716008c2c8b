//! Play session
//!
//! Relays one live stream to one viewer. Codec headers go out exactly once
//! before any packet; the session then stays in its relay loop until the
//! subscriber queue closes, the hub closes, or the viewer write fails.

use crate::error::Result;
use crate::registry::{Received, RegistryError, StreamKey, StreamRegistry};
use crate::stats::SessionStats;

use super::context::SessionContext;
use super::state::{PlayExit, PlayReport};
use super::MediaSink;

/// Drive one viewer until the relay ends.
///
/// An unknown stream key fails with [`RegistryError::StreamNotFound`] before
/// anything is written to the sink.
pub async fn run_play<K>(
    ctx: &SessionContext,
    sink: &mut K,
    registry: &StreamRegistry,
) -> Result<PlayReport>
where
    K: MediaSink + ?Sized,
{
    let key = StreamKey::from_path(sink.path());

    let Some(hub) = registry.get(&key).await else {
        tracing::warn!(session_id = ctx.session_id, stream = %key, "Play requested for unknown stream");
        return Err(RegistryError::StreamNotFound(key).into());
    };

    if let Err(e) = sink.write_header(hub.headers()).await {
        tracing::debug!(
            session_id = ctx.session_id,
            stream = %key,
            error = %e,
            "Failed to send codec headers"
        );
        return Err(e);
    }

    let mut subscription = hub.subscribe();
    let mut stats = SessionStats::new();

    tracing::info!(
        session_id = ctx.session_id,
        stream = %key,
        subscriber_id = subscription.id(),
        "Play started"
    );

    let exit = loop {
        match subscription.recv().await {
            Received::Packet(packet) => {
                if let Err(e) = sink.write_packet(&packet).await {
                    tracing::debug!(
                        session_id = ctx.session_id,
                        stream = %key,
                        error = %e,
                        "Viewer write failed"
                    );
                    break PlayExit::SinkFailed;
                }
                stats.on_packet(&packet);
            }
            Received::QueueClosed => break PlayExit::QueueClosed,
            Received::HubClosed => break PlayExit::HubClosed,
        }
    };

    drop(subscription);

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
        "Play ended"
    );

    Ok(PlayReport { key, exit, stats })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::error::Error;
    use crate::registry::{Packet, StreamHub};
    use crate::session::testing::{headers, CollectingSink};

    async fn live(registry: &StreamRegistry, key: &str) -> Arc<StreamHub> {
        let hub = Arc::new(StreamHub::new(StreamKey::new(key), headers()));
        registry.set(StreamKey::new(key), Arc::clone(&hub)).await;
        hub
    }

    async fn wait_for_subscriber(hub: &StreamHub) {
        while hub.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
    }

    fn packet(seq: u64) -> Packet {
        Packet::audio(seq, seq as u32 * 23, Bytes::from_static(&[0xAF, 0x01, 0x00]))
    }

    #[tokio::test]
    async fn test_unknown_stream() {
        let registry = StreamRegistry::new();
        let mut sink = CollectingSink::new("/live/missing");

        let err = run_play(&SessionContext::detached(1), &mut sink, &registry)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Registry(RegistryError::StreamNotFound(ref key)) if key.as_str() == "live/missing"
        ));
        assert!(sink.headers.is_empty());
    }

    #[tokio::test]
    async fn test_relays_until_hub_closes() {
        let registry = Arc::new(StreamRegistry::new());
        let hub = live(&registry, "live/a").await;

        let play = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let mut sink = CollectingSink::new("/live/a");
                let report = run_play(&SessionContext::detached(1), &mut sink, &registry).await;
                (report, sink)
            })
        };

        wait_for_subscriber(&hub).await;
        for seq in 0..3 {
            hub.broadcast(packet(seq));
        }
        while hub.stats().packets_broadcast < 3 {
            tokio::task::yield_now().await;
        }
        // Let the relay drain before closing
        tokio::time::sleep(Duration::from_millis(50)).await;
        hub.close();

        let (report, sink) = tokio::time::timeout(Duration::from_secs(1), play)
            .await
            .unwrap()
            .unwrap();
        let report = report.unwrap();

        assert_eq!(report.exit, PlayExit::HubClosed);
        assert_eq!(sink.headers.len(), 1);
        assert!(sink.headers[0].ptr_eq(hub.headers()));
        let seqs: Vec<u64> = sink.packets.iter().map(|p| p.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(report.stats.packets, 3);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_unsubscribes() {
        let registry = Arc::new(StreamRegistry::new());
        let hub = live(&registry, "live/a").await;

        let play = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let mut sink = CollectingSink::new("/live/a");
                sink.fail_at = Some(1);
                run_play(&SessionContext::detached(1), &mut sink, &registry).await
            })
        };

        wait_for_subscriber(&hub).await;
        hub.broadcast(packet(0));
        hub.broadcast(packet(1));

        let report = tokio::time::timeout(Duration::from_secs(1), play)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(report.exit, PlayExit::SinkFailed);
        assert_eq!(report.stats.packets, 1);
        assert_eq!(hub.subscriber_count(), 0);
        assert!(!hub.is_closed());
    }

    #[tokio::test]
    async fn test_header_failure_never_subscribes() {
        let registry = StreamRegistry::new();
        let hub = live(&registry, "live/a").await;
        let mut sink = CollectingSink::new("/live/a");
        sink.fail_header = true;

        assert!(run_play(&SessionContext::detached(1), &mut sink, &registry)
            .await
            .is_err());
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.stats().subscribers, 0);
    }

    #[tokio::test]
    async fn test_closed_hub_ends_immediately() {
        let registry = StreamRegistry::new();
        let hub = live(&registry, "live/a").await;
        hub.close();

        let mut sink = CollectingSink::new("/live/a");
        let report = tokio::time::timeout(
            Duration::from_secs(1),
            run_play(&SessionContext::detached(1), &mut sink, &registry),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(report.exit, PlayExit::HubClosed);
        assert!(sink.packets.is_empty());
    }
}
