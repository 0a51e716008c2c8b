//! Per-stream broadcast hub
//!
//! A hub owns the codec headers of one live stream and a set of bounded
//! subscriber queues. The publisher calls [`StreamHub::broadcast`] for every
//! packet; each viewer drains its own [`Subscription`].
//!
//! # Backpressure
//!
//! Delivery uses `try_send`. A queue at capacity drops the packet for that
//! subscriber only, so a slow viewer never stalls the publisher or another
//! viewer.
//!
//! # Locking
//!
//! The member set sits behind a `std::sync::RwLock`. Broadcast takes the read
//! side and sees a consistent snapshot; subscribe, unsubscribe and close take
//! the write side. No lock is ever held across an `.await`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, watch};

use crate::archive::ArchivedObject;
use crate::stats::HubStats;

use super::config::DEFAULT_QUEUE_CAPACITY;
use super::frame::{CodecHeaders, Packet, StreamKey};

struct Members {
    queues: HashMap<u64, mpsc::Sender<Packet>>,
    next_id: u64,
    closed: bool,
}

/// Broadcast engine for one live stream
pub struct StreamHub {
    key: StreamKey,
    headers: CodecHeaders,
    capacity: usize,
    members: RwLock<Members>,
    closed_tx: watch::Sender<bool>,
    last_archive: Mutex<Option<ArchivedObject>>,
    packets_broadcast: AtomicU64,
    packets_dropped: AtomicU64,
}

impl StreamHub {
    /// Create an open hub with the default queue capacity
    pub fn new(key: StreamKey, headers: CodecHeaders) -> Self {
        Self::with_capacity(key, headers, DEFAULT_QUEUE_CAPACITY)
    }

    /// Create an open hub whose subscriber queues hold `capacity` packets
    pub fn with_capacity(key: StreamKey, headers: CodecHeaders, capacity: usize) -> Self {
        let (closed_tx, _) = watch::channel(false);

        Self {
            key,
            headers,
            capacity: capacity.max(1),
            members: RwLock::new(Members {
                queues: HashMap::new(),
                next_id: 1,
                closed: false,
            }),
            closed_tx,
            last_archive: Mutex::new(None),
            packets_broadcast: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// Codec headers, fixed for the hub's whole lifetime
    pub fn headers(&self) -> &CodecHeaders {
        &self.headers
    }

    /// Register a new subscriber queue.
    ///
    /// On a closed hub the returned subscription is already closed and will
    /// never yield a packet.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);

        let mut members = self.write_members();
        let id = members.next_id;
        members.next_id += 1;

        if members.closed {
            drop(members);
            drop(tx);
            tracing::debug!(stream = %self.key, subscriber_id = id, "Subscribe on closed hub");
        } else {
            members.queues.insert(id, tx);
            let subscribers = members.queues.len();
            drop(members);
            tracing::info!(
                stream = %self.key,
                subscriber_id = id,
                subscribers = subscribers,
                "Subscriber added"
            );
        }

        Subscription {
            id,
            hub: Arc::clone(self),
            rx,
            closed: self.closed_tx.subscribe(),
        }
    }

    /// Remove a subscriber and close its queue.
    ///
    /// Returns `false` if the id was not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut members = self.write_members();
        let removed = members.queues.remove(&id).is_some();
        let subscribers = members.queues.len();
        drop(members);

        if removed {
            tracing::debug!(
                stream = %self.key,
                subscriber_id = id,
                subscribers = subscribers,
                "Subscriber removed"
            );
        }
        removed
    }

    /// Offer a packet to every subscriber without blocking.
    ///
    /// Returns the number of queues that accepted it.
    pub fn broadcast(&self, packet: Packet) -> usize {
        self.packets_broadcast.fetch_add(1, Ordering::Relaxed);

        let members = self.read_members();
        let mut delivered = 0;

        for (id, tx) in members.queues.iter() {
            match tx.try_send(packet.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.packets_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(
                        stream = %self.key,
                        subscriber_id = *id,
                        sequence = packet.sequence,
                        "Subscriber queue full, packet dropped"
                    );
                }
                // Receiver already gone; its Subscription drop removes it
                Err(TrySendError::Closed(_)) => {}
            }
        }

        delivered
    }

    /// Close every queue and wake all waiting subscribers. Later calls are no-ops.
    pub fn close(&self) {
        let mut members = self.write_members();
        if members.closed {
            return;
        }
        members.closed = true;
        let subscribers = members.queues.len();
        members.queues.clear();
        drop(members);

        self.closed_tx.send_replace(true);

        tracing::info!(
            stream = %self.key,
            subscribers = subscribers,
            packets = self.packets_broadcast.load(Ordering::Relaxed),
            dropped = self.packets_dropped.load(Ordering::Relaxed),
            "Hub closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    pub fn subscriber_count(&self) -> usize {
        self.read_members().queues.len()
    }

    /// Most recent archived recording of this hub's publish session
    pub fn last_archive(&self) -> Option<ArchivedObject> {
        self.last_archive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_last_archive(&self, object: ArchivedObject) {
        *self
            .last_archive
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(object);
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.subscriber_count(),
            packets_broadcast: self.packets_broadcast.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            closed: self.is_closed(),
        }
    }

    fn read_members(&self) -> RwLockReadGuard<'_, Members> {
        self.members.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_members(&self) -> RwLockWriteGuard<'_, Members> {
        self.members.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of waiting on a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Next packet in broadcast order
    Packet(Packet),
    /// The queue was closed; no more packets will arrive
    QueueClosed,
    /// The hub signalled closure
    HubClosed,
}

/// Consumer side of one subscriber queue
///
/// Dropping the subscription unsubscribes it from the hub.
pub struct Subscription {
    id: u64,
    hub: Arc<StreamHub>,
    rx: mpsc::Receiver<Packet>,
    closed: watch::Receiver<bool>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn hub(&self) -> &Arc<StreamHub> {
        &self.hub
    }

    /// Wait for the next packet or for the hub to close, whichever comes first
    pub async fn recv(&mut self) -> Received {
        tokio::select! {
            biased;
            _ = closed_signal(&mut self.closed) => Received::HubClosed,
            packet = self.rx.recv() => match packet {
                Some(packet) => Received::Packet(packet),
                None => Received::QueueClosed,
            },
        }
    }

    /// Take a queued packet without waiting.
    ///
    /// Once the hub is closed this reports `Disconnected`, even if packets
    /// are still buffered.
    pub fn try_recv(&mut self) -> Result<Packet, TryRecvError> {
        if *self.closed.borrow() {
            return Err(TryRecvError::Disconnected);
        }
        self.rx.try_recv()
    }
}

async fn closed_signal(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for StreamHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHub")
            .field("key", &self.key)
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("stream", &self.hub.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::media::flv::FlvTagType;
    use crate::registry::frame::CodecHeader;

    fn headers() -> CodecHeaders {
        CodecHeaders::new(vec![CodecHeader::new(
            FlvTagType::Video,
            Bytes::from_static(&[0x17, 0x00, 0x01]),
        )])
        .unwrap()
    }

    fn hub(capacity: usize) -> Arc<StreamHub> {
        Arc::new(StreamHub::with_capacity(
            StreamKey::new("live/test"),
            headers(),
            capacity,
        ))
    }

    fn packet(seq: u64) -> Packet {
        Packet::video(seq, seq as u32 * 33, Bytes::from(vec![0x27, 0x01, seq as u8]))
    }

    #[tokio::test]
    async fn test_delivers_in_order() {
        let hub = hub(8);
        let mut sub = hub.subscribe();

        for seq in 1..=3 {
            assert_eq!(hub.broadcast(packet(seq)), 1);
        }

        for seq in 1..=3 {
            assert_eq!(sub.recv().await, Received::Packet(packet(seq)));
        }
        assert!(matches!(sub.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let hub = hub(2);
        let mut sub = hub.subscribe();

        assert_eq!(hub.broadcast(packet(1)), 1);
        assert_eq!(hub.broadcast(packet(2)), 1);
        assert_eq!(hub.broadcast(packet(3)), 0);

        assert_eq!(sub.try_recv().unwrap(), packet(1));
        assert_eq!(sub.try_recv().unwrap(), packet(2));
        assert!(matches!(sub.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(hub.stats().packets_dropped, 1);
    }

    #[test]
    fn test_slow_subscriber_isolated() {
        let hub = hub(1);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        hub.broadcast(packet(1));
        assert_eq!(fast.try_recv().unwrap(), packet(1));

        // `slow` is full now; `fast` must still get the next packet
        assert_eq!(hub.broadcast(packet(2)), 1);
        assert_eq!(fast.try_recv().unwrap(), packet(2));
        assert_eq!(slow.try_recv().unwrap(), packet(1));
        assert!(matches!(slow.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let hub = hub(4);
        for seq in 0..100 {
            assert_eq!(hub.broadcast(packet(seq)), 0);
        }
        assert_eq!(hub.stats().packets_broadcast, 100);
    }

    #[test]
    fn test_broadcast_all_full_does_not_block() {
        let hub = hub(1);
        let _a = hub.subscribe();
        let _b = hub.subscribe();
        for seq in 0..1000 {
            hub.broadcast(packet(seq));
        }
        assert_eq!(hub.stats().packets_dropped, 2 * 999);
    }

    #[tokio::test]
    async fn test_close_closes_queues() {
        let hub = hub(4);
        let mut sub = hub.subscribe();
        // Still buffered when the hub closes
        hub.broadcast(packet(0));

        hub.close();

        assert!(hub.is_closed());
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(sub.recv().await, Received::HubClosed);
        assert!(matches!(sub.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn test_debug_output() {
        let hub = hub(4);
        let _sub = hub.subscribe();
        let out = format!("{:?}", hub);
        assert!(out.contains("live/test"));
        assert!(out.contains("subscribers: 1"));
        assert!(out.contains("closed: false"));
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_subscribers() {
        let hub = hub(4);
        let mut waiters = Vec::new();
        for _ in 0..3 {
            let mut sub = hub.subscribe();
            waiters.push(tokio::spawn(async move { sub.recv().await }));
        }
        tokio::task::yield_now().await;

        hub.close();

        for waiter in waiters {
            let received = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("subscriber did not wake")
                .unwrap();
            assert_eq!(received, Received::HubClosed);
        }
    }

    #[tokio::test]
    async fn test_subscribe_after_close() {
        let hub = hub(4);
        hub.close();

        let mut sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.broadcast(packet(1)), 0);
        assert!(matches!(sub.try_recv(), Err(TryRecvError::Disconnected)));
        assert_eq!(sub.recv().await, Received::HubClosed);
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_queue_once() {
        let hub = hub(4);
        let mut sub = hub.subscribe();
        let id = sub.id();

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert_eq!(hub.broadcast(packet(1)), 0);
        assert_eq!(sub.recv().await, Received::QueueClosed);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = hub(4);
        let sub = hub.subscribe();
        let other = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);
        assert_ne!(sub.id(), other.id());

        drop(sub);
        assert_eq!(hub.subscriber_count(), 1);
        drop(other);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let hub = hub(4);
        let _sub = hub.subscribe();
        hub.close();
        hub.close();
        assert!(hub.stats().closed);
    }

    #[test]
    fn test_headers_unchanged_by_traffic() {
        let hub = hub(2);
        let before = hub.headers().clone();

        for round in 0..10 {
            let sub = hub.subscribe();
            hub.broadcast(packet(round));
            drop(sub);
        }
        hub.close();

        assert_eq!(hub.headers(), &before);
        assert!(hub.headers().ptr_eq(&before));
    }

    #[test]
    fn test_last_archive() {
        let hub = hub(2);
        assert!(hub.last_archive().is_none());

        let object = ArchivedObject {
            name: "live/test/20240101-000000-deadbeef.flv".into(),
            uploaded_at: chrono::Utc::now(),
            size: 42,
        };
        hub.set_last_archive(object.clone());
        assert_eq!(hub.last_archive(), Some(object));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_churn_keeps_order() {
        let hub = hub(4096);
        let mut checker = hub.subscribe();

        let churn = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let sub = hub.subscribe();
                    tokio::task::yield_now().await;
                    drop(sub);
                }
            })
        };

        let producer = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for seq in 0..2000 {
                    hub.broadcast(packet(seq));
                    if seq % 100 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        producer.await.unwrap();
        churn.await.unwrap();

        for seq in 0..2000 {
            assert_eq!(checker.try_recv().unwrap().sequence, seq);
        }
        assert_eq!(hub.subscriber_count(), 1);
    }
}
