//! A single bounded queue type, built on the retry-timing primitives in [`crate::msg_assurance`],
//! used for both the outbound send-queue and the in-flight queue of a client session.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant as StdInstant;

use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Duration};

use crate::id;
use crate::msg_assurance::{ExponentialBackoff, RetryDuration};
use crate::qos::QosLevel;
use crate::v3::PublishPacket;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Client,
    Broker,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketState {
    QueuedQoS0,
    QueuedQoS1,
    QueuedQoS2,
    WaitPubAck,
    WaitPubRec,
    WaitPubRel,
    WaitPubComp,
}

/// Releases a client-origin packet id back to the process-wide allocator when the last
/// reference to it is dropped. Broker-origin ids are never ours to release.
#[derive(Debug)]
struct ClientIdGuard(u16);

impl Drop for ClientIdGuard {
    fn drop(&mut self) {
        id::mark_free(self.0);
    }
}

#[derive(Clone, Debug)]
enum PacketId {
    None,
    Client(Arc<ClientIdGuard>),
    Broker(u16),
}

impl PacketId {
    fn value(&self) -> Option<u16> {
        match self {
            Self::None => None,
            Self::Client(guard) => Some(guard.0),
            Self::Broker(id) => Some(*id),
        }
    }
}

/// Wraps an outbound or inbound `Publish` with the bookkeeping a QoS handshake needs:
/// the packet-id reservation, the current state, and the retry clock.
#[derive(Clone, Debug)]
pub struct MessageContext {
    packet: Arc<PublishPacket>,
    id: PacketId,
    state: PacketState,
    origin: Origin,
    attempts: u32,
    last_activity: StdInstant,
    retry: RetryDuration,
}

impl MessageContext {
    /// Builds a context for a client-originated publish. `id` must already be reserved
    /// with [`crate::id::next`]/[`crate::id::mark_used`] for QoS ≥ 1; pass `None` for QoS 0.
    pub fn originate(packet: PublishPacket, id: Option<u16>) -> Self {
        let state = match packet.qos() {
            QosLevel::AtMostOnce => PacketState::QueuedQoS0,
            QosLevel::AtLeastOnce => PacketState::QueuedQoS1,
            QosLevel::ExactlyOnce => PacketState::QueuedQoS2,
        };

        let id = match id {
            Some(id) => PacketId::Client(Arc::new(ClientIdGuard(id))),
            None => PacketId::None,
        };

        return Self {
            packet: Arc::new(packet),
            id,
            state,
            origin: Origin::Client,
            attempts: 0,
            last_activity: StdInstant::now(),
            retry: RetryDuration::default(),
        };
    }

    /// Builds a context for a broker-originated QoS 2 publish awaiting `PubRel`.
    pub fn receive_wait_rel(packet: PublishPacket, id: u16) -> Self {
        return Self {
            packet: Arc::new(packet),
            id: PacketId::Broker(id),
            state: PacketState::WaitPubRel,
            origin: Origin::Broker,
            attempts: 0,
            last_activity: StdInstant::now(),
            retry: RetryDuration::default(),
        };
    }

    pub fn id(&self) -> Option<u16> {
        return self.id.value();
    }

    pub fn state(&self) -> PacketState {
        return self.state;
    }

    pub fn set_state(&mut self, state: PacketState) {
        self.last_activity = StdInstant::now();
        self.state = state;
    }

    pub fn origin(&self) -> Origin {
        return self.origin;
    }

    pub fn packet(&self) -> &Arc<PublishPacket> {
        return &self.packet;
    }

    pub fn attempts(&self) -> u32 {
        return self.attempts;
    }

    /// Marks a re-send attempt and backs off the retry clock exponentially.
    pub fn record_retry(&mut self) {
        self.attempts += 1;
        self.last_activity = StdInstant::now();
        let backed_off = self.retry.exponential();
        self.retry.set_duration(backed_off);
    }

    pub fn is_timed_out(&self) -> bool {
        return StdInstant::now().duration_since(self.last_activity) > self.retry.inner();
    }

    pub fn should_retry(&self) -> bool {
        matches!(self.state, PacketState::WaitPubAck | PacketState::WaitPubRec) && self.is_timed_out()
    }
}

struct Inner {
    items: VecDeque<MessageContext>,
    capacity: usize,
}

/// A fixed-capacity FIFO of [`MessageContext`], shared between a client's receive and
/// dispatcher tasks. `add` parks the caller while the queue is full (except QoS 0
/// contexts, which are dropped silently rather than blocking a fire-and-forget publish).
pub struct SessionQueue {
    inner: Mutex<Inner>,
    /// Signaled whenever an item is added, removed, or the queue is cleared.
    changed: Notify,
}

impl SessionQueue {
    pub fn new(capacity: usize) -> Self {
        return Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                capacity,
            }),
            changed: Notify::new(),
        };
    }

    /// Pushes `ctx` onto the back of the queue, parking until space frees up if full.
    ///
    /// Exception: a `QueuedQoS0` context is dropped silently instead of blocking, since a
    /// fire-and-forget publish must never stall on back-pressure.
    pub async fn add(&self, ctx: MessageContext) {
        if ctx.state == PacketState::QueuedQoS0 {
            let mut guard = self.inner.lock().await;
            if guard.items.len() < guard.capacity {
                guard.items.push_back(ctx);
                drop(guard);
                self.changed.notify_waiters();
            }
            // full: drop the QoS 0 context silently.
            return;
        }

        loop {
            {
                let mut guard = self.inner.lock().await;
                if guard.items.len() < guard.capacity {
                    guard.items.push_back(ctx);
                    drop(guard);
                    self.changed.notify_waiters();
                    return;
                }
            }
            self.changed.notified().await;
        }
    }

    pub async fn front(&self) -> Option<MessageContext> {
        return self.inner.lock().await.items.front().cloned();
    }

    pub async fn pop_front(&self) -> Option<MessageContext> {
        let mut guard = self.inner.lock().await;
        let item = guard.items.pop_front();
        drop(guard);
        if item.is_some() {
            self.changed.notify_waiters();
        }
        return item;
    }

    pub async fn remove_at(&self, idx: usize) -> Option<MessageContext> {
        let mut guard = self.inner.lock().await;
        let item = guard.items.remove(idx);
        drop(guard);
        if item.is_some() {
            self.changed.notify_waiters();
        }
        return item;
    }

    pub async fn len(&self) -> usize {
        return self.inner.lock().await.items.len();
    }

    pub async fn is_empty(&self) -> bool {
        return self.inner.lock().await.items.is_empty();
    }

    pub async fn is_full(&self) -> bool {
        let guard = self.inner.lock().await;
        return guard.items.len() >= guard.capacity;
    }

    /// Returns the index of the first context whose packet-id matches `packet_id` and
    /// whose state is one of `allowed` (any state matches if `allowed` is empty).
    pub async fn find(&self, packet_id: u16, allowed: &[PacketState]) -> Option<usize> {
        let guard = self.inner.lock().await;
        return guard.items.iter().position(|ctx| {
            ctx.id() == Some(packet_id) && (allowed.is_empty() || allowed.contains(&ctx.state))
        });
    }

    /// Scans the queue for entries whose retry clock has elapsed, per
    /// [`MessageContext::should_retry`].
    pub async fn timed_out_indices(&self) -> Vec<usize> {
        let guard = self.inner.lock().await;
        return guard
            .items
            .iter()
            .enumerate()
            .filter(|(_, ctx)| ctx.should_retry())
            .map(|(idx, _)| idx)
            .collect();
    }

    pub async fn with_mut<F, R>(&self, idx: usize, f: F) -> Option<R>
    where
        F: FnOnce(&mut MessageContext) -> R,
    {
        let mut guard = self.inner.lock().await;
        let result = guard.items.get_mut(idx).map(f);
        drop(guard);
        if result.is_some() {
            self.changed.notify_waiters();
        }
        return result;
    }

    /// Blocks until the queue changes, or until `timeout_dur` elapses; waits indefinitely
    /// when `None`.
    pub async fn wait(&self, timeout_dur: Option<Duration>) {
        let notified = self.changed.notified();
        match timeout_dur {
            Some(dur) => {
                let _ = timeout(dur, notified).await;
            }
            None => notified.await,
        }
    }

    /// Empties the queue. Dropping each context releases any owned packet-id back to the
    /// allocator.
    pub async fn clear(&self) {
        let mut guard = self.inner.lock().await;
        guard.items.clear();
        drop(guard);
        self.changed.notify_waiters();
    }
}

#[cfg(test)]
mod session_queue {
    use super::*;
    use crate::topic::TopicName;
    use bytes::Bytes;

    fn publish(topic: &str) -> PublishPacket {
        PublishPacket::new(&TopicName::from_str(topic).unwrap(), Bytes::new())
    }

    #[tokio::test]
    async fn qos0_is_dropped_when_full() {
        let queue = SessionQueue::new(1);
        let mut p1 = publish("a");
        p1.set_qos_atmostonce();
        queue.add(MessageContext::originate(p1, None)).await;
        assert_eq!(queue.len().await, 1);

        let mut p2 = publish("b");
        p2.set_qos_atmostonce();
        queue.add(MessageContext::originate(p2, None)).await;
        // queue was already full of one QoS 0 context; the second is dropped silently.
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn find_matches_id_and_state() {
        let queue = SessionQueue::new(4);
        let mut p = publish("a");
        p.set_qos_atleastonce(7);
        let mut ctx = MessageContext::originate(p, Some(7));
        ctx.set_state(PacketState::WaitPubAck);
        queue.add(ctx).await;

        let idx = queue.find(7, &[PacketState::WaitPubAck]).await;
        assert_eq!(idx, Some(0));

        let miss = queue.find(7, &[PacketState::WaitPubRec]).await;
        assert_eq!(miss, None);
    }

    #[tokio::test]
    async fn pop_front_notifies_waiters() {
        let queue = SessionQueue::new(1);
        let mut p = publish("a");
        p.set_qos_atleastonce(1);
        queue.add(MessageContext::originate(p, Some(1))).await;

        let popped = queue.pop_front().await;
        assert!(popped.is_some());
        assert!(queue.is_empty().await);
    }
}
