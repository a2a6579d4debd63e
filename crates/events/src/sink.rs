//! Per-session ordered event sink backed by a tokio broadcast channel.

use std::sync::RwLock;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::TraceEvent;

/// Capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1000;

struct SinkInner {
    events: Vec<TraceEvent>,
    last_sequence: u64,
}

/// Ordered in-memory event log for one session.
///
/// Assigns gap-free sequence numbers (starting at 1), keeps the full
/// history for cursor-based replay, and fans live events out to
/// subscribers. Durable persistence is layered on top by the caller, which
/// must serialize `next_sequence`/`publish` pairs per session.
pub struct SessionSink {
    session_id: Uuid,
    inner: RwLock<SinkInner>,
    sender: broadcast::Sender<TraceEvent>,
}

impl SessionSink {
    pub fn new(session_id: Uuid) -> Self {
        Self::with_capacity(session_id, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(session_id: Uuid, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            session_id,
            inner: RwLock::new(SinkInner {
                events: Vec::new(),
                last_sequence: 0,
            }),
            sender,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Sequence number the next published event must carry.
    pub fn next_sequence(&self) -> u64 {
        self.inner.read().unwrap().last_sequence + 1
    }

    pub fn last_sequence(&self) -> u64 {
        self.inner.read().unwrap().last_sequence
    }

    /// Record an event in the history and broadcast it to subscribers.
    ///
    /// If there are no subscribers the broadcast is dropped; the history
    /// still retains the event for replay.
    pub fn publish(&self, event: TraceEvent) {
        {
            let mut inner = self.inner.write().unwrap();
            inner.last_sequence = event.sequence_no;
            inner.events.push(event.clone());
        }
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.sender.subscribe()
    }

    /// Events with `sequence_no` strictly greater than `after`, in order.
    pub fn events_after(&self, after: u64) -> Vec<TraceEvent> {
        self.inner
            .read()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.sequence_no > after)
            .cloned()
            .collect()
    }

    pub fn history(&self) -> Vec<TraceEvent> {
        self.inner.read().unwrap().events.clone()
    }

    /// Replace the in-memory history with persisted events (restart path).
    pub fn hydrate(&self, events: Vec<TraceEvent>) {
        let mut inner = self.inner.write().unwrap();
        inner.last_sequence = events.iter().map(|e| e.sequence_no).max().unwrap_or(0);
        inner.events = events;
    }

    pub fn history_len(&self) -> usize {
        self.inner.read().unwrap().events.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for SessionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSink")
            .field("session_id", &self.session_id)
            .field("history_len", &self.history_len())
            .field("last_sequence", &self.last_sequence())
            .finish()
    }
}
