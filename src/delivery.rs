//! Message delivery: single-slot queue that "types out" assistant messages.
//!
//! Each request waits out an optional lead-in, then streams for a fixed
//! latency, then commits. Exactly one request occupies the slot at a time;
//! the rest wait in FIFO order, so commits always follow enqueue order no
//! matter when the producers of those messages finished their own work.
//!
//! The queue does not spawn anything. Its owner polls [`DeliveryQueue::next_step`]
//! (usually from a `tokio::select!` loop) and receives starts and commits as
//! they happen. Commits are also broadcast as [`DeliveryEvent`]s.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{Instant, Sleep};
use tracing::debug;
use uuid::Uuid;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// A message waiting to be delivered, plus an opaque tag handed back on commit.
#[derive(Debug, Clone)]
pub struct DeliveryRequest<T> {
    pub text: String,
    /// Pause before streaming starts. The slot is already held during it.
    pub lead_in: Duration,
    pub tag: T,
}

impl<T> DeliveryRequest<T> {
    pub fn new(text: impl Into<String>, tag: T) -> Self {
        Self {
            text: text.into(),
            lead_in: Duration::ZERO,
            tag,
        }
    }

    pub fn with_lead_in(mut self, lead_in: Duration) -> Self {
        self.lead_in = lead_in;
        self
    }
}

/// Broadcast to observers as deliveries progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryEvent {
    Started {
        id: Uuid,
        text: String,
    },
    Committed {
        id: Uuid,
        text: String,
        at: DateTime<Utc>,
    },
}

/// What happened when the active delivery's timer fired.
#[derive(Debug)]
pub enum DeliveryStep<T> {
    /// Lead-in elapsed; the text is now streaming.
    Started { id: Uuid },
    /// Streaming finished; the text must be appended to history now.
    Committed(Committed<T>),
}

/// A finished delivery.
#[derive(Debug)]
pub struct Committed<T> {
    pub id: Uuid,
    pub text: String,
    pub tag: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    LeadIn,
    Streaming,
}

struct Active<T> {
    id: Uuid,
    request: DeliveryRequest<T>,
    stage: Stage,
    timer: Pin<Box<Sleep>>,
}

/// FIFO queue that lets one delivery run at a time.
pub struct DeliveryQueue<T> {
    latency: Duration,
    active: Option<Active<T>>,
    pending: VecDeque<(Uuid, DeliveryRequest<T>)>,
    tx: broadcast::Sender<DeliveryEvent>,
}

impl<T> DeliveryQueue<T> {
    /// Create a queue whose messages stream for `latency` before committing.
    pub fn new(latency: Duration) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            latency,
            active: None,
            pending: VecDeque::new(),
            tx,
        }
    }

    /// Subscribe to delivery events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.tx.subscribe()
    }

    /// Sender half, for handing out further subscriptions.
    pub fn sender(&self) -> broadcast::Sender<DeliveryEvent> {
        self.tx.clone()
    }

    /// Queue a message. It starts immediately if the slot is free.
    pub fn enqueue(&mut self, request: DeliveryRequest<T>) -> Uuid {
        let id = Uuid::new_v4();
        debug!(delivery_id = %id, lead_in_ms = request.lead_in.as_millis() as u64, queued = self.pending.len(), "Delivery enqueued");
        self.pending.push_back((id, request));
        if self.active.is_none() {
            self.start_next();
        }
        id
    }

    /// Whether a message is currently streaming (lead-in finished, not yet committed).
    pub fn is_streaming(&self) -> bool {
        matches!(&self.active, Some(a) if a.stage == Stage::Streaming)
    }

    /// Text of the message currently streaming.
    pub fn streaming_text(&self) -> Option<&str> {
        match &self.active {
            Some(a) if a.stage == Stage::Streaming => Some(a.request.text.as_str()),
            _ => None,
        }
    }

    /// Whether anything is active or waiting.
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.pending.is_empty()
    }

    /// Number of deliveries active or waiting.
    pub fn len(&self) -> usize {
        self.pending.len() + usize::from(self.active.is_some())
    }

    pub fn is_empty(&self) -> bool {
        !self.is_busy()
    }

    /// Wait for the active delivery to make progress.
    ///
    /// Pends forever while the queue is idle. Cancel safe: timers live in the
    /// queue, so dropping this future loses nothing.
    pub async fn next_step(&mut self) -> DeliveryStep<T> {
        let Some(active) = self.active.as_mut() else {
            return std::future::pending().await;
        };
        active.timer.as_mut().await;

        let stage = active.stage;
        match stage {
            Stage::LeadIn => {
                active.stage = Stage::Streaming;
                active.timer.as_mut().reset(Instant::now() + self.latency);
                let id = active.id;
                debug!(delivery_id = %id, "Delivery streaming");
                let _ = self.tx.send(DeliveryEvent::Started {
                    id,
                    text: active.request.text.clone(),
                });
                DeliveryStep::Started { id }
            }
            Stage::Streaming => {
                let Some(done) = self.active.take() else {
                    return std::future::pending().await;
                };
                debug!(delivery_id = %done.id, "Delivery committed");
                let _ = self.tx.send(DeliveryEvent::Committed {
                    id: done.id,
                    text: done.request.text.clone(),
                    at: Utc::now(),
                });
                self.start_next();
                DeliveryStep::Committed(Committed {
                    id: done.id,
                    text: done.request.text,
                    tag: done.request.tag,
                })
            }
        }
    }

    fn start_next(&mut self) {
        if let Some((id, request)) = self.pending.pop_front() {
            let timer = Box::pin(tokio::time::sleep(request.lead_in));
            self.active = Some(Active {
                id,
                request,
                stage: Stage::LeadIn,
                timer,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn commit<T>(queue: &mut DeliveryQueue<T>) -> Committed<T> {
        loop {
            if let DeliveryStep::Committed(done) = queue.next_step().await {
                return done;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn commits_in_enqueue_order() {
        let mut queue = DeliveryQueue::new(Duration::from_millis(500));
        queue.enqueue(DeliveryRequest::new("first", 1).with_lead_in(Duration::from_millis(800)));
        queue.enqueue(DeliveryRequest::new("second", 2));
        assert_eq!(queue.len(), 2);

        let first = commit(&mut queue).await;
        assert_eq!((first.text.as_str(), first.tag), ("first", 1));
        let second = commit(&mut queue).await;
        assert_eq!((second.text.as_str(), second.tag), ("second", 2));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lead_in_holds_slot_without_streaming() {
        let mut queue = DeliveryQueue::new(Duration::from_millis(500));
        queue.enqueue(DeliveryRequest::new("hello", ()).with_lead_in(Duration::from_secs(1)));

        assert!(queue.is_busy());
        assert!(!queue.is_streaming());
        assert!(queue.streaming_text().is_none());

        let started = Instant::now();
        assert!(matches!(queue.next_step().await, DeliveryStep::Started { .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert!(queue.is_streaming());
        assert_eq!(queue.streaming_text(), Some("hello"));

        commit(&mut queue).await;
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
        assert!(!queue.is_streaming());
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_delivery_streams_at_a_time() {
        let mut queue = DeliveryQueue::new(Duration::from_millis(500));
        queue.enqueue(DeliveryRequest::new("a", ()));
        queue.enqueue(DeliveryRequest::new("b", ()));

        assert!(matches!(queue.next_step().await, DeliveryStep::Started { .. }));
        assert_eq!(queue.streaming_text(), Some("a"));
        assert_eq!(queue.len(), 2);

        commit(&mut queue).await;
        assert!(matches!(queue.next_step().await, DeliveryStep::Started { .. }));
        assert_eq!(queue.streaming_text(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn broadcasts_start_and_commit() {
        let mut queue = DeliveryQueue::new(Duration::from_millis(10));
        let mut rx = queue.subscribe();
        let id = queue.enqueue(DeliveryRequest::new("ping", ()));

        commit(&mut queue).await;

        match rx.recv().await.unwrap() {
            DeliveryEvent::Started { id: got, text } => {
                assert_eq!(got, id);
                assert_eq!(text, "ping");
            }
            other => panic!("Expected Started, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            DeliveryEvent::Committed { id: got, text, .. } => {
                assert_eq!(got, id);
                assert_eq!(text, "ping");
            }
            other => panic!("Expected Committed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_queue_never_resolves() {
        let mut queue: DeliveryQueue<()> = DeliveryQueue::new(Duration::from_millis(10));
        let step = tokio::time::timeout(Duration::from_secs(60), queue.next_step()).await;
        assert!(step.is_err());
    }
}
