//! Execution Event Queue — a per-request view onto a single `(bus,
//! contextId)` pair, with the A2A completion semantics layered on top of
//! the bus's raw fan-out.
//!
//! Mirrors the pull-based consumption shape the event queue in this
//! crate's lineage used (construct, pull events, `stop()`), adapted from an
//! in-process broadcast buffer to one bound to the Event Bus's per-context
//! subscription.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::types::StreamResponse;

use super::event_bus::{BusMessage, Discontinuity, EventBus};

/// One item produced by [`EventQueue::next_event`].
#[derive(Debug, Clone)]
pub enum QueueItem {
    /// A task-lifecycle event.
    Event(StreamResponse),
    /// A gap notification passed through from the Event Bus.
    Discontinuity(Discontinuity),
}

/// Bounded, per-request consumer of a context's event stream.
///
/// Terminates — and is from then on always empty — after it yields either a
/// standalone `Message` event or a `StatusUpdate` with `final = true`.
pub struct EventQueue {
    bus: std::sync::Arc<EventBus>,
    context_id: String,
    /// When set, events for other `taskId`s sharing this context are
    /// filtered out before being yielded (used by `resubscribe`).
    task_id_filter: Option<String>,
    receiver: Mutex<tokio::sync::broadcast::Receiver<BusMessage>>,
    terminated: AtomicBool,
}

impl EventQueue {
    /// Register a listener on `context_id` via `bus` and return a queue
    /// that yields only events for that context (optionally further
    /// narrowed to `task_id_filter`).
    pub async fn new(
        bus: std::sync::Arc<EventBus>,
        context_id: impl Into<String>,
        task_id_filter: Option<String>,
    ) -> Self {
        let context_id = context_id.into();
        let receiver = bus.on_context(&context_id).await;
        Self {
            bus,
            context_id,
            task_id_filter,
            receiver: Mutex::new(receiver),
            terminated: AtomicBool::new(false),
        }
    }

    /// Pull the next event, or `None` once the queue has terminated.
    ///
    /// Terminates the queue (and unregisters its listener) the moment it
    /// returns a standalone `Message` or a `final = true` `StatusUpdate`;
    /// every subsequent call returns `None` immediately.
    pub async fn next_event(&self) -> Option<QueueItem> {
        if self.terminated.load(Ordering::Acquire) {
            return None;
        }

        loop {
            let mut receiver = self.receiver.lock().await;
            let received = receiver.recv().await;
            drop(receiver);

            match received {
                Ok(BusMessage::Discontinuity(d)) => {
                    return Some(QueueItem::Discontinuity(d));
                }
                Ok(BusMessage::Event(event)) => {
                    if let Some(task_id) = &self.task_id_filter {
                        if event_task_id(&event).as_deref() != Some(task_id.as_str()) {
                            continue;
                        }
                    }
                    if is_final_event(&event) {
                        self.terminate().await;
                    }
                    return Some(QueueItem::Event(event));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        context_id = %self.context_id,
                        skipped,
                        "event queue consumer lagged, events dropped"
                    );
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    self.terminate().await;
                    return None;
                }
            }
        }
    }

    /// Force termination: unregisters the listener and makes every further
    /// call to [`next_event`](Self::next_event) return `None`. Idempotent
    /// and safe to call from another task.
    pub async fn stop(&self) {
        self.terminate().await;
    }

    async fn terminate(&self) {
        if !self.terminated.swap(true, Ordering::AcqRel) {
            self.bus.unregister_context(&self.context_id).await;
            debug!(context_id = %self.context_id, "event queue terminated");
        }
    }
}

fn event_task_id(event: &StreamResponse) -> Option<String> {
    match event {
        StreamResponse::Task(t) => Some(t.id.clone()),
        StreamResponse::Message(m) => m.task_id.clone(),
        StreamResponse::StatusUpdate(e) => Some(e.task_id.clone()),
        StreamResponse::ArtifactUpdate(e) => Some(e.task_id.clone()),
    }
}

fn is_final_event(event: &StreamResponse) -> bool {
    match event {
        StreamResponse::Message(_) => true,
        StreamResponse::StatusUpdate(e) => e.r#final,
        _ => false,
    }
}
