//! Event Bus — per-context publish/subscribe over the Cache/Topic Adapter,
//! with gap detection.
//!
//! One topic per `contextId`. A background poller per registered context
//! long-polls the topic and fans each delivered event out to every local
//! subscriber over a `tokio::sync::broadcast` channel; a discontinuity from
//! the broker becomes a synthetic [`BusMessage::Discontinuity`] rather than
//! tearing the poller down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheTopicAdapter, SubscribeItem};
use crate::error::{A2AError, A2AResult};
use crate::types::StreamResponse;

/// Delay between successive polls of a context's topic.
const POLL_IDLE_DELAY: Duration = Duration::from_millis(100);

/// Delay before retrying a poll after a transport error.
const POLL_ERROR_DELAY: Duration = Duration::from_millis(250);

/// Capacity of each context's fan-out channel. Generous relative to the
/// per-task event volume a single task lifecycle produces.
const CHANNEL_CAPACITY: usize = 256;

/// A broker-reported gap between two observed sequence numbers on a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Discontinuity {
    /// Context (topic) this gap was observed on.
    pub context_id: String,
    /// The sequence number immediately following the last event this
    /// process actually observed, *before* the poller advanced past the
    /// gap. Reported pre-advance intentionally (see design notes).
    pub from_sequence: u64,
    /// The sequence number the broker says polling should resume from.
    pub to_sequence: u64,
}

/// One item delivered to an Event Bus subscriber.
#[derive(Debug, Clone)]
pub enum BusMessage {
    /// A task-lifecycle event.
    Event(StreamResponse),
    /// A gap notification; the poller keeps running after emitting this.
    Discontinuity(Discontinuity),
}

struct ContextState {
    sender: broadcast::Sender<BusMessage>,
    subscriber_count: usize,
    poller: JoinHandle<()>,
}

/// Per-context publish/subscribe bus backed by a [`CacheTopicAdapter`].
pub struct EventBus {
    adapter: Arc<dyn CacheTopicAdapter>,
    contexts: Mutex<HashMap<String, ContextState>>,
}

impl EventBus {
    /// Build a bus over `adapter`.
    pub fn new(adapter: Arc<dyn CacheTopicAdapter>) -> Self {
        Self {
            adapter,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Publish `event` to its `contextId`'s topic.
    pub async fn publish(&self, event: StreamResponse) -> A2AResult<()> {
        let context_id = context_id_of(&event);
        if context_id.is_empty() {
            return Err(A2AError::invalid_params(
                "event must carry a non-empty contextId",
            ));
        }
        let payload = serde_json::to_string(&event)?;
        self.adapter.topic_publish(&context_id, payload).await
    }

    /// Register `context_id`, starting a poller if this is the first
    /// registration, and return a receiver for events matching that
    /// context. Idempotent and safe to call concurrently.
    pub async fn on_context(&self, context_id: &str) -> broadcast::Receiver<BusMessage> {
        let mut contexts = self.contexts.lock().await;
        if let Some(state) = contexts.get_mut(context_id) {
            state.subscriber_count += 1;
            return state.sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        let poller = tokio::spawn(poll_context(
            Arc::clone(&self.adapter),
            context_id.to_string(),
            sender.clone(),
        ));
        contexts.insert(
            context_id.to_string(),
            ContextState {
                sender,
                subscriber_count: 1,
                poller,
            },
        );
        debug!(context_id, "registered context poller");
        receiver
    }

    /// Register `context_id` without taking a subscription, for callers
    /// that only need the poller running (mirrors the source's
    /// `registerContext`).
    pub async fn register_context(&self, context_id: &str) {
        drop(self.on_context(context_id).await);
    }

    /// Drop one subscriber of `context_id`; once the count reaches zero the
    /// poller is aborted and the context is removed.
    pub async fn unregister_context(&self, context_id: &str) {
        let mut contexts = self.contexts.lock().await;
        let Some(state) = contexts.get_mut(context_id) else {
            return;
        };
        state.subscriber_count = state.subscriber_count.saturating_sub(1);
        if state.subscriber_count == 0 {
            let state = contexts.remove(context_id).expect("just looked up");
            state.poller.abort();
            debug!(context_id, "unregistered context poller");
        }
    }

    /// Abort every poller and drop all context state.
    pub async fn close(&self) {
        let mut contexts = self.contexts.lock().await;
        for (context_id, state) in contexts.drain() {
            state.poller.abort();
            debug!(context_id, "closed context poller");
        }
    }

    /// Number of contexts with an active poller. Test/introspection only.
    pub async fn active_context_count(&self) -> usize {
        self.contexts.lock().await.len()
    }
}

fn context_id_of(event: &StreamResponse) -> String {
    match event {
        StreamResponse::Task(t) => t.context_id.clone(),
        StreamResponse::Message(m) => m.context_id.clone().unwrap_or_default(),
        StreamResponse::StatusUpdate(e) => e.context_id.clone(),
        StreamResponse::ArtifactUpdate(e) => e.context_id.clone(),
    }
}

async fn poll_context(
    adapter: Arc<dyn CacheTopicAdapter>,
    context_id: String,
    sender: broadcast::Sender<BusMessage>,
) {
    let mut seq_num: u64 = 0;
    let mut seq_page: u64 = 0;

    loop {
        match adapter
            .topic_subscribe(&context_id, seq_num, seq_page)
            .await
        {
            Ok(result) => {
                for item in result.items {
                    match item {
                        SubscribeItem::Message {
                            payload,
                            topic_sequence_number,
                        } => {
                            match serde_json::from_str::<StreamResponse>(&payload) {
                                Ok(event) => {
                                    let _ = sender.send(BusMessage::Event(event));
                                }
                                Err(err) => {
                                    warn!(context_id = %context_id, error = %err, "dropping malformed bus event");
                                }
                            }
                            seq_num = topic_sequence_number + 1;
                        }
                        SubscribeItem::Discontinuity {
                            new_topic_sequence,
                            new_sequence_page,
                        } => {
                            let notice = Discontinuity {
                                context_id: context_id.clone(),
                                from_sequence: seq_num,
                                to_sequence: new_topic_sequence,
                            };
                            warn!(context_id = %context_id, from = notice.from_sequence, to = notice.to_sequence, "topic discontinuity");
                            let _ = sender.send(BusMessage::Discontinuity(notice));
                            seq_num = new_topic_sequence + 1;
                            seq_page = new_sequence_page;
                        }
                    }
                }
                tokio::time::sleep(POLL_IDLE_DELAY).await;
            }
            Err(err) => {
                warn!(context_id = %context_id, error = %err, "event bus poll failed, retrying");
                tokio::time::sleep(POLL_ERROR_DELAY).await;
            }
        }
    }
}
