//! In-process [`CacheTopicAdapter`] — a `tokio::sync::Mutex`-guarded map plus
//! per-topic append-only sequence logs.
//!
//! Used by tests, the single-instance deployment mode, and the demos. It
//! implements TTL expiry lazily (checked on `get`) rather than with a
//! background sweeper, matching the restraint the in-memory task store in
//! this crate takes with its own bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::A2AResult;

use super::{CacheTopicAdapter, GetFormat, SetOptions, SubscribeItem, SubscribeResult};

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// One topic's durable log: sequence-numbered messages, never truncated for
/// the lifetime of the process (this is a test/dev adapter; a real broker
/// would apply its own retention).
#[derive(Default)]
struct Topic {
    messages: Vec<String>,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    topics: HashMap<String, Topic>,
}

/// In-memory [`CacheTopicAdapter`].
#[derive(Clone)]
pub struct InMemoryCacheAdapter {
    state: Arc<Mutex<State>>,
}

impl InMemoryCacheAdapter {
    /// Create a new, empty adapter.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }
}

impl Default for InMemoryCacheAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheTopicAdapter for InMemoryCacheAdapter {
    async fn get(&self, key: &str, _format: GetFormat) -> A2AResult<Option<Vec<u8>>> {
        let mut state = self.state.lock().await;
        let expired = matches!(state.entries.get(key), Some(e) if e.expires_at <= Instant::now());
        if expired {
            state.entries.remove(key);
        }
        Ok(state.entries.get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, options: SetOptions) -> A2AResult<()> {
        let ttl = Duration::from_secs(options.ttl_seconds.unwrap_or(super::DEFAULT_TTL_SECONDS));
        let mut state = self.state.lock().await;
        state.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        debug!(key, "cache entry set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> A2AResult<()> {
        let mut state = self.state.lock().await;
        state.entries.remove(key);
        Ok(())
    }

    async fn topic_publish(&self, topic: &str, payload: String) -> A2AResult<()> {
        let mut state = self.state.lock().await;
        state.topics.entry(topic.to_string()).or_default().messages.push(payload);
        Ok(())
    }

    async fn topic_subscribe(
        &self,
        topic: &str,
        sequence_number: u64,
        _sequence_page: u64,
    ) -> A2AResult<SubscribeResult> {
        let state = self.state.lock().await;
        let items = match state.topics.get(topic) {
            Some(log) => log
                .messages
                .iter()
                .enumerate()
                .skip(sequence_number as usize)
                .map(|(idx, payload)| SubscribeItem::Message {
                    payload: payload.clone(),
                    topic_sequence_number: idx as u64,
                })
                .collect(),
            None => Vec::new(),
        };
        Ok(SubscribeResult { items })
    }

    async fn is_valid_connection(&self) -> bool {
        true
    }
}
