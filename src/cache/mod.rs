//! Cache/Topic Adapter — the leaf dependency of the whole substrate.
//!
//! Wraps a remote key-value-with-TTL + pub/sub-topics-with-sequence-numbers
//! service behind one async trait, [`CacheTopicAdapter`]. Every other
//! component (task store, event bus) is written against the trait, not a
//! concrete implementation, so the substrate runs equally well against a
//! real HTTP-backed cache ([`HttpCacheAdapter`]) or an in-process one
//! ([`InMemoryCacheAdapter`]) used by tests and single-instance deployments.

mod http;
mod memory;

pub use http::{HttpCacheAdapter, HttpCacheAdapterConfig};
pub use memory::InMemoryCacheAdapter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::A2AResult;

/// Default TTL applied to `set` calls that don't specify one, in seconds.
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// How a stored value should be read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetFormat {
    /// Return the raw bytes as stored.
    Raw,
    /// Decode as a UTF-8 string.
    String,
    /// Decode as a UTF-8 string and parse as JSON.
    Json,
}

/// Options accepted by [`CacheTopicAdapter::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Time-to-live in seconds. Defaults to [`DEFAULT_TTL_SECONDS`] if `None`.
    pub ttl_seconds: Option<u64>,
}

/// A single item returned from [`CacheTopicAdapter::topic_subscribe`]: either
/// a delivered message or a discontinuity signal from the broker.
#[derive(Debug, Clone)]
pub enum SubscribeItem {
    /// A message delivered on the topic.
    Message {
        /// The raw JSON payload, as published.
        payload: String,
        /// The sequence number this message occupies on the topic.
        topic_sequence_number: u64,
    },
    /// A broker-reported gap: one or more messages between the last
    /// observed sequence and `new_topic_sequence` are irrecoverable.
    Discontinuity {
        /// The sequence number to resume polling from.
        new_topic_sequence: u64,
        /// The sequence page to resume polling from.
        new_sequence_page: u64,
    },
}

/// Result of a [`CacheTopicAdapter::topic_subscribe`] poll.
#[derive(Debug, Clone, Default)]
pub struct SubscribeResult {
    /// Items delivered since the requested sequence number, in order.
    pub items: Vec<SubscribeItem>,
}

/// A lenient result envelope, used by the `*_lenient` entry points that
/// surface adapter errors as data instead of raising them — the Rust
/// expression of the source's `throwOnError: false` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdapterOutcome<T> {
    /// The call succeeded.
    Ok {
        /// Always `true` on this variant.
        success: bool,
        /// The successful payload.
        data: T,
    },
    /// The call failed; `error` carries a human-readable description.
    Err {
        /// Always `false` on this variant.
        success: bool,
        /// Human-readable failure description.
        error: String,
    },
}

impl<T> AdapterOutcome<T> {
    fn ok(data: T) -> Self {
        AdapterOutcome::Ok {
            success: true,
            data,
        }
    }

    fn err(error: impl std::fmt::Display) -> Self {
        AdapterOutcome::Err {
            success: false,
            error: error.to_string(),
        }
    }
}

/// Interface the task execution substrate requires of its backing cache and
/// pub/sub-topic service.
///
/// Implementors should retry transient failures (network errors, 5xx
/// responses) internally with exponential backoff — callers of the `try_*`
/// methods only ever see a persistent failure or a result.
#[async_trait]
pub trait CacheTopicAdapter: Send + Sync {
    /// Look up `key`. Returns `Ok(None)` for a cache-miss (source 404);
    /// any other non-2xx response is an error.
    async fn get(&self, key: &str, format: GetFormat) -> A2AResult<Option<Vec<u8>>>;

    /// Store `value` under `key` with the given options.
    async fn set(&self, key: &str, value: Vec<u8>, options: SetOptions) -> A2AResult<()>;

    /// Remove `key`. Not an error if it was already absent.
    async fn delete(&self, key: &str) -> A2AResult<()>;

    /// Publish `payload` (the JSON encoding of an event) to `topic`.
    async fn topic_publish(&self, topic: &str, payload: String) -> A2AResult<()>;

    /// Long-poll `topic` for items at or after `sequence_number` /
    /// `sequence_page`.
    async fn topic_subscribe(
        &self,
        topic: &str,
        sequence_number: u64,
        sequence_page: u64,
    ) -> A2AResult<SubscribeResult>;

    /// Probe connectivity by looking up a sentinel key. A "cache not found"
    /// response is treated as an invalid connection; anything else
    /// (including a miss on the sentinel key itself) counts as valid.
    async fn is_valid_connection(&self) -> bool;

    /// JSON convenience wrapper around [`get`](Self::get) with
    /// `format: Json`.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> A2AResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key, GetFormat::Json).await? {
            Some(bytes) => {
                let value: T = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// JSON convenience wrapper around [`set`](Self::set).
    async fn set_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> A2AResult<()>
    where
        Self: Sized,
    {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes, options).await
    }

    /// `get` with errors surfaced as an [`AdapterOutcome`] instead of raised
    /// — the Rust expression of the source's `throwOnError: false` mode.
    async fn get_lenient(&self, key: &str, format: GetFormat) -> AdapterOutcome<Option<Vec<u8>>> {
        match self.get(key, format).await {
            Ok(v) => AdapterOutcome::ok(v),
            Err(e) => AdapterOutcome::err(e),
        }
    }

    /// `set` with errors surfaced as an [`AdapterOutcome`] instead of raised.
    async fn set_lenient(&self, key: &str, value: Vec<u8>, options: SetOptions) -> AdapterOutcome<()> {
        match self.set(key, value, options).await {
            Ok(()) => AdapterOutcome::ok(()),
            Err(e) => AdapterOutcome::err(e),
        }
    }
}
