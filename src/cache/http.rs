//! HTTP-backed [`CacheTopicAdapter`] — talks to a remote cache/topics service
//! over `reqwest`, with the retry policy the adapter contract requires.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::A2AError;

use super::{CacheTopicAdapter, GetFormat, SetOptions, SubscribeItem, SubscribeResult};

/// Number of attempts made for a transient failure before giving up
/// (the first attempt plus two retries).
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between retries.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Configuration for [`HttpCacheAdapter`].
#[derive(Debug, Clone)]
pub struct HttpCacheAdapterConfig {
    /// Base URL of the cache/topics service, no trailing slash.
    pub base_url: String,
    /// Bearer token (or API key) sent as `Authorization`.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl HttpCacheAdapterConfig {
    /// Create a config pointed at `base_url` with no authentication and a
    /// 10-second request timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Attach an API key / bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// [`CacheTopicAdapter`] implementation backed by an HTTP cache/topics
/// service (e.g. a managed cache-and-pubsub product).
///
/// Mirrors the retry-with-backoff and error-classification shape used by
/// this crate's other `reqwest`-based HTTP client: timeouts and connection
/// failures are transient and retried; non-2xx responses other than a 404
/// (treated as a cache miss) are classified by status and retried only if
/// the status is 5xx.
pub struct HttpCacheAdapter {
    client: Client,
    config: HttpCacheAdapterConfig,
}

impl HttpCacheAdapter {
    /// Build an adapter from `config`.
    pub fn new(config: HttpCacheAdapterConfig) -> A2AResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(A2AError::from)?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Run `attempt` up to [`MAX_ATTEMPTS`] times, retrying only on
    /// transient failures with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, op: &str, mut attempt: F) -> A2AResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = A2AResult<T>>,
    {
        let mut delay = RETRY_BASE_DELAY;
        let mut last_err = None;
        for try_num in 1..=MAX_ATTEMPTS {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && try_num < MAX_ATTEMPTS => {
                    warn!(op, try_num, error = %err, "transient cache error, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| A2AError::internal_error("retry loop exhausted")))
    }
}

use crate::error::A2AResult;

#[async_trait]
impl CacheTopicAdapter for HttpCacheAdapter {
    async fn get(&self, key: &str, _format: GetFormat) -> A2AResult<Option<Vec<u8>>> {
        self.with_retry("get", || async {
            let resp = self
                .authorize(self.client.get(self.url(&format!("/cache/{key}"))))
                .send()
                .await?;
            match resp.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => {
                    let bytes = resp.bytes().await?;
                    Ok(Some(bytes.to_vec()))
                }
                status => {
                    let body = resp.text().await.unwrap_or_default();
                    Err(A2AError::Http {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, options: SetOptions) -> A2AResult<()> {
        let ttl = options.ttl_seconds.unwrap_or(super::DEFAULT_TTL_SECONDS);
        self.with_retry("set", || async {
            let resp = self
                .authorize(
                    self.client
                        .put(self.url(&format!("/cache/{key}?ttl_seconds={ttl}")))
                        .body(value.clone()),
                )
                .send()
                .await?;
            if resp.status().is_success() {
                Ok(())
            } else {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                Err(A2AError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> A2AResult<()> {
        self.with_retry("delete", || async {
            let resp = self
                .authorize(self.client.delete(self.url(&format!("/cache/{key}"))))
                .send()
                .await?;
            if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
                Ok(())
            } else {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                Err(A2AError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
        })
        .await
    }

    async fn topic_publish(&self, topic: &str, payload: String) -> A2AResult<()> {
        self.with_retry("topic_publish", || async {
            let resp = self
                .authorize(
                    self.client
                        .post(self.url(&format!("/topics/{topic}")))
                        .body(payload.clone()),
                )
                .send()
                .await?;
            if resp.status().is_success() {
                Ok(())
            } else {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                Err(A2AError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
        })
        .await
    }

    async fn topic_subscribe(
        &self,
        topic: &str,
        sequence_number: u64,
        sequence_page: u64,
    ) -> A2AResult<SubscribeResult> {
        self.with_retry("topic_subscribe", || async {
            let resp = self
                .authorize(self.client.get(self.url(&format!(
                    "/topics/{topic}?sequence_number={sequence_number}&sequence_page={sequence_page}"
                ))))
                .send()
                .await?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(A2AError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
            let wire: WireSubscribeResult = resp.json().await.map_err(A2AError::from)?;
            Ok(SubscribeResult {
                items: wire.items.into_iter().map(Into::into).collect(),
            })
        })
        .await
    }

    async fn is_valid_connection(&self) -> bool {
        match self.get("__connection_probe__", GetFormat::Raw).await {
            Ok(_) => true,
            Err(A2AError::Http { body, .. }) => !body.to_lowercase().contains("cache not found"),
            Err(_) => false,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct WireSubscribeResult {
    items: Vec<WireSubscribeItem>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum WireSubscribeItem {
    Message {
        item: String,
        topic_sequence_number: u64,
    },
    Discontinuity {
        new_topic_sequence: u64,
        new_sequence_page: u64,
    },
}

impl From<WireSubscribeItem> for SubscribeItem {
    fn from(item: WireSubscribeItem) -> Self {
        match item {
            WireSubscribeItem::Message {
                item,
                topic_sequence_number,
            } => SubscribeItem::Message {
                payload: item,
                topic_sequence_number,
            },
            WireSubscribeItem::Discontinuity {
                new_topic_sequence,
                new_sequence_page,
            } => SubscribeItem::Discontinuity {
                new_topic_sequence,
                new_sequence_page,
            },
        }
    }
}
