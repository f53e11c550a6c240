//! Task execution substrate — the server-side half of the crate.
//!
//! Layered bottom-up:
//!
//! - [`crate::cache::CacheTopicAdapter`] — the leaf dependency: a remote
//!   key-value-with-TTL plus pub/sub-topics-with-sequence-numbers service.
//! - [`TaskStore`] trait + [`InMemoryTaskStore`]/[`CacheTaskStore`] — durable
//!   task persistence, with large-blob externalization in the cache-backed
//!   implementation.
//! - [`EventBus`] — per-context publish/subscribe over the adapter, with gap
//!   detection.
//! - [`EventQueue`] — a per-request, completion-aware view onto one context's
//!   event stream.
//! - [`ResultManager`] — folds that stream into a task snapshot, persisting
//!   each change.
//! - [`AgentHandler`]/[`Executor`] — runs user agent logic for one message
//!   and publishes the resulting lifecycle.
//! - [`RequestHandler`] trait + [`DefaultRequestHandler`] — the seven A2A
//!   JSON-RPC operations, wiring everything above together.
//! - [`a2a_router`] — ready-made axum routes exposing a request handler over
//!   HTTP + SSE.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a_rs::server::*;
//! use a2a_rs::types::{AgentCard, Message};
//!
//! // 1. Implement your agent logic as an async closure or a type.
//! let handler: Arc<dyn AgentHandler> = Arc::new(
//!     |message: Message, _ctx: HandlerContext| -> HandlerFuture {
//!         Box::pin(async move { Ok(HandlerResult::Text("hello".into())) })
//!     },
//! );
//!
//! // 2. Wire up the substrate.
//! let adapter = Arc::new(a2a_rs::cache::InMemoryCacheAdapter::new());
//! let task_store: Arc<dyn TaskStore> = Arc::new(CacheTaskStore::new(adapter.clone()));
//! let bus = Arc::new(EventBus::new(adapter.clone()));
//! let executor = Arc::new(Executor::new(bus.clone(), handler, "my-agent", "agent-1", "worker"));
//! let request_handler: Arc<dyn RequestHandler> =
//!     Arc::new(DefaultRequestHandler::new(adapter, task_store, bus, executor, agent_card));
//!
//! // 3. Create the router and serve.
//! let app = a2a_router(request_handler, agent_card);
//! ```

pub mod axum_integration;
pub mod event_bus;
pub mod event_queue;
pub mod executor;
pub mod request_handler;
pub mod result_manager;
pub mod task_store;

pub use crate::types::SendMessageResponse;
pub use axum_integration::a2a_router;
pub use event_bus::{BusMessage, Discontinuity, EventBus};
pub use event_queue::{EventQueue, QueueItem};
pub use executor::{AgentHandler, Executor, HandlerContext, HandlerFuture, HandlerResult};
pub use request_handler::{DefaultRequestHandler, RequestHandler};
pub use result_manager::ResultManager;
pub use task_store::{CacheTaskStore, InMemoryTaskStore, TaskListParams, TaskListResponse, TaskStore};
