//! # a2a-substrate — stateless task execution substrate for the Agent-to-Agent protocol
//!
//! A Rust implementation of the server side of the
//! [A2A protocol](https://a2a-protocol.org/latest/specification/) v0.3,
//! built so that all durable state — tasks, event streams, push
//! notification configs — lives behind a single Cache/Topic Adapter trait
//! rather than in process memory. Any number of instances can serve the
//! same set of contexts concurrently.
//!
//! ## Overview
//!
//! - Send a message and get a task or a direct message reply
//! - Stream real-time status and artifact updates via Server-Sent Events
//! - Re-subscribe to a running task's stream from a different process
//! - Persist push notification configuration per task
//! - Cancel a running task
//!
//! ## Feature flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|--------------|
//! | `transport` | yes     | axum router, SSE framing, `.well-known/agent.json`, CORS |
//!
//! ## Quick start
//!
//! Implement [`server::AgentHandler`] to define your agent's behavior:
//!
//! ```rust,ignore
//! use a2a_rs::server::{AgentHandler, HandlerContext, HandlerFuture, HandlerResult};
//! use a2a_rs::types::{Message, Part};
//! use a2a_rs::error::A2AResult;
//! use async_trait::async_trait;
//!
//! struct EchoAgent;
//!
//! #[async_trait]
//! impl AgentHandler for EchoAgent {
//!     async fn handle(&self, message: Message, _ctx: HandlerContext) -> A2AResult<HandlerResult> {
//!         let text = message.parts.iter().find_map(|p| match p {
//!             Part::Text { text, .. } => Some(text.clone()),
//!             _ => None,
//!         }).unwrap_or_default();
//!         Ok(HandlerResult::Text(format!("echo: {text}")))
//!     }
//! }
//! ```
//!
//! Then wire it into an axum server:
//!
//! ```rust,ignore
//! use a2a_rs::builders::ServerBuilder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = ServerBuilder::new(Arc::new(EchoAgent), "echo-agent")
//!         .with_agent_card(|b| {
//!             b.with_jsonrpc_interface("http://localhost:3000/a2a")
//!                 .with_streaming(true)
//!         })
//!         .build();
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! This exposes:
//! - `POST /a2a` — JSON-RPC 2.0 endpoint for all methods
//! - `GET /.well-known/agent.json` — agent card discovery
//!
//! ## Protocol compliance
//!
//! Types match the protobuf definitions at
//! [`a2a.proto`](https://github.com/a2aproject/A2A/blob/main/specification/a2a.proto).
//!
//! Supported JSON-RPC methods:
//! - `message/send` — send a message, block until a task or message result
//! - `message/stream` — send a message, stream the lifecycle via SSE
//! - `tasks/get` — retrieve a task by id
//! - `tasks/list` — list tasks with filtering
//! - `tasks/cancel` — cancel a running task
//! - `tasks/resubscribe` — re-attach to a running task's event stream
//! - `tasks/pushNotificationConfig/set` / `get`
//!
//! ## Architecture
//!
//! - [`cache::CacheTopicAdapter`] — the backing key-value + pub/sub service
//! - [`server::EventBus`] — per-context publish/subscribe over the adapter
//! - [`server::EventQueue`] — per-request view with completion semantics
//! - [`server::ResultManager`] — folds events into a durable task snapshot
//! - [`server::Executor`] — runs [`server::AgentHandler`] and publishes its lifecycle
//! - [`server::RequestHandler`] / [`server::DefaultRequestHandler`] — the JSON-RPC surface
//! - [`server::TaskStore`] / [`server::InMemoryTaskStore`] / [`server::CacheTaskStore`]
//! - [`server::a2a_router`] — axum routes over a `RequestHandler`
//!
//! ## Core types
//!
//! - [`types::Task`] — task with status, history, and artifacts
//! - [`types::Message`] — a message with text/file/data parts
//! - [`types::Part`] — content part (text, file, or structured data)
//! - [`types::TaskState`] — task lifecycle state machine
//! - [`types::StreamResponse`] — SSE event types
//! - [`types::AgentCard`] — agent metadata and capabilities
//! - [`error::A2AError`] — error types with JSON-RPC error codes

pub mod builders;
pub mod cache;
pub mod error;
pub mod types;
pub mod utils;

#[cfg(feature = "transport")]
pub mod server;

/// Prelude module that re-exports commonly used types and traits.
///
/// Import this module with `use a2a_rs::prelude::*;` to get access to the most
/// frequently used types without having to import them individually.
pub mod prelude {
    pub use crate::types::{
        AgentCapabilities, AgentCard, AgentInterface, AgentSkill, Artifact, FileContent,
        FileWithBytes, FileWithUri, Message, Part, Role, SendMessageConfiguration,
        SendMessageParams, StreamResponse, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
        TaskStatusUpdateEvent,
    };

    pub use crate::error::{A2AError, A2AResult};

    pub use crate::cache::CacheTopicAdapter;

    pub use crate::builders::AgentCardBuilder;

    #[cfg(feature = "transport")]
    pub use crate::builders::ServerBuilder;

    #[cfg(feature = "transport")]
    pub use crate::server::{
        a2a_router, AgentHandler, DefaultRequestHandler, EventBus, EventQueue, Executor,
        HandlerContext, HandlerResult, InMemoryTaskStore, RequestHandler, ResultManager, TaskStore,
    };
}

// Re-export core types at crate root for convenience.
pub use builders::AgentCardBuilder;
pub use error::{A2AError, A2AResult};
pub use types::*;

#[cfg(feature = "transport")]
pub use builders::ServerBuilder;
