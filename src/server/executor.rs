//! Executor — runs the user-supplied agent handler for one message and
//! drives the resulting task through its lifecycle, publishing every step
//! to the Event Bus.
//!
//! Takes the place of this crate's original `AgentExecutor`/`TaskUpdater`
//! pair with a single closure-friendly entry point: callers provide an
//! [`AgentHandler`] rather than implementing `execute`/`cancel` against a
//! raw event queue, and the publish-side bookkeeping (task synthesis,
//! working/completed/failed status updates, history dedup) lives here
//! instead of being the handler's responsibility.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::A2AResult;
use crate::types::{
    Artifact, Message, Part, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};

use super::event_bus::EventBus;

/// The three shapes an [`AgentHandler`] may return, mirroring the source's
/// `string | {parts,artifacts,metadata} | {kind:"task",...}` union.
#[derive(Debug, Clone)]
pub enum HandlerResult {
    /// A plain string reply, wrapped in a single text part.
    Text(String),
    /// Explicit reply parts, plus artifacts/metadata to attach to the task.
    Parts {
        /// The reply message's content.
        parts: Vec<Part>,
        /// Artifacts to merge onto the task.
        artifacts: Option<Vec<Artifact>>,
        /// Metadata to shallow-merge onto the task.
        metadata: Option<serde_json::Value>,
    },
    /// Full control over the completed task's terminal status.
    TaskPartial {
        /// The task's final status; must carry a message.
        status: TaskStatus,
        /// Artifacts to merge onto the task.
        artifacts: Option<Vec<Artifact>>,
        /// Metadata to shallow-merge onto the task.
        metadata: Option<serde_json::Value>,
    },
}

/// Per-invocation context handed to an [`AgentHandler`]: the task as
/// initialized before the handler ran, and a progress-reporting callback.
pub struct HandlerContext {
    /// The task as it stood when the handler was invoked.
    pub task: Task,
    bus: Arc<EventBus>,
    original_message: Message,
}

impl HandlerContext {
    /// Publish a `StatusUpdate{state: working, final: false}` carrying
    /// `text` as the message content. The channel by which a long-running
    /// handler reports progress; each call publishes exactly one event.
    pub async fn publish_update(&self, text: impl Into<String>) -> A2AResult<()> {
        let message = Message {
            parts: vec![Part::text(text)],
            ..self.original_message.clone()
        };
        self.bus
            .publish(crate::types::StreamResponse::StatusUpdate(TaskStatusUpdateEvent {
                task_id: self.task.id.clone(),
                context_id: self.task.context_id.clone(),
                kind: "status-update".into(),
                status: TaskStatus {
                    state: TaskState::Working,
                    message: Some(message),
                    timestamp: Some(Utc::now().to_rfc3339()),
                },
                r#final: false,
                metadata: None,
            }))
            .await
    }
}

/// A boxed, `Send` future returning a handler's result — the Rust shape of
/// the source's `BoxFuture<result>`.
pub type HandlerFuture = Pin<Box<dyn Future<Output = A2AResult<HandlerResult>> + Send>>;

/// User-supplied agent logic: given the incoming message and a handler
/// context, produce a reply.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Process `message` and return a reply, using `context` to report
    /// progress via [`HandlerContext::publish_update`].
    async fn handle(&self, message: Message, context: HandlerContext) -> A2AResult<HandlerResult>;
}

#[async_trait]
impl<F> AgentHandler for F
where
    F: Fn(Message, HandlerContext) -> HandlerFuture + Send + Sync,
{
    async fn handle(&self, message: Message, context: HandlerContext) -> A2AResult<HandlerResult> {
        (self)(message, context).await
    }
}

/// Runs an [`AgentHandler`] against an incoming message and publishes the
/// resulting task lifecycle to the Event Bus.
///
/// Holds no task-store reference: persistence of the events it publishes is
/// the Result Manager's job, downstream on the same bus.
pub struct Executor {
    bus: Arc<EventBus>,
    handler: Arc<dyn AgentHandler>,
    agent_name: String,
    agent_id: String,
    agent_type: String,
}

impl Executor {
    /// Build an executor publishing through `bus`, running `handler`, and
    /// tagging synthesized tasks with the given agent identity.
    pub fn new(
        bus: Arc<EventBus>,
        handler: Arc<dyn AgentHandler>,
        agent_name: impl Into<String>,
        agent_id: impl Into<String>,
        agent_type: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            handler,
            agent_name: agent_name.into(),
            agent_id: agent_id.into(),
            agent_type: agent_type.into(),
        }
    }

    /// Run the full lifecycle for `message` against `existing_task` (if
    /// this is a continuation), publishing every step. Handler errors are
    /// swallowed and translated into a terminal `failed` status; they are
    /// never propagated from this method. Only a failure to publish (an
    /// Event Bus / adapter problem) is returned to the caller.
    pub async fn run(&self, message: Message, existing_task: Option<Task>) -> A2AResult<()> {
        let (task, is_new) = self.initialize_task(&message, existing_task);

        if is_new {
            self.bus.publish(crate::types::StreamResponse::Task(task.clone())).await?;
        }

        self.bus
            .publish(crate::types::StreamResponse::StatusUpdate(TaskStatusUpdateEvent {
                task_id: task.id.clone(),
                context_id: task.context_id.clone(),
                kind: "status-update".into(),
                status: TaskStatus {
                    state: TaskState::Working,
                    message: Some(message.clone()),
                    timestamp: Some(Utc::now().to_rfc3339()),
                },
                r#final: false,
                metadata: Some(self.identity_metadata()),
            }))
            .await?;

        let context = HandlerContext {
            task: task.clone(),
            bus: Arc::clone(&self.bus),
            original_message: message.clone(),
        };

        let outcome = self.handler.handle(message.clone(), context).await;

        let final_status = match outcome {
            Ok(result) => {
                for artifact in self.artifacts_of(&result) {
                    self.bus
                        .publish(crate::types::StreamResponse::ArtifactUpdate(TaskArtifactUpdateEvent {
                            task_id: task.id.clone(),
                            context_id: task.context_id.clone(),
                            kind: "artifact-update".into(),
                            artifact,
                            append: None,
                            last_chunk: Some(true),
                            metadata: None,
                        }))
                        .await?;
                }
                let metadata = self.metadata_of(&result);
                (self.translate_result(&message, result), metadata)
            }
            Err(err) => {
                error!(task_id = %task.id, error = %err, "agent handler failed");
                let failed_message = Message {
                    parts: vec![Part::text(format!("Agent execution failed: {err}"))],
                    ..message.clone()
                };
                (
                    TaskStatus {
                        state: TaskState::Failed,
                        message: Some(failed_message),
                        timestamp: Some(Utc::now().to_rfc3339()),
                    },
                    None,
                )
            }
        };
        let (final_status, final_metadata) = final_status;

        info!(task_id = %task.id, state = ?final_status.state, "task reached terminal state");
        self.bus
            .publish(crate::types::StreamResponse::StatusUpdate(TaskStatusUpdateEvent {
                task_id: task.id.clone(),
                context_id: task.context_id.clone(),
                kind: "status-update".into(),
                status: final_status,
                r#final: true,
                metadata: final_metadata,
            }))
            .await
    }

    fn identity_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "agentName": self.agent_name,
            "agentId": self.agent_id,
            "agentType": self.agent_type,
        })
    }

    fn initialize_task(&self, message: &Message, existing_task: Option<Task>) -> (Task, bool) {
        if let Some(task) = existing_task {
            return (task, false);
        }

        let task_id = message.task_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let context_id = message.context_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

        let task = Task {
            id: task_id,
            context_id,
            kind: "task".into(),
            status: TaskStatus {
                state: TaskState::Submitted,
                message: Some(message.clone()),
                timestamp: Some(Utc::now().to_rfc3339()),
            },
            artifacts: None,
            history: Some(vec![message.clone()]),
            metadata: Some(self.identity_metadata()),
        };
        (task, true)
    }

    /// Artifacts a successful [`HandlerResult`] asked to attach to the task,
    /// published as `ArtifactUpdate` events ahead of the terminal status so
    /// the Result Manager's reducer sees them before the task is marked done.
    fn artifacts_of(&self, result: &HandlerResult) -> Vec<Artifact> {
        match result {
            HandlerResult::Text(_) => Vec::new(),
            HandlerResult::Parts { artifacts, .. } => artifacts.clone().unwrap_or_default(),
            HandlerResult::TaskPartial { artifacts, .. } => artifacts.clone().unwrap_or_default(),
        }
    }

    /// Metadata a successful [`HandlerResult`] asked to shallow-merge onto
    /// the task, carried on the terminal `StatusUpdate` so the Result
    /// Manager's `reduce_status_update` can merge it onto `task.metadata`.
    fn metadata_of(&self, result: &HandlerResult) -> Option<serde_json::Value> {
        match result {
            HandlerResult::Text(_) => None,
            HandlerResult::Parts { metadata, .. } => metadata.clone(),
            HandlerResult::TaskPartial { metadata, .. } => metadata.clone(),
        }
    }

    /// Translate a successful [`HandlerResult`] into the task's terminal
    /// status. Artifacts and metadata are published separately by
    /// [`Self::artifacts_of`]/[`Self::metadata_of`]; this only builds the
    /// final status message.
    fn translate_result(&self, original_message: &Message, result: HandlerResult) -> TaskStatus {
        match result {
            HandlerResult::Text(text) => TaskStatus {
                state: TaskState::Completed,
                message: Some(Message {
                    parts: vec![Part::text(text)],
                    ..original_message.clone()
                }),
                timestamp: Some(Utc::now().to_rfc3339()),
            },
            HandlerResult::Parts { parts, .. } => TaskStatus {
                state: TaskState::Completed,
                message: Some(Message {
                    parts,
                    ..original_message.clone()
                }),
                timestamp: Some(Utc::now().to_rfc3339()),
            },
            HandlerResult::TaskPartial { status, .. } => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheAdapter;
    use crate::types::{Role, StreamResponse};

    fn message(id: &str, text: &str) -> Message {
        Message {
            message_id: id.into(),
            role: Role::User,
            kind: "message".into(),
            parts: vec![Part::text(text)],
            context_id: None,
            task_id: None,
            metadata: None,
            extensions: None,
            reference_task_ids: None,
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl AgentHandler for EchoHandler {
        async fn handle(&self, message: Message, _context: HandlerContext) -> A2AResult<HandlerResult> {
            let text = message
                .parts
                .iter()
                .filter_map(|p| match p {
                    Part::Text { text, .. } => Some(text.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" ");
            Ok(HandlerResult::Text(format!("echo: {text}")))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl AgentHandler for FailingHandler {
        async fn handle(&self, _message: Message, _context: HandlerContext) -> A2AResult<HandlerResult> {
            Err(crate::error::A2AError::internal_error("boom"))
        }
    }

    #[tokio::test]
    async fn run_publishes_task_then_working_then_completed() {
        let bus = Arc::new(EventBus::new(Arc::new(InMemoryCacheAdapter::new())));
        let mut rx = bus.on_context("ctx-1").await;
        let executor = Executor::new(Arc::clone(&bus), Arc::new(EchoHandler), "agent", "agent-1", "worker");

        let msg = Message {
            context_id: Some("ctx-1".into()),
            ..message("m1", "hello")
        };
        executor.run(msg, None).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, super::super::event_bus::BusMessage::Event(StreamResponse::Task(_))));

        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second,
            super::super::event_bus::BusMessage::Event(StreamResponse::StatusUpdate(ref e)) if e.status.state == TaskState::Working && !e.r#final
        ));

        let third = rx.recv().await.unwrap();
        match third {
            super::super::event_bus::BusMessage::Event(StreamResponse::StatusUpdate(e)) => {
                assert_eq!(e.status.state, TaskState::Completed);
                assert!(e.r#final);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn handler_error_produces_terminal_failed_status() {
        let bus = Arc::new(EventBus::new(Arc::new(InMemoryCacheAdapter::new())));
        let mut rx = bus.on_context("ctx-1").await;
        let executor = Executor::new(Arc::clone(&bus), Arc::new(FailingHandler), "agent", "agent-1", "worker");

        let msg = Message {
            context_id: Some("ctx-1".into()),
            ..message("m1", "hello")
        };
        executor.run(msg, None).await.unwrap();

        // Task, then working StatusUpdate, then failed StatusUpdate.
        let _ = rx.recv().await.unwrap();
        let _ = rx.recv().await.unwrap();
        match rx.recv().await.unwrap() {
            super::super::event_bus::BusMessage::Event(StreamResponse::StatusUpdate(e)) => {
                assert_eq!(e.status.state, TaskState::Failed);
                assert!(e.r#final);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn existing_task_is_reused_without_a_task_event() {
        let bus = Arc::new(EventBus::new(Arc::new(InMemoryCacheAdapter::new())));
        let mut rx = bus.on_context("ctx-1").await;
        let executor = Executor::new(Arc::clone(&bus), Arc::new(EchoHandler), "agent", "agent-1", "worker");

        let existing = Task {
            id: "t1".into(),
            context_id: "ctx-1".into(),
            kind: "task".into(),
            status: TaskStatus {
                state: TaskState::Submitted,
                message: None,
                timestamp: None,
            },
            artifacts: None,
            history: None,
            metadata: None,
        };

        let msg = Message {
            context_id: Some("ctx-1".into()),
            ..message("m1", "hello")
        };
        executor.run(msg, Some(existing)).await.unwrap();

        // First event should be the working StatusUpdate, not a Task event.
        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            super::super::event_bus::BusMessage::Event(StreamResponse::StatusUpdate(_))
        ));
    }
}
