//! Result Manager — reduces a stream of lifecycle events into the current
//! task snapshot and persists each change to the Task Store.
//!
//! Downstream of the Event Bus/Execution Event Queue: each event a queue
//! yields is folded in turn. Because delivery is at-least-once, every
//! reduction rule is idempotent on `messageId`/`artifactId` so a redelivered
//! event is a no-op rather than a duplicate.

use tracing::{debug, warn};

use crate::error::A2AResult;
use crate::types::{Artifact, Message, StreamResponse, Task, TaskArtifactUpdateEvent, TaskStatusUpdateEvent};

use super::task_store::TaskStore;

/// Merges an artifact update into a task's artifact list.
///
/// A first chunk (`append = false`) replaces any existing artifact sharing
/// its `artifactId`, or adds a new one. A continuation chunk
/// (`append = true`) extends the existing artifact's parts; one with no
/// matching artifact to extend is dropped with a warning.
fn append_artifact_to_task(task: &mut Task, event: &TaskArtifactUpdateEvent) {
    let artifacts = task.artifacts.get_or_insert_with(Vec::new);
    let new_artifact: &Artifact = &event.artifact;
    let artifact_id = &new_artifact.artifact_id;
    let append_parts = event.append.unwrap_or(false);

    let existing_idx = artifacts.iter().position(|a| a.artifact_id == *artifact_id);

    if !append_parts {
        if let Some(idx) = existing_idx {
            artifacts[idx] = new_artifact.clone();
        } else {
            artifacts.push(new_artifact.clone());
        }
    } else if let Some(idx) = existing_idx {
        let existing = &mut artifacts[idx];
        existing.parts.extend(new_artifact.parts.clone());
        if new_artifact.name.is_some() {
            existing.name = new_artifact.name.clone();
        }
        if new_artifact.description.is_some() {
            existing.description = new_artifact.description.clone();
        }
        merge_metadata(&mut existing.metadata, &new_artifact.metadata);
    } else {
        warn!(
            artifact_id = %artifact_id,
            task_id = %task.id,
            "received append=true for a nonexistent artifact, dropping chunk"
        );
    }
}

/// Merge `new` into `existing` key by key, new keys winning on conflict.
fn merge_metadata(existing: &mut Option<serde_json::Value>, new: &Option<serde_json::Value>) {
    let Some(new_obj) = new.as_ref().and_then(|v| v.as_object()) else { return };
    let existing_obj = existing
        .get_or_insert_with(|| serde_json::Value::Object(Default::default()))
        .as_object_mut()
        .expect("metadata slot is always an object once initialized here");
    for (key, value) in new_obj {
        existing_obj.insert(key.clone(), value.clone());
    }
}

/// Folds A2A lifecycle events into a task snapshot, persisting each change.
///
/// Mirrors the reduction this crate's task manager performs, generalized to
/// run downstream of the Event Bus rather than inline in a single request
/// handler method, and made idempotent against redelivery.
pub struct ResultManager {
    task_store: std::sync::Arc<dyn TaskStore>,
    current_task: Option<Task>,
    latest_user_message: Option<Message>,
    final_message_result: Option<Message>,
}

impl ResultManager {
    /// Create a manager over `task_store` with no task loaded yet.
    pub fn new(task_store: std::sync::Arc<dyn TaskStore>) -> Self {
        Self {
            task_store,
            current_task: None,
            latest_user_message: None,
            final_message_result: None,
        }
    }

    /// Record the message that initiated this request, so it can be
    /// prepended to a freshly-created task's history if the Executor's
    /// `Task` event doesn't already include it.
    pub fn with_user_message(mut self, message: Message) -> Self {
        self.latest_user_message = Some(message);
        self
    }

    /// Pre-load an existing task, for requests that supplied a `taskId`.
    pub fn with_existing_task(mut self, task: Task) -> Self {
        self.current_task = Some(task);
        self
    }

    /// The current in-memory task snapshot, if one has been established.
    pub fn current_task(&self) -> Option<&Task> {
        self.current_task.as_ref()
    }

    /// The standalone message result, if the event stream ended in a
    /// `Message` rather than a task terminal state.
    pub fn final_message(&self) -> Option<&Message> {
        self.final_message_result.as_ref()
    }

    /// Fold one event into the current state, persisting any resulting
    /// change to the task store.
    pub async fn process(&mut self, event: &StreamResponse) -> A2AResult<()> {
        match event {
            StreamResponse::Message(message) => {
                debug!(message_id = %message.message_id, "result manager received standalone message");
                self.final_message_result = Some(message.clone());
                Ok(())
            }
            StreamResponse::Task(task) => self.reduce_task(task.clone()).await,
            StreamResponse::StatusUpdate(update) => self.reduce_status_update(update).await,
            StreamResponse::ArtifactUpdate(update) => self.reduce_artifact_update(update).await,
        }
    }

    async fn reduce_task(&mut self, mut task: Task) -> A2AResult<()> {
        if let Some(user_message) = &self.latest_user_message {
            let already_present = task
                .history
                .as_ref()
                .map(|h| h.iter().any(|m| m.message_id == user_message.message_id))
                .unwrap_or(false);
            if !already_present {
                task.history.get_or_insert_with(Vec::new).insert(0, user_message.clone());
            }
        }
        debug!(task_id = %task.id, "result manager reducing Task event");
        self.persist(task).await
    }

    async fn reduce_status_update(&mut self, update: &TaskStatusUpdateEvent) -> A2AResult<()> {
        let Some(mut task) = self.task_for(&update.task_id).await? else {
            warn!(task_id = %update.task_id, "status update for unknown task, dropping");
            return Ok(());
        };

        if let Some(message) = &update.status.message {
            let already_present = task
                .history
                .as_ref()
                .map(|h| h.iter().any(|m| m.message_id == message.message_id))
                .unwrap_or(false);
            if !already_present {
                task.history.get_or_insert_with(Vec::new).push(message.clone());
            }
        }

        task.status = update.status.clone();
        merge_metadata(&mut task.metadata, &update.metadata);
        debug!(task_id = %task.id, state = ?task.status.state, "result manager reducing StatusUpdate");
        self.persist(task).await
    }

    async fn reduce_artifact_update(&mut self, update: &TaskArtifactUpdateEvent) -> A2AResult<()> {
        let Some(mut task) = self.task_for(&update.task_id).await? else {
            warn!(task_id = %update.task_id, "artifact update for unknown task, dropping");
            return Ok(());
        };

        append_artifact_to_task(&mut task, update);
        debug!(task_id = %task.id, artifact_id = %update.artifact.artifact_id, "result manager reducing ArtifactUpdate");
        self.persist(task).await
    }

    /// Resolve the task to mutate: the in-memory snapshot if present,
    /// otherwise a load from the store.
    async fn task_for(&mut self, task_id: &str) -> A2AResult<Option<Task>> {
        if let Some(task) = &self.current_task {
            return Ok(Some(task.clone()));
        }
        let loaded = self.task_store.get(task_id).await?;
        if let Some(task) = &loaded {
            self.current_task = Some(task.clone());
        }
        Ok(loaded)
    }

    async fn persist(&mut self, task: Task) -> A2AResult<()> {
        self.task_store.save(task.clone(), None).await?;
        self.current_task = Some(task);
        Ok(())
    }
}
