//! Helpers for building `Task`s outside the request-handling path.

use crate::error::{A2AError, A2AResult};
use crate::types::{Artifact, Message, Part, Task, TaskState, TaskStatus};
use uuid::Uuid;

/// A freshly `submitted` task seeded with `request` as its sole history entry.
///
/// Generates a task and context id when `request` doesn't already carry
/// them. Rejects a request with no parts, or a text part with empty text.
pub fn new_task(request: Message) -> A2AResult<Task> {
    if request.parts.is_empty() {
        return Err(A2AError::invalid_params("Message parts cannot be empty"));
    }
    for part in &request.parts {
        if let Part::Text { text, .. } = part {
            if text.is_empty() {
                return Err(A2AError::invalid_params("TextPart content cannot be empty"));
            }
        }
    }

    Ok(Task {
        id: request.task_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
        context_id: request.context_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
        kind: "task".to_string(),
        status: TaskStatus { state: TaskState::Submitted, message: None, timestamp: None },
        artifacts: None,
        history: Some(vec![request]),
        metadata: None,
    })
}

/// A `completed` task carrying `artifacts`. Rejects an empty artifact list.
pub fn completed_task(
    task_id: impl Into<String>,
    context_id: impl Into<String>,
    artifacts: Vec<Artifact>,
    history: Option<Vec<Message>>,
) -> A2AResult<Task> {
    if artifacts.is_empty() {
        return Err(A2AError::invalid_params(
            "artifacts must be a non-empty list of Artifact objects",
        ));
    }

    Ok(Task {
        id: task_id.into(),
        context_id: context_id.into(),
        kind: "task".to_string(),
        status: TaskStatus { state: TaskState::Completed, message: None, timestamp: None },
        artifacts: Some(artifacts),
        history,
        metadata: None,
    })
}

/// Keeps only the most recent `history_length` history entries of `task`.
/// `None` leaves history untouched; `0` empties it.
pub fn apply_history_length(mut task: Task, history_length: Option<usize>) -> Task {
    if let Some(length) = history_length {
        if let Some(history) = &mut task.history {
            let total = history.len();
            *history = history.split_off(total.saturating_sub(length));
        }
    }
    task
}
