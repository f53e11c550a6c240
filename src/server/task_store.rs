//! Task Store — durable task persistence, with large-blob externalization.
//!
//! Two implementations ship: [`InMemoryTaskStore`], a plain `HashMap` used
//! by tests and by components (Result Manager, Executor) that don't need to
//! exercise externalization; and [`CacheTaskStore`], the production store
//! that serializes the task snapshot into the Cache/Topic Adapter and
//! externalizes every `file`/`data` artifact-part payload so the primary
//! record stays small.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::cache::{CacheTopicAdapter, GetFormat, SetOptions};
use crate::error::A2AResult;
use crate::types::{FileContent, Part, Task, TaskState};

/// Parameters for listing tasks with optional filtering and pagination.
#[derive(Debug, Clone, Default)]
pub struct TaskListParams {
    /// Filter tasks by context ID.
    pub context_id: Option<String>,

    /// Filter tasks by state.
    pub status: Option<Vec<TaskState>>,

    /// Maximum number of tasks to return per page.
    pub page_size: Option<usize>,

    /// Opaque token for pagination — the task ID to start after.
    pub page_token: Option<String>,
}

/// Response for a task listing request.
#[derive(Debug, Clone)]
pub struct TaskListResponse {
    /// The tasks matching the query.
    pub tasks: Vec<Task>,

    /// Token for the next page, if more results are available.
    pub next_page_token: Option<String>,
}

/// Trait for persisting and retrieving A2A tasks.
///
/// Save/load failures are logged and swallowed rather than propagated:
/// `load` returns `Ok(None)` and `save` returns `Ok(())` even when the
/// underlying store failed, matching the source's failure policy — callers
/// (the Request Handler) must treat a missing task as `TaskNotFound`
/// regardless of whether it never existed or failed to persist.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Save or update a task, with an optional TTL override.
    async fn save(&self, task: Task, ttl_seconds: Option<u64>) -> A2AResult<()>;

    /// Retrieve a task by its ID.
    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>>;

    /// Delete a task by its ID. Silently succeeds if absent.
    async fn delete(&self, task_id: &str) -> A2AResult<()>;

    /// List tasks matching the given parameters.
    async fn list(&self, params: &TaskListParams) -> A2AResult<TaskListResponse>;
}

/// In-memory task store backed by a `HashMap`.
///
/// No externalization: artifact parts are stored inline. Suitable for unit
/// tests of the Result Manager and Executor, and for short-lived processes
/// that don't need cross-instance durability.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: tokio::sync::RwLock<HashMap<String, Task>>,
    insertion_order: tokio::sync::RwLock<Vec<String>>,
}

impl InMemoryTaskStore {
    /// Create a new empty in-memory task store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: Task, _ttl_seconds: Option<u64>) -> A2AResult<()> {
        let task_id = task.id.clone();
        let mut tasks = self.tasks.write().await;
        let is_new = !tasks.contains_key(&task_id);
        tasks.insert(task_id.clone(), task);
        if is_new {
            self.insertion_order.write().await.push(task_id.clone());
        }
        debug!(task_id = %task_id, is_new, "task saved");
        Ok(())
    }

    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn delete(&self, task_id: &str) -> A2AResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(task_id).is_some() {
            self.insertion_order.write().await.retain(|id| id != task_id);
        }
        Ok(())
    }

    async fn list(&self, params: &TaskListParams) -> A2AResult<TaskListResponse> {
        list_from_snapshot(
            &*self.tasks.read().await,
            &self.insertion_order.read().await,
            params,
        )
    }
}

/// Shared pagination/filtering logic for stores that keep their full task
/// set resident (in-memory and cache-backed alike keep an index of IDs).
fn list_from_snapshot(
    tasks: &HashMap<String, Task>,
    order: &[String],
    params: &TaskListParams,
) -> A2AResult<TaskListResponse> {
    let start_idx = match &params.page_token {
        Some(token) => match order.iter().position(|id| id == token) {
            Some(pos) => pos + 1,
            None => {
                warn!(page_token = %token, "invalid page token, starting from beginning");
                0
            }
        },
        None => 0,
    };

    let page_size = params.page_size.unwrap_or(usize::MAX);
    let mut result_tasks = Vec::new();
    let mut last_id = None;

    for id in order.iter().skip(start_idx) {
        if result_tasks.len() >= page_size {
            break;
        }
        let Some(task) = tasks.get(id) else { continue };
        if let Some(ctx) = &params.context_id {
            if &task.context_id != ctx {
                continue;
            }
        }
        if let Some(states) = &params.status {
            if !states.contains(&task.status.state) {
                continue;
            }
        }
        last_id = Some(id.clone());
        result_tasks.push(task.clone());
    }

    let next_page_token = match (&last_id, result_tasks.len() == page_size) {
        (Some(last), true) => {
            let pos = order.iter().position(|id| id == last).unwrap_or(0);
            (pos + 1 < order.len()).then(|| last.clone())
        }
        _ => None,
    };

    Ok(TaskListResponse {
        tasks: result_tasks,
        next_page_token,
    })
}

/// Cache/Topic Adapter–backed task store with artifact externalization.
///
/// Serializes the whole task under key `{taskId}`. Before serializing,
/// every `file` part with inline bytes, and every `data` part, is rewritten:
/// the payload is written to `artifact:{taskId}:{artifactId}:{uuid}` and the
/// part's `metadata.cacheKey` records that key with the inline payload
/// stripped. `load` reverses the transform, looking up each `cacheKey` and
/// removing it from the surfaced metadata.
pub struct CacheTaskStore {
    adapter: Arc<dyn CacheTopicAdapter>,
    /// Index of known task IDs, for `list`'s pagination; the cache itself
    /// has no listing primitive.
    index: tokio::sync::RwLock<Vec<String>>,
}

impl CacheTaskStore {
    /// Build a store over `adapter`.
    pub fn new(adapter: Arc<dyn CacheTopicAdapter>) -> Self {
        Self {
            adapter,
            index: tokio::sync::RwLock::new(Vec::new()),
        }
    }

    async fn externalize(&self, mut task: Task) -> A2AResult<Task> {
        let task_id = task.id.clone();
        if let Some(artifacts) = &mut task.artifacts {
            for artifact in artifacts {
                for part in &mut artifact.parts {
                    self.externalize_part(&task_id, &artifact.artifact_id, part).await?;
                }
            }
        }
        Ok(task)
    }

    async fn externalize_part(&self, task_id: &str, artifact_id: &str, part: &mut Part) -> A2AResult<()> {
        match part {
            Part::File { file, metadata } => {
                if let FileContent::Bytes(inline) = file {
                    let cache_key = format!("artifact:{task_id}:{artifact_id}:{}", Uuid::new_v4());
                    self.adapter
                        .set(&cache_key, inline.bytes.clone().into_bytes(), SetOptions::default())
                        .await?;
                    inline.bytes.clear();
                    set_cache_key(metadata, &cache_key);
                }
            }
            Part::Data { data, metadata } => {
                let encoded = serde_json::to_string(data)?;
                let cache_key = format!("artifact:{task_id}:{artifact_id}:{}", Uuid::new_v4());
                self.adapter
                    .set(&cache_key, encoded.into_bytes(), SetOptions::default())
                    .await?;
                *data = serde_json::Value::Null;
                set_cache_key(metadata, &cache_key);
            }
            Part::Text { .. } => {}
        }
        Ok(())
    }

    async fn rehydrate(&self, mut task: Task) -> Task {
        if let Some(artifacts) = &mut task.artifacts {
            for artifact in artifacts {
                for part in &mut artifact.parts {
                    self.rehydrate_part(part).await;
                }
            }
        }
        task
    }

    async fn rehydrate_part(&self, part: &mut Part) {
        let cache_key = match part {
            Part::File { metadata, .. } | Part::Data { metadata, .. } => take_cache_key(metadata),
            Part::Text { .. } => None,
        };
        let Some(cache_key) = cache_key else { return };

        let fetched = match self.adapter.get(&cache_key, GetFormat::Raw).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                warn!(cache_key, "externalized artifact payload missing on load");
                return;
            }
            Err(err) => {
                error!(cache_key, error = %err, "failed to rehydrate externalized artifact payload");
                return;
            }
        };

        match part {
            Part::File { file, .. } => {
                if let FileContent::Bytes(inline) = file {
                    inline.bytes = String::from_utf8_lossy(&fetched).into_owned();
                }
            }
            Part::Data { data, .. } => {
                if let Ok(value) = serde_json::from_slice(&fetched) {
                    *data = value;
                }
            }
            Part::Text { .. } => {}
        }
    }
}

fn set_cache_key(metadata: &mut Option<serde_json::Value>, cache_key: &str) {
    let obj = metadata
        .get_or_insert_with(|| serde_json::Value::Object(Default::default()))
        .as_object_mut()
        .expect("metadata slot is always an object once initialized here");
    obj.insert("cacheKey".to_string(), serde_json::Value::String(cache_key.to_string()));
}

fn take_cache_key(metadata: &mut Option<serde_json::Value>) -> Option<String> {
    let obj = metadata.as_mut()?.as_object_mut()?;
    let key = obj.remove("cacheKey")?.as_str()?.to_string();
    if obj.is_empty() {
        *metadata = None;
    }
    Some(key)
}

#[async_trait]
impl TaskStore for CacheTaskStore {
    async fn save(&self, task: Task, ttl_seconds: Option<u64>) -> A2AResult<()> {
        let task_id = task.id.clone();
        let externalized = match self.externalize(task).await {
            Ok(t) => t,
            Err(err) => {
                error!(task_id = %task_id, error = %err, "failed to externalize task artifacts, save aborted");
                return Ok(());
            }
        };

        let payload = match serde_json::to_vec(&externalized) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(task_id = %task_id, error = %err, "failed to serialize task");
                return Ok(());
            }
        };

        let ttl = ttl_seconds.unwrap_or(crate::cache::DEFAULT_TTL_SECONDS);
        match self
            .adapter
            .set(&task_id, payload, SetOptions { ttl_seconds: Some(ttl) })
            .await
        {
            Ok(()) => {
                let mut index = self.index.write().await;
                if !index.contains(&task_id) {
                    index.push(task_id.clone());
                }
                debug!(task_id = %task_id, "task saved to cache");
            }
            Err(err) => error!(task_id = %task_id, error = %err, "failed to save task to cache"),
        }
        Ok(())
    }

    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>> {
        let bytes = match self.adapter.get(task_id, GetFormat::Json).await {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(task_id, error = %err, "failed to load task from cache");
                return Ok(None);
            }
        };
        let Some(bytes) = bytes else { return Ok(None) };

        let task: Task = match serde_json::from_slice(&bytes) {
            Ok(task) => task,
            Err(err) => {
                error!(task_id, error = %err, "failed to deserialize stored task");
                return Ok(None);
            }
        };
        Ok(Some(self.rehydrate(task).await))
    }

    async fn delete(&self, task_id: &str) -> A2AResult<()> {
        if let Err(err) = self.adapter.delete(task_id).await {
            error!(task_id, error = %err, "failed to delete task from cache");
        }
        self.index.write().await.retain(|id| id != task_id);
        Ok(())
    }

    async fn list(&self, params: &TaskListParams) -> A2AResult<TaskListResponse> {
        let index = self.index.read().await.clone();
        let mut tasks = HashMap::with_capacity(index.len());
        for id in &index {
            if let Some(task) = self.get(id).await? {
                tasks.insert(id.clone(), task);
            }
        }
        list_from_snapshot(&tasks, &index, params)
    }
}
