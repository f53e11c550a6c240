//! Request Handler — the substrate's single entry point for the seven A2A
//! JSON-RPC operations, wiring together the Cache/Topic Adapter, Task
//! Store, Event Bus, Execution Event Queue, Result Manager, and Executor.
//!
//! `on_message_send` and `on_message_send_stream` share the same shape: look
//! up or validate the target task, register an Event Queue on its context,
//! spawn the [`Executor`], and let a [`ResultManager`] fold the resulting
//! events into the Task Store. The blocking variant drives that fold inline,
//! under a deadline; the streaming variant hands the queue to the caller for
//! SSE delivery and folds a second, independent subscription in the
//! background.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::cache::{CacheTopicAdapter, GetFormat, SetOptions};
use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, CancelTaskParams, CreateTaskPushNotificationConfigParams, GetTaskParams, ListTasksParams,
    ListTasksResponse, Message, SendMessageParams, SendMessageResponse, StreamResponse,
    SubscribeToTaskParams, Task, TaskIdParams, TaskPushNotificationConfig, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};
use crate::utils::{apply_history_length, new_agent_text_message};

use super::event_bus::EventBus;
use super::event_queue::{EventQueue, QueueItem};
use super::executor::Executor;
use super::result_manager::ResultManager;
use super::task_store::{TaskListParams, TaskStore};

/// How long a blocking `message/send` waits for the task to reach a
/// terminal state before giving up and aborting the executor.
const SEND_MESSAGE_DEADLINE: Duration = Duration::from_secs(30);

/// Handles the seven JSON-RPC methods the transport layer dispatches to.
///
/// `sendMessage`/`sendMessageStream` both run an [`Executor`] against the
/// Event Bus and fold the result through a [`ResultManager`]; the remaining
/// methods operate on the Task Store and Cache/Topic Adapter directly.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// `message/send` — run the agent and block until the task (or a
    /// standalone message result) is produced, subject to a deadline.
    async fn on_message_send(&self, params: SendMessageParams) -> A2AResult<SendMessageResponse>;

    /// `message/stream` — run the agent and return an event queue the
    /// transport layer can drain for SSE delivery. Fails with
    /// `StreamingNotSupported` if the agent card declares
    /// `capabilities.streaming = false`.
    async fn on_message_send_stream(&self, params: SendMessageParams) -> A2AResult<EventQueue>;

    /// `tasks/get` — fetch a task, trimming history to the requested length.
    async fn on_get_task(&self, params: GetTaskParams) -> A2AResult<Task>;

    /// `tasks/list` — list tasks matching filter/pagination criteria.
    async fn on_list_tasks(&self, params: ListTasksParams) -> A2AResult<ListTasksResponse>;

    /// `tasks/cancel` — move a non-terminal task to `canceled`.
    async fn on_cancel_task(&self, params: CancelTaskParams) -> A2AResult<Task>;

    /// `tasks/resubscribe` — yield the current task snapshot, then (if it
    /// isn't already terminal) a queue of the task's remaining events.
    async fn on_resubscribe_to_task(
        &self,
        params: SubscribeToTaskParams,
    ) -> A2AResult<(Task, Option<EventQueue>)>;

    /// `tasks/pushNotificationConfig/set`. Fails with
    /// `PushNotificationNotSupported` if the agent card declares
    /// `capabilities.pushNotifications = false`.
    async fn on_set_task_push_notification_config(
        &self,
        params: CreateTaskPushNotificationConfigParams,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// `tasks/pushNotificationConfig/get`.
    async fn on_get_task_push_notification_config(
        &self,
        params: TaskIdParams,
    ) -> A2AResult<TaskPushNotificationConfig>;
}

/// Standard [`RequestHandler`] implementation, wiring the substrate's
/// collaborators together.
pub struct DefaultRequestHandler {
    adapter: Arc<dyn CacheTopicAdapter>,
    task_store: Arc<dyn TaskStore>,
    bus: Arc<EventBus>,
    executor: Arc<Executor>,
    agent_card: AgentCard,
}

impl DefaultRequestHandler {
    /// Build a handler over the given collaborators. `agent_card` is
    /// consulted for the streaming/push-notification capability checks.
    pub fn new(
        adapter: Arc<dyn CacheTopicAdapter>,
        task_store: Arc<dyn TaskStore>,
        bus: Arc<EventBus>,
        executor: Arc<Executor>,
        agent_card: AgentCard,
    ) -> Self {
        Self {
            adapter,
            task_store,
            bus,
            executor,
            agent_card,
        }
    }

    fn is_terminal(state: &TaskState) -> bool {
        matches!(
            state,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled | TaskState::Rejected
        )
    }

    fn trim_history(task: &mut Task, max_length: Option<i32>) {
        let max_length = max_length.and_then(|m| usize::try_from(m).ok());
        *task = apply_history_length(task.clone(), max_length);
    }

    async fn require_task(&self, task_id: &str) -> A2AResult<Task> {
        self.task_store
            .get(task_id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(task_id))
    }

    fn check_streaming_capability(&self) -> A2AResult<()> {
        if self.agent_card.capabilities.streaming == Some(false) {
            return Err(A2AError::streaming_not_supported(
                "agent card declares capabilities.streaming = false",
            ));
        }
        Ok(())
    }

    fn check_push_notifications_capability(&self) -> A2AResult<()> {
        if self.agent_card.capabilities.push_notifications == Some(false) {
            return Err(A2AError::push_notification_not_supported(
                "agent card declares capabilities.pushNotifications = false",
            ));
        }
        Ok(())
    }

    fn push_config_key(task_id: &str) -> String {
        format!("push-config:{task_id}")
    }

    /// Resolve the task a message targets (if `taskId` is set, validating it
    /// isn't already terminal) and the context it runs in.
    async fn resolve_context(&self, params: &SendMessageParams) -> A2AResult<(Option<Task>, String)> {
        let Some(task_id) = params.message.task_id.clone() else {
            let context_id = params
                .message
                .context_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            return Ok((None, context_id));
        };

        let task = self.require_task(&task_id).await?;
        if Self::is_terminal(&task.status.state) {
            return Err(A2AError::invalid_params(format!(
                "task {task_id} is in terminal state {:?}",
                task.status.state
            )));
        }
        let context_id = params
            .message
            .context_id
            .clone()
            .unwrap_or_else(|| task.context_id.clone());
        Ok((Some(task), context_id))
    }

    fn seed_result_manager(&self, message: Message, existing_task: Option<Task>) -> ResultManager {
        let mut result_manager = ResultManager::new(Arc::clone(&self.task_store)).with_user_message(message);
        if let Some(task) = existing_task {
            result_manager = result_manager.with_existing_task(task);
        }
        result_manager
    }

    /// Drain `queue` through `result_manager` until it terminates.
    async fn drive_to_terminal(
        &self,
        queue: &EventQueue,
        mut result_manager: ResultManager,
    ) -> A2AResult<ResultManager> {
        loop {
            match queue.next_event().await {
                Some(QueueItem::Event(event)) => {
                    result_manager.process(&event).await?;
                }
                Some(QueueItem::Discontinuity(d)) => {
                    warn!(context_id = %d.context_id, "discontinuity observed while awaiting completion");
                }
                None => return Ok(result_manager),
            }
        }
    }
}

#[async_trait]
impl RequestHandler for DefaultRequestHandler {
    async fn on_message_send(&self, params: SendMessageParams) -> A2AResult<SendMessageResponse> {
        if params.message.message_id.is_empty() {
            return Err(A2AError::invalid_params("message.messageId must be non-empty"));
        }
        let (existing_task, context_id) = self.resolve_context(&params).await?;
        let message = Message {
            context_id: Some(context_id.clone()),
            ..params.message.clone()
        };

        let queue = EventQueue::new(Arc::clone(&self.bus), context_id.as_str(), None).await;

        let executor = Arc::clone(&self.executor);
        let run_message = message.clone();
        let run_task = existing_task.clone();
        let handle = tokio::spawn(async move { executor.run(run_message, run_task).await });

        let result_manager = self.seed_result_manager(message.clone(), existing_task.clone());
        let result_manager = match tokio::time::timeout(
            SEND_MESSAGE_DEADLINE,
            self.drive_to_terminal(&queue, result_manager),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                handle.abort();
                queue.stop().await;
                return Err(A2AError::internal_error(format!(
                    "message/send exceeded the {}s deadline",
                    SEND_MESSAGE_DEADLINE.as_secs()
                )));
            }
        };

        if let Err(join_err) = handle.await {
            if !join_err.is_cancelled() {
                error!(error = %join_err, "executor task panicked");
            }
        }

        if let Some(message) = result_manager.final_message() {
            return Ok(SendMessageResponse::Message(message.clone()));
        }

        let mut task = result_manager
            .current_task()
            .cloned()
            .ok_or_else(|| A2AError::internal_error("executor produced neither a task nor a message"))?;
        let history_length = params.configuration.as_ref().and_then(|c| c.history_length);
        Self::trim_history(&mut task, history_length);
        Ok(SendMessageResponse::Task(task))
    }

    async fn on_message_send_stream(&self, params: SendMessageParams) -> A2AResult<EventQueue> {
        self.check_streaming_capability()?;
        if params.message.message_id.is_empty() {
            return Err(A2AError::invalid_params("message.messageId must be non-empty"));
        }
        let (existing_task, context_id) = self.resolve_context(&params).await?;
        let message = Message {
            context_id: Some(context_id.clone()),
            ..params.message.clone()
        };

        let sse_queue = EventQueue::new(Arc::clone(&self.bus), context_id.as_str(), None).await;
        let persist_queue = EventQueue::new(Arc::clone(&self.bus), context_id.as_str(), None).await;

        let executor = Arc::clone(&self.executor);
        let run_message = message.clone();
        let run_task = existing_task.clone();
        tokio::spawn(async move {
            if let Err(err) = executor.run(run_message, run_task).await {
                error!(error = %err, "executor failed to publish stream event");
            }
        });

        let mut result_manager = self.seed_result_manager(message, existing_task);
        tokio::spawn(async move {
            while let Some(item) = persist_queue.next_event().await {
                if let QueueItem::Event(event) = item {
                    if let Err(err) = result_manager.process(&event).await {
                        error!(error = %err, "result manager failed while persisting stream");
                        break;
                    }
                }
            }
        });

        Ok(sse_queue)
    }

    async fn on_get_task(&self, params: GetTaskParams) -> A2AResult<Task> {
        let mut task = self.require_task(&params.id).await?;
        Self::trim_history(&mut task, params.history_length);
        Ok(task)
    }

    async fn on_list_tasks(&self, params: ListTasksParams) -> A2AResult<ListTasksResponse> {
        let store_params = TaskListParams {
            context_id: params.context_id.clone(),
            status: params.status.map(|s| vec![s]),
            page_size: params.page_size.map(|n| n.max(0) as usize),
            page_token: params.page_token.clone(),
        };
        let result = self.task_store.list(&store_params).await?;
        let mut tasks = result.tasks;
        for task in &mut tasks {
            Self::trim_history(task, params.history_length);
        }
        let page_size = tasks.len() as i32;
        Ok(ListTasksResponse {
            tasks,
            next_page_token: result.next_page_token.unwrap_or_default(),
            page_size,
            total_size: page_size,
        })
    }

    async fn on_cancel_task(&self, params: CancelTaskParams) -> A2AResult<Task> {
        let mut task = self.require_task(&params.id).await?;
        if Self::is_terminal(&task.status.state) {
            return Err(A2AError::task_not_cancelable(format!(
                "task {} is already in terminal state {:?}",
                params.id, task.status.state
            )));
        }

        let cancel_message = new_agent_text_message(
            "Task canceled by client request",
            Some(task.context_id.clone()),
            Some(task.id.clone()),
        );
        task.status = TaskStatus {
            state: TaskState::Canceled,
            message: Some(cancel_message),
            timestamp: Some(Utc::now().to_rfc3339()),
        };
        self.task_store.save(task.clone(), None).await?;
        self.bus
            .publish(StreamResponse::StatusUpdate(TaskStatusUpdateEvent {
                task_id: task.id.clone(),
                context_id: task.context_id.clone(),
                kind: "status-update".into(),
                status: task.status.clone(),
                r#final: true,
                metadata: None,
            }))
            .await?;
        Ok(task)
    }

    async fn on_resubscribe_to_task(
        &self,
        params: SubscribeToTaskParams,
    ) -> A2AResult<(Task, Option<EventQueue>)> {
        let task = self.require_task(&params.id).await?;
        if Self::is_terminal(&task.status.state) {
            return Ok((task, None));
        }
        let queue = EventQueue::new(Arc::clone(&self.bus), task.context_id.as_str(), Some(task.id.clone())).await;
        Ok((task, Some(queue)))
    }

    async fn on_set_task_push_notification_config(
        &self,
        params: CreateTaskPushNotificationConfigParams,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.check_push_notifications_capability()?;
        self.require_task(&params.task_id).await?;

        let config = TaskPushNotificationConfig {
            id: Some(params.config_id.clone()),
            task_id: params.task_id.clone(),
            push_notification_config: params.config.clone(),
            tenant: params.tenant.clone(),
        };
        let payload = serde_json::to_vec(&config)?;
        self.adapter
            .set(&Self::push_config_key(&params.task_id), payload, SetOptions::default())
            .await?;
        Ok(config)
    }

    async fn on_get_task_push_notification_config(
        &self,
        params: TaskIdParams,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.check_push_notifications_capability()?;
        self.require_task(&params.id).await?;

        let bytes = self
            .adapter
            .get(&Self::push_config_key(&params.id), GetFormat::Json)
            .await?
            .ok_or_else(|| {
                A2AError::internal_error(format!("no push notification config set for task {}", params.id))
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
