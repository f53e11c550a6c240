//! Axum integration — the HTTP/JSON-RPC transport binding over a
//! [`RequestHandler`].
//!
//! Provides [`a2a_router`], an axum `Router` with:
//! - `POST {base_path}` — JSON-RPC 2.0 dispatch
//! - `GET {base_path}.well-known/agent.json` — agent card discovery
//!
//! This layer owns none of the task lifecycle — it parses JSON-RPC
//! envelopes, calls the request handler, and renders the result as a single
//! JSON object or as an `text/event-stream`.
//!
//! # Supported methods
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `message/send` | `MessageSendParams` | `Task` or `Message` |
//! | `message/stream` | `MessageSendParams` | SSE of `Task \| StatusUpdate \| ArtifactUpdate` |
//! | `tasks/get` | `{id, historyLength?}` | `Task` |
//! | `tasks/list` | `{contextId?, status?, pageSize?, pageToken?}` | `{tasks, nextPageToken}` |
//! | `tasks/cancel` | `{id}` | `Task` |
//! | `tasks/resubscribe` | `{id}` | SSE of events |
//! | `tasks/pushNotificationConfig/set` | `{taskId, configId, config}` | echo |
//! | `tasks/pushNotificationConfig/get` | `{id}` | `{taskId, pushNotificationConfig}` |
//!
//! # Example
//!
//! ```rust,ignore
//! use a2a_rs::server::{a2a_router, DefaultRequestHandler};
//! use std::sync::Arc;
//!
//! let app = a2a_router(handler, agent_card);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use futures::stream::Stream;
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{self, A2AError};
use crate::types::{
    AgentCard, CancelTaskParams, CreateTaskPushNotificationConfigParams, GetTaskParams,
    JsonRpcError as A2AJsonRpcError, ListTasksParams, SendMessageParams, StreamResponse,
    SubscribeToTaskParams, TaskIdParams,
};
use crate::utils::PREV_AGENT_CARD_WELL_KNOWN_PATH;

use super::event_queue::{EventQueue, QueueItem};
use super::request_handler::RequestHandler;

/// How often a heartbeat `event: ping` is sent on an open SSE stream.
const SSE_HEARTBEAT: Duration = Duration::from_secs(15);

struct AppState {
    handler: Arc<dyn RequestHandler>,
    agent_card: AgentCard,
}

/// Build an axum `Router` exposing `handler` over JSON-RPC + SSE, plus the
/// well-known agent card endpoint.
pub fn a2a_router(handler: Arc<dyn RequestHandler>, agent_card: AgentCard) -> Router {
    let state = Arc::new(AppState { handler, agent_card });

    Router::new()
        .route(PREV_AGENT_CARD_WELL_KNOWN_PATH, get(handle_agent_card))
        .route("/a2a", post(handle_jsonrpc))
        .with_state(state)
}

async fn handle_agent_card(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(&state.agent_card).into_response()
}

#[derive(Debug, serde::Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, serde::Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<A2AJsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".into(), id, result: Some(result), error: None }
    }

    fn error(id: Option<Value>, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(A2AJsonRpcError { code, message, data: None }),
        }
    }

    fn from_a2a_error(id: Option<Value>, err: A2AError) -> Self {
        let rpc_err: A2AJsonRpcError = err.into();
        Self { jsonrpc: "2.0".into(), id, result: None, error: Some(rpc_err) }
    }
}

async fn handle_jsonrpc(State(state): State<Arc<AppState>>, Json(request): Json<JsonRpcRequest>) -> Response {
    if request.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::error(
            request.id,
            error::INVALID_REQUEST,
            "invalid JSON-RPC version, must be \"2.0\"".into(),
        ))
        .into_response();
    }

    debug!(method = %request.method, "JSON-RPC request received");

    match request.method.as_str() {
        "message/send" => handle_message_send(state, request).await,
        "message/stream" => handle_message_stream(state, request).await,
        "tasks/get" => handle_tasks_get(state, request).await,
        "tasks/list" => handle_tasks_list(state, request).await,
        "tasks/cancel" => handle_tasks_cancel(state, request).await,
        "tasks/resubscribe" => handle_tasks_resubscribe(state, request).await,
        "tasks/pushNotificationConfig/set" => handle_push_config_set(state, request).await,
        "tasks/pushNotificationConfig/get" => handle_push_config_get(state, request).await,
        method => {
            warn!(method = %method, "unknown JSON-RPC method");
            Json(JsonRpcResponse::error(
                request.id,
                error::METHOD_NOT_FOUND,
                format!("method not found: {method}"),
            ))
            .into_response()
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, String> {
    serde_json::from_value(params).map_err(|e| e.to_string())
}

fn invalid_params(id: Option<Value>, detail: impl std::fmt::Display) -> Response {
    Json(JsonRpcResponse::error(id, error::INVALID_PARAMS, format!("invalid params: {detail}"))).into_response()
}

fn to_json_response<T: serde::Serialize>(id: Option<Value>, value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(v) => Json(JsonRpcResponse::success(id, v)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            Json(JsonRpcResponse::error(id, error::INTERNAL_ERROR, format!("internal error: {e}"))).into_response()
        }
    }
}

async fn handle_message_send(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params: SendMessageParams = match parse(request.params) {
        Ok(p) => p,
        Err(e) => return invalid_params(request.id, e),
    };

    match state.handler.on_message_send(params).await {
        Ok(response) => to_json_response(request.id, &response),
        Err(e) => Json(JsonRpcResponse::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_message_stream(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params: SendMessageParams = match parse(request.params) {
        Ok(p) => p,
        Err(e) => return invalid_params(request.id, e),
    };

    match state.handler.on_message_send_stream(params).await {
        Ok(queue) => sse_response(request.id, queue),
        Err(e) => Json(JsonRpcResponse::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_tasks_get(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params: GetTaskParams = match parse(request.params) {
        Ok(p) => p,
        Err(e) => return invalid_params(request.id, e),
    };

    match state.handler.on_get_task(params).await {
        Ok(task) => to_json_response(request.id, &task),
        Err(e) => Json(JsonRpcResponse::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_tasks_list(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params: ListTasksParams = match parse(request.params) {
        Ok(p) => p,
        Err(e) => return invalid_params(request.id, e),
    };

    match state.handler.on_list_tasks(params).await {
        Ok(response) => to_json_response(request.id, &response),
        Err(e) => Json(JsonRpcResponse::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_tasks_cancel(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params: CancelTaskParams = match parse(request.params) {
        Ok(p) => p,
        Err(e) => return invalid_params(request.id, e),
    };

    match state.handler.on_cancel_task(params).await {
        Ok(task) => to_json_response(request.id, &task),
        Err(e) => Json(JsonRpcResponse::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_tasks_resubscribe(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params: SubscribeToTaskParams = match parse(request.params) {
        Ok(p) => p,
        Err(e) => return invalid_params(request.id, e),
    };

    match state.handler.on_resubscribe_to_task(params).await {
        Ok((task, Some(queue))) => {
            debug!(task_id = %task.id, "resubscribed to running task");
            sse_response(request.id, queue)
        }
        Ok((task, None)) => to_json_response(request.id, &task),
        Err(e) => Json(JsonRpcResponse::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_push_config_set(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params: CreateTaskPushNotificationConfigParams = match parse(request.params) {
        Ok(p) => p,
        Err(e) => return invalid_params(request.id, e),
    };

    match state.handler.on_set_task_push_notification_config(params).await {
        Ok(config) => to_json_response(request.id, &config),
        Err(e) => Json(JsonRpcResponse::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_push_config_get(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params: TaskIdParams = match parse(request.params) {
        Ok(p) => p,
        Err(e) => return invalid_params(request.id, e),
    };

    match state.handler.on_get_task_push_notification_config(params).await {
        Ok(config) => to_json_response(request.id, &config),
        Err(e) => Json(JsonRpcResponse::from_a2a_error(request.id, e)).into_response(),
    }
}

// ---- SSE ----

/// Render an [`EventQueue`] as `text/event-stream`, framing each record as
/// `id: {epochMs}-{rand}\ndata: {json}\n\n` and wrapping a stalled stream in
/// a 15-second `event: ping` heartbeat.
fn sse_response(request_id: Option<Value>, queue: EventQueue) -> Response {
    let stream = make_sse_stream(request_id, queue);
    Sse::new(stream).into_response()
}

fn record_id() -> String {
    format!("{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple())
}

fn make_sse_stream(
    request_id: Option<Value>,
    queue: EventQueue,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut saw_terminal = false;
        let mut heartbeat = tokio::time::interval(SSE_HEARTBEAT);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        heartbeat.tick().await; // first tick fires immediately, discard it

        loop {
            let next = tokio::select! {
                item = queue.next_event() => item,
                _ = heartbeat.tick() => {
                    yield Ok(Event::default().event("ping").data(""));
                    continue;
                }
            };

            match next {
                Some(QueueItem::Event(event)) => {
                    let is_terminal = matches!(&event, StreamResponse::StatusUpdate(u) if u.r#final)
                        || matches!(&event, StreamResponse::Message(_));

                    match serde_json::to_value(&event) {
                        Ok(result) => {
                            let rpc = JsonRpcResponse::success(request_id.clone(), result);
                            match serde_json::to_string(&rpc) {
                                Ok(json) => yield Ok(Event::default().id(record_id()).data(json)),
                                Err(e) => error!(error = %e, "failed to serialize SSE JSON-RPC envelope"),
                            }
                        }
                        Err(e) => error!(error = %e, "failed to serialize SSE event"),
                    }

                    if is_terminal {
                        saw_terminal = true;
                        break;
                    }
                }
                Some(QueueItem::Discontinuity(gap)) => {
                    warn!(
                        context_id = %gap.context_id,
                        from_sequence = gap.from_sequence,
                        to_sequence = gap.to_sequence,
                        "SSE stream observed a discontinuity, events were dropped"
                    );
                }
                None => break,
            }
        }

        if !saw_terminal {
            warn!("SSE stream closed before a terminal event was observed");
            let rpc = JsonRpcResponse::error(
                request_id,
                error::INTERNAL_ERROR,
                "event stream closed before task reached a terminal state".into(),
            );
            if let Ok(json) = serde_json::to_string(&rpc) {
                yield Ok(Event::default().event("error").id(record_id()).data(json));
            }
        }
    }
}
