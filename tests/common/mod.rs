//! Shared test utilities for integration tests.

use std::sync::Arc;

use a2a_rs::builders::{AgentCardBuilder, ServerBuilder};
use a2a_rs::error::{A2AError, A2AResult};
use a2a_rs::server::{AgentHandler, HandlerContext, HandlerResult, TaskStore};
use a2a_rs::types::{Message, Part};
use a2a_rs::utils::{get_text_parts, new_text_artifact};
use async_trait::async_trait;

/// A simple echo agent that echoes back the text from the user's message.
pub struct EchoAgent;

#[async_trait]
impl AgentHandler for EchoAgent {
    async fn handle(&self, message: Message, _context: HandlerContext) -> A2AResult<HandlerResult> {
        let input = user_text(&message);
        let text = if input.is_empty() { "No text received".to_string() } else { input };
        Ok(HandlerResult::Text(format!("Echo: {text}")))
    }
}

/// A slow echo agent that publishes intermediate status updates before completing.
pub struct SlowEchoAgent;

#[async_trait]
impl AgentHandler for SlowEchoAgent {
    async fn handle(&self, message: Message, context: HandlerContext) -> A2AResult<HandlerResult> {
        let input = user_text(&message);
        let text = if input.is_empty() { "No text".to_string() } else { input };

        context.publish_update(format!("Processed: {text}")).await?;

        let artifact = new_text_artifact("output", format!("Processed: {text}"), None::<String>);

        Ok(HandlerResult::Parts {
            parts: vec![Part::text(format!("Done: {text}"))],
            artifacts: Some(vec![artifact]),
            metadata: None,
        })
    }
}

/// An agent that always fails.
pub struct FailingAgent;

#[async_trait]
impl AgentHandler for FailingAgent {
    async fn handle(&self, _message: Message, _context: HandlerContext) -> A2AResult<HandlerResult> {
        Err(A2AError::internal_error("Agent intentionally failed"))
    }
}

fn user_text(message: &Message) -> String {
    get_text_parts(&message.parts).join("\n")
}

/// Build a default agent card for testing.
pub fn test_agent_card(url: &str) -> a2a_rs::types::AgentCard {
    AgentCardBuilder::new("Test Echo Agent", "An echo agent for testing", "0.1.0")
        .with_jsonrpc_interface(url)
        .with_streaming(true)
        .with_skill(
            "echo",
            "Echo",
            "Echoes back messages",
            vec!["test".to_string()],
        )
        .build()
}

/// Start a test server on a random port. Returns the base URL and a handle to shut it down.
pub async fn start_test_server(
    handler: Arc<dyn AgentHandler>,
) -> (String, tokio::task::JoinHandle<()>) {
    start_test_server_with_store(handler, Arc::new(a2a_rs::server::InMemoryTaskStore::new())).await
}

/// Start a test server on a random port with a specific task store.
pub async fn start_test_server_with_store(
    handler: Arc<dyn AgentHandler>,
    store: Arc<dyn TaskStore>,
) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let agent_card = test_agent_card(&format!("{}/a2a", base_url));
    let app = ServerBuilder::new(handler, "test-agent")
        .with_task_store(store)
        .with_agent_card_direct(agent_card)
        .build();

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Brief wait for the server to start accepting connections.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    (base_url, handle)
}

/// Helper to build a JSON-RPC request body.
pub fn jsonrpc_request(
    id: serde_json::Value,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

/// Helper to build a message/send request body.
pub fn message_send_request(id: i64, text: &str) -> serde_json::Value {
    jsonrpc_request(
        serde_json::json!(id),
        "message/send",
        serde_json::json!({
            "message": {
                "messageId": format!("test-msg-{}", id),
                "role": "user",
                "parts": [{"kind": "text", "text": text}]
            }
        }),
    )
}

/// Helper to build a message/send request with context_id and task_id.
pub fn message_send_with_context(
    id: i64,
    text: &str,
    context_id: &str,
    task_id: Option<&str>,
) -> serde_json::Value {
    let mut message = serde_json::json!({
        "messageId": format!("test-msg-{}", id),
        "role": "user",
        "parts": [{"kind": "text", "text": text}],
        "contextId": context_id
    });
    if let Some(tid) = task_id {
        message["taskId"] = serde_json::json!(tid);
    }
    jsonrpc_request(
        serde_json::json!(id),
        "message/send",
        serde_json::json!({ "message": message }),
    )
}
