//! Echo Agent — a minimal A2A server that echoes messages back.
//!
//! Run with:
//! ```sh
//! cargo run --example echo_agent
//! ```
//!
//! Then test with curl:
//! ```sh
//! # Check agent card
//! curl http://localhost:3000/.well-known/agent.json | jq
//!
//! # Send a message
//! curl -X POST http://localhost:3000/a2a \
//!   -H "Content-Type: application/json" \
//!   -d '{
//!     "jsonrpc": "2.0",
//!     "id": 1,
//!     "method": "message/send",
//!     "params": {
//!       "message": {
//!         "messageId": "m1",
//!         "role": "user",
//!         "parts": [{"kind": "text", "text": "Hello, agent!"}]
//!       }
//!     }
//!   }'
//! ```

use std::sync::Arc;

use a2a_rs::builders::ServerBuilder;
use a2a_rs::error::A2AResult;
use a2a_rs::server::{AgentHandler, HandlerContext, HandlerFuture, HandlerResult};
use a2a_rs::types::{Message, Part};
use a2a_rs::utils::{get_text_parts, new_text_artifact};
use async_trait::async_trait;

/// A simple agent that echoes back whatever you send it.
struct EchoAgent;

#[async_trait]
impl AgentHandler for EchoAgent {
    async fn handle(&self, message: Message, context: HandlerContext) -> A2AResult<HandlerResult> {
        let text = get_text_parts(&message.parts).join("\n");
        let text = if text.is_empty() { "no text received".to_string() } else { text };

        context.publish_update("echoing your message").await?;

        let artifact = new_text_artifact("echo-response", format!("echo: {text}"), None::<String>);

        Ok(HandlerResult::Parts {
            parts: vec![Part::text(format!("echoed: {text}"))],
            artifacts: Some(vec![artifact]),
            metadata: None,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let handler: Arc<dyn AgentHandler> = Arc::new(EchoAgent);
    let app = ServerBuilder::new(handler, "echo-agent")
        .with_agent_card(|b| {
            b.with_jsonrpc_interface("http://localhost:3000/a2a")
                .with_streaming(true)
                .with_skill(
                    "echo",
                    "Echo",
                    "Echoes back any text message you send",
                    vec!["echo".to_string(), "test".to_string()],
                )
        })
        .with_cors(true)
        .build();

    let addr = "0.0.0.0:3000";
    println!("Echo Agent listening on http://{addr}");
    println!("  Agent card: http://{addr}/.well-known/agent.json");
    println!("  A2A endpoint: http://{addr}/a2a");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// A type-only check that `HandlerFuture` remains the right shape for a
// closure-based handler, in case someone wires one up instead of a struct.
#[allow(dead_code)]
fn _closure_handler_shape_check() -> Arc<dyn AgentHandler> {
    Arc::new(
        move |message: Message, _ctx: HandlerContext| -> HandlerFuture {
            Box::pin(async move {
                Ok(HandlerResult::Text(format!(
                    "{} parts received",
                    message.parts.len()
                )))
            })
        },
    )
}
