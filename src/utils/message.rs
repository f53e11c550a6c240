//! Helpers for building agent-authored `Message`s.

use crate::types::{Message, Part, Role};
use crate::utils::parts::get_text_parts;
use uuid::Uuid;

/// An agent message with a single text part. Generates a fresh `messageId`.
pub fn new_agent_text_message(
    text: impl Into<String>,
    context_id: Option<impl Into<String>>,
    task_id: Option<impl Into<String>>,
) -> Message {
    new_agent_parts_message(
        vec![Part::Text { text: text.into(), metadata: None }],
        context_id,
        task_id,
    )
}

/// An agent message with arbitrary parts. Generates a fresh `messageId`.
pub fn new_agent_parts_message(
    parts: Vec<Part>,
    context_id: Option<impl Into<String>>,
    task_id: Option<impl Into<String>>,
) -> Message {
    Message {
        message_id: Uuid::new_v4().to_string(),
        role: Role::Agent,
        kind: "message".to_string(),
        parts,
        context_id: context_id.map(Into::into),
        task_id: task_id.map(Into::into),
        metadata: None,
        extensions: None,
        reference_task_ids: None,
    }
}

/// Joins the text of every text part in `message`, in order.
pub fn get_message_text(message: &Message, delimiter: &str) -> String {
    get_text_parts(&message.parts).join(delimiter)
}
