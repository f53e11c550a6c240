//! Helpers for pulling typed content back out of a `Part` slice.

use crate::types::{FileContent, Part};
use serde_json::Value;

/// Text content of every `Part::Text` in `parts`, in order.
pub fn get_text_parts(parts: &[Part]) -> Vec<String> {
    parts
        .iter()
        .filter_map(|part| match part {
            Part::Text { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// Data payloads of every `Part::Data` in `parts`, in order.
pub fn get_data_parts(parts: &[Part]) -> Vec<Value> {
    parts
        .iter()
        .filter_map(|part| match part {
            Part::Data { data, .. } => Some(data.clone()),
            _ => None,
        })
        .collect()
}

/// File content of every `Part::File` in `parts`, in order.
pub fn get_file_parts(parts: &[Part]) -> Vec<FileContent> {
    parts
        .iter()
        .filter_map(|part| match part {
            Part::File { file, .. } => Some(file.clone()),
            _ => None,
        })
        .collect()
}
