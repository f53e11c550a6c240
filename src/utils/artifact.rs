//! Helpers for building `Artifact`s.

use crate::types::{Artifact, Part};
use crate::utils::parts::get_text_parts;
use serde_json::Value;
use uuid::Uuid;

/// An artifact with the given parts and a freshly generated `artifactId`.
pub fn new_artifact(
    parts: Vec<Part>,
    name: impl Into<String>,
    description: Option<impl Into<String>>,
) -> Artifact {
    Artifact {
        artifact_id: Uuid::new_v4().to_string(),
        parts,
        name: Some(name.into()),
        description: description.map(Into::into),
        metadata: None,
        extensions: None,
    }
}

/// An artifact holding a single text part.
pub fn new_text_artifact(
    name: impl Into<String>,
    text: impl Into<String>,
    description: Option<impl Into<String>>,
) -> Artifact {
    new_artifact(
        vec![Part::Text { text: text.into(), metadata: None }],
        name,
        description,
    )
}

/// An artifact holding a single structured-data part.
pub fn new_data_artifact(
    name: impl Into<String>,
    data: Value,
    description: Option<impl Into<String>>,
) -> Artifact {
    new_artifact(vec![Part::Data { data, metadata: None }], name, description)
}

/// Joins the text of every text part in `artifact`, in order.
pub fn get_artifact_text(artifact: &Artifact, delimiter: &str) -> String {
    get_text_parts(&artifact.parts).join(delimiter)
}
