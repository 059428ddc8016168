//! Decoder for the serialized step execution context.
//!
//! The batch engine stores each context as a base64-wrapped Java
//! serialization stream of a `Map<String, Object>`. Decoding turns it into
//! named, typed, human-readable entries without needing any of the classes
//! involved.

pub mod error;
pub mod interpret;
pub mod java_time;
pub mod render;
pub mod stream;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use tracing::debug;

pub use error::{DecodeError, RenderError};
pub use render::UNSERIALIZABLE;

/// Raw context row. `serialized_context` holds the full payload when the
/// short column was too small for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub short_context: String,
    pub serialized_context: Option<String>,
}

impl ExecutionContext {
    pub fn source_text(&self) -> &str {
        match self.serialized_context.as_deref() {
            Some(full) if !full.trim().is_empty() => full,
            _ => &self.short_context,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContextItem {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionContextDecoder;

impl ExecutionContextDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Entries in the map's own iteration order.
    ///
    /// Fails as a whole on bad base64, a malformed stream or a root that is
    /// not a map. A value that cannot be rendered becomes
    /// [`UNSERIALIZABLE`] and the other entries are kept.
    pub fn decode(&self, context: &ExecutionContext) -> Result<Vec<ExecutionContextItem>, DecodeError> {
        let bytes = STANDARD.decode(context.source_text().trim())?;
        self.decode_bytes(&bytes)
    }

    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Vec<ExecutionContextItem>, DecodeError> {
        let graph = stream::parse(bytes)?;
        let entries = interpret::root_entries(&graph)?;

        let items = entries
            .into_iter()
            .map(|(key, value)| {
                let name = match &key {
                    stream::Value::Str(s) => s.clone(),
                    other => interpret::interpret(&graph, other)
                        .and_then(|k| render::key_text(&k))
                        .unwrap_or_else(|_| UNSERIALIZABLE.to_string()),
                };
                let type_name = interpret::type_name(&graph, &value);
                let value = render::render(&graph, &value).unwrap_or_else(|err| {
                    debug!(entry = %name, %type_name, error = %err, "context value not renderable");
                    UNSERIALIZABLE.to_string()
                });
                ExecutionContextItem {
                    name,
                    type_name,
                    value,
                }
            })
            .collect();

        Ok(items)
    }
}
