//! Wire records, rendered messages, and tool input DTOs
//!
//! Backend records mirror the JSON emitted by the automation server. Tool
//! inputs are annotated with `JsonSchema` for automatic schema generation.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Contact icon reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    /// Local path of the avatar image, if any
    #[serde(default)]
    pub path: Option<String>,
}

/// Contact record returned by listing and search routes
///
/// Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Stable opaque identifier (the backend's `arg` field)
    #[serde(rename = "arg")]
    pub identifier: String,
    /// Display name
    #[serde(default)]
    pub title: Option<String>,
    /// Secondary label (remark, alias)
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Avatar reference
    #[serde(default)]
    pub icon: Icon,
    /// Integer validity flag
    #[serde(default)]
    pub valid: i64,
}

/// Response body of the search route
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<Contact>,
}

/// One entry of a conversation's chat log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLogEntry {
    /// Sender id; a group id for group messages
    pub from_user: String,
    /// Recipient id
    pub to_user: String,
    /// Raw text; group messages embed the sender id as a prefix
    #[serde(default)]
    pub content: String,
    /// Epoch seconds as sent by the backend; kept raw so odd values degrade
    /// to pass-through rather than failing the page
    #[serde(default)]
    pub create_time: Value,
    #[serde(default)]
    pub is_sent_from_self: bool,
}

/// A page of chat history, in backend (chronological) order
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLogPage {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub has_more: bool,
    #[serde(rename = "chatLogs", default)]
    pub entries: Vec<ChatLogEntry>,
}

/// Accept `true`/`false` as well as numeric `0`/`1` style flags
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}

/// Display-ready form of a `ChatLogEntry`
///
/// Transient: built per entry and discarded after formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub from_display: String,
    pub to_display: String,
    pub content_display: String,
    pub time_display: String,
    pub is_self: bool,
}

impl RenderedMessage {
    /// Carry an entry through unresolved: raw ids, raw content, raw timestamp
    pub fn verbatim(entry: &ChatLogEntry) -> Self {
        Self {
            from_display: entry.from_user.clone(),
            to_display: entry.to_user.clone(),
            content_display: entry.content.clone(),
            time_display: raw_value_text(&entry.create_time),
            is_self: entry.is_sent_from_self,
        }
    }
}

/// Text form of a raw JSON scalar, without quotes around strings
pub fn raw_value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Input: contact search by name
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ContactInput {
    /// Name, remark, or id fragment to search for (percent-encoding allowed)
    #[serde(default)]
    pub name: String,
}

/// Input: chat history for one conversation
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ChatLogsInput {
    /// Conversation id (user or group id, not the display name)
    pub user_id: String,
    /// Number of most recent messages to fetch (default 10)
    #[serde(default = "default_count")]
    pub count: usize,
}

/// Input: send a text message
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SendInput {
    /// Recipient id (user or group id, not the display name)
    pub user_id: String,
    /// Message text
    pub message: String,
}

/// Default value for `count` in chat_logs
pub fn default_count() -> usize {
    10
}
