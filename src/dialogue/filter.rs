//! Pure checks over transport-supplied chat metadata.

use serde::{Deserialize, Serialize};

/// WhatsApp suffix on one-to-one chat and sender ids.
const PERSONAL_SUFFIX: &str = "@c.us";

/// The fields of transport metadata the dialogue cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMetadata {
    /// Conversation id. Group chats carry a distinguishing suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Display name the sender chose, if the transport reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

impl ChatMetadata {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: Some(chat_id.into()),
            sender_name: None,
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Pull `chat_id` and `sender_name` out of a channel's metadata blob.
    pub fn from_json(metadata: &serde_json::Value) -> Self {
        let field = |key: &str| {
            metadata
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        Self {
            chat_id: field("chat_id"),
            sender_name: field("sender_name"),
        }
    }
}

/// Whether a message came from a group or broadcast chat.
///
/// Missing metadata counts as a direct chat.
pub fn is_group_chat(metadata: &ChatMetadata, group_suffix: &str) -> bool {
    match metadata.chat_id.as_deref() {
        Some(chat_id) if !group_suffix.is_empty() => chat_id.ends_with(group_suffix),
        _ => false,
    }
}

/// Phone-like identity for a sender id: the transport suffix is dropped.
pub fn sender_identity(sender: &str) -> &str {
    let sender = sender.trim();
    sender.strip_suffix(PERSONAL_SUFFIX).unwrap_or(sender)
}
