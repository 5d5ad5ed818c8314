use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized inbound chat message, the only thing the game side ever
/// sees of VK's update format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatUpdate {
    pub message_id: i64,
    pub sender_id: i64,
    pub chat_id: i64,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Conversation member profile as returned by
/// `messages.getConversationMembers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub screen_name: String,
}

// --- Long poll wire format ---

#[derive(Debug, Clone, Deserialize)]
pub struct LongPollServer {
    pub key: String,
    pub server: String,
    pub ts: String,
}

#[derive(Debug, Deserialize)]
pub struct LongPollResponse {
    pub ts: Option<String>,
    #[serde(default)]
    pub updates: Vec<RawUpdate>,
    pub failed: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct RawUpdate {
    #[serde(rename = "type")]
    pub kind: String,
    pub object: RawUpdateObject,
}

#[derive(Debug, Deserialize)]
pub struct RawUpdateObject {
    pub message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
pub struct RawMessage {
    pub from_id: i64,
    pub peer_id: i64,
    pub conversation_message_id: i64,
    #[serde(default)]
    pub text: String,
}

impl RawUpdate {
    /// `message_new` updates with a non-empty body become [`ChatUpdate`]s;
    /// everything else (stickers, service actions, other event kinds) is
    /// dropped at the transport boundary.
    pub fn into_chat_update(self) -> Option<ChatUpdate> {
        if self.kind != "message_new" {
            return None;
        }
        let message = self.object.message?;
        if message.text.trim().is_empty() {
            return None;
        }
        Some(ChatUpdate {
            message_id: message.conversation_message_id,
            sender_id: message.from_id,
            chat_id: message.peer_id,
            text: message.text,
            received_at: Utc::now(),
        })
    }
}

// --- Response envelopes ---

#[derive(Debug, Deserialize)]
pub struct VkEnvelope<T> {
    pub response: Option<T>,
    pub error: Option<VkApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct VkApiErrorBody {
    pub error_code: i64,
    pub error_msg: String,
}

#[derive(Debug, Deserialize)]
pub struct ConversationMembers {
    #[serde(default)]
    pub profiles: Vec<MemberProfile>,
}
