/// Buyer and seller conversations about an ad
mod manager;

pub use manager::MessageManager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest last-message preview kept on a conversation, in characters
pub const PREVIEW_LENGTH: usize = 50;

/// Conversation between two users about one ad
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub ad_id: String,
    pub ad_title: String,
    pub ad_image: Option<String>,
    pub ad_price: Option<f64>,
    pub participants: [String; 2],
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn includes(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The participant that is not `user_id`
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.participants[0] == user_id {
            &self.participants[1]
        } else {
            &self.participants[0]
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Public profile of a conversation partner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub ad_id: Option<String>,
    pub receiver_id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub message_id: String,
    pub conversation_id: String,
}

/// Conversation as listed in the inbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_user: Option<Participant>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationList {
    pub conversations: Vec<ConversationSummary>,
}

/// One page of a conversation, oldest message first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationThread {
    pub conversation: Conversation,
    pub other_user: Option<Participant>,
    pub messages: Vec<Message>,
    pub page: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

/// First [`PREVIEW_LENGTH`] characters, with "..." when truncated
pub fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_LENGTH {
        let head: String = content.chars().take(PREVIEW_LENGTH).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}
