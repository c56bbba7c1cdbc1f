// Core entities shared by the cache, the gateways and the sync layer.
// Wire names follow the backend: camelCase for chat fields, snake_case for
// message/user URL fields, timestamps as integer milliseconds since epoch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub status: UserStatus,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Offline,
    Away,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    /// The two participant user ids.
    pub participants: Vec<String>,
    #[serde(rename = "lastMessage", default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
    /// Absent on the wire decodes to "now"; a wrong-typed value is a decode error.
    #[serde(
        rename = "lastMessageDate",
        default = "Utc::now",
        with = "chrono::serde::ts_milliseconds"
    )]
    pub last_message_date: DateTime<Utc>,
    #[serde(rename = "unreadCount", default)]
    pub unread_count: u32,
    #[serde(rename = "isPinned", default)]
    pub is_pinned: bool,
    #[serde(
        rename = "createdAt",
        default = "Utc::now",
        with = "chrono::serde::ts_milliseconds"
    )]
    pub created_at: DateTime<Utc>,
}

/// Denormalized projection of a chat's newest message. Kept consistent by
/// the reconciler, never an independent source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub id: String,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Chat {
    /// The other side of a two-party chat.
    pub fn other_participant(&self, current_user_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|id| id.as_str() != current_user_id)
            .map(|id| id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    pub status: MessageStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

/// Derived from the content fields, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    File,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        if self.image_url.is_some() {
            MessageKind::Image
        } else if self.file_url.is_some() {
            MessageKind::File
        } else {
            MessageKind::Text
        }
    }
}

/// Response to a successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// Outgoing message payload. Serializes as the send-message request body,
/// which uses camelCase URL keys (the response uses snake_case ones).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Draft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "imageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "fileURL", skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

impl Draft {
    pub fn text(text: impl Into<String>) -> Self {
        Draft {
            text: Some(text.into()),
            ..Draft::default()
        }
    }

    /// A draft with no content fields at all is not sendable.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.image_url.is_none() && self.file_url.is_none()
    }
}
