use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "message_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    General,
    Viewing,
    Payment,
    Maintenance,
    Lease,
}

impl Default for MessageType {
    fn default() -> Self {
        Self::General
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub property_id: Option<Uuid>,
    pub subject: String,
    pub body: String,
    pub message_type: MessageType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub property_id: Option<Uuid>,
    pub subject: String,
    pub body: String,
    pub message_type: MessageType,
}

/// Conversations are not stored; they are messages grouped by counterparty and property.
#[derive(Debug, Serialize, ToSchema)]
pub struct Conversation {
    pub counterparty_id: Uuid,
    pub property_id: Option<Uuid>,
    pub last_message: Message,
    pub unread_count: i64,
    pub message_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessagingGateResponse {
    pub can_message: bool,
    pub reason: crate::services::UnlockReason,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub property_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub body: String,
    pub message_type: Option<MessageType>,
}
