use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::api::outcome_json;
use crate::error::{AppError, AppResult};
use crate::middleware::{AppState, AuthUser};
use crate::models::{
    Conversation, Message, MessagingGateResponse, Profile, ProfilePublic, SendMessageRequest,
};
use crate::services::messaging_service::{group_conversations, OutgoingMessage};
use crate::services::{EmailService, MessagingService};
use crate::store::{PgStore, RentalStore};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(send_message))
        .route("/conversations", get(list_conversations))
        .route("/contacts", get(list_contacts))
        .route("/can-message/:landlord_id", get(can_message))
        .route("/:id/read", put(mark_as_read))
}

/// Messages grouped into threads by counterparty and property, newest thread first
#[utoipa::path(
    get,
    path = "/api/v1/messages/conversations",
    tag = "messages",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Conversations", body = Vec<Conversation>)
    )
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<Conversation>>> {
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE sender_id = $1 OR recipient_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(group_conversations(auth_user.user_id, messages)))
}

/// Landlords a tenant may currently write to
#[utoipa::path(
    get,
    path = "/api/v1/messages/contacts",
    tag = "messages",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Messageable landlords", body = Vec<ProfilePublic>),
        (status = 403, description = "Not a tenant")
    )
)]
pub async fn list_contacts(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<ProfilePublic>>> {
    auth_user.require_tenant()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let ids = MessagingService::new(&store, &mailer)
        .contacts(auth_user.user_id)
        .await?;

    let profiles = sqlx::query_as::<_, Profile>(
        "SELECT * FROM profiles WHERE id = ANY($1) ORDER BY first_name, last_name",
    )
    .bind(&ids)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(profiles.into_iter().map(ProfilePublic::from).collect()))
}

/// Whether the caller may write to the given landlord, and why
#[utoipa::path(
    get,
    path = "/api/v1/messages/can-message/{landlord_id}",
    tag = "messages",
    security(("bearer_auth" = [])),
    params(("landlord_id" = Uuid, Path, description = "Landlord profile ID")),
    responses(
        (status = 200, description = "Gate decision", body = MessagingGateResponse)
    )
)]
pub async fn can_message(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(landlord_id): Path<Uuid>,
) -> AppResult<Json<MessagingGateResponse>> {
    let store = PgStore::new(state.pool.clone());
    let sender = store
        .get_profile(auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mailer = EmailService::new(state.config.clone());
    let reason = MessagingService::new(&store, &mailer)
        .gate(&sender, landlord_id)
        .await?;

    Ok(Json(MessagingGateResponse {
        can_message: reason.is_unlocked(),
        reason,
    }))
}

/// Send a message. Tenants are held to the messaging gate.
#[utoipa::path(
    post,
    path = "/api/v1/messages",
    tag = "messages",
    security(("bearer_auth" = [])),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message sent", body = Message),
        (status = 403, description = "Messaging with this landlord is locked"),
        (status = 404, description = "Recipient not found")
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<Json<Value>> {
    payload.validate()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = MessagingService::new(&store, &mailer)
        .send(
            auth_user.user_id,
            OutgoingMessage {
                recipient_id: payload.recipient_id,
                property_id: payload.property_id,
                subject: payload.subject,
                body: payload.body,
                message_type: payload.message_type.unwrap_or_default(),
            },
        )
        .await?;

    Ok(Json(outcome_json(outcome)))
}

#[utoipa::path(
    put,
    path = "/api/v1/messages/{id}/read",
    tag = "messages",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 404, description = "Not found")
    )
)]
pub async fn mark_as_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let result = sqlx::query("UPDATE messages SET is_read = true WHERE id = $1 AND recipient_id = $2")
        .bind(id)
        .bind(auth_user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Message not found".to_string()));
    }

    Ok(Json(json!({"success": true})))
}
