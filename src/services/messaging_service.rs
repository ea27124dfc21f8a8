use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Conversation, Message, MessageType, NewMessage, NotificationType, Profile, UserRole,
};
use crate::services::email_service::Mailer;
use crate::services::notification_service::NotificationService;
use crate::services::Outcome;
use crate::store::RentalStore;

/// Why a sender may (or may not) message a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnlockReason {
    /// Landlords and admins are never gated.
    Landlord,
    ApplicationApproved,
    Lease,
    /// The landlord wrote to the tenant first.
    InitialInquiry,
    Locked,
}

impl UnlockReason {
    pub fn is_unlocked(&self) -> bool {
        !matches!(self, Self::Locked)
    }
}

#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub recipient_id: Uuid,
    pub property_id: Option<Uuid>,
    pub subject: String,
    pub body: String,
    pub message_type: MessageType,
}

pub struct MessagingService<'a> {
    store: &'a dyn RentalStore,
    notifier: NotificationService<'a>,
}

impl<'a> MessagingService<'a> {
    pub fn new(store: &'a dyn RentalStore, mailer: &'a dyn Mailer) -> Self {
        Self {
            store,
            notifier: NotificationService::new(store, mailer),
        }
    }

    /// A tenant may write to a landlord once an application on one of the landlord's
    /// properties is approved, once they share a lease, or after the landlord wrote first.
    pub async fn gate(&self, sender: &Profile, recipient_id: Uuid) -> AppResult<UnlockReason> {
        if sender.role != UserRole::Tenant {
            return Ok(UnlockReason::Landlord);
        }

        let approved = self
            .store
            .landlords_with_approved_applications(sender.id)
            .await?;
        if approved.contains(&recipient_id) {
            return Ok(UnlockReason::ApplicationApproved);
        }

        let leased = self.store.landlords_with_leases(sender.id).await?;
        if leased.contains(&recipient_id) {
            return Ok(UnlockReason::Lease);
        }

        let senders = self.store.senders_to(sender.id).await?;
        if senders.contains(&recipient_id) {
            return Ok(UnlockReason::InitialInquiry);
        }

        Ok(UnlockReason::Locked)
    }

    /// Everyone a tenant may currently message.
    pub async fn contacts(&self, tenant_id: Uuid) -> AppResult<Vec<Uuid>> {
        let mut contacts = self
            .store
            .landlords_with_approved_applications(tenant_id)
            .await?;
        contacts.extend(self.store.landlords_with_leases(tenant_id).await?);
        contacts.extend(self.store.senders_to(tenant_id).await?);

        let mut seen = std::collections::HashSet::new();
        contacts.retain(|id| seen.insert(*id));
        Ok(contacts)
    }

    pub async fn send(&self, sender_id: Uuid, outgoing: OutgoingMessage) -> AppResult<Outcome<Message>> {
        if outgoing.recipient_id == sender_id {
            return Err(AppError::BadRequest(
                "You cannot send a message to yourself".to_string(),
            ));
        }

        let sender = self.profile(sender_id).await?;
        let recipient = self.profile(outgoing.recipient_id).await?;

        let reason = self.gate(&sender, recipient.id).await?;
        if !reason.is_unlocked() {
            tracing::debug!("Message from {} to {} refused: locked", sender.id, recipient.id);
            return Err(AppError::MessagingLocked);
        }

        let message = self
            .store
            .insert_message(NewMessage {
                sender_id: sender.id,
                recipient_id: recipient.id,
                property_id: outgoing.property_id,
                subject: outgoing.subject.trim().to_string(),
                body: outgoing.body,
                message_type: outgoing.message_type,
            })
            .await?;

        let failures = self
            .notifier
            .notify(
                recipient.id,
                NotificationType::Message,
                &format!("New message from {}", sender.display_name()),
                &message.subject,
                Some("/messages"),
            )
            .await;

        Ok(Outcome::new(message, failures))
    }

    async fn profile(&self, id: Uuid) -> AppResult<Profile> {
        self.store
            .get_profile(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

/// Groups a user's messages into conversations keyed by `(counterparty, property)`,
/// newest conversation first.
pub fn group_conversations(user_id: Uuid, messages: Vec<Message>) -> Vec<Conversation> {
    let mut groups: HashMap<(Uuid, Option<Uuid>), Conversation> = HashMap::new();

    for message in messages {
        let counterparty_id = if message.sender_id == user_id {
            message.recipient_id
        } else {
            message.sender_id
        };
        let unread = message.recipient_id == user_id && !message.is_read;

        let entry = groups
            .entry((counterparty_id, message.property_id))
            .or_insert_with(|| Conversation {
                counterparty_id,
                property_id: message.property_id,
                last_message: message.clone(),
                unread_count: 0,
                message_count: 0,
            });
        entry.message_count += 1;
        if unread {
            entry.unread_count += 1;
        }
        if message.created_at >= entry.last_message.created_at {
            entry.last_message = message;
        }
    }

    let mut conversations: Vec<Conversation> = groups.into_values().collect();
    conversations.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));
    conversations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewLease;
    use crate::services::testing::{apply, tenant, yard, RecordingMailer};
    use crate::services::ApplicationService;
    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal::Decimal;

    fn message(from: Uuid, to: Uuid, property: Option<Uuid>, minutes_ago: i64, read: bool) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: from,
            recipient_id: to,
            property_id: property,
            subject: "Hello".to_string(),
            body: "Is the room still available?".to_string(),
            message_type: MessageType::General,
            is_read: read,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_group_by_counterparty_and_property() {
        let me = Uuid::new_v4();
        let landlord = Uuid::new_v4();
        let room = Some(Uuid::new_v4());
        let flat = Some(Uuid::new_v4());

        let conversations = group_conversations(
            me,
            vec![
                message(me, landlord, room, 30, true),
                message(landlord, me, room, 20, false),
                message(landlord, me, flat, 10, false),
                message(landlord, me, room, 5, true),
            ],
        );

        assert_eq!(conversations.len(), 2);
        let room_thread = conversations
            .iter()
            .find(|c| c.property_id == room)
            .unwrap();
        assert_eq!(room_thread.counterparty_id, landlord);
        assert_eq!(room_thread.message_count, 3);
        assert_eq!(room_thread.unread_count, 1);
        // newest thread first
        assert_eq!(conversations[0].property_id, room);
    }

    #[test]
    fn test_own_unread_messages_do_not_count() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let conversations = group_conversations(me, vec![message(me, other, None, 1, false)]);
        assert_eq!(conversations[0].unread_count, 0);
    }

    #[test]
    fn test_unlock_reason_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&UnlockReason::ApplicationApproved).unwrap(),
            "\"application_approved\""
        );
        assert!(!UnlockReason::Locked.is_unlocked());
        assert!(UnlockReason::InitialInquiry.is_unlocked());
    }

    fn hello(recipient_id: Uuid) -> OutgoingMessage {
        OutgoingMessage {
            recipient_id,
            property_id: None,
            subject: " Room enquiry ".to_string(),
            body: "Is the backroom still available?".to_string(),
            message_type: MessageType::General,
        }
    }

    #[tokio::test]
    async fn test_tenant_locked_without_relationship() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let other_landlord = y.store.add_profile("zanele@example.co.za", UserRole::Landlord).await;
        let service = MessagingService::new(&y.store, &mailer);

        // a conversation with someone else does not open this one
        service.send(other_landlord.id, hello(t.id)).await.unwrap();
        assert_eq!(service.gate(&t, other_landlord.id).await.unwrap(), UnlockReason::InitialInquiry);
        assert_eq!(service.gate(&t, y.landlord.id).await.unwrap(), UnlockReason::Locked);

        let err = service.send(t.id, hello(y.landlord.id)).await.unwrap_err();
        assert!(matches!(err, AppError::MessagingLocked));
        assert!(y.store.messages_to(y.landlord.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_approval_unlocks_messaging() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let app = apply(&y.store, &mailer, t.id, y.property.id).await;
        ApplicationService::new(&y.store, &mailer)
            .approve(y.landlord.id, app.id)
            .await
            .unwrap();

        let service = MessagingService::new(&y.store, &mailer);
        assert_eq!(
            service.gate(&t, y.landlord.id).await.unwrap(),
            UnlockReason::ApplicationApproved
        );

        let sent = service.send(t.id, hello(y.landlord.id)).await.unwrap();
        assert!(!sent.is_degraded());
        assert_eq!(sent.value.subject, "Room enquiry");
        assert_eq!(y.store.messages_to(y.landlord.id).await.len(), 1);
        assert!(y
            .store
            .notifications_for(y.landlord.id)
            .await
            .iter()
            .any(|n| n.notification_type == NotificationType::Message));

        // approval and lease point at the same landlord
        assert_eq!(service.contacts(t.id).await.unwrap(), vec![y.landlord.id]);
    }

    #[tokio::test]
    async fn test_lease_alone_unlocks_messaging() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        y.store
            .insert_lease(NewLease {
                application_id: None,
                property_id: y.property.id,
                tenant_id: t.id,
                landlord_id: y.landlord.id,
                monthly_rent: Decimal::from(2500),
                deposit_amount: None,
                start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2027, 3, 1).unwrap(),
                config: None,
            })
            .await
            .unwrap();

        let service = MessagingService::new(&y.store, &mailer);
        assert_eq!(service.gate(&t, y.landlord.id).await.unwrap(), UnlockReason::Lease);
    }

    #[tokio::test]
    async fn test_landlords_are_never_gated() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let service = MessagingService::new(&y.store, &mailer);

        assert_eq!(service.gate(&y.landlord, t.id).await.unwrap(), UnlockReason::Landlord);
        service.send(y.landlord.id, hello(t.id)).await.unwrap();

        let err = service.send(y.landlord.id, hello(y.landlord.id)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_failed_notification_does_not_lose_the_message() {
        let y = yard().await;
        let mailer = RecordingMailer::failing();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let service = MessagingService::new(&y.store, &mailer);

        let sent = service.send(y.landlord.id, hello(t.id)).await.unwrap();
        assert!(sent.is_degraded());
        assert_eq!(y.store.messages_to(t.id).await.len(), 1);
    }
}
