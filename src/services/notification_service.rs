use uuid::Uuid;

use crate::models::{NewNotification, NotificationType};
use crate::services::email_service::{notification_email_html, Mailer};
use crate::store::RentalStore;

/// In-app notification plus a best-effort email copy.
///
/// Neither delivery path is allowed to fail the caller's operation: problems are logged and
/// returned so the caller can report a degraded success.
pub struct NotificationService<'a> {
    store: &'a dyn RentalStore,
    mailer: &'a dyn Mailer,
}

impl<'a> NotificationService<'a> {
    pub fn new(store: &'a dyn RentalStore, mailer: &'a dyn Mailer) -> Self {
        Self { store, mailer }
    }

    pub async fn notify(
        &self,
        user_id: Uuid,
        notification_type: NotificationType,
        title: &str,
        body: &str,
        action_url: Option<&str>,
    ) -> Vec<String> {
        let mut failures = Vec::new();

        let new = NewNotification {
            user_id,
            notification_type,
            title: title.to_string(),
            body: Some(body.to_string()),
            action_url: action_url.map(str::to_string),
        };
        if let Err(e) = self.store.insert_notification(new).await {
            tracing::warn!("Failed to store notification '{}' for {}: {}", title, user_id, e);
            failures.push(format!("notification '{}' for {}: {}", title, user_id, e));
        }

        let recipient = match self.store.get_profile(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                failures.push(format!("email '{}' for {}: no profile", title, user_id));
                return failures;
            }
            Err(e) => {
                failures.push(format!("email '{}' for {}: {}", title, user_id, e));
                return failures;
            }
        };

        let html = notification_email_html(title, body, action_url);
        if let Err(e) = self.mailer.send(&recipient.email, title, &html).await {
            tracing::warn!("Failed to email '{}' to {}: {}", title, recipient.email, e);
            failures.push(format!("email '{}' to {}: {}", title, recipient.email, e));
        }

        failures
    }
}
