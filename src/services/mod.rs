pub mod application_service;
pub mod auth_service;
pub mod email_service;
pub mod lease_service;
pub mod messaging_service;
pub mod notification_service;
pub mod verification_service;
pub mod viewing_service;

#[cfg(test)]
pub(crate) mod testing;

pub use application_service::{Approval, ApplicationService};
pub use auth_service::AuthService;
pub use email_service::{EmailService, Mailer};
pub use lease_service::LeaseService;
pub use messaging_service::{MessagingService, UnlockReason};
pub use notification_service::NotificationService;
pub use verification_service::VerificationService;
pub use viewing_service::ViewingService;

use serde::Serialize;

/// Result of an operation whose main effect succeeded. Side effects that did not
/// (notifications, emails) are listed instead of being dropped.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub side_effects_failed: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, side_effects_failed: Vec<String>) -> Self {
        Self {
            value,
            side_effects_failed,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.side_effects_failed.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            side_effects_failed: self.side_effects_failed,
        }
    }
}
