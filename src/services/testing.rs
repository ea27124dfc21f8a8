//! Fixtures shared by the service tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Application, Profile, Property, UserRole};
use crate::services::application_service::SubmitApplication;
use crate::services::email_service::Mailer;
use crate::services::ApplicationService;
use crate::store::MemoryStore;

/// Keeps every email instead of sending it. `failing()` refuses all of them.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent_to(&self, email: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == email)
            .map(|(_, subject)| subject.clone())
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Email("mail relay unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

pub struct Yard {
    pub store: MemoryStore,
    pub landlord: Profile,
    pub property: Property,
}

/// A landlord with one available room at R2500, deposit R2500.
pub async fn yard() -> Yard {
    let store = MemoryStore::new();
    let landlord = store.add_profile("thabo@example.co.za", UserRole::Landlord).await;
    let property = store
        .add_property(
            landlord.id,
            "Backroom in Orlando East",
            Decimal::from(2500),
            Some(Decimal::from(2500)),
        )
        .await;
    Yard {
        store,
        landlord,
        property,
    }
}

pub fn move_in() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

pub async fn tenant(store: &MemoryStore, email: &str) -> Profile {
    store.add_profile(email, UserRole::Tenant).await
}

pub async fn apply(
    store: &MemoryStore,
    mailer: &RecordingMailer,
    tenant_id: Uuid,
    property_id: Uuid,
) -> Application {
    ApplicationService::new(store, mailer)
        .submit(
            tenant_id,
            SubmitApplication {
                property_id,
                proposed_move_in_date: move_in(),
                lease_duration_requested: Some(12),
                additional_occupants: None,
                additional_occupants_details: None,
                tenant_notes: Some("I work in Braamfontein".to_string()),
            },
        )
        .await
        .unwrap()
        .value
}
