//! Persistence used by the lifecycle services.
//!
//! `PgStore` backs the running service; `MemoryStore` keeps everything in process and is
//! what the service-level tests run against.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppResult;
use crate::lifecycle::LeaseConfig;
use crate::models::{
    Application, ApplicationStatus, Lease, Message, NewLease, NewMessage, NewNotification,
    Notification, Profile, Property, PropertyStatus, ViewingRequest, ViewingStatus, WorkflowIntent,
    WorkflowStatus,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub tenant_id: Uuid,
    pub property_id: Uuid,
    pub proposed_move_in_date: NaiveDate,
    pub lease_duration_requested: i32,
    pub additional_occupants: i32,
    pub additional_occupants_details: Option<String>,
    pub tenant_notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewViewingRequest {
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub requested_date: NaiveDate,
    pub requested_time: NaiveTime,
    pub status: ViewingStatus,
    pub tenant_message: Option<String>,
    pub landlord_message: Option<String>,
}

/// Replacement terms for a lease nobody has signed yet.
#[derive(Debug, Clone)]
pub struct LeaseTerms {
    pub monthly_rent: Decimal,
    pub deposit_amount: Option<Decimal>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub config: LeaseConfig,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct ViewingUpdate {
    pub status: Option<ViewingStatus>,
    pub tenant_message: Option<String>,
    pub landlord_message: Option<String>,
    pub willing_without_viewing: Option<bool>,
    pub decline_reason: Option<String>,
}

#[async_trait]
pub trait RentalStore: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> AppResult<Option<Profile>>;

    async fn get_property(&self, id: Uuid) -> AppResult<Option<Property>>;
    /// Writes `status` and the matching `is_active` flag together, provided the property is
    /// still in `expected`. Otherwise `Conflict`.
    async fn set_property_status(
        &self,
        id: Uuid,
        expected: PropertyStatus,
        status: PropertyStatus,
    ) -> AppResult<Property>;

    async fn insert_application(&self, new: NewApplication) -> AppResult<Application>;
    async fn get_application(&self, id: Uuid) -> AppResult<Option<Application>>;
    async fn find_application(
        &self,
        property_id: Uuid,
        tenant_id: Uuid,
    ) -> AppResult<Option<Application>>;
    async fn list_applications_for_property(&self, property_id: Uuid)
        -> AppResult<Vec<Application>>;
    /// Compare-and-set: only applies while the application is still in `expected`.
    async fn update_application_status(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        status: ApplicationStatus,
        rejection_reason: Option<String>,
    ) -> AppResult<Application>;
    /// Approves the application and takes the property off the market in one step. Fails with
    /// `Conflict`, changing nothing, unless the property is available and the application is
    /// still in `expected`.
    async fn approve_application(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        property_id: Uuid,
    ) -> AppResult<(Application, Property)>;

    async fn insert_viewing(&self, new: NewViewingRequest) -> AppResult<ViewingRequest>;
    async fn get_viewing(&self, id: Uuid) -> AppResult<Option<ViewingRequest>>;
    /// Oldest first.
    async fn list_viewings_for_pair(
        &self,
        property_id: Uuid,
        tenant_id: Uuid,
    ) -> AppResult<Vec<ViewingRequest>>;
    async fn update_viewing(&self, id: Uuid, update: ViewingUpdate) -> AppResult<ViewingRequest>;

    async fn insert_lease(&self, new: NewLease) -> AppResult<Lease>;
    async fn get_lease(&self, id: Uuid) -> AppResult<Option<Lease>>;
    async fn find_lease_by_application(&self, application_id: Uuid) -> AppResult<Option<Lease>>;
    /// Persists signature, cancellation and activity fields.
    async fn save_lease(&self, lease: &Lease) -> AppResult<Lease>;
    async fn update_lease_terms(&self, id: Uuid, terms: LeaseTerms) -> AppResult<Lease>;

    async fn insert_message(&self, new: NewMessage) -> AppResult<Message>;
    async fn insert_notification(&self, new: NewNotification) -> AppResult<Notification>;

    async fn landlords_with_approved_applications(&self, tenant_id: Uuid) -> AppResult<Vec<Uuid>>;
    async fn landlords_with_leases(&self, tenant_id: Uuid) -> AppResult<Vec<Uuid>>;
    async fn senders_to(&self, recipient_id: Uuid) -> AppResult<Vec<Uuid>>;

    /// Returns the existing intent for `(kind, subject)` if there is one, marked running again.
    async fn begin_workflow(&self, kind: &str, subject_id: Uuid) -> AppResult<WorkflowIntent>;
    async fn complete_workflow_step(&self, id: Uuid, step: &str) -> AppResult<()>;
    async fn finish_workflow(
        &self,
        id: Uuid,
        status: WorkflowStatus,
        last_error: Option<String>,
    ) -> AppResult<()>;
}
