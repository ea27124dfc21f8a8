use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LeaseTerms, NewApplication, NewViewingRequest, RentalStore, ViewingUpdate};
use crate::error::{AppError, AppResult};
use crate::models::{
    Application, ApplicationStatus, Lease, Message, NewLease, NewMessage, NewNotification,
    Notification, Profile, Property, PropertyStatus, UserRole, ViewingRequest, WorkflowIntent,
    WorkflowStatus,
};

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    properties: Vec<Property>,
    applications: Vec<Application>,
    viewings: Vec<ViewingRequest>,
    leases: Vec<Lease>,
    messages: Vec<Message>,
    notifications: Vec<Notification>,
    workflows: Vec<WorkflowIntent>,
    failing: HashSet<&'static str>,
}

impl Tables {
    fn check(&self, op: &'static str) -> AppResult<()> {
        if self.failing.contains(op) {
            return Err(AppError::Internal(format!("injected failure in {}", op)));
        }
        Ok(())
    }
}

/// In-process store. Rows are kept in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    interleave: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_profile(&self, email: &str, role: UserRole) -> Profile {
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: None,
            last_name: None,
            phone: None,
            role,
            is_verified: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.profiles.push(profile.clone());
        profile
    }

    pub async fn add_property(
        &self,
        landlord_id: Uuid,
        title: &str,
        rent: Decimal,
        deposit: Option<Decimal>,
    ) -> Property {
        let now = Utc::now();
        let property = Property {
            id: Uuid::new_v4(),
            landlord_id,
            title: title.to_string(),
            description: None,
            address: "1 Main Road".to_string(),
            township: Some("Soweto".to_string()),
            rent_amount: rent,
            deposit_amount: deposit,
            water_included: false,
            electricity_included: false,
            gas_included: false,
            is_active: true,
            status: PropertyStatus::Available,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.properties.push(property.clone());
        property
    }

    /// Every read yields to the scheduler first, so concurrent callers on one task take turns.
    pub fn interleave_calls(&self) {
        self.interleave.store(true, Ordering::Relaxed);
    }

    async fn turn(&self) {
        if self.interleave.load(Ordering::Relaxed) {
            tokio::task::yield_now().await;
        }
    }

    /// Makes every later call of the named store operation fail.
    pub async fn fail_on(&self, op: &'static str) {
        self.tables.write().await.failing.insert(op);
    }

    pub async fn clear_failures(&self) {
        self.tables.write().await.failing.clear();
    }

    pub async fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        self.tables
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn messages_to(&self, user_id: Uuid) -> Vec<Message> {
        self.tables
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.recipient_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn leases_for_application(&self, application_id: Uuid) -> Vec<Lease> {
        self.tables
            .read()
            .await
            .leases
            .iter()
            .filter(|l| l.application_id == Some(application_id))
            .cloned()
            .collect()
    }

    pub async fn workflow_for(&self, kind: &str, subject_id: Uuid) -> Option<WorkflowIntent> {
        self.tables
            .read()
            .await
            .workflows
            .iter()
            .find(|w| w.kind == kind && w.subject_id == subject_id)
            .cloned()
    }
}

#[async_trait]
impl RentalStore for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        let t = self.tables.read().await;
        Ok(t.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn get_property(&self, id: Uuid) -> AppResult<Option<Property>> {
        self.turn().await;
        let t = self.tables.read().await;
        Ok(t.properties.iter().find(|p| p.id == id).cloned())
    }

    async fn set_property_status(
        &self,
        id: Uuid,
        expected: PropertyStatus,
        status: PropertyStatus,
    ) -> AppResult<Property> {
        let mut t = self.tables.write().await;
        t.check("set_property_status")?;
        let property = t
            .properties
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;
        if property.status != expected {
            return Err(AppError::Conflict(
                "Property status changed; reload and try again".to_string(),
            ));
        }
        property.status = status;
        property.is_active = status.is_active();
        property.updated_at = Utc::now();
        Ok(property.clone())
    }

    async fn insert_application(&self, new: NewApplication) -> AppResult<Application> {
        let mut t = self.tables.write().await;
        t.check("insert_application")?;
        if t
            .applications
            .iter()
            .any(|a| a.property_id == new.property_id && a.tenant_id == new.tenant_id)
        {
            return Err(AppError::Conflict(
                "You have already applied for this property".to_string(),
            ));
        }
        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            property_id: new.property_id,
            proposed_move_in_date: new.proposed_move_in_date,
            lease_duration_requested: new.lease_duration_requested,
            additional_occupants: new.additional_occupants,
            additional_occupants_details: new.additional_occupants_details,
            tenant_notes: new.tenant_notes,
            status: ApplicationStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        t.applications.push(application.clone());
        Ok(application)
    }

    async fn get_application(&self, id: Uuid) -> AppResult<Option<Application>> {
        self.turn().await;
        let t = self.tables.read().await;
        Ok(t.applications.iter().find(|a| a.id == id).cloned())
    }

    async fn find_application(
        &self,
        property_id: Uuid,
        tenant_id: Uuid,
    ) -> AppResult<Option<Application>> {
        self.turn().await;
        let t = self.tables.read().await;
        Ok(t.applications
            .iter()
            .find(|a| a.property_id == property_id && a.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_applications_for_property(
        &self,
        property_id: Uuid,
    ) -> AppResult<Vec<Application>> {
        self.turn().await;
        let t = self.tables.read().await;
        Ok(t.applications
            .iter()
            .filter(|a| a.property_id == property_id)
            .cloned()
            .collect())
    }

    async fn update_application_status(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        status: ApplicationStatus,
        rejection_reason: Option<String>,
    ) -> AppResult<Application> {
        let mut t = self.tables.write().await;
        t.check("update_application_status")?;
        let application = t
            .applications
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
        if application.status != expected {
            return Err(AppError::Conflict(
                "Application status changed; reload and try again".to_string(),
            ));
        }
        application.status = status;
        if rejection_reason.is_some() {
            application.rejection_reason = rejection_reason;
        }
        application.updated_at = Utc::now();
        Ok(application.clone())
    }

    async fn approve_application(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        property_id: Uuid,
    ) -> AppResult<(Application, Property)> {
        let mut t = self.tables.write().await;
        t.check("approve_application")?;
        let now = Utc::now();

        let p = t
            .properties
            .iter()
            .position(|p| p.id == property_id && p.status == PropertyStatus::Available)
            .ok_or_else(|| AppError::Conflict("This property is no longer available".to_string()))?;
        let a = t
            .applications
            .iter()
            .position(|a| a.id == id && a.status == expected && a.property_id == property_id)
            .ok_or_else(|| {
                AppError::Conflict("Application status changed; reload and try again".to_string())
            })?;

        let property = &mut t.properties[p];
        property.status = PropertyStatus::Occupied;
        property.is_active = false;
        property.updated_at = now;
        let property = property.clone();

        let application = &mut t.applications[a];
        application.status = ApplicationStatus::Approved;
        application.updated_at = now;
        Ok((application.clone(), property))
    }

    async fn insert_viewing(&self, new: NewViewingRequest) -> AppResult<ViewingRequest> {
        let mut t = self.tables.write().await;
        t.check("insert_viewing")?;
        let now = Utc::now();
        let viewing = ViewingRequest {
            id: Uuid::new_v4(),
            property_id: new.property_id,
            tenant_id: new.tenant_id,
            requested_date: new.requested_date,
            requested_time: new.requested_time,
            status: new.status,
            tenant_message: new.tenant_message,
            landlord_message: new.landlord_message,
            willing_without_viewing: None,
            decline_reason: None,
            created_at: now,
            updated_at: now,
        };
        t.viewings.push(viewing.clone());
        Ok(viewing)
    }

    async fn get_viewing(&self, id: Uuid) -> AppResult<Option<ViewingRequest>> {
        let t = self.tables.read().await;
        Ok(t.viewings.iter().find(|v| v.id == id).cloned())
    }

    async fn list_viewings_for_pair(
        &self,
        property_id: Uuid,
        tenant_id: Uuid,
    ) -> AppResult<Vec<ViewingRequest>> {
        let t = self.tables.read().await;
        Ok(t.viewings
            .iter()
            .filter(|v| v.property_id == property_id && v.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn update_viewing(&self, id: Uuid, update: ViewingUpdate) -> AppResult<ViewingRequest> {
        let mut t = self.tables.write().await;
        t.check("update_viewing")?;
        let viewing = t
            .viewings
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| AppError::NotFound("Viewing request not found".to_string()))?;
        if let Some(status) = update.status {
            viewing.status = status;
        }
        if update.tenant_message.is_some() {
            viewing.tenant_message = update.tenant_message;
        }
        if update.landlord_message.is_some() {
            viewing.landlord_message = update.landlord_message;
        }
        if update.willing_without_viewing.is_some() {
            viewing.willing_without_viewing = update.willing_without_viewing;
        }
        if update.decline_reason.is_some() {
            viewing.decline_reason = update.decline_reason;
        }
        viewing.updated_at = Utc::now();
        Ok(viewing.clone())
    }

    async fn insert_lease(&self, new: NewLease) -> AppResult<Lease> {
        let mut t = self.tables.write().await;
        t.check("insert_lease")?;
        if new.application_id.is_some()
            && t.leases.iter().any(|l| l.application_id == new.application_id)
        {
            return Err(AppError::Conflict(
                "A lease already exists for this application".to_string(),
            ));
        }
        let config = new
            .config
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let now = Utc::now();
        let lease = Lease {
            id: Uuid::new_v4(),
            application_id: new.application_id,
            property_id: new.property_id,
            tenant_id: new.tenant_id,
            landlord_id: new.landlord_id,
            monthly_rent: new.monthly_rent,
            deposit_amount: new.deposit_amount,
            start_date: new.start_date,
            end_date: new.end_date,
            is_active: true,
            is_signed: false,
            config,
            landlord_signed_at: None,
            tenant_signed_at: None,
            cancellation_notice_at: None,
            cancellation_penalty: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        };
        t.leases.push(lease.clone());
        Ok(lease)
    }

    async fn get_lease(&self, id: Uuid) -> AppResult<Option<Lease>> {
        let t = self.tables.read().await;
        Ok(t.leases.iter().find(|l| l.id == id).cloned())
    }

    async fn find_lease_by_application(&self, application_id: Uuid) -> AppResult<Option<Lease>> {
        let t = self.tables.read().await;
        Ok(t.leases
            .iter()
            .find(|l| l.application_id == Some(application_id))
            .cloned())
    }

    async fn save_lease(&self, lease: &Lease) -> AppResult<Lease> {
        let mut t = self.tables.write().await;
        t.check("save_lease")?;
        let stored = t
            .leases
            .iter_mut()
            .find(|l| l.id == lease.id)
            .ok_or_else(|| AppError::NotFound("Lease not found".to_string()))?;
        stored.end_date = lease.end_date;
        stored.is_active = lease.is_active;
        stored.is_signed = lease.is_signed;
        stored.landlord_signed_at = lease.landlord_signed_at;
        stored.tenant_signed_at = lease.tenant_signed_at;
        stored.cancellation_notice_at = lease.cancellation_notice_at;
        stored.cancellation_penalty = lease.cancellation_penalty;
        stored.cancelled_by = lease.cancelled_by;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn update_lease_terms(&self, id: Uuid, terms: LeaseTerms) -> AppResult<Lease> {
        let mut t = self.tables.write().await;
        t.check("update_lease_terms")?;
        let config =
            serde_json::to_value(&terms.config).map_err(|e| AppError::Internal(e.to_string()))?;
        let lease = t
            .leases
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| AppError::NotFound("Lease not found".to_string()))?;
        lease.monthly_rent = terms.monthly_rent;
        lease.deposit_amount = terms.deposit_amount;
        lease.start_date = terms.start_date;
        lease.end_date = terms.end_date;
        lease.config = Some(config);
        lease.updated_at = Utc::now();
        Ok(lease.clone())
    }

    async fn insert_message(&self, new: NewMessage) -> AppResult<Message> {
        let mut t = self.tables.write().await;
        t.check("insert_message")?;
        let message = Message {
            id: Uuid::new_v4(),
            sender_id: new.sender_id,
            recipient_id: new.recipient_id,
            property_id: new.property_id,
            subject: new.subject,
            body: new.body,
            message_type: new.message_type,
            is_read: false,
            created_at: Utc::now(),
        };
        t.messages.push(message.clone());
        Ok(message)
    }

    async fn insert_notification(&self, new: NewNotification) -> AppResult<Notification> {
        let mut t = self.tables.write().await;
        t.check("insert_notification")?;
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            notification_type: new.notification_type,
            title: new.title,
            body: new.body,
            action_url: new.action_url,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };
        t.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn landlords_with_approved_applications(&self, tenant_id: Uuid) -> AppResult<Vec<Uuid>> {
        let t = self.tables.read().await;
        let mut ids: Vec<Uuid> = t
            .applications
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.status == ApplicationStatus::Approved)
            .filter_map(|a| t.properties.iter().find(|p| p.id == a.property_id))
            .map(|p| p.landlord_id)
            .collect();
        ids.dedup();
        Ok(ids)
    }

    async fn landlords_with_leases(&self, tenant_id: Uuid) -> AppResult<Vec<Uuid>> {
        let t = self.tables.read().await;
        Ok(t.leases
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .map(|l| l.landlord_id)
            .collect())
    }

    async fn senders_to(&self, recipient_id: Uuid) -> AppResult<Vec<Uuid>> {
        let t = self.tables.read().await;
        Ok(t.messages
            .iter()
            .filter(|m| m.recipient_id == recipient_id)
            .map(|m| m.sender_id)
            .collect())
    }

    async fn begin_workflow(&self, kind: &str, subject_id: Uuid) -> AppResult<WorkflowIntent> {
        let mut t = self.tables.write().await;
        t.check("begin_workflow")?;
        if let Some(existing) = t
            .workflows
            .iter_mut()
            .find(|w| w.kind == kind && w.subject_id == subject_id)
        {
            if existing.status != WorkflowStatus::Completed {
                existing.status = WorkflowStatus::Running;
            }
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let intent = WorkflowIntent {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            subject_id,
            status: WorkflowStatus::Running,
            completed_steps: Vec::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        t.workflows.push(intent.clone());
        Ok(intent)
    }

    async fn complete_workflow_step(&self, id: Uuid, step: &str) -> AppResult<()> {
        let mut t = self.tables.write().await;
        if let Some(intent) = t.workflows.iter_mut().find(|w| w.id == id) {
            if !intent.has_completed(step) {
                intent.completed_steps.push(step.to_string());
            }
            intent.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn finish_workflow(
        &self,
        id: Uuid,
        status: WorkflowStatus,
        last_error: Option<String>,
    ) -> AppResult<()> {
        let mut t = self.tables.write().await;
        if let Some(intent) = t.workflows.iter_mut().find(|w| w.id == id) {
            intent.status = status;
            intent.last_error = last_error;
            intent.updated_at = Utc::now();
        }
        Ok(())
    }
}
