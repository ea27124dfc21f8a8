use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{LeaseTerms, NewApplication, NewViewingRequest, RentalStore, ViewingUpdate};
use crate::error::{map_unique_violation, AppError, AppResult};
use crate::models::{
    Application, ApplicationStatus, Lease, Message, NewLease, NewMessage, NewNotification,
    Notification, Profile, Property, PropertyStatus, ViewingRequest, WorkflowIntent,
    WorkflowStatus,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn config_json(new: &NewLease) -> AppResult<Option<serde_json::Value>> {
    new.config
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[async_trait]
impl RentalStore for PgStore {
    async fn get_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn get_property(&self, id: Uuid) -> AppResult<Option<Property>> {
        let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(property)
    }

    async fn set_property_status(
        &self,
        id: Uuid,
        expected: PropertyStatus,
        status: PropertyStatus,
    ) -> AppResult<Property> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties
            SET status = $3, is_active = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(status)
        .bind(status.is_active())
        .fetch_optional(&self.pool)
        .await?;

        match property {
            Some(property) => Ok(property),
            None => match self.get_property(id).await? {
                Some(_) => Err(AppError::Conflict(
                    "Property status changed; reload and try again".to_string(),
                )),
                None => Err(AppError::NotFound("Property not found".to_string())),
            },
        }
    }

    async fn insert_application(&self, new: NewApplication) -> AppResult<Application> {
        sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (
                tenant_id, property_id, proposed_move_in_date, lease_duration_requested,
                additional_occupants, additional_occupants_details, tenant_notes, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(new.tenant_id)
        .bind(new.property_id)
        .bind(new.proposed_move_in_date)
        .bind(new.lease_duration_requested)
        .bind(new.additional_occupants)
        .bind(&new.additional_occupants_details)
        .bind(&new.tenant_notes)
        .bind(ApplicationStatus::Pending)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "You have already applied for this property"))
    }

    async fn get_application(&self, id: Uuid) -> AppResult<Option<Application>> {
        let application =
            sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(application)
    }

    async fn find_application(
        &self,
        property_id: Uuid,
        tenant_id: Uuid,
    ) -> AppResult<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE property_id = $1 AND tenant_id = $2",
        )
        .bind(property_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn list_applications_for_property(
        &self,
        property_id: Uuid,
    ) -> AppResult<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE property_id = $1 ORDER BY created_at",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    async fn update_application_status(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        status: ApplicationStatus,
        rejection_reason: Option<String>,
    ) -> AppResult<Application> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET status = $3, rejection_reason = COALESCE($4, rejection_reason), updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(status)
        .bind(&rejection_reason)
        .fetch_optional(&self.pool)
        .await?;

        match application {
            Some(application) => Ok(application),
            None => match self.get_application(id).await? {
                Some(_) => Err(AppError::Conflict(
                    "Application status changed; reload and try again".to_string(),
                )),
                None => Err(AppError::NotFound("Application not found".to_string())),
            },
        }
    }

    async fn approve_application(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        property_id: Uuid,
    ) -> AppResult<(Application, Property)> {
        let mut tx = self.pool.begin().await?;

        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties
            SET status = 'occupied', is_active = false, updated_at = NOW()
            WHERE id = $1 AND status = 'available'
            RETURNING *
            "#,
        )
        .bind(property_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Conflict("This property is no longer available".to_string()))?;

        let application = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET status = 'approved', updated_at = NOW()
            WHERE id = $1 AND status = $2 AND property_id = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(property_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::Conflict("Application status changed; reload and try again".to_string())
        })?;

        tx.commit().await?;
        Ok((application, property))
    }

    async fn insert_viewing(&self, new: NewViewingRequest) -> AppResult<ViewingRequest> {
        let viewing = sqlx::query_as::<_, ViewingRequest>(
            r#"
            INSERT INTO viewing_requests (
                property_id, tenant_id, requested_date, requested_time, status,
                tenant_message, landlord_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new.property_id)
        .bind(new.tenant_id)
        .bind(new.requested_date)
        .bind(new.requested_time)
        .bind(new.status)
        .bind(&new.tenant_message)
        .bind(&new.landlord_message)
        .fetch_one(&self.pool)
        .await?;
        Ok(viewing)
    }

    async fn get_viewing(&self, id: Uuid) -> AppResult<Option<ViewingRequest>> {
        let viewing =
            sqlx::query_as::<_, ViewingRequest>("SELECT * FROM viewing_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(viewing)
    }

    async fn list_viewings_for_pair(
        &self,
        property_id: Uuid,
        tenant_id: Uuid,
    ) -> AppResult<Vec<ViewingRequest>> {
        let viewings = sqlx::query_as::<_, ViewingRequest>(
            r#"
            SELECT * FROM viewing_requests
            WHERE property_id = $1 AND tenant_id = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(property_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(viewings)
    }

    async fn update_viewing(&self, id: Uuid, update: ViewingUpdate) -> AppResult<ViewingRequest> {
        sqlx::query_as::<_, ViewingRequest>(
            r#"
            UPDATE viewing_requests SET
                status = COALESCE($2, status),
                tenant_message = COALESCE($3, tenant_message),
                landlord_message = COALESCE($4, landlord_message),
                willing_without_viewing = COALESCE($5, willing_without_viewing),
                decline_reason = COALESCE($6, decline_reason),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(&update.tenant_message)
        .bind(&update.landlord_message)
        .bind(update.willing_without_viewing)
        .bind(&update.decline_reason)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Viewing request not found".to_string()))
    }

    async fn insert_lease(&self, new: NewLease) -> AppResult<Lease> {
        let config = config_json(&new)?;

        sqlx::query_as::<_, Lease>(
            r#"
            INSERT INTO leases (
                application_id, property_id, tenant_id, landlord_id, monthly_rent,
                deposit_amount, start_date, end_date, is_active, is_signed, config
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, false, $9)
            RETURNING *
            "#,
        )
        .bind(new.application_id)
        .bind(new.property_id)
        .bind(new.tenant_id)
        .bind(new.landlord_id)
        .bind(new.monthly_rent)
        .bind(new.deposit_amount)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(config)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "A lease already exists for this application"))
    }

    async fn get_lease(&self, id: Uuid) -> AppResult<Option<Lease>> {
        let lease = sqlx::query_as::<_, Lease>("SELECT * FROM leases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lease)
    }

    async fn find_lease_by_application(&self, application_id: Uuid) -> AppResult<Option<Lease>> {
        let lease = sqlx::query_as::<_, Lease>("SELECT * FROM leases WHERE application_id = $1")
            .bind(application_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lease)
    }

    async fn save_lease(&self, lease: &Lease) -> AppResult<Lease> {
        sqlx::query_as::<_, Lease>(
            r#"
            UPDATE leases SET
                end_date = $2,
                is_active = $3,
                is_signed = $4,
                landlord_signed_at = $5,
                tenant_signed_at = $6,
                cancellation_notice_at = $7,
                cancellation_penalty = $8,
                cancelled_by = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(lease.id)
        .bind(lease.end_date)
        .bind(lease.is_active)
        .bind(lease.is_signed)
        .bind(lease.landlord_signed_at)
        .bind(lease.tenant_signed_at)
        .bind(lease.cancellation_notice_at)
        .bind(lease.cancellation_penalty)
        .bind(lease.cancelled_by)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Lease not found".to_string()))
    }

    async fn update_lease_terms(&self, id: Uuid, terms: LeaseTerms) -> AppResult<Lease> {
        let config =
            serde_json::to_value(&terms.config).map_err(|e| AppError::Internal(e.to_string()))?;
        sqlx::query_as::<_, Lease>(
            r#"
            UPDATE leases SET
                monthly_rent = $2,
                deposit_amount = $3,
                start_date = $4,
                end_date = $5,
                config = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(terms.monthly_rent)
        .bind(terms.deposit_amount)
        .bind(terms.start_date)
        .bind(terms.end_date)
        .bind(config)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Lease not found".to_string()))
    }

    async fn insert_message(&self, new: NewMessage) -> AppResult<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (sender_id, recipient_id, property_id, subject, body, message_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new.sender_id)
        .bind(new.recipient_id)
        .bind(new.property_id)
        .bind(&new.subject)
        .bind(&new.body)
        .bind(new.message_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    async fn insert_notification(&self, new: NewNotification) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, notification_type, title, body, action_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.notification_type)
        .bind(&new.title)
        .bind(&new.body)
        .bind(&new.action_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(notification)
    }

    async fn landlords_with_approved_applications(&self, tenant_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT p.landlord_id
            FROM applications a
            JOIN properties p ON p.id = a.property_id
            WHERE a.tenant_id = $1 AND a.status = 'approved'
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn landlords_with_leases(&self, tenant_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT DISTINCT landlord_id FROM leases WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn senders_to(&self, recipient_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT DISTINCT sender_id FROM messages WHERE recipient_id = $1")
                .bind(recipient_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn begin_workflow(&self, kind: &str, subject_id: Uuid) -> AppResult<WorkflowIntent> {
        let intent = sqlx::query_as::<_, WorkflowIntent>(
            r#"
            INSERT INTO workflow_intents (kind, subject_id, status)
            VALUES ($1, $2, 'running')
            ON CONFLICT (kind, subject_id) DO UPDATE SET
                status = CASE
                    WHEN workflow_intents.status = 'completed' THEN workflow_intents.status
                    ELSE 'running'::workflow_status
                END,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(kind)
        .bind(subject_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(intent)
    }

    async fn complete_workflow_step(&self, id: Uuid, step: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE workflow_intents
            SET completed_steps = array_append(completed_steps, $2), updated_at = NOW()
            WHERE id = $1 AND NOT ($2 = ANY(completed_steps))
            "#,
        )
        .bind(id)
        .bind(step)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finish_workflow(
        &self,
        id: Uuid,
        status: WorkflowStatus,
        last_error: Option<String>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE workflow_intents SET status = $2, last_error = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(&last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
