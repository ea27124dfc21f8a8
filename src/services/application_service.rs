use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::lifecycle::{
    self, calculate_end_date, resolve_viewing_request, ApplicationEvent, PropertyEvent,
    ViewingEvent,
};
use crate::models::{
    Application, ApplicationStatus, Lease, NewLease, NotificationType, Property, PropertyStatus,
    ViewingRequest, ViewingStatus, WorkflowIntent, WorkflowStatus,
};
use crate::services::email_service::Mailer;
use crate::services::notification_service::NotificationService;
use crate::services::viewing_service::{parse_viewing_time, trimmed};
use crate::services::Outcome;
use crate::store::{NewApplication, NewViewingRequest, RentalStore, ViewingUpdate};

pub const APPROVAL_WORKFLOW: &str = "approve_application";
pub const SIBLING_REJECTION_REASON: &str = "Property has been rented to another applicant";
pub const DEFAULT_LEASE_MONTHS: i32 = 12;

/// Approval steps, in the order they run. The first two are written by one store call.
pub mod steps {
    pub const MARK_APPROVED: &str = "mark_approved";
    pub const MARK_PROPERTY_OCCUPIED: &str = "mark_property_occupied";
    pub const CREATE_LEASE: &str = "create_lease";
    pub const NOTIFY_TENANT: &str = "notify_tenant";
    pub const REJECT_SIBLINGS: &str = "reject_siblings";

    pub const ALL: [&str; 5] = [
        MARK_APPROVED,
        MARK_PROPERTY_OCCUPIED,
        CREATE_LEASE,
        NOTIFY_TENANT,
        REJECT_SIBLINGS,
    ];
}

/// Attempts at moving a sibling application that keeps changing underneath us.
const SIBLING_REJECT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct SubmitApplication {
    pub property_id: Uuid,
    pub proposed_move_in_date: NaiveDate,
    pub lease_duration_requested: Option<i32>,
    pub additional_occupants: Option<i32>,
    pub additional_occupants_details: Option<String>,
    pub tenant_notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Approval {
    pub application: Application,
    pub lease: Lease,
    pub property: Property,
    pub rejected_application_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ApplicationDetail {
    pub application: Application,
    pub property: Property,
    pub viewing_request: Option<ViewingRequest>,
}

pub struct ApplicationService<'a> {
    store: &'a dyn RentalStore,
    notifier: NotificationService<'a>,
}

impl<'a> ApplicationService<'a> {
    pub fn new(store: &'a dyn RentalStore, mailer: &'a dyn Mailer) -> Self {
        Self {
            store,
            notifier: NotificationService::new(store, mailer),
        }
    }

    pub async fn submit(
        &self,
        tenant_id: Uuid,
        input: SubmitApplication,
    ) -> AppResult<Outcome<Application>> {
        let property = self.property(input.property_id).await?;
        if property.status != PropertyStatus::Available || !property.is_active {
            return Err(AppError::Conflict(
                "This property is no longer accepting applications".to_string(),
            ));
        }
        if property.landlord_id == tenant_id {
            return Err(AppError::BadRequest(
                "You cannot apply for your own property".to_string(),
            ));
        }

        let application = self
            .store
            .insert_application(NewApplication {
                tenant_id,
                property_id: property.id,
                proposed_move_in_date: input.proposed_move_in_date,
                lease_duration_requested: input
                    .lease_duration_requested
                    .unwrap_or(DEFAULT_LEASE_MONTHS),
                additional_occupants: input.additional_occupants.unwrap_or(0),
                additional_occupants_details: trimmed(input.additional_occupants_details),
                tenant_notes: trimmed(input.tenant_notes),
            })
            .await?;

        // A confirmed viewing for this pair is now superseded by the application.
        let viewings = self
            .store
            .list_viewings_for_pair(property.id, tenant_id)
            .await?;
        if let Some(viewing) = resolve_viewing_request(&viewings, property.id, tenant_id) {
            if viewing.status.is_confirmed() {
                let status = lifecycle::viewing::transition(
                    viewing.status,
                    ViewingEvent::ApplicationSubmitted,
                )?;
                self.store
                    .update_viewing(
                        viewing.id,
                        ViewingUpdate {
                            status: Some(status),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
        }

        tracing::info!(
            "Application {} submitted for property {} by {}",
            application.id,
            property.id,
            tenant_id
        );

        let failures = self
            .notifier
            .notify(
                property.landlord_id,
                NotificationType::Application,
                "New rental application",
                &format!("You have a new application for {}.", property.title),
                Some(&format!("/landlord/applications/{}", application.id)),
            )
            .await;

        Ok(Outcome::new(application, failures))
    }

    /// Landlord proposes a viewing from an application. Creates a `requested` viewing and
    /// moves the application to `viewing_requested`.
    pub async fn schedule_viewing(
        &self,
        landlord_id: Uuid,
        application_id: Uuid,
        requested_date: NaiveDate,
        requested_time: Option<&str>,
        message: Option<String>,
    ) -> AppResult<Outcome<(Application, ViewingRequest)>> {
        let (application, property) = self.landlord_application(landlord_id, application_id).await?;
        let next = lifecycle::application::transition(
            application.status,
            ApplicationEvent::RequestViewing,
        )?;
        let requested_time = parse_viewing_time(requested_time)?;

        let application = self
            .store
            .update_application_status(application.id, application.status, next, None)
            .await?;
        let viewing = self
            .store
            .insert_viewing(NewViewingRequest {
                property_id: property.id,
                tenant_id: application.tenant_id,
                requested_date,
                requested_time,
                status: ViewingStatus::Requested,
                tenant_message: None,
                landlord_message: trimmed(message),
            })
            .await?;

        let failures = self
            .notifier
            .notify(
                application.tenant_id,
                NotificationType::Viewing,
                "Viewing proposed",
                &format!(
                    "The landlord of {} proposed a viewing on {} at {}.",
                    property.title,
                    viewing.requested_date,
                    viewing.requested_time.format("%H:%M")
                ),
                Some("/tenant/viewings"),
            )
            .await;

        Ok(Outcome::new((application, viewing), failures))
    }

    /// Approves an application and carries out everything that follows from it.
    ///
    /// Progress is recorded in a workflow intent. If a core step fails, the intent is left
    /// `failed` and calling `approve` again resumes after the last completed step.
    /// Notification problems do not fail the approval; they come back in the outcome.
    pub async fn approve(
        &self,
        landlord_id: Uuid,
        application_id: Uuid,
    ) -> AppResult<Outcome<Approval>> {
        let (application, property) = self.landlord_application(landlord_id, application_id).await?;

        if application.status != ApplicationStatus::Approved {
            lifecycle::application::transition(application.status, ApplicationEvent::Approve)?;
            lifecycle::property::transition(property.status, PropertyEvent::Let).map_err(|_| {
                AppError::Conflict("This property is no longer available".to_string())
            })?;
        }

        let intent = self
            .store
            .begin_workflow(APPROVAL_WORKFLOW, application.id)
            .await?;
        if intent.status == WorkflowStatus::Completed {
            return Err(AppError::InvalidTransition(
                "application is already approved".to_string(),
            ));
        }
        if !intent.completed_steps.is_empty() {
            tracing::info!(
                "Resuming approval of {} after steps {:?}",
                application.id,
                intent.completed_steps
            );
        }

        match self.run_approval(&intent, application, property).await {
            Ok(outcome) => {
                let last_error = outcome
                    .is_degraded()
                    .then(|| outcome.side_effects_failed.join("; "));
                self.store
                    .finish_workflow(intent.id, WorkflowStatus::Completed, last_error)
                    .await?;
                tracing::info!(
                    "Application {} approved; lease {}, {} sibling(s) rejected",
                    outcome.value.application.id,
                    outcome.value.lease.id,
                    outcome.value.rejected_application_ids.len()
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("Approval of {} stopped: {}", application_id, e);
                self.store
                    .finish_workflow(intent.id, WorkflowStatus::Failed, Some(e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }

    async fn run_approval(
        &self,
        intent: &WorkflowIntent,
        application: Application,
        property: Property,
    ) -> AppResult<Outcome<Approval>> {
        let mut failures = Vec::new();

        // Approval and the property claim land together, so two approvals racing for one
        // property cannot both get through.
        let (application, property) = if application.status == ApplicationStatus::Approved {
            (application, property)
        } else {
            lifecycle::application::transition(application.status, ApplicationEvent::Approve)?;
            self.store
                .approve_application(application.id, application.status, property.id)
                .await?
        };
        self.store
            .complete_workflow_step(intent.id, steps::MARK_APPROVED)
            .await?;
        self.store
            .complete_workflow_step(intent.id, steps::MARK_PROPERTY_OCCUPIED)
            .await?;

        // Lease creation is keyed on the application, so a retry finds the earlier lease.
        let lease = match self.store.find_lease_by_application(application.id).await? {
            Some(lease) => lease,
            None => {
                let months = u32::try_from(application.lease_duration_requested)
                    .map_err(|_| AppError::Validation("Invalid lease duration".to_string()))?;
                let start_date = application.proposed_move_in_date;
                let end_date = calculate_end_date(start_date, months)
                    .ok_or_else(|| AppError::Validation("Lease end date out of range".to_string()))?;
                self.store
                    .insert_lease(NewLease {
                        application_id: Some(application.id),
                        property_id: property.id,
                        tenant_id: application.tenant_id,
                        landlord_id: property.landlord_id,
                        monthly_rent: property.rent_amount,
                        deposit_amount: property.deposit_amount,
                        start_date,
                        end_date,
                        config: None,
                    })
                    .await?
            }
        };
        self.store
            .complete_workflow_step(intent.id, steps::CREATE_LEASE)
            .await?;

        if !intent.has_completed(steps::NOTIFY_TENANT) {
            failures.extend(
                self.notifier
                    .notify(
                        application.tenant_id,
                        NotificationType::Application,
                        "Application approved",
                        &format!(
                            "Your application for {} has been approved. Your lease is ready for review.",
                            property.title
                        ),
                        Some(&format!("/tenant/leases/{}", lease.id)),
                    )
                    .await,
            );
            self.store
                .complete_workflow_step(intent.id, steps::NOTIFY_TENANT)
                .await?;
        }

        let mut rejected_application_ids = Vec::new();
        let siblings = self
            .store
            .list_applications_for_property(property.id)
            .await?;
        for sibling in siblings
            .into_iter()
            .filter(|a| a.id != application.id && !a.status.is_terminal())
        {
            let Some(sibling) = self.reject_sibling(sibling).await? else {
                continue;
            };
            rejected_application_ids.push(sibling.id);

            failures.extend(
                self.notifier
                    .notify(
                        sibling.tenant_id,
                        NotificationType::Application,
                        "Application unsuccessful",
                        &format!("{}: {}.", property.title, SIBLING_REJECTION_REASON),
                        None,
                    )
                    .await,
            );
        }
        self.store
            .complete_workflow_step(intent.id, steps::REJECT_SIBLINGS)
            .await?;

        Ok(Outcome::new(
            Approval {
                application,
                lease,
                property,
                rejected_application_ids,
            },
            failures,
        ))
    }

    /// Rejects a competing application, re-reading it when it moved since it was listed.
    /// `None` when it reached a final state on its own.
    async fn reject_sibling(&self, mut sibling: Application) -> AppResult<Option<Application>> {
        for _ in 0..SIBLING_REJECT_ATTEMPTS {
            if sibling.status.is_terminal() {
                return Ok(None);
            }
            let next = lifecycle::application::transition(sibling.status, ApplicationEvent::Reject)?;
            match self
                .store
                .update_application_status(
                    sibling.id,
                    sibling.status,
                    next,
                    Some(SIBLING_REJECTION_REASON.to_string()),
                )
                .await
            {
                Ok(rejected) => return Ok(Some(rejected)),
                Err(AppError::Conflict(_)) => sibling = self.application(sibling.id).await?,
                Err(e) => return Err(e),
            }
        }
        Err(AppError::Conflict(format!(
            "Application {} kept changing while being rejected",
            sibling.id
        )))
    }

    /// Rejects an application from any open state. A blank reason is stored as none.
    pub async fn reject(
        &self,
        landlord_id: Uuid,
        application_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<Outcome<Application>> {
        let (application, property) = self.landlord_application(landlord_id, application_id).await?;
        let next = lifecycle::application::transition(application.status, ApplicationEvent::Reject)?;
        let reason = trimmed(reason);
        let application = self
            .store
            .update_application_status(application.id, application.status, next, reason.clone())
            .await?;

        tracing::info!("Application {} rejected", application.id);

        let body = match &reason {
            Some(r) => format!("Your application for {} was not successful: {}", property.title, r),
            None => format!("Your application for {} was not successful.", property.title),
        };
        let failures = self
            .notifier
            .notify(
                application.tenant_id,
                NotificationType::Application,
                "Application unsuccessful",
                &body,
                None,
            )
            .await;

        Ok(Outcome::new(application, failures))
    }

    /// The application with the viewing request it refers to (the newest one for the pair).
    /// Visible to the applicant and to the property's landlord.
    pub async fn detail(&self, user_id: Uuid, application_id: Uuid) -> AppResult<ApplicationDetail> {
        let application = self.application(application_id).await?;
        let property = self.property(application.property_id).await?;
        if application.tenant_id != user_id && property.landlord_id != user_id {
            return Err(AppError::Forbidden);
        }

        let viewings = self
            .store
            .list_viewings_for_pair(application.property_id, application.tenant_id)
            .await?;
        let viewing_request =
            resolve_viewing_request(&viewings, application.property_id, application.tenant_id)
                .cloned();

        Ok(ApplicationDetail {
            application,
            property,
            viewing_request,
        })
    }

    async fn application(&self, id: Uuid) -> AppResult<Application> {
        self.store
            .get_application(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))
    }

    async fn property(&self, id: Uuid) -> AppResult<Property> {
        self.store
            .get_property(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Property not found".to_string()))
    }

    async fn landlord_application(
        &self,
        landlord_id: Uuid,
        application_id: Uuid,
    ) -> AppResult<(Application, Property)> {
        let application = self.application(application_id).await?;
        let property = self.property(application.property_id).await?;
        if property.landlord_id != landlord_id {
            return Err(AppError::Forbidden);
        }
        Ok((application, property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{apply, move_in, tenant, yard, RecordingMailer};
    use crate::store::MemoryStore;
    use std::collections::HashSet;

    async fn titles_for(store: &MemoryStore, user_id: Uuid, title: &str) -> usize {
        store
            .notifications_for(user_id)
            .await
            .iter()
            .filter(|n| n.title == title)
            .count()
    }

    #[tokio::test]
    async fn test_approve_creates_lease_and_rejects_other_applicants() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let winner = tenant(&y.store, "lerato@example.co.za").await;
        let runner_up = tenant(&y.store, "sipho@example.co.za").await;
        let late = tenant(&y.store, "naledi@example.co.za").await;
        let withdrawn = tenant(&y.store, "bongani@example.co.za").await;

        let chosen = apply(&y.store, &mailer, winner.id, y.property.id).await;
        let second = apply(&y.store, &mailer, runner_up.id, y.property.id).await;
        let third = apply(&y.store, &mailer, late.id, y.property.id).await;
        let already_rejected = apply(&y.store, &mailer, withdrawn.id, y.property.id).await;

        let service = ApplicationService::new(&y.store, &mailer);
        service
            .reject(y.landlord.id, already_rejected.id, Some("Incomplete documents".to_string()))
            .await
            .unwrap();

        let outcome = service.approve(y.landlord.id, chosen.id).await.unwrap();
        assert!(!outcome.is_degraded());
        let approval = outcome.value;

        assert_eq!(approval.application.status, ApplicationStatus::Approved);
        assert_eq!(approval.property.status, PropertyStatus::Occupied);
        assert!(!approval.property.is_active);

        let rejected: HashSet<Uuid> = approval.rejected_application_ids.iter().copied().collect();
        assert_eq!(rejected, HashSet::from([second.id, third.id]));

        for id in [second.id, third.id] {
            let app = y.store.get_application(id).await.unwrap().unwrap();
            assert_eq!(app.status, ApplicationStatus::Rejected);
            assert_eq!(app.rejection_reason.as_deref(), Some(SIBLING_REJECTION_REASON));
        }
        let untouched = y.store.get_application(already_rejected.id).await.unwrap().unwrap();
        assert_eq!(untouched.rejection_reason.as_deref(), Some("Incomplete documents"));

        let lease = approval.lease;
        assert_eq!(lease.application_id, Some(chosen.id));
        assert_eq!(lease.start_date, move_in());
        assert_eq!(lease.end_date, NaiveDate::from_ymd_opt(2027, 3, 1).unwrap());
        assert_eq!(lease.monthly_rent, y.property.rent_amount);
        assert_eq!(lease.deposit_amount, y.property.deposit_amount);
        assert!(lease.is_active);
        assert!(!lease.is_signed);

        assert_eq!(titles_for(&y.store, winner.id, "Application approved").await, 1);
        assert_eq!(titles_for(&y.store, runner_up.id, "Application unsuccessful").await, 1);
        assert_eq!(mailer.sent_to("lerato@example.co.za"), vec!["Application approved"]);

        let intent = y.store.workflow_for(APPROVAL_WORKFLOW, chosen.id).await.unwrap();
        assert_eq!(intent.status, WorkflowStatus::Completed);
        for step in steps::ALL {
            assert!(intent.has_completed(step), "step {} not recorded", step);
        }
    }

    #[tokio::test]
    async fn test_approve_resumes_after_a_failed_step() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let winner = tenant(&y.store, "lerato@example.co.za").await;
        let other = tenant(&y.store, "sipho@example.co.za").await;
        let chosen = apply(&y.store, &mailer, winner.id, y.property.id).await;
        let sibling = apply(&y.store, &mailer, other.id, y.property.id).await;
        let service = ApplicationService::new(&y.store, &mailer);

        y.store.fail_on("insert_lease").await;
        let err = service.approve(y.landlord.id, chosen.id).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        let intent = y.store.workflow_for(APPROVAL_WORKFLOW, chosen.id).await.unwrap();
        assert_eq!(intent.status, WorkflowStatus::Failed);
        assert!(intent.has_completed(steps::MARK_APPROVED));
        assert!(intent.has_completed(steps::MARK_PROPERTY_OCCUPIED));
        assert!(!intent.has_completed(steps::CREATE_LEASE));
        assert!(y.store.leases_for_application(chosen.id).await.is_empty());
        let property = y.store.get_property(y.property.id).await.unwrap().unwrap();
        assert_eq!(property.status, PropertyStatus::Occupied);
        let pending_sibling = y.store.get_application(sibling.id).await.unwrap().unwrap();
        assert_eq!(pending_sibling.status, ApplicationStatus::Pending);

        y.store.clear_failures().await;
        let approval = service.approve(y.landlord.id, chosen.id).await.unwrap().value;

        let leases = y.store.leases_for_application(chosen.id).await;
        assert_eq!(leases.len(), 1);
        assert_eq!(approval.lease.id, leases[0].id);
        assert_eq!(approval.property.status, PropertyStatus::Occupied);
        assert_eq!(approval.rejected_application_ids, vec![sibling.id]);
        // the tenant is told once, not once per attempt
        assert_eq!(titles_for(&y.store, winner.id, "Application approved").await, 1);

        let intent = y.store.workflow_for(APPROVAL_WORKFLOW, chosen.id).await.unwrap();
        assert_eq!(intent.status, WorkflowStatus::Completed);
        assert_eq!(intent.last_error, None);
    }

    #[tokio::test]
    async fn test_approve_reports_failed_email_without_failing() {
        let y = yard().await;
        let mailer = RecordingMailer::failing();
        let winner = tenant(&y.store, "lerato@example.co.za").await;
        let chosen = apply(&y.store, &mailer, winner.id, y.property.id).await;

        let outcome = ApplicationService::new(&y.store, &mailer)
            .approve(y.landlord.id, chosen.id)
            .await
            .unwrap();

        assert!(outcome.is_degraded());
        assert!(outcome.side_effects_failed[0].contains("lerato@example.co.za"));
        assert_eq!(outcome.value.application.status, ApplicationStatus::Approved);
        // in-app copy still stored
        assert_eq!(titles_for(&y.store, winner.id, "Application approved").await, 1);

        let intent = y.store.workflow_for(APPROVAL_WORKFLOW, chosen.id).await.unwrap();
        assert_eq!(intent.status, WorkflowStatus::Completed);
        assert!(intent.last_error.is_some());
    }

    #[tokio::test]
    async fn test_approve_reports_failed_notification_insert() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let winner = tenant(&y.store, "lerato@example.co.za").await;
        let chosen = apply(&y.store, &mailer, winner.id, y.property.id).await;

        y.store.fail_on("insert_notification").await;
        let outcome = ApplicationService::new(&y.store, &mailer)
            .approve(y.landlord.id, chosen.id)
            .await
            .unwrap();

        assert!(outcome.is_degraded());
        assert_eq!(outcome.value.property.status, PropertyStatus::Occupied);
        assert_eq!(mailer.sent_to("lerato@example.co.za"), vec!["Application approved"]);
    }

    #[tokio::test]
    async fn test_approve_twice_is_refused() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let winner = tenant(&y.store, "lerato@example.co.za").await;
        let chosen = apply(&y.store, &mailer, winner.id, y.property.id).await;
        let service = ApplicationService::new(&y.store, &mailer);

        service.approve(y.landlord.id, chosen.id).await.unwrap();
        let err = service.approve(y.landlord.id, chosen.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(y.store.leases_for_application(chosen.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_approvals_let_one_tenant_in() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let first = tenant(&y.store, "lerato@example.co.za").await;
        let second = tenant(&y.store, "sipho@example.co.za").await;
        let a = apply(&y.store, &mailer, first.id, y.property.id).await;
        let b = apply(&y.store, &mailer, second.id, y.property.id).await;
        y.store.interleave_calls();

        let service = ApplicationService::new(&y.store, &mailer);
        let (ra, rb) = tokio::join!(
            service.approve(y.landlord.id, a.id),
            service.approve(y.landlord.id, b.id)
        );

        let (winner, loser) = match (ra, rb) {
            (Ok(won), Err(lost)) => ((won, a.id), (lost, b.id)),
            (Err(lost), Ok(won)) => ((won, b.id), (lost, a.id)),
            (ra, rb) => panic!("expected exactly one approval, got {:?} and {:?}", ra.is_ok(), rb.is_ok()),
        };
        assert!(matches!(winner.0.value.application.status, ApplicationStatus::Approved));
        assert!(matches!(loser.0, AppError::Conflict(_)));

        let winning = y.store.get_application(winner.1).await.unwrap().unwrap();
        let losing = y.store.get_application(loser.1).await.unwrap().unwrap();
        assert_eq!(winning.status, ApplicationStatus::Approved);
        assert_eq!(losing.status, ApplicationStatus::Rejected);

        assert_eq!(y.store.leases_for_application(winner.1).await.len(), 1);
        assert!(y.store.leases_for_application(loser.1).await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_status_write_is_refused() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let applicant = tenant(&y.store, "lerato@example.co.za").await;
        let app = apply(&y.store, &mailer, applicant.id, y.property.id).await;
        ApplicationService::new(&y.store, &mailer)
            .approve(y.landlord.id, app.id)
            .await
            .unwrap();

        // a writer that still believes the application is pending
        let err = y
            .store
            .update_application_status(
                app.id,
                ApplicationStatus::Pending,
                ApplicationStatus::AwaitingLandlordDecision,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let app = y.store.get_application(app.id).await.unwrap().unwrap();
        assert_eq!(app.status, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn test_approve_needs_an_available_property() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let winner = tenant(&y.store, "lerato@example.co.za").await;
        let chosen = apply(&y.store, &mailer, winner.id, y.property.id).await;

        y.store
            .set_property_status(y.property.id, PropertyStatus::Available, PropertyStatus::Unlisted)
            .await
            .unwrap();
        let err = ApplicationService::new(&y.store, &mailer)
            .approve(y.landlord.id, chosen.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(y.store.leases_for_application(chosen.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_only_the_landlord_decides() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let applicant = tenant(&y.store, "lerato@example.co.za").await;
        let chosen = apply(&y.store, &mailer, applicant.id, y.property.id).await;
        let service = ApplicationService::new(&y.store, &mailer);

        let err = service.approve(applicant.id, chosen.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = service.reject(applicant.id, chosen.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn test_reject_stores_trimmed_reason_and_is_final() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let applicant = tenant(&y.store, "lerato@example.co.za").await;
        let app = apply(&y.store, &mailer, applicant.id, y.property.id).await;
        let service = ApplicationService::new(&y.store, &mailer);

        let rejected = service
            .reject(y.landlord.id, app.id, Some("   ".to_string()))
            .await
            .unwrap()
            .value;
        assert_eq!(rejected.status, ApplicationStatus::Rejected);
        assert_eq!(rejected.rejection_reason, None);

        let err = service.reject(y.landlord.id, app.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        let err = service.approve(y.landlord.id, app.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_submit_guards() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let applicant = tenant(&y.store, "lerato@example.co.za").await;
        apply(&y.store, &mailer, applicant.id, y.property.id).await;
        let service = ApplicationService::new(&y.store, &mailer);

        let input = SubmitApplication {
            property_id: y.property.id,
            proposed_move_in_date: move_in(),
            lease_duration_requested: None,
            additional_occupants: None,
            additional_occupants_details: None,
            tenant_notes: None,
        };

        let err = service.submit(applicant.id, input.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = service.submit(y.landlord.id, input.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        y.store
            .set_property_status(
                y.property.id,
                PropertyStatus::Available,
                PropertyStatus::Maintenance,
            )
            .await
            .unwrap();
        let newcomer = tenant(&y.store, "sipho@example.co.za").await;
        let err = service.submit(newcomer.id, input).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_submit_defaults_and_notifies_landlord() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let applicant = tenant(&y.store, "lerato@example.co.za").await;

        let outcome = ApplicationService::new(&y.store, &mailer)
            .submit(
                applicant.id,
                SubmitApplication {
                    property_id: y.property.id,
                    proposed_move_in_date: move_in(),
                    lease_duration_requested: None,
                    additional_occupants: None,
                    additional_occupants_details: Some("  ".to_string()),
                    tenant_notes: None,
                },
            )
            .await
            .unwrap();

        let app = outcome.value;
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert_eq!(app.lease_duration_requested, DEFAULT_LEASE_MONTHS);
        assert_eq!(app.additional_occupants, 0);
        assert_eq!(app.additional_occupants_details, None);
        assert_eq!(titles_for(&y.store, y.landlord.id, "New rental application").await, 1);
    }

    #[tokio::test]
    async fn test_schedule_viewing_moves_application_on() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let applicant = tenant(&y.store, "lerato@example.co.za").await;
        let app = apply(&y.store, &mailer, applicant.id, y.property.id).await;
        let service = ApplicationService::new(&y.store, &mailer);

        let (app, viewing) = service
            .schedule_viewing(
                y.landlord.id,
                app.id,
                NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
                Some("15:00"),
                Some("Ring the bell at the gate".to_string()),
            )
            .await
            .unwrap()
            .value;

        assert_eq!(app.status, ApplicationStatus::ViewingRequested);
        assert_eq!(viewing.status, ViewingStatus::Requested);
        assert_eq!(viewing.tenant_id, applicant.id);
        assert_eq!(viewing.landlord_message.as_deref(), Some("Ring the bell at the gate"));

        let detail = service.detail(applicant.id, app.id).await.unwrap();
        assert_eq!(detail.viewing_request.map(|v| v.id), Some(viewing.id));

        // a second proposal is not valid from viewing_requested
        let err = service
            .schedule_viewing(
                y.landlord.id,
                app.id,
                NaiveDate::from_ymd_opt(2026, 2, 21).unwrap(),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_detail_hidden_from_strangers() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let applicant = tenant(&y.store, "lerato@example.co.za").await;
        let stranger = tenant(&y.store, "sipho@example.co.za").await;
        let app = apply(&y.store, &mailer, applicant.id, y.property.id).await;

        let service = ApplicationService::new(&y.store, &mailer);
        assert!(service.detail(y.landlord.id, app.id).await.is_ok());
        let err = service.detail(stranger.id, app.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }
}
