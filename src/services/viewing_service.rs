use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::lifecycle::{
    self, resolve_viewing_request, ApplicationEvent, LifecycleError, ViewingEvent,
};
use crate::models::{
    Application, NotificationType, Property, PropertyStatus, ViewingRequest, ViewingStatus,
};
use crate::services::email_service::Mailer;
use crate::services::notification_service::NotificationService;
use crate::services::Outcome;
use crate::store::{NewViewingRequest, RentalStore, ViewingUpdate};

const DEFAULT_VIEWING_TIME: (u32, u32) = (10, 0);

/// Parses `HH:MM` or `HH:MM:SS`; a missing time means 10:00.
pub fn parse_viewing_time(value: Option<&str>) -> AppResult<NaiveTime> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => NaiveTime::from_hms_opt(DEFAULT_VIEWING_TIME.0, DEFAULT_VIEWING_TIME.1, 0)
            .ok_or_else(|| AppError::Internal("invalid default viewing time".to_string())),
        Some(v) => NaiveTime::parse_from_str(v, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(v, "%H:%M:%S"))
            .map_err(|_| AppError::Validation(format!("Invalid viewing time '{}'", v))),
    }
}

/// A viewing change together with the application it dragged along, if any.
#[derive(Debug, Clone)]
pub struct ViewingChange {
    pub viewing: ViewingRequest,
    pub application: Option<Application>,
}

pub struct ViewingService<'a> {
    store: &'a dyn RentalStore,
    notifier: NotificationService<'a>,
}

impl<'a> ViewingService<'a> {
    pub fn new(store: &'a dyn RentalStore, mailer: &'a dyn Mailer) -> Self {
        Self {
            store,
            notifier: NotificationService::new(store, mailer),
        }
    }

    /// Tenant asks to see a property before (or after) applying.
    pub async fn request(
        &self,
        tenant_id: Uuid,
        property_id: Uuid,
        requested_date: NaiveDate,
        requested_time: Option<&str>,
        message: Option<String>,
    ) -> AppResult<Outcome<ViewingChange>> {
        let property = self.property(property_id).await?;
        if property.status != PropertyStatus::Available || !property.is_active {
            return Err(AppError::Conflict(
                "This property is not available for viewings".to_string(),
            ));
        }
        if property.landlord_id == tenant_id {
            return Err(AppError::BadRequest(
                "You cannot request a viewing of your own property".to_string(),
            ));
        }

        let existing = self
            .store
            .list_viewings_for_pair(property_id, tenant_id)
            .await?;
        if existing.iter().any(|v| v.status.is_open()) {
            return Err(AppError::Conflict(
                "You already have an open viewing request for this property".to_string(),
            ));
        }

        let viewing = self
            .store
            .insert_viewing(NewViewingRequest {
                property_id,
                tenant_id,
                requested_date,
                requested_time: parse_viewing_time(requested_time)?,
                status: ViewingStatus::Requested,
                tenant_message: trimmed(message),
                landlord_message: None,
            })
            .await?;

        let application = self
            .advance_application(&viewing, ApplicationEvent::RequestViewing)
            .await?;

        tracing::info!(
            "Viewing {} requested for property {} by {}",
            viewing.id,
            property_id,
            tenant_id
        );

        let failures = self
            .notifier
            .notify(
                property.landlord_id,
                NotificationType::Viewing,
                "New viewing request",
                &format!(
                    "A tenant would like to view {} on {}.",
                    property.title, viewing.requested_date
                ),
                Some("/landlord/viewings"),
            )
            .await;

        Ok(Outcome::new(
            ViewingChange {
                viewing,
                application,
            },
            failures,
        ))
    }

    pub async fn confirm(
        &self,
        landlord_id: Uuid,
        viewing_id: Uuid,
        message: Option<String>,
    ) -> AppResult<Outcome<ViewingChange>> {
        let (viewing, _) = self.landlord_viewing(landlord_id, viewing_id).await?;
        let status = lifecycle::viewing::transition(viewing.status, ViewingEvent::Confirm)?;
        let viewing = self
            .store
            .update_viewing(
                viewing.id,
                ViewingUpdate {
                    status: Some(status),
                    landlord_message: trimmed(message),
                    ..Default::default()
                },
            )
            .await?;

        let failures = self
            .notifier
            .notify(
                viewing.tenant_id,
                NotificationType::Viewing,
                "Viewing confirmed",
                &format!(
                    "Your viewing on {} at {} has been confirmed.",
                    viewing.requested_date,
                    viewing.requested_time.format("%H:%M")
                ),
                Some("/tenant/viewings"),
            )
            .await;

        Ok(Outcome::new(
            ViewingChange {
                viewing,
                application: None,
            },
            failures,
        ))
    }

    pub async fn decline(
        &self,
        landlord_id: Uuid,
        viewing_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<Outcome<ViewingChange>> {
        let (viewing, _) = self.landlord_viewing(landlord_id, viewing_id).await?;
        let status = lifecycle::viewing::transition(viewing.status, ViewingEvent::Decline)?;
        let viewing = self
            .store
            .update_viewing(
                viewing.id,
                ViewingUpdate {
                    status: Some(status),
                    landlord_message: trimmed(reason),
                    ..Default::default()
                },
            )
            .await?;

        let failures = self
            .notifier
            .notify(
                viewing.tenant_id,
                NotificationType::Viewing,
                "Viewing declined",
                "The landlord could not accommodate your viewing request.",
                Some("/tenant/viewings"),
            )
            .await;

        Ok(Outcome::new(
            ViewingChange {
                viewing,
                application: None,
            },
            failures,
        ))
    }

    /// Landlord marks a confirmed viewing as done; the linked application moves to
    /// `awaiting_landlord_decision`.
    pub async fn mark_done(
        &self,
        landlord_id: Uuid,
        viewing_id: Uuid,
    ) -> AppResult<Outcome<ViewingChange>> {
        let (viewing, _) = self.landlord_viewing(landlord_id, viewing_id).await?;
        let status = lifecycle::viewing::transition(viewing.status, ViewingEvent::MarkDone)?;
        let viewing = self
            .store
            .update_viewing(
                viewing.id,
                ViewingUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;

        let application = self
            .advance_application(&viewing, ApplicationEvent::ViewingCompleted)
            .await?;

        Ok(Outcome::new(
            ViewingChange {
                viewing,
                application,
            },
            Vec::new(),
        ))
    }

    /// Either party may cancel an open viewing.
    pub async fn cancel(&self, user_id: Uuid, viewing_id: Uuid) -> AppResult<Outcome<ViewingChange>> {
        let viewing = self.viewing(viewing_id).await?;
        let property = self.property(viewing.property_id).await?;
        let counterparty = if viewing.tenant_id == user_id {
            property.landlord_id
        } else if property.landlord_id == user_id {
            viewing.tenant_id
        } else {
            return Err(AppError::Forbidden);
        };

        let status = lifecycle::viewing::transition(viewing.status, ViewingEvent::Cancel)?;
        let viewing = self
            .store
            .update_viewing(
                viewing.id,
                ViewingUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;

        let failures = self
            .notifier
            .notify(
                counterparty,
                NotificationType::Viewing,
                "Viewing cancelled",
                &format!("The viewing of {} has been cancelled.", property.title),
                None,
            )
            .await;

        Ok(Outcome::new(
            ViewingChange {
                viewing,
                application: None,
            },
            failures,
        ))
    }

    /// Tenant accepts a viewing the landlord proposed. The application goes to
    /// `viewing_scheduled`.
    pub async fn tenant_accept(
        &self,
        tenant_id: Uuid,
        viewing_id: Uuid,
    ) -> AppResult<Outcome<ViewingChange>> {
        let viewing = self.tenant_viewing(tenant_id, viewing_id).await?;
        let status = lifecycle::viewing::transition(viewing.status, ViewingEvent::TenantAccepted)?;
        let viewing = self
            .store
            .update_viewing(
                viewing.id,
                ViewingUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;

        let application = self
            .advance_application(&viewing, ApplicationEvent::TenantAcceptedViewing)
            .await?;

        let property = self.property(viewing.property_id).await?;
        let failures = self
            .notifier
            .notify(
                property.landlord_id,
                NotificationType::Viewing,
                "Viewing accepted",
                &format!(
                    "The tenant accepted the viewing of {} on {}.",
                    property.title, viewing.requested_date
                ),
                Some("/landlord/viewings"),
            )
            .await;

        Ok(Outcome::new(
            ViewingChange {
                viewing,
                application,
            },
            failures,
        ))
    }

    /// Tenant turns a viewing down, saying whether they would take the place unseen.
    pub async fn tenant_decline(
        &self,
        tenant_id: Uuid,
        viewing_id: Uuid,
        willing_without_viewing: bool,
        reason: Option<String>,
    ) -> AppResult<Outcome<ViewingChange>> {
        let viewing = self.tenant_viewing(tenant_id, viewing_id).await?;
        let status = lifecycle::viewing::transition(
            viewing.status,
            ViewingEvent::TenantDeclined {
                willing_without_viewing,
            },
        )?;
        let viewing = self
            .store
            .update_viewing(
                viewing.id,
                ViewingUpdate {
                    status: Some(status),
                    willing_without_viewing: Some(willing_without_viewing),
                    // The reason is only kept when the tenant walks away.
                    decline_reason: if willing_without_viewing {
                        None
                    } else {
                        trimmed(reason)
                    },
                    ..Default::default()
                },
            )
            .await?;

        let application = self
            .advance_application(
                &viewing,
                ApplicationEvent::TenantDeclinedViewing {
                    willing_without_viewing,
                },
            )
            .await?;

        let property = self.property(viewing.property_id).await?;
        let body = if willing_without_viewing {
            format!(
                "The tenant declined the viewing of {} but is willing to rent it without viewing.",
                property.title
            )
        } else {
            format!("The tenant declined the viewing of {}.", property.title)
        };
        let failures = self
            .notifier
            .notify(
                property.landlord_id,
                NotificationType::Viewing,
                "Viewing declined by tenant",
                &body,
                Some("/landlord/applications"),
            )
            .await;

        Ok(Outcome::new(
            ViewingChange {
                viewing,
                application,
            },
            failures,
        ))
    }

    /// Applies `event` to the application for the viewing's `(property, tenant)` pair, but only
    /// when this viewing is the one that pair resolves to and the event is valid for the
    /// application's current state.
    async fn advance_application(
        &self,
        viewing: &ViewingRequest,
        event: ApplicationEvent,
    ) -> AppResult<Option<Application>> {
        let Some(application) = self
            .store
            .find_application(viewing.property_id, viewing.tenant_id)
            .await?
        else {
            return Ok(None);
        };

        let viewings = self
            .store
            .list_viewings_for_pair(viewing.property_id, viewing.tenant_id)
            .await?;
        let is_current = resolve_viewing_request(&viewings, viewing.property_id, viewing.tenant_id)
            .map_or(false, |v| v.id == viewing.id);
        if !is_current {
            return Ok(None);
        }

        match lifecycle::application::transition(application.status, event) {
            Ok(next) => {
                let updated = match self
                    .store
                    .update_application_status(application.id, application.status, next, None)
                    .await
                {
                    Ok(updated) => updated,
                    Err(AppError::Conflict(_)) => {
                        tracing::warn!(
                            "Application {} changed during viewing event '{}'; left as is",
                            application.id,
                            event.name()
                        );
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                };
                tracing::info!(
                    "Application {} moved {} -> {}",
                    application.id,
                    application.status.as_str(),
                    next.as_str()
                );
                Ok(Some(updated))
            }
            Err(LifecycleError::InvalidTransition { .. }) | Err(LifecycleError::Terminal { .. }) => {
                tracing::debug!(
                    "Application {} left at {} after viewing event '{}'",
                    application.id,
                    application.status.as_str(),
                    event.name()
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn viewing(&self, id: Uuid) -> AppResult<ViewingRequest> {
        self.store
            .get_viewing(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Viewing request not found".to_string()))
    }

    async fn property(&self, id: Uuid) -> AppResult<Property> {
        self.store
            .get_property(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Property not found".to_string()))
    }

    async fn landlord_viewing(
        &self,
        landlord_id: Uuid,
        viewing_id: Uuid,
    ) -> AppResult<(ViewingRequest, Property)> {
        let viewing = self.viewing(viewing_id).await?;
        let property = self.property(viewing.property_id).await?;
        if property.landlord_id != landlord_id {
            return Err(AppError::Forbidden);
        }
        Ok((viewing, property))
    }

    async fn tenant_viewing(&self, tenant_id: Uuid, viewing_id: Uuid) -> AppResult<ViewingRequest> {
        let viewing = self.viewing(viewing_id).await?;
        if viewing.tenant_id != tenant_id {
            return Err(AppError::Forbidden);
        }
        Ok(viewing)
    }
}

pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationStatus;
    use crate::services::application_service::SubmitApplication;
    use crate::services::testing::{apply, move_in, tenant, yard, RecordingMailer};
    use crate::services::ApplicationService;

    #[test]
    fn test_parse_viewing_time_defaults_to_ten() {
        assert_eq!(
            parse_viewing_time(None).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );
        assert_eq!(
            parse_viewing_time(Some("  ")).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_viewing_time_formats() {
        assert_eq!(
            parse_viewing_time(Some("14:30")).unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap()
        );
        assert_eq!(
            parse_viewing_time(Some("09:15:00")).unwrap(),
            NaiveTime::from_hms_opt(9, 15, 0).unwrap()
        );
        assert!(parse_viewing_time(Some("half past two")).is_err());
    }

    #[test]
    fn test_trimmed_drops_blank() {
        assert_eq!(trimmed(Some("  ".to_string())), None);
        assert_eq!(trimmed(Some(" ok ".to_string())), Some("ok".to_string()));
        assert_eq!(trimmed(None), None);
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[tokio::test]
    async fn test_request_without_application() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let service = ViewingService::new(&y.store, &mailer);

        let change = service
            .request(t.id, y.property.id, day(20), Some("11:30"), Some(" Can I come after work? ".to_string()))
            .await
            .unwrap()
            .value;
        assert_eq!(change.viewing.status, ViewingStatus::Requested);
        assert_eq!(change.viewing.tenant_message.as_deref(), Some("Can I come after work?"));
        assert!(change.application.is_none());
        assert_eq!(y.store.notifications_for(y.landlord.id).await.len(), 1);

        let err = service
            .request(t.id, y.property.id, day(21), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_request_guards_property() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let service = ViewingService::new(&y.store, &mailer);

        let err = service
            .request(y.landlord.id, y.property.id, day(20), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        y.store
            .set_property_status(y.property.id, PropertyStatus::Available, PropertyStatus::Occupied)
            .await
            .unwrap();
        let err = service
            .request(t.id, y.property.id, day(20), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_request_moves_pending_application() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        apply(&y.store, &mailer, t.id, y.property.id).await;

        let change = ViewingService::new(&y.store, &mailer)
            .request(t.id, y.property.id, day(20), None, None)
            .await
            .unwrap()
            .value;
        assert_eq!(
            change.application.map(|a| a.status),
            Some(ApplicationStatus::ViewingRequested)
        );
    }

    #[tokio::test]
    async fn test_proposed_viewing_accepted_then_done() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let app = apply(&y.store, &mailer, t.id, y.property.id).await;

        let (_, viewing) = ApplicationService::new(&y.store, &mailer)
            .schedule_viewing(y.landlord.id, app.id, day(20), Some("09:00"), None)
            .await
            .unwrap()
            .value;

        let service = ViewingService::new(&y.store, &mailer);
        let accepted = service.tenant_accept(t.id, viewing.id).await.unwrap().value;
        assert_eq!(accepted.viewing.status, ViewingStatus::Confirmed);
        assert_eq!(
            accepted.application.map(|a| a.status),
            Some(ApplicationStatus::ViewingScheduled)
        );

        let err = service.mark_done(t.id, viewing.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let done = service.mark_done(y.landlord.id, viewing.id).await.unwrap().value;
        assert_eq!(done.viewing.status, ViewingStatus::Completed);
        assert_eq!(
            done.application.map(|a| a.status),
            Some(ApplicationStatus::AwaitingLandlordDecision)
        );

        let err = service.cancel(t.id, viewing.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_finished_viewing_never_reopens_an_approval() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let app = apply(&y.store, &mailer, t.id, y.property.id).await;
        let applications = ApplicationService::new(&y.store, &mailer);
        let (_, viewing) = applications
            .schedule_viewing(y.landlord.id, app.id, day(20), None, None)
            .await
            .unwrap()
            .value;
        let service = ViewingService::new(&y.store, &mailer);
        service.tenant_accept(t.id, viewing.id).await.unwrap();
        y.store.interleave_calls();

        let (done, approval) = tokio::join!(
            service.mark_done(y.landlord.id, viewing.id),
            applications.approve(y.landlord.id, app.id)
        );
        assert_eq!(done.unwrap().value.viewing.status, ViewingStatus::Completed);

        let app = y.store.get_application(app.id).await.unwrap().unwrap();
        match approval {
            Ok(_) => assert_eq!(app.status, ApplicationStatus::Approved),
            Err(e) => {
                assert!(matches!(e, AppError::Conflict(_)));
                assert_eq!(app.status, ApplicationStatus::AwaitingLandlordDecision);
            }
        }
    }

    #[tokio::test]
    async fn test_only_the_newest_viewing_moves_the_application() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let service = ViewingService::new(&y.store, &mailer);

        let stale = service
            .request(t.id, y.property.id, day(18), None, None)
            .await
            .unwrap()
            .value
            .viewing;
        let app = apply(&y.store, &mailer, t.id, y.property.id).await;
        let (app, current) = ApplicationService::new(&y.store, &mailer)
            .schedule_viewing(y.landlord.id, app.id, day(20), None, None)
            .await
            .unwrap()
            .value;
        assert_eq!(app.status, ApplicationStatus::ViewingRequested);

        service.confirm(y.landlord.id, stale.id, None).await.unwrap();
        let done = service.mark_done(y.landlord.id, stale.id).await.unwrap().value;
        assert_eq!(done.viewing.status, ViewingStatus::Completed);
        assert!(done.application.is_none());
        let unchanged = y.store.get_application(app.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, ApplicationStatus::ViewingRequested);

        let accepted = service.tenant_accept(t.id, current.id).await.unwrap().value;
        assert_eq!(
            accepted.application.map(|a| a.status),
            Some(ApplicationStatus::ViewingScheduled)
        );
    }

    #[tokio::test]
    async fn test_tenant_decline_willing_without_viewing() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let app = apply(&y.store, &mailer, t.id, y.property.id).await;
        let (_, viewing) = ApplicationService::new(&y.store, &mailer)
            .schedule_viewing(y.landlord.id, app.id, day(20), None, None)
            .await
            .unwrap()
            .value;

        let change = ViewingService::new(&y.store, &mailer)
            .tenant_decline(t.id, viewing.id, true, Some("I know the area".to_string()))
            .await
            .unwrap()
            .value;
        assert_eq!(change.viewing.status, ViewingStatus::AwaitingLandlordDecision);
        assert_eq!(change.viewing.willing_without_viewing, Some(true));
        assert_eq!(change.viewing.decline_reason, None);
        assert_eq!(
            change.application.map(|a| a.status),
            Some(ApplicationStatus::AwaitingLandlordDecision)
        );
    }

    #[tokio::test]
    async fn test_tenant_decline_walking_away() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let app = apply(&y.store, &mailer, t.id, y.property.id).await;
        let (_, viewing) = ApplicationService::new(&y.store, &mailer)
            .schedule_viewing(y.landlord.id, app.id, day(20), None, None)
            .await
            .unwrap()
            .value;

        let change = ViewingService::new(&y.store, &mailer)
            .tenant_decline(t.id, viewing.id, false, Some("Found another place".to_string()))
            .await
            .unwrap()
            .value;
        assert_eq!(change.viewing.status, ViewingStatus::Cancelled);
        assert_eq!(change.viewing.decline_reason.as_deref(), Some("Found another place"));
        assert_eq!(
            change.application.map(|a| a.status),
            Some(ApplicationStatus::ViewingDeclined)
        );
    }

    #[tokio::test]
    async fn test_application_supersedes_confirmed_viewing() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let service = ViewingService::new(&y.store, &mailer);

        let viewing = service
            .request(t.id, y.property.id, day(20), None, None)
            .await
            .unwrap()
            .value
            .viewing;
        service.confirm(y.landlord.id, viewing.id, Some("See you then".to_string())).await.unwrap();

        ApplicationService::new(&y.store, &mailer)
            .submit(
                t.id,
                SubmitApplication {
                    property_id: y.property.id,
                    proposed_move_in_date: move_in(),
                    lease_duration_requested: Some(6),
                    additional_occupants: Some(1),
                    additional_occupants_details: Some("My daughter".to_string()),
                    tenant_notes: None,
                },
            )
            .await
            .unwrap();

        let stored = y.store.get_viewing(viewing.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ViewingStatus::ApplicationSubmitted);
        assert_eq!(stored.landlord_message.as_deref(), Some("See you then"));
    }

    #[tokio::test]
    async fn test_cancel_is_for_the_two_parties() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let stranger = tenant(&y.store, "sipho@example.co.za").await;
        let service = ViewingService::new(&y.store, &mailer);

        let viewing = service
            .request(t.id, y.property.id, day(20), None, None)
            .await
            .unwrap()
            .value
            .viewing;

        let err = service.cancel(stranger.id, viewing.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = service.decline(stranger.id, viewing.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let cancelled = service.cancel(y.landlord.id, viewing.id).await.unwrap().value;
        assert_eq!(cancelled.viewing.status, ViewingStatus::Cancelled);
        assert_eq!(y.store.notifications_for(t.id).await.len(), 1);
    }
}
