use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::lifecycle::property as property_lifecycle;
use crate::lifecycle::{
    calculate_end_date, plan_cancellation, LeaseConfig, LeaseConfigInput, PropertyEvent,
};
use crate::models::{ApplicationStatus, Lease, NewLease, NotificationType, Property};
use crate::services::email_service::Mailer;
use crate::services::notification_service::NotificationService;
use crate::services::Outcome;
use crate::store::{LeaseTerms, RentalStore};

#[derive(Debug, Clone)]
pub struct DraftLease {
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub start_date: NaiveDate,
    pub monthly_rent: Option<Decimal>,
    pub terms: LeaseConfigInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signer {
    Landlord,
    Tenant,
}

pub struct LeaseService<'a> {
    store: &'a dyn RentalStore,
    notifier: NotificationService<'a>,
}

impl<'a> LeaseService<'a> {
    pub fn new(store: &'a dyn RentalStore, mailer: &'a dyn Mailer) -> Self {
        Self {
            store,
            notifier: NotificationService::new(store, mailer),
        }
    }

    /// Landlord writes up the terms for an approved tenant. The lease created at approval is
    /// filled in while nobody has signed it; otherwise a new lease is drawn up.
    pub async fn create(&self, landlord_id: Uuid, draft: DraftLease) -> AppResult<Outcome<Lease>> {
        let property = self.property(draft.property_id).await?;
        if property.landlord_id != landlord_id {
            return Err(AppError::Forbidden);
        }

        let application = self
            .store
            .find_application(property.id, draft.tenant_id)
            .await?
            .filter(|a| a.status == ApplicationStatus::Approved)
            .ok_or_else(|| {
                AppError::BadRequest(
                    "This tenant has no approved application for the property".to_string(),
                )
            })?;

        let monthly_rent = draft.monthly_rent.unwrap_or(property.rent_amount);
        let config = LeaseConfig::build(draft.terms, monthly_rent, property.deposit_amount)?;
        let end_date = calculate_end_date(draft.start_date, config.duration_months)
            .ok_or_else(|| AppError::Validation("Lease end date out of range".to_string()))?;
        let deposit_amount = if config.deposit_required {
            property.deposit_amount
        } else {
            None
        };

        let lease = match self.store.find_lease_by_application(application.id).await? {
            Some(existing) if is_untouched(&existing) => {
                self.store
                    .update_lease_terms(
                        existing.id,
                        LeaseTerms {
                            monthly_rent,
                            deposit_amount,
                            start_date: draft.start_date,
                            end_date,
                            config,
                        },
                    )
                    .await?
            }
            Some(_) => {
                return Err(AppError::Conflict(
                    "The lease for this application has already been signed or cancelled"
                        .to_string(),
                ))
            }
            None => {
                self.store
                    .insert_lease(NewLease {
                        application_id: Some(application.id),
                        property_id: property.id,
                        tenant_id: draft.tenant_id,
                        landlord_id,
                        monthly_rent,
                        deposit_amount,
                        start_date: draft.start_date,
                        end_date,
                        config: Some(config),
                    })
                    .await?
            }
        };

        tracing::info!("Lease {} drawn up for property {}", lease.id, property.id);

        let failures = self
            .notifier
            .notify(
                lease.tenant_id,
                NotificationType::Lease,
                "Lease ready to review",
                &format!("Your lease for {} is ready for you to review.", property.title),
                Some(&format!("/tenant/leases/{}", lease.id)),
            )
            .await;

        Ok(Outcome::new(lease, failures))
    }

    /// Records a signature. The landlord signs first; `is_signed` is set once both have.
    pub async fn sign(&self, user_id: Uuid, lease_id: Uuid) -> AppResult<Outcome<Lease>> {
        let mut lease = self.lease(lease_id).await?;
        let signer = self.party(&lease, user_id)?;

        if lease.cancellation_notice_at.is_some() || !lease.is_active {
            return Err(AppError::InvalidTransition(
                "a cancelled lease cannot be signed".to_string(),
            ));
        }

        let now = Utc::now();
        let counterparty = match signer {
            Signer::Landlord => {
                if lease.landlord_signed_at.is_some() {
                    return Err(AppError::Conflict(
                        "You have already signed this lease".to_string(),
                    ));
                }
                lease.landlord_signed_at = Some(now);
                lease.tenant_id
            }
            Signer::Tenant => {
                if lease.tenant_signed_at.is_some() {
                    return Err(AppError::Conflict(
                        "You have already signed this lease".to_string(),
                    ));
                }
                if lease.landlord_signed_at.is_none() {
                    return Err(AppError::InvalidTransition(
                        "the landlord has not signed this lease yet".to_string(),
                    ));
                }
                lease.tenant_signed_at = Some(now);
                lease.landlord_id
            }
        };
        lease.is_signed = lease.landlord_signed_at.is_some() && lease.tenant_signed_at.is_some();

        let lease = self.store.save_lease(&lease).await?;
        tracing::info!(
            "Lease {} signed by {:?}; fully signed: {}",
            lease.id,
            signer,
            lease.is_signed
        );

        let (title, body) = match signer {
            Signer::Landlord => (
                "Lease signed by landlord",
                "Your landlord has signed the lease. Please review and sign it.",
            ),
            Signer::Tenant => (
                "Lease signed by tenant",
                "The tenant has signed the lease. The move-in payment is now due.",
            ),
        };
        let failures = self
            .notifier
            .notify(
                counterparty,
                NotificationType::Lease,
                title,
                body,
                Some(&format!("/leases/{}", lease.id)),
            )
            .await;

        Ok(Outcome::new(lease, failures))
    }

    /// Either party gives notice. The lease ends after the notice period and, when no deposit
    /// was required, carries the cancellation penalty. The other party is told.
    pub async fn cancel(&self, user_id: Uuid, lease_id: Uuid) -> AppResult<Outcome<Lease>> {
        let mut lease = self.lease(lease_id).await?;
        let party = self.party(&lease, user_id)?;

        let config = lease
            .config
            .as_ref()
            .map(LeaseConfig::from_json)
            .transpose()?;
        let now = Utc::now();
        let plan = plan_cancellation(&lease, config.as_ref(), now.date_naive())?;

        lease.cancellation_notice_at = Some(now);
        lease.cancelled_by = Some(user_id);
        lease.end_date = plan.effective_date;
        lease.is_active = plan.is_active;
        lease.cancellation_penalty = plan.penalty;
        let lease = self.store.save_lease(&lease).await?;

        tracing::info!(
            "Lease {} cancelled by {:?}, effective {}, penalty {:?}",
            lease.id,
            party,
            lease.end_date,
            lease.cancellation_penalty
        );

        let (counterparty, link, by) = match party {
            Signer::Landlord => (
                lease.tenant_id,
                format!("/tenant/leases/{}", lease.id),
                "Your landlord has cancelled your lease",
            ),
            Signer::Tenant => (
                lease.landlord_id,
                format!("/landlord/leases/{}", lease.id),
                "Your tenant has cancelled their lease",
            ),
        };
        let body = match lease.cancellation_penalty {
            Some(penalty) => format!(
                "{}. It ends on {}. A cancellation penalty of R{} applies.",
                by, lease.end_date, penalty
            ),
            None => format!("{}. It ends on {}.", by, lease.end_date),
        };
        let failures = self
            .notifier
            .notify(
                counterparty,
                NotificationType::Lease,
                "Lease cancelled",
                &body,
                Some(&link),
            )
            .await;

        Ok(Outcome::new(lease, failures))
    }

    /// Takes the lease's property off the market.
    pub async fn unlist(&self, landlord_id: Uuid, lease_id: Uuid) -> AppResult<Property> {
        self.move_property(landlord_id, lease_id, PropertyEvent::Unlist)
            .await
    }

    /// Puts an unlisted property back on the market.
    pub async fn relist(&self, landlord_id: Uuid, lease_id: Uuid) -> AppResult<Property> {
        self.move_property(landlord_id, lease_id, PropertyEvent::Relist)
            .await
    }

    async fn move_property(
        &self,
        landlord_id: Uuid,
        lease_id: Uuid,
        event: PropertyEvent,
    ) -> AppResult<Property> {
        let property = self.lease_property(landlord_id, lease_id).await?;
        let next = property_lifecycle::transition(property.status, event)?;
        self.store
            .set_property_status(property.id, property.status, next)
            .await
    }

    /// Reads the property fresh, so the status check and the write see the same row.
    async fn lease_property(&self, landlord_id: Uuid, lease_id: Uuid) -> AppResult<Property> {
        let lease = self.lease(lease_id).await?;
        if lease.landlord_id != landlord_id {
            return Err(AppError::Forbidden);
        }
        self.property(lease.property_id).await
    }

    fn party(&self, lease: &Lease, user_id: Uuid) -> AppResult<Signer> {
        if lease.landlord_id == user_id {
            Ok(Signer::Landlord)
        } else if lease.tenant_id == user_id {
            Ok(Signer::Tenant)
        } else {
            Err(AppError::Forbidden)
        }
    }

    async fn lease(&self, id: Uuid) -> AppResult<Lease> {
        self.store
            .get_lease(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Lease not found".to_string()))
    }

    async fn property(&self, id: Uuid) -> AppResult<Property> {
        self.store
            .get_property(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Property not found".to_string()))
    }
}

fn is_untouched(lease: &Lease) -> bool {
    lease.landlord_signed_at.is_none()
        && lease.tenant_signed_at.is_none()
        && lease.cancellation_notice_at.is_none()
        && lease.is_active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{ExtraCharge, LeaseState, PropertyOptions, CANCEL_PENALTY, NOTICE_DAYS};
    use crate::models::{Profile, PropertyStatus};
    use crate::services::testing::{apply, move_in, tenant, yard, RecordingMailer, Yard};
    use crate::services::ApplicationService;
    use chrono::Duration;

    async fn approved(y: &Yard, mailer: &RecordingMailer) -> (Profile, Lease) {
        let t = tenant(&y.store, "lerato@example.co.za").await;
        let app = apply(&y.store, mailer, t.id, y.property.id).await;
        let approval = ApplicationService::new(&y.store, mailer)
            .approve(y.landlord.id, app.id)
            .await
            .unwrap()
            .value;
        (t, approval.lease)
    }

    fn terms(deposit_required: bool, duration_months: u32) -> LeaseConfigInput {
        LeaseConfigInput {
            extras: vec![ExtraCharge {
                name: "Prepaid electricity top-up".to_string(),
                amount: Decimal::from(200),
            }],
            deposit_required,
            rent_due_day: 1,
            duration_months,
            annual_increase_percent: Decimal::from(8),
            property_options: PropertyOptions {
                own_bathroom: true,
                ..PropertyOptions::default()
            },
        }
    }

    #[tokio::test]
    async fn test_landlord_signs_before_tenant() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let (t, lease) = approved(&y, &mailer).await;
        let service = LeaseService::new(&y.store, &mailer);
        let today = Utc::now().date_naive();

        assert_eq!(LeaseState::derive(&lease, false, today), LeaseState::PendingSignatures);

        let err = service.sign(t.id, lease.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let lease = service.sign(y.landlord.id, lease.id).await.unwrap().value;
        assert!(lease.landlord_signed_at.is_some());
        assert!(!lease.is_signed);
        assert_eq!(
            LeaseState::derive(&lease, false, today),
            LeaseState::LandlordSignedAwaitingTenant
        );

        let err = service.sign(y.landlord.id, lease.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let lease = service.sign(t.id, lease.id).await.unwrap().value;
        assert!(lease.tenant_signed_at.is_some());
        assert!(lease.is_signed);
        assert_eq!(
            LeaseState::derive(&lease, false, today),
            LeaseState::SignedPendingPayment
        );
        assert_eq!(LeaseState::derive(&lease, true, today), LeaseState::Active);

        let stranger = tenant(&y.store, "sipho@example.co.za").await;
        let err = service.sign(stranger.id, lease.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn test_cancel_with_deposit_has_no_penalty() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let (t, lease) = approved(&y, &mailer).await;
        let service = LeaseService::new(&y.store, &mailer);

        let cancelled = service.cancel(y.landlord.id, lease.id).await.unwrap().value;
        let today = Utc::now().date_naive();
        assert!(cancelled.cancellation_notice_at.is_some());
        assert!(!cancelled.is_active);
        assert_eq!(cancelled.cancellation_penalty, None);
        // the notice period may straddle midnight between the two clock reads
        let expected = today + Duration::days(NOTICE_DAYS);
        assert!(cancelled.end_date == expected || cancelled.end_date == expected - Duration::days(1));
        assert_eq!(
            LeaseState::derive(&cancelled, true, today),
            LeaseState::CancellationPending
        );
        assert_eq!(
            LeaseState::derive(&cancelled, true, cancelled.end_date),
            LeaseState::Cancelled
        );

        let err = service.cancel(y.landlord.id, lease.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        let err = service.sign(t.id, lease.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_cancel_without_deposit_carries_penalty() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let (t, lease) = approved(&y, &mailer).await;
        let service = LeaseService::new(&y.store, &mailer);

        let drafted = service
            .create(
                y.landlord.id,
                DraftLease {
                    property_id: y.property.id,
                    tenant_id: t.id,
                    start_date: move_in(),
                    monthly_rent: None,
                    terms: terms(false, 6),
                },
            )
            .await
            .unwrap()
            .value;
        assert_eq!(drafted.id, lease.id);

        let stranger = tenant(&y.store, "sipho@example.co.za").await;
        let err = service.cancel(stranger.id, lease.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let cancelled = service.cancel(y.landlord.id, lease.id).await.unwrap().value;
        assert_eq!(cancelled.cancellation_penalty, Some(Decimal::from(CANCEL_PENALTY)));
        assert_eq!(cancelled.cancelled_by, Some(y.landlord.id));

        let notices = y.store.notifications_for(t.id).await;
        assert!(notices.iter().any(|n| n.title == "Lease cancelled"
            && n.body.as_deref().map_or(false, |b| b.contains("penalty"))));
    }

    #[tokio::test]
    async fn test_tenant_gives_notice() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let (t, lease) = approved(&y, &mailer).await;
        let service = LeaseService::new(&y.store, &mailer);
        service.sign(y.landlord.id, lease.id).await.unwrap();
        service.sign(t.id, lease.id).await.unwrap();

        let outcome = service.cancel(t.id, lease.id).await.unwrap();
        assert!(!outcome.is_degraded());
        let cancelled = outcome.value;
        assert_eq!(cancelled.cancelled_by, Some(t.id));
        assert!(!cancelled.is_active);
        assert!(cancelled.cancellation_notice_at.is_some());
        // approval lease carries no terms, so the deposit counts as taken
        assert_eq!(cancelled.cancellation_penalty, None);

        let to_landlord = y.store.notifications_for(y.landlord.id).await;
        assert!(to_landlord.iter().any(|n| n.title == "Lease cancelled"
            && n.body.as_deref().map_or(false, |b| b.contains("Your tenant"))));
        let to_tenant = y.store.notifications_for(t.id).await;
        assert!(!to_tenant.iter().any(|n| n.title == "Lease cancelled"));

        let err = service.cancel(y.landlord.id, lease.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_create_fills_in_the_approval_lease() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let (t, lease) = approved(&y, &mailer).await;
        assert!(lease.config.is_none());

        let drafted = LeaseService::new(&y.store, &mailer)
            .create(
                y.landlord.id,
                DraftLease {
                    property_id: y.property.id,
                    tenant_id: t.id,
                    start_date: move_in(),
                    monthly_rent: Some(Decimal::from(2700)),
                    terms: terms(true, 6),
                },
            )
            .await
            .unwrap()
            .value;

        assert_eq!(drafted.id, lease.id);
        assert_eq!(y.store.leases_for_application(lease.application_id.unwrap()).await.len(), 1);
        assert_eq!(drafted.monthly_rent, Decimal::from(2700));
        assert_eq!(drafted.deposit_amount, Some(Decimal::from(2500)));
        assert_eq!(drafted.end_date, NaiveDate::from_ymd_opt(2026, 9, 1).unwrap());

        let config = LeaseConfig::from_json(drafted.config.as_ref().unwrap()).unwrap();
        assert_eq!(config.monthly_total, Decimal::from(2900));
        assert_eq!(config.move_in_total, Decimal::from(2700 + 2500 + 200));
        assert!(config.property_options.own_bathroom);
    }

    #[tokio::test]
    async fn test_create_refused_once_signed() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let (t, lease) = approved(&y, &mailer).await;
        let service = LeaseService::new(&y.store, &mailer);
        service.sign(y.landlord.id, lease.id).await.unwrap();

        let err = service
            .create(
                y.landlord.id,
                DraftLease {
                    property_id: y.property.id,
                    tenant_id: t.id,
                    start_date: move_in(),
                    monthly_rent: None,
                    terms: terms(true, 12),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_needs_an_approved_tenant_and_valid_terms() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let t = tenant(&y.store, "lerato@example.co.za").await;
        apply(&y.store, &mailer, t.id, y.property.id).await;
        let service = LeaseService::new(&y.store, &mailer);

        let draft = |input: LeaseConfigInput| DraftLease {
            property_id: y.property.id,
            tenant_id: t.id,
            start_date: move_in(),
            monthly_rent: None,
            terms: input,
        };

        let err = service.create(y.landlord.id, draft(terms(true, 12))).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = service.create(t.id, draft(terms(true, 12))).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let app = y.store.find_application(y.property.id, t.id).await.unwrap().unwrap();
        ApplicationService::new(&y.store, &mailer)
            .approve(y.landlord.id, app.id)
            .await
            .unwrap();
        let err = service.create(y.landlord.id, draft(terms(true, 5))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unlist_and_relist() {
        let y = yard().await;
        let mailer = RecordingMailer::new();
        let (t, lease) = approved(&y, &mailer).await;
        let service = LeaseService::new(&y.store, &mailer);

        let err = service.unlist(t.id, lease.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let property = service.unlist(y.landlord.id, lease.id).await.unwrap();
        assert_eq!(property.status, PropertyStatus::Unlisted);
        assert!(!property.is_active);

        let err = service.unlist(y.landlord.id, lease.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let property = service.relist(y.landlord.id, lease.id).await.unwrap();
        assert_eq!(property.status, PropertyStatus::Available);
        assert!(property.is_active);

        let err = service.relist(y.landlord.id, lease.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }
}
