use chrono::{Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::LifecycleError;
use crate::models::Lease;

pub const NOTICE_DAYS: i64 = 20;
pub const CANCEL_PENALTY: i64 = 300;
pub const ADMIN_FEE: i64 = 375;
pub const LEASE_CONFIG_VERSION: u32 = 1;

pub const LEASE_DURATIONS: [u32; 7] = [1, 2, 3, 6, 12, 18, 24];
pub const RENT_DUE_DAYS: [u32; 3] = [1, 15, 25];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ExtraCharge {
    pub name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PropertyOptions {
    pub furnished: bool,
    pub own_bathroom: bool,
    pub own_kitchen: bool,
    pub parking_included: bool,
    pub wifi_included: bool,
    pub pets_allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct CancellationPolicy {
    pub notice_days: i64,
    pub penalty_amount: Decimal,
    pub penalty_applies_without_deposit: bool,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            notice_days: NOTICE_DAYS,
            penalty_amount: Decimal::from(CANCEL_PENALTY),
            penalty_applies_without_deposit: true,
        }
    }
}

/// Terms a landlord fills in when drawing up a lease.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaseConfigInput {
    #[serde(default)]
    pub extras: Vec<ExtraCharge>,
    pub deposit_required: bool,
    pub rent_due_day: u32,
    pub duration_months: u32,
    #[serde(default)]
    pub annual_increase_percent: Decimal,
    #[serde(default)]
    pub property_options: PropertyOptions,
}

/// Stored alongside a lease as JSON. Totals are derived from the inputs at write time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct LeaseConfig {
    pub version: u32,
    pub extras: Vec<ExtraCharge>,
    pub deposit_required: bool,
    pub rent_due_day: u32,
    pub duration_months: u32,
    pub annual_increase_percent: Decimal,
    pub property_options: PropertyOptions,
    pub move_in_total: Decimal,
    pub monthly_total: Decimal,
    pub cancellation_policy: CancellationPolicy,
    pub admin_fee: Decimal,
}

impl LeaseConfig {
    pub fn build(
        input: LeaseConfigInput,
        rent: Decimal,
        deposit: Option<Decimal>,
    ) -> Result<Self, LifecycleError> {
        validate_input(&input, rent)?;

        let deposit = if input.deposit_required { deposit } else { None };
        let move_in_total = calculate_move_in_total(rent, deposit, &input.extras);
        let monthly_total = calculate_monthly_total(rent, &input.extras);

        Ok(Self {
            version: LEASE_CONFIG_VERSION,
            cancellation_policy: CancellationPolicy {
                penalty_applies_without_deposit: !input.deposit_required,
                ..CancellationPolicy::default()
            },
            extras: input.extras,
            deposit_required: input.deposit_required,
            rent_due_day: input.rent_due_day,
            duration_months: input.duration_months,
            annual_increase_percent: input.annual_increase_percent,
            property_options: input.property_options,
            move_in_total,
            monthly_total,
            admin_fee: Decimal::from(ADMIN_FEE),
        })
    }

    /// Reads a stored configuration. Blobs written by a newer schema are refused.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, LifecycleError> {
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| LifecycleError::InvalidConfig(e.to_string()))?;
        if config.version > LEASE_CONFIG_VERSION {
            return Err(LifecycleError::InvalidConfig(format!(
                "unsupported configuration version {}",
                config.version
            )));
        }
        Ok(config)
    }

    pub fn extras_total(&self) -> Decimal {
        self.extras.iter().map(|e| e.amount).sum()
    }
}

fn validate_input(input: &LeaseConfigInput, rent: Decimal) -> Result<(), LifecycleError> {
    if rent <= Decimal::ZERO {
        return Err(LifecycleError::InvalidConfig(
            "monthly rent must be positive".to_string(),
        ));
    }
    if !RENT_DUE_DAYS.contains(&input.rent_due_day) {
        return Err(LifecycleError::InvalidConfig(format!(
            "rent due day must be one of {:?}",
            RENT_DUE_DAYS
        )));
    }
    if !LEASE_DURATIONS.contains(&input.duration_months) {
        return Err(LifecycleError::InvalidConfig(format!(
            "lease duration must be one of {:?} months",
            LEASE_DURATIONS
        )));
    }
    if input.annual_increase_percent < Decimal::ZERO
        || input.annual_increase_percent > Decimal::from(100)
    {
        return Err(LifecycleError::InvalidConfig(
            "annual increase must be between 0 and 100 percent".to_string(),
        ));
    }
    for extra in &input.extras {
        if extra.name.trim().is_empty() {
            return Err(LifecycleError::InvalidConfig(
                "extra charges need a name".to_string(),
            ));
        }
        if extra.amount < Decimal::ZERO {
            return Err(LifecycleError::InvalidConfig(format!(
                "extra charge '{}' cannot be negative",
                extra.name
            )));
        }
    }
    Ok(())
}

pub fn calculate_move_in_total(
    rent: Decimal,
    deposit: Option<Decimal>,
    extras: &[ExtraCharge],
) -> Decimal {
    deposit.unwrap_or(Decimal::ZERO) + calculate_monthly_total(rent, extras)
}

pub fn calculate_monthly_total(rent: Decimal, extras: &[ExtraCharge]) -> Decimal {
    rent + extras.iter().map(|e| e.amount).sum::<Decimal>()
}

/// Calendar-month addition; a start on the 31st lands on the last day of shorter months.
pub fn calculate_end_date(start: NaiveDate, duration_months: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(duration_months))
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, ToSchema)]
pub enum LeaseState {
    PendingSignatures,
    LandlordSignedAwaitingTenant,
    SignedPendingPayment,
    Active,
    CancellationPending,
    Cancelled,
}

impl LeaseState {
    pub fn derive(lease: &Lease, move_in_paid: bool, today: NaiveDate) -> Self {
        if lease.cancellation_notice_at.is_some() {
            return if today < lease.end_date {
                Self::CancellationPending
            } else {
                Self::Cancelled
            };
        }

        if !lease.is_signed {
            return if lease.landlord_signed_at.is_some() {
                Self::LandlordSignedAwaitingTenant
            } else {
                Self::PendingSignatures
            };
        }

        if move_in_paid {
            Self::Active
        } else {
            Self::SignedPendingPayment
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PendingSignatures => "Pending Signatures",
            Self::LandlordSignedAwaitingTenant => "Landlord Signed - Awaiting Tenant",
            Self::SignedPendingPayment => "Signed - Pending Payment",
            Self::Active => "Active",
            Self::CancellationPending => "Cancellation Pending",
            Self::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationPlan {
    pub effective_date: NaiveDate,
    pub is_active: bool,
    pub penalty: Option<Decimal>,
}

pub fn plan_cancellation(
    lease: &Lease,
    config: Option<&LeaseConfig>,
    today: NaiveDate,
) -> Result<CancellationPlan, LifecycleError> {
    if lease.cancellation_notice_at.is_some() {
        return Err(LifecycleError::Terminal {
            entity: "lease",
            state: "cancellation_pending",
        });
    }
    if !lease.is_active {
        return Err(LifecycleError::InvalidTransition {
            entity: "lease",
            state: "inactive",
            event: "cancel",
        });
    }

    let deposit_required = match config {
        Some(c) => c.deposit_required,
        None => lease.deposit_amount.map_or(false, |d| d > Decimal::ZERO),
    };

    let (notice_days, penalty_amount) = match config {
        Some(c) => (
            c.cancellation_policy.notice_days,
            c.cancellation_policy.penalty_amount,
        ),
        None => (NOTICE_DAYS, Decimal::from(CANCEL_PENALTY)),
    };

    Ok(CancellationPlan {
        effective_date: today + Duration::days(notice_days),
        is_active: false,
        penalty: (!deposit_required).then_some(penalty_amount),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn extras(amounts: &[i64]) -> Vec<ExtraCharge> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, a)| ExtraCharge {
                name: format!("extra {}", i),
                amount: Decimal::from(*a),
            })
            .collect()
    }

    fn input(deposit_required: bool, extra_amounts: &[i64]) -> LeaseConfigInput {
        LeaseConfigInput {
            extras: extras(extra_amounts),
            deposit_required,
            rent_due_day: 1,
            duration_months: 12,
            annual_increase_percent: Decimal::from(5),
            property_options: PropertyOptions::default(),
        }
    }

    fn lease(deposit: Option<Decimal>) -> Lease {
        let now = Utc::now();
        Lease {
            id: Uuid::new_v4(),
            application_id: None,
            property_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            landlord_id: Uuid::new_v4(),
            monthly_rent: Decimal::from(2500),
            deposit_amount: deposit,
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2027, 3, 1).unwrap(),
            is_active: true,
            is_signed: false,
            config: None,
            landlord_signed_at: None,
            tenant_signed_at: None,
            cancellation_notice_at: None,
            cancellation_penalty: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_totals_without_extras() {
        let rent = Decimal::from(2500);
        assert_eq!(calculate_monthly_total(rent, &[]), rent);
        assert_eq!(calculate_move_in_total(rent, None, &[]), rent);
        assert_eq!(
            calculate_move_in_total(rent, Some(Decimal::from(2500)), &[]),
            Decimal::from(5000)
        );
    }

    #[test]
    fn test_totals_with_extras() {
        let rent = Decimal::new(180050, 2);
        let charges = vec![
            ExtraCharge {
                name: "Water".to_string(),
                amount: Decimal::new(15025, 2),
            },
            ExtraCharge {
                name: "Parking".to_string(),
                amount: Decimal::from(200),
            },
        ];
        assert_eq!(calculate_monthly_total(rent, &charges), Decimal::new(215075, 2));
        assert_eq!(
            calculate_move_in_total(rent, Some(Decimal::from(1000)), &charges),
            Decimal::new(315075, 2)
        );
    }

    #[test]
    fn test_build_ignores_deposit_when_not_required() {
        let config =
            LeaseConfig::build(input(false, &[100]), Decimal::from(2000), Some(Decimal::from(2000)))
                .unwrap();
        assert_eq!(config.move_in_total, Decimal::from(2100));
        assert_eq!(config.monthly_total, Decimal::from(2100));
        assert!(config.cancellation_policy.penalty_applies_without_deposit);
        assert_eq!(config.version, LEASE_CONFIG_VERSION);
    }

    #[test]
    fn test_build_includes_required_deposit() {
        let config =
            LeaseConfig::build(input(true, &[100, 50]), Decimal::from(2000), Some(Decimal::from(1500)))
                .unwrap();
        assert_eq!(config.move_in_total, Decimal::from(3650));
        assert_eq!(config.monthly_total, Decimal::from(2150));
        assert_eq!(config.extras_total(), Decimal::from(150));
    }

    #[test]
    fn test_build_rejects_bad_terms() {
        let mut bad_day = input(true, &[]);
        bad_day.rent_due_day = 30;
        assert!(LeaseConfig::build(bad_day, Decimal::from(2000), None).is_err());

        let mut bad_duration = input(true, &[]);
        bad_duration.duration_months = 5;
        assert!(LeaseConfig::build(bad_duration, Decimal::from(2000), None).is_err());

        assert!(LeaseConfig::build(input(true, &[-1]), Decimal::from(2000), None).is_err());
        assert!(LeaseConfig::build(input(true, &[]), Decimal::ZERO, None).is_err());
    }

    #[test]
    fn test_config_json_round_trip_and_version_guard() {
        let config = LeaseConfig::build(input(true, &[10]), Decimal::from(900), None).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(LeaseConfig::from_json(&json).unwrap(), config);

        let mut future = json.clone();
        future["version"] = serde_json::json!(LEASE_CONFIG_VERSION + 1);
        assert!(LeaseConfig::from_json(&future).is_err());
    }

    #[test]
    fn test_end_date_adds_calendar_months() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert_eq!(
            calculate_end_date(start, 1),
            NaiveDate::from_ymd_opt(2026, 2, 28)
        );
        assert_eq!(
            calculate_end_date(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(), 12),
            NaiveDate::from_ymd_opt(2027, 3, 15)
        );
    }

    #[test]
    fn test_cancellation_without_deposit_carries_penalty() {
        let today = NaiveDate::from_ymd_opt(2026, 4, 10).unwrap();
        let config = LeaseConfig::build(input(false, &[]), Decimal::from(2500), None).unwrap();

        let plan = plan_cancellation(&lease(None), Some(&config), today).unwrap();
        assert_eq!(plan.effective_date, NaiveDate::from_ymd_opt(2026, 4, 30).unwrap());
        assert!(!plan.is_active);
        assert_eq!(plan.penalty, Some(Decimal::from(CANCEL_PENALTY)));
    }

    #[test]
    fn test_cancellation_with_deposit_has_no_penalty() {
        let today = NaiveDate::from_ymd_opt(2026, 4, 10).unwrap();
        let plan = plan_cancellation(&lease(Some(Decimal::from(2500))), None, today).unwrap();
        assert_eq!(plan.penalty, None);
        assert_eq!(plan.effective_date, today + Duration::days(NOTICE_DAYS));
    }

    #[test]
    fn test_cancellation_only_once() {
        let mut l = lease(None);
        l.cancellation_notice_at = Some(Utc::now());
        assert!(plan_cancellation(&l, None, Utc::now().date_naive()).is_err());
    }

    #[test]
    fn test_state_derivation() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let mut l = lease(None);
        assert_eq!(LeaseState::derive(&l, false, today), LeaseState::PendingSignatures);

        l.landlord_signed_at = Some(Utc::now());
        assert_eq!(
            LeaseState::derive(&l, false, today),
            LeaseState::LandlordSignedAwaitingTenant
        );

        l.tenant_signed_at = Some(Utc::now());
        l.is_signed = true;
        assert_eq!(LeaseState::derive(&l, false, today), LeaseState::SignedPendingPayment);
        assert_eq!(LeaseState::derive(&l, true, today), LeaseState::Active);

        l.cancellation_notice_at = Some(Utc::now());
        l.end_date = today + Duration::days(NOTICE_DAYS);
        assert_eq!(LeaseState::derive(&l, true, today), LeaseState::CancellationPending);
        assert_eq!(
            LeaseState::derive(&l, true, l.end_date),
            LeaseState::Cancelled
        );
    }
}
