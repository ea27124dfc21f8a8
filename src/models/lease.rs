use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::lifecycle::{LeaseConfig, LeaseConfigInput, LeaseState};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Lease {
    pub id: Uuid,
    pub application_id: Option<Uuid>,
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub landlord_id: Uuid,
    pub monthly_rent: Decimal,
    pub deposit_amount: Option<Decimal>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    /// Set only once both parties have signed.
    pub is_signed: bool,
    pub config: Option<serde_json::Value>,
    pub landlord_signed_at: Option<DateTime<Utc>>,
    pub tenant_signed_at: Option<DateTime<Utc>>,
    pub cancellation_notice_at: Option<DateTime<Utc>>,
    pub cancellation_penalty: Option<Decimal>,
    /// Profile of the party who gave notice.
    pub cancelled_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape shared by the approval workflow and landlord-drafted leases.
#[derive(Debug, Clone)]
pub struct NewLease {
    pub application_id: Option<Uuid>,
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub landlord_id: Uuid,
    pub monthly_rent: Decimal,
    pub deposit_amount: Option<Decimal>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub config: Option<LeaseConfig>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaseResponse {
    #[serde(flatten)]
    pub lease: Lease,
    pub state: LeaseState,
    pub state_label: String,
    pub terms: Option<LeaseConfig>,
    pub property_title: Option<String>,
    pub property_status: Option<crate::models::PropertyStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLeaseRequest {
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub start_date: NaiveDate,
    /// Overrides the property's rent when set.
    pub monthly_rent: Option<Decimal>,
    pub terms: LeaseConfigInput,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MoveInBreakdown {
    pub lease_id: Uuid,
    pub base_rent: Decimal,
    pub deposit: Option<Decimal>,
    pub extras_total: Decimal,
    pub admin_fee: Decimal,
    pub move_in_total: Decimal,
    pub total_due: Decimal,
}
