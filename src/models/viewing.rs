use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::lifecycle::ViewingStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ViewingRequest {
    pub id: Uuid,
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub requested_date: NaiveDate,
    #[schema(value_type = String, example = "10:00:00")]
    pub requested_time: NaiveTime,
    pub status: ViewingStatus,
    pub tenant_message: Option<String>,
    pub landlord_message: Option<String>,
    pub willing_without_viewing: Option<bool>,
    pub decline_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateViewingRequest {
    pub property_id: Uuid,
    pub requested_date: NaiveDate,
    pub requested_time: Option<String>,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct LandlordViewingActionRequest {
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TenantDeclineViewingRequest {
    pub willing_without_viewing: bool,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct ViewingsQuery {
    pub status: Option<String>,
    pub property_id: Option<Uuid>,
}
