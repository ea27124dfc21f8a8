use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::lifecycle::ApplicationStatus;
use crate::models::ViewingRequest;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Application {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub property_id: Uuid,
    pub proposed_move_in_date: NaiveDate,
    pub lease_duration_requested: i32,
    pub additional_occupants: i32,
    pub additional_occupants_details: Option<String>,
    pub tenant_notes: Option<String>,
    pub status: ApplicationStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplicationResponse {
    #[serde(flatten)]
    pub application: Application,
    pub property_title: String,
    pub tenant_name: String,
    pub viewing_request: Option<ViewingRequest>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateApplicationRequest {
    pub property_id: Uuid,
    pub proposed_move_in_date: NaiveDate,
    #[validate(range(min = 1, max = 24))]
    pub lease_duration_requested: Option<i32>,
    #[validate(range(min = 0, max = 20))]
    pub additional_occupants: Option<i32>,
    pub additional_occupants_details: Option<String>,
    #[validate(length(max = 2000))]
    pub tenant_notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ScheduleViewingRequest {
    pub requested_date: NaiveDate,
    /// `HH:MM`, defaults to 10:00.
    pub requested_time: Option<String>,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RejectApplicationRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct ApplicationsQuery {
    pub status: Option<String>,
    pub property_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
