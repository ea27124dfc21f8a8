use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "property_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    Available,
    Occupied,
    Maintenance,
    Unlisted,
}

impl Default for PropertyStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl PropertyStatus {
    /// A property is listed (active) exactly when it is available.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Available)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Maintenance => "maintenance",
            Self::Unlisted => "unlisted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Property {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub address: String,
    pub township: Option<String>,
    pub rent_amount: Decimal,
    pub deposit_amount: Option<Decimal>,
    pub water_included: bool,
    pub electricity_included: bool,
    pub gas_included: bool,
    pub is_active: bool,
    pub status: PropertyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn utilities_included(&self) -> bool {
        self.water_included || self.electricity_included || self.gas_included
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub property_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePropertyRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 3, max = 255))]
    pub address: String,
    pub township: Option<String>,
    pub rent_amount: Decimal,
    pub deposit_amount: Option<Decimal>,
    #[serde(default)]
    pub water_included: bool,
    #[serde(default)]
    pub electricity_included: bool,
    #[serde(default)]
    pub gas_included: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePropertyRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub township: Option<String>,
    pub rent_amount: Option<Decimal>,
    pub deposit_amount: Option<Decimal>,
    pub water_included: Option<bool>,
    pub electricity_included: Option<bool>,
    pub gas_included: Option<bool>,
    pub status: Option<PropertyStatus>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct PropertiesQuery {
    pub township: Option<String>,
    pub min_rent: Option<Decimal>,
    pub max_rent: Option<Decimal>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
