use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Rent,
    Deposit,
    Utilities,
    Maintenance,
    Other,
}

impl Default for PaymentType {
    fn default() -> Self {
        Self::Rent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub lease_id: Option<Uuid>,
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
    pub transaction_reference: Option<String>,
    /// File name of the uploaded proof; the file itself lives elsewhere.
    pub proof_of_payment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePaymentRequest {
    pub lease_id: Option<Uuid>,
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub payment_type: Option<PaymentType>,
    #[validate(length(max = 255))]
    pub transaction_reference: Option<String>,
    #[validate(length(max = 255))]
    pub proof_of_payment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct PaymentsQuery {
    pub status: Option<String>,
    pub lease_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
