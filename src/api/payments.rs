use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::lifecycle::{LeaseConfig, ADMIN_FEE};
use crate::middleware::{is_landlord, AppState, AuthUser};
use crate::models::{
    CreatePaymentRequest, Lease, MoveInBreakdown, Payment, PaymentStatus, PaymentsQuery,
};
use crate::store::{PgStore, RentalStore};
use crate::utils::validators::{page_bounds, sanitize_string};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments).post(record_payment))
        .route("/:id/confirm", post(confirm_payment))
        .route("/mark-overdue", post(mark_overdue))
        .route("/move-in/:lease_id", get(move_in_breakdown))
}

async fn load_lease(state: &AppState, id: Uuid) -> AppResult<Lease> {
    PgStore::new(state.pool.clone())
        .get_lease(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lease not found".to_string()))
}

/// What a tenant owes before moving in. Leases without stored terms fall back to rent plus deposit.
pub fn breakdown_for(lease: &Lease) -> AppResult<MoveInBreakdown> {
    let admin_fee = Decimal::from(ADMIN_FEE);

    let breakdown = match lease.config.as_ref().map(LeaseConfig::from_json).transpose()? {
        Some(config) => MoveInBreakdown {
            lease_id: lease.id,
            base_rent: lease.monthly_rent,
            deposit: if config.deposit_required {
                lease.deposit_amount
            } else {
                None
            },
            extras_total: config.extras_total(),
            admin_fee: config.admin_fee,
            move_in_total: config.move_in_total,
            total_due: config.move_in_total + config.admin_fee,
        },
        None => {
            let move_in_total = lease.monthly_rent + lease.deposit_amount.unwrap_or_default();
            MoveInBreakdown {
                lease_id: lease.id,
                base_rent: lease.monthly_rent,
                deposit: lease.deposit_amount,
                extras_total: Decimal::ZERO,
                admin_fee,
                move_in_total,
                total_due: move_in_total + admin_fee,
            }
        }
    };
    Ok(breakdown)
}

/// Whether `paid` covers the move-in amount the tenant was shown.
pub fn move_in_settled(lease: &Lease, paid: Decimal) -> AppResult<bool> {
    Ok(paid >= breakdown_for(lease)?.total_due)
}

/// Tenant records a payment they made; it stays pending until the landlord confirms it
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    tag = "payments",
    security(("bearer_auth" = [])),
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = Payment),
        (status = 403, description = "Lease belongs to another tenant"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn record_payment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<Json<Payment>> {
    auth_user.require_tenant()?;
    payload.validate()?;

    if payload.amount <= Decimal::ZERO {
        return Err(AppError::Validation("Amount must be positive".to_string()));
    }

    if let Some(lease_id) = payload.lease_id {
        let lease = load_lease(&state, lease_id).await?;
        if lease.tenant_id != auth_user.user_id {
            return Err(AppError::Forbidden);
        }
    }

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (
            tenant_id, lease_id, amount, due_date, status, payment_type,
            transaction_reference, proof_of_payment
        )
        VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(auth_user.user_id)
    .bind(payload.lease_id)
    .bind(payload.amount)
    .bind(payload.due_date)
    .bind(payload.payment_type.unwrap_or_default())
    .bind(payload.transaction_reference.as_deref().map(sanitize_string))
    .bind(payload.proof_of_payment.as_deref().map(sanitize_string))
    .fetch_one(&state.pool)
    .await?;

    tracing::info!("Payment {} recorded by {}", payment.id, auth_user.user_id);
    Ok(Json(payment))
}

/// Tenant: own payments. Landlord: payments on their leases.
#[utoipa::path(
    get,
    path = "/api/v1/payments",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(PaymentsQuery),
    responses(
        (status = 200, description = "Payments", body = Vec<Payment>),
        (status = 422, description = "Unknown status filter")
    )
)]
pub async fn list_payments(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<PaymentsQuery>,
) -> AppResult<Json<Vec<Payment>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            serde_json::from_value::<PaymentStatus>(Value::String(s.to_string()))
                .map_err(|_| AppError::Validation(format!("Unknown payment status '{}'", s)))
        })
        .transpose()?;
    let (limit, offset) = page_bounds(query.page, query.limit);

    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT pay.* FROM payments pay
        LEFT JOIN leases l ON l.id = pay.lease_id
        WHERE (CASE WHEN $1 THEN l.landlord_id = $2 ELSE pay.tenant_id = $2 END)
          AND ($3::payment_status IS NULL OR pay.status = $3)
          AND ($4::uuid IS NULL OR pay.lease_id = $4)
        ORDER BY pay.created_at DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(is_landlord(&auth_user.role))
    .bind(auth_user.user_id)
    .bind(status)
    .bind(query.lease_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(payments))
}

/// Landlord confirms a payment was received
#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/confirm",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment marked paid", body = Payment),
        (status = 403, description = "Not the landlord on this lease"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already paid")
    )
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Payment>> {
    auth_user.require_landlord()?;

    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    let lease_id = payment.lease_id.ok_or(AppError::Forbidden)?;
    let lease = load_lease(&state, lease_id).await?;
    if lease.landlord_id != auth_user.user_id {
        return Err(AppError::Forbidden);
    }
    if payment.status == PaymentStatus::Paid {
        return Err(AppError::Conflict("Payment is already confirmed".to_string()));
    }

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        UPDATE payments
        SET status = 'paid', paid_date = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(Utc::now().date_naive())
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(payment))
}

/// Landlord flags pending payments past their due date as overdue
#[utoipa::path(
    post,
    path = "/api/v1/payments/mark-overdue",
    tag = "payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Number of payments marked overdue")
    )
)]
pub async fn mark_overdue(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Value>> {
    auth_user.require_landlord()?;

    let result = sqlx::query(
        r#"
        UPDATE payments pay
        SET status = 'overdue', updated_at = NOW()
        FROM leases l
        WHERE l.id = pay.lease_id
          AND l.landlord_id = $1
          AND pay.status = 'pending'
          AND pay.due_date < $2
        "#,
    )
    .bind(auth_user.user_id)
    .bind(Utc::now().date_naive())
    .execute(&state.pool)
    .await?;

    if result.rows_affected() > 0 {
        tracing::info!(
            "Marked {} payments overdue for landlord {}",
            result.rows_affected(),
            auth_user.user_id
        );
    }

    Ok(Json(json!({
        "success": true,
        "count": result.rows_affected()
    })))
}

/// Move-in amount for a lease, including the admin fee
#[utoipa::path(
    get,
    path = "/api/v1/payments/move-in/{lease_id}",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("lease_id" = Uuid, Path, description = "Lease ID")),
    responses(
        (status = 200, description = "Move-in breakdown", body = MoveInBreakdown),
        (status = 403, description = "Not a party to the lease"),
        (status = 404, description = "Not found")
    )
)]
pub async fn move_in_breakdown(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(lease_id): Path<Uuid>,
) -> AppResult<Json<MoveInBreakdown>> {
    let lease = load_lease(&state, lease_id).await?;
    if lease.tenant_id != auth_user.user_id && lease.landlord_id != auth_user.user_id {
        return Err(AppError::Forbidden);
    }

    Ok(Json(breakdown_for(&lease)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{LeaseConfigInput, PropertyOptions};
    use crate::models::Lease;
    use chrono::NaiveDate;

    fn lease(rent: i64, deposit: Option<i64>, config: Option<serde_json::Value>) -> Lease {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        Lease {
            id: Uuid::new_v4(),
            application_id: None,
            property_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            landlord_id: Uuid::new_v4(),
            monthly_rent: Decimal::from(rent),
            deposit_amount: deposit.map(Decimal::from),
            start_date: start,
            end_date: NaiveDate::from_ymd_opt(2027, 3, 1).unwrap(),
            is_active: true,
            is_signed: false,
            config,
            landlord_signed_at: None,
            tenant_signed_at: None,
            cancellation_notice_at: None,
            cancellation_penalty: None,
            cancelled_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_breakdown_without_terms_uses_rent_and_deposit() {
        let b = breakdown_for(&lease(2500, Some(2500), None)).unwrap();
        assert_eq!(b.move_in_total, Decimal::from(5000));
        assert_eq!(b.admin_fee, Decimal::from(ADMIN_FEE));
        assert_eq!(b.total_due, Decimal::from(5000 + ADMIN_FEE));
        assert_eq!(b.extras_total, Decimal::ZERO);
    }

    #[test]
    fn test_move_in_needs_the_admin_fee_too() {
        let lease = lease(2500, Some(2500), None);
        let breakdown = breakdown_for(&lease).unwrap();

        assert!(!move_in_settled(&lease, breakdown.move_in_total).unwrap());
        assert!(move_in_settled(&lease, breakdown.total_due).unwrap());
        assert!(move_in_settled(&lease, Decimal::from(6000)).unwrap());
    }

    #[test]
    fn test_breakdown_follows_stored_terms() {
        let input = LeaseConfigInput {
            extras: vec![],
            deposit_required: false,
            rent_due_day: 1,
            duration_months: 12,
            annual_increase_percent: Decimal::ZERO,
            property_options: PropertyOptions::default(),
        };
        let config = LeaseConfig::build(input, Decimal::from(3000), Some(Decimal::from(3000)))
            .unwrap();
        let json = serde_json::to_value(&config).unwrap();

        let b = breakdown_for(&lease(3000, Some(3000), Some(json))).unwrap();
        assert_eq!(b.deposit, None);
        assert_eq!(b.move_in_total, Decimal::from(3000));
        assert_eq!(b.total_due, Decimal::from(3000 + ADMIN_FEE));
    }
}
