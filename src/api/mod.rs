pub mod applications;
pub mod auth;
pub mod favorites;
pub mod leases;
pub mod messages;
pub mod notifications;
pub mod payments;
pub mod properties;
pub mod users;
pub mod viewings;

use axum::Router;
use serde::Serialize;
use serde_json::{json, Value};

use crate::middleware::AppState;
use crate::services::Outcome;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/users", users::routes())
        .nest("/properties", properties::routes())
        .nest("/applications", applications::routes())
        .nest("/viewings", viewings::routes())
        .nest("/leases", leases::routes())
        .nest("/messages", messages::routes())
        .nest("/notifications", notifications::routes())
        .nest("/payments", payments::routes())
        .nest("/favorites", favorites::routes())
}

/// Envelope for mutations with best-effort side effects. `degraded` is true when the
/// main change went through but a notification or email did not.
pub(crate) fn outcome_json<T: Serialize>(outcome: Outcome<T>) -> Value {
    json!({
        "success": true,
        "degraded": outcome.is_degraded(),
        "data": outcome.value,
        "side_effects_failed": outcome.side_effects_failed,
    })
}
