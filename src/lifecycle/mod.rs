//! Status lifecycles for applications, viewing requests, leases and listings.
//!
//! Every status change in the service goes through `transition` here; handlers and
//! services never write a status they computed themselves.

pub mod application;
pub mod lease;
pub mod property;
pub mod viewing;

use thiserror::Error;

pub use application::{ApplicationEvent, ApplicationStatus};
pub use lease::{
    calculate_end_date, calculate_monthly_total, calculate_move_in_total, plan_cancellation,
    CancellationPlan, CancellationPolicy, ExtraCharge, LeaseConfig, LeaseConfigInput, LeaseState,
    PropertyOptions, ADMIN_FEE, CANCEL_PENALTY, LEASE_CONFIG_VERSION, NOTICE_DAYS,
};
pub use property::PropertyEvent;
pub use viewing::{resolve_viewing_request, ViewingEvent, ViewingStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("{entity} is already {state} and cannot change")]
    Terminal {
        entity: &'static str,
        state: &'static str,
    },

    #[error("cannot apply '{event}' to {entity} in state '{state}'")]
    InvalidTransition {
        entity: &'static str,
        state: &'static str,
        event: &'static str,
    },

    #[error("invalid lease configuration: {0}")]
    InvalidConfig(String),
}
