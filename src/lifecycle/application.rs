use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::LifecycleError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    ViewingRequested,
    ViewingScheduled,
    ViewingAccepted,
    ViewingDeclined,
    AwaitingLandlordDecision,
    Approved,
    Rejected,
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 8] = [
        Self::Pending,
        Self::ViewingRequested,
        Self::ViewingScheduled,
        Self::ViewingAccepted,
        Self::ViewingDeclined,
        Self::AwaitingLandlordDecision,
        Self::Approved,
        Self::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ViewingRequested => "viewing_requested",
            Self::ViewingScheduled => "viewing_scheduled",
            Self::ViewingAccepted => "viewing_accepted",
            Self::ViewingDeclined => "viewing_declined",
            Self::AwaitingLandlordDecision => "awaiting_landlord_decision",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Statuses from which a landlord may approve.
    pub fn is_decidable(&self) -> bool {
        matches!(
            self,
            Self::Pending
                | Self::ViewingDeclined
                | Self::ViewingScheduled
                | Self::ViewingAccepted
                | Self::AwaitingLandlordDecision
        )
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationEvent {
    RequestViewing,
    TenantAcceptedViewing,
    TenantDeclinedViewing { willing_without_viewing: bool },
    ViewingCompleted,
    Approve,
    Reject,
}

impl ApplicationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestViewing => "request_viewing",
            Self::TenantAcceptedViewing => "tenant_accepted_viewing",
            Self::TenantDeclinedViewing { .. } => "tenant_declined_viewing",
            Self::ViewingCompleted => "viewing_completed",
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

pub fn transition(
    current: ApplicationStatus,
    event: ApplicationEvent,
) -> Result<ApplicationStatus, LifecycleError> {
    use ApplicationEvent as E;
    use ApplicationStatus as S;

    if current.is_terminal() {
        return Err(LifecycleError::Terminal {
            entity: "application",
            state: current.as_str(),
        });
    }

    let next = match (current, event) {
        (S::Pending, E::RequestViewing) => S::ViewingRequested,
        (S::ViewingRequested, E::TenantAcceptedViewing) => S::ViewingScheduled,
        (
            S::ViewingRequested | S::ViewingScheduled,
            E::TenantDeclinedViewing {
                willing_without_viewing,
            },
        ) => {
            if willing_without_viewing {
                S::AwaitingLandlordDecision
            } else {
                S::ViewingDeclined
            }
        }
        (S::ViewingRequested | S::ViewingScheduled | S::ViewingAccepted, E::ViewingCompleted) => {
            S::AwaitingLandlordDecision
        }
        (state, E::Approve) if state.is_decidable() => S::Approved,
        (_, E::Reject) => S::Rejected,
        (state, event) => {
            return Err(LifecycleError::InvalidTransition {
                entity: "application",
                state: state.as_str(),
                event: event.name(),
            })
        }
    };

    Ok(next)
}
