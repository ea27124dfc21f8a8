use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::LifecycleError;
use crate::models::ViewingRequest;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "viewing_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ViewingStatus {
    Requested,
    Pending,
    Scheduled,
    Confirmed,
    Completed,
    Declined,
    Cancelled,
    ApplicationSubmitted,
    AwaitingLandlordDecision,
}

impl Default for ViewingStatus {
    fn default() -> Self {
        Self::Requested
    }
}

impl ViewingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Declined => "declined",
            Self::Cancelled => "cancelled",
            Self::ApplicationSubmitted => "application_submitted",
            Self::AwaitingLandlordDecision => "awaiting_landlord_decision",
        }
    }

    /// `requested` and `pending` are the same state under two names.
    pub fn is_awaiting_landlord(&self) -> bool {
        matches!(self, Self::Requested | Self::Pending)
    }

    /// `confirmed` and `scheduled` are the same state under two names.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Scheduled)
    }

    pub fn is_open(&self) -> bool {
        self.is_awaiting_landlord() || self.is_confirmed()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Declined | Self::Cancelled | Self::ApplicationSubmitted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewingEvent {
    Confirm,
    Decline,
    MarkDone,
    Cancel,
    TenantAccepted,
    TenantDeclined { willing_without_viewing: bool },
    ApplicationSubmitted,
}

impl ViewingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Decline => "decline",
            Self::MarkDone => "mark_done",
            Self::Cancel => "cancel",
            Self::TenantAccepted => "tenant_accepted",
            Self::TenantDeclined { .. } => "tenant_declined",
            Self::ApplicationSubmitted => "application_submitted",
        }
    }
}

pub fn transition(current: ViewingStatus, event: ViewingEvent) -> Result<ViewingStatus, LifecycleError> {
    use ViewingEvent as E;
    use ViewingStatus as S;

    if current.is_terminal() {
        return Err(LifecycleError::Terminal {
            entity: "viewing request",
            state: current.as_str(),
        });
    }

    let next = match event {
        E::Confirm | E::TenantAccepted if current.is_awaiting_landlord() => S::Confirmed,
        E::Decline if current.is_awaiting_landlord() => S::Declined,
        E::MarkDone if current.is_confirmed() => S::Completed,
        E::Cancel if current.is_open() => S::Cancelled,
        E::TenantDeclined {
            willing_without_viewing,
        } if current.is_open() => {
            if willing_without_viewing {
                S::AwaitingLandlordDecision
            } else {
                S::Cancelled
            }
        }
        E::ApplicationSubmitted if current.is_confirmed() => S::ApplicationSubmitted,
        _ => {
            return Err(LifecycleError::InvalidTransition {
                entity: "viewing request",
                state: current.as_str(),
                event: event.name(),
            })
        }
    };

    Ok(next)
}

/// Picks the viewing request an application refers to: the newest one for the
/// `(property, tenant)` pair. Equal timestamps resolve to the later entry.
pub fn resolve_viewing_request(
    requests: &[ViewingRequest],
    property_id: Uuid,
    tenant_id: Uuid,
) -> Option<&ViewingRequest> {
    requests
        .iter()
        .filter(|r| r.property_id == property_id && r.tenant_id == tenant_id)
        .max_by_key(|r| r.created_at)
}
