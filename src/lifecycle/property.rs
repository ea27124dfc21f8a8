use super::LifecycleError;
use crate::models::PropertyStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyEvent {
    /// An application was approved. Only the approval workflow sends this.
    Let,
    Unlist,
    Relist,
    StartMaintenance,
    EndMaintenance,
}

impl PropertyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Let => "let",
            Self::Unlist => "unlist",
            Self::Relist => "relist",
            Self::StartMaintenance => "start_maintenance",
            Self::EndMaintenance => "end_maintenance",
        }
    }
}

pub fn transition(
    status: PropertyStatus,
    event: PropertyEvent,
) -> Result<PropertyStatus, LifecycleError> {
    use PropertyEvent as E;
    use PropertyStatus as S;

    let next = match (status, event) {
        (S::Available, E::Let) => S::Occupied,
        (S::Available | S::Occupied | S::Maintenance, E::Unlist) => S::Unlisted,
        (S::Unlisted, E::Relist) => S::Available,
        (S::Available | S::Unlisted, E::StartMaintenance) => S::Maintenance,
        (S::Maintenance, E::EndMaintenance) => S::Available,
        _ => {
            return Err(LifecycleError::InvalidTransition {
                entity: "property",
                state: status.as_str(),
                event: event.name(),
            })
        }
    };
    Ok(next)
}

/// A status change a landlord asked for by name. Nobody asks their way into `occupied`;
/// that only follows an approval.
pub fn change_to(
    status: PropertyStatus,
    target: PropertyStatus,
) -> Result<PropertyStatus, LifecycleError> {
    use PropertyStatus as S;

    if status == target {
        return Ok(status);
    }
    let event = match (status, target) {
        (_, S::Unlisted) => PropertyEvent::Unlist,
        (S::Maintenance, S::Available) => PropertyEvent::EndMaintenance,
        (_, S::Available) => PropertyEvent::Relist,
        (_, S::Maintenance) => PropertyEvent::StartMaintenance,
        (_, S::Occupied) => {
            return Err(LifecycleError::InvalidTransition {
                entity: "property",
                state: status.as_str(),
                event: "occupy",
            })
        }
    };
    transition(status, event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use PropertyStatus::*;

    #[test]
    fn test_only_an_available_property_is_let() {
        assert_eq!(transition(Available, PropertyEvent::Let), Ok(Occupied));
        for status in [Occupied, Maintenance, Unlisted] {
            assert!(transition(status, PropertyEvent::Let).is_err());
        }
    }

    #[test]
    fn test_relist_only_from_unlisted() {
        assert_eq!(transition(Unlisted, PropertyEvent::Relist), Ok(Available));
        for status in [Available, Occupied, Maintenance] {
            assert!(transition(status, PropertyEvent::Relist).is_err());
        }
    }

    #[test]
    fn test_rented_property_cannot_be_reopened_directly() {
        assert!(change_to(Occupied, Available).is_err());
        assert!(change_to(Occupied, Maintenance).is_err());
        assert_eq!(change_to(Occupied, Unlisted), Ok(Unlisted));
        assert_eq!(change_to(Occupied, Occupied), Ok(Occupied));
    }

    #[test]
    fn test_nobody_asks_for_occupied() {
        for status in [Available, Maintenance, Unlisted] {
            assert_eq!(
                change_to(status, Occupied),
                Err(LifecycleError::InvalidTransition {
                    entity: "property",
                    state: status.as_str(),
                    event: "occupy",
                })
            );
        }
    }

    #[test]
    fn test_maintenance_round_trip() {
        assert_eq!(change_to(Available, Maintenance), Ok(Maintenance));
        assert_eq!(change_to(Maintenance, Available), Ok(Available));
        assert_eq!(change_to(Unlisted, Maintenance), Ok(Maintenance));
    }
}
