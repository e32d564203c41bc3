pub mod booking;
pub mod events;
pub mod identity;
pub mod repository;
pub mod trip;

pub use booking::{Booking, BookingError, BookingStatus};
pub use identity::{Caller, IdentityContext, UserProfile, ADMIN_ROLE};
pub use repository::{SeatStore, Stores, StoreError, StoreResult};
pub use trip::{SeatCounters, Trip, TripChanges, TripError};

use uuid::Uuid;

/// Every failure an engine operation can surface to its caller.
///
/// All variants except [`EngineError::StorageFailure`] are business-rule rejections and
/// are terminal for the call: retrying the same request yields the same answer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("Not permitted")]
    Forbidden,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("An active booking already exists for trip {trip_id}")]
    DuplicateActiveBooking { trip_id: Uuid },
    #[error("Drivers cannot book a seat on their own trip")]
    SelfBookingForbidden,
    #[error("No seats available on trip {0}")]
    NoSeatsAvailable(Uuid),
    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(Uuid),
    #[error("Cannot reduce seats below the {booked} seat(s) already booked")]
    CapacityBelowBookings { booked: u32 },
    #[error("Seat accounting violation on trip {trip_id}")]
    SeatAccountingViolation { trip_id: Uuid },
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl EngineError {
    pub fn trip_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "Trip", id }
    }

    pub fn booking_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "Booking", id }
    }

    /// Only storage failures are worth retrying; everything else is a verdict on the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageFailure(_))
    }
}

impl From<TripError> for EngineError {
    fn from(err: TripError) -> Self {
        match err {
            TripError::InvalidSeatCount(count) => {
                Self::InvalidArgument(format!("total seats must be at least 1, got {count}"))
            }
            TripError::BlankAddress(field) => {
                Self::InvalidArgument(format!("{field} address must not be blank"))
            }
            TripError::CapacityBelowBookings { booked, .. } => {
                Self::CapacityBelowBookings { booked }
            }
            TripError::SeatOverflow { trip_id } => Self::SeatAccountingViolation { trip_id },
            TripError::InconsistentCounters { .. } => {
                Self::StorageFailure(StoreError::Corrupt(err.to_string()))
            }
        }
    }
}

impl From<BookingError> for EngineError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::AlreadyCancelled(id) => Self::AlreadyCancelled(id),
            BookingError::UnknownStatus(_) => {
                Self::StorageFailure(StoreError::Corrupt(err.to_string()))
            }
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_failures_are_retryable() {
        assert!(EngineError::StorageFailure(StoreError::Backend("timeout".into())).is_retryable());
        assert!(!EngineError::Forbidden.is_retryable());
        assert!(!EngineError::NoSeatsAvailable(Uuid::new_v4()).is_retryable());
    }

    #[test]
    fn test_capacity_message_states_booked_count() {
        let err = EngineError::from(TripError::CapacityBelowBookings { booked: 3, requested: 2 });
        assert_eq!(err.to_string(), "Cannot reduce seats below the 3 seat(s) already booked");
    }

    #[test]
    fn test_forbidden_does_not_leak_reason() {
        assert_eq!(EngineError::Forbidden.to_string(), "Not permitted");
    }
}
