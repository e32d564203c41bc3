use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::booking::Booking;
use crate::events::EventPublisher;
use crate::identity::UserProfile;
use crate::trip::{SeatCounters, Trip};

/// Failure inside a storage backend. Distinct from every business-rule error.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository trait for trip data access.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Inserts a new trip, or updates route and schedule of an existing one. Seat counters of
    /// a stored trip are only written through [`SeatStore`].
    async fn save(&self, trip: &Trip) -> StoreResult<Trip>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Trip>>;

    /// Removes the trip and every booking that references it.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    async fn find_by_driver_id(&self, driver_id: Uuid) -> StoreResult<Vec<Trip>>;

    /// Case-insensitive substring match on the destination address.
    async fn find_by_destination(&self, needle: &str) -> StoreResult<Vec<Trip>>;

    async fn find_all(&self) -> StoreResult<Vec<Trip>>;
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn save(&self, booking: &Booking) -> StoreResult<Booking>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn find_by_rider_id(&self, rider_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn find_by_trip_id(&self, trip_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn exists_active_by_trip_and_rider(
        &self,
        trip_id: Uuid,
        rider_id: Uuid,
    ) -> StoreResult<bool>;

    async fn find_all(&self) -> StoreResult<Vec<Booking>>;
}

/// Writes that move a trip's seat counters.
///
/// Every write is guarded by the counters the caller read: when the stored trip no longer
/// holds `expected`, nothing is written and the call fails with [`StoreError::Conflict`].
#[async_trait]
pub trait SeatStore: Send + Sync {
    /// Persist the trip's new counters and the booking that moved them. Both land or neither.
    async fn commit_seat_change(
        &self,
        trip: &Trip,
        expected: SeatCounters,
        booking: &Booking,
    ) -> StoreResult<(Trip, Booking)>;

    /// Persist an edited trip whose capacity may have changed.
    async fn update_capacity(&self, trip: &Trip, expected: SeatCounters) -> StoreResult<Trip>;
}

/// Read access to registered users, owned by the registration workflow
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserProfile>>;

    /// Users that are both enabled and approved.
    async fn list_enabled(&self) -> StoreResult<Vec<UserProfile>>;
}

/// Read access to existing message threads
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Unordered: `exists_between(a, b) == exists_between(b, a)`.
    async fn exists_between(&self, a: Uuid, b: Uuid) -> StoreResult<bool>;
}

/// Handles to every external collaborator the engine consumes.
#[derive(Clone)]
pub struct Stores {
    pub trips: Arc<dyn TripStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub seats: Arc<dyn SeatStore>,
    pub users: Arc<dyn UserDirectory>,
    pub conversations: Arc<dyn ConversationStore>,
    pub events: Arc<dyn EventPublisher>,
}
