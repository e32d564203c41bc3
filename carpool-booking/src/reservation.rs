use carpool_core::events::{publish_event, EventPublisher};
use carpool_core::repository::BookingStore;
use carpool_core::{Booking, BookingStatus, EngineError, EngineResult, IdentityContext};
use carpool_ledger::CapacityLedger;
use carpool_shared::events::{
    BookingCancelledEvent, SeatReservedEvent, BOOKING_CANCELLED_TOPIC, BOOKING_RESERVED_TOPIC,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Rider-facing booking use cases.
///
/// Each mutating call is one unit: it either lands completely (seat counter and booking
/// record) or leaves both untouched.
pub struct ReservationService {
    ledger: Arc<CapacityLedger>,
    bookings: Arc<dyn BookingStore>,
    events: Arc<dyn EventPublisher>,
}

impl ReservationService {
    pub fn new(
        ledger: Arc<CapacityLedger>,
        bookings: Arc<dyn BookingStore>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { ledger, bookings, events }
    }

    /// Reserve one seat on `trip_id` for the calling rider.
    #[instrument(skip(self, caller), fields(rider = ?caller.current_user_id()))]
    pub async fn reserve(
        &self,
        caller: &dyn IdentityContext,
        trip_id: Uuid,
    ) -> EngineResult<Booking> {
        let rider_id = caller.current_user_id().ok_or(EngineError::Forbidden)?;

        // Held until the booking is committed, so the duplicate check and the seat
        // decrement see the same state.
        let lease = self.ledger.acquire(trip_id).await?;

        if lease.trip().is_driven_by(rider_id) {
            return Err(EngineError::SelfBookingForbidden);
        }

        if self.bookings.exists_active_by_trip_and_rider(trip_id, rider_id).await? {
            warn!("Rider {} already holds an active booking on trip {}", rider_id, trip_id);
            return Err(EngineError::DuplicateActiveBooking { trip_id });
        }

        let (trip, booking) = lease.commit_booking(rider_id).await.inspect_err(|e| {
            if matches!(e, EngineError::NoSeatsAvailable(_)) {
                warn!("Trip {} is full", trip_id);
            }
        })?;

        info!(
            "Booking {} confirmed for rider {} on trip {} ({} seat(s) left)",
            booking.id,
            rider_id,
            trip.id,
            trip.available_seats()
        );

        let event = SeatReservedEvent {
            booking_id: booking.id,
            trip_id: trip.id,
            rider_id,
            available_seats: trip.available_seats(),
            timestamp: Utc::now().timestamp(),
        };
        let key = trip.id.to_string();
        publish_event(self.events.as_ref(), BOOKING_RESERVED_TOPIC, &key, &event).await;

        Ok(booking)
    }

    /// Cancel a booking and give its seat back. Allowed for the booking's rider and for admins.
    #[instrument(skip(self, caller), fields(requester = ?caller.current_user_id()))]
    pub async fn cancel(&self, caller: &dyn IdentityContext, booking_id: Uuid) -> EngineResult<()> {
        let requester = caller.current_user_id().ok_or(EngineError::Forbidden)?;

        let booking = self.load(booking_id).await?;
        if !booking.is_owned_by(requester) && !caller.is_admin() {
            return Err(EngineError::Forbidden);
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(EngineError::AlreadyCancelled(booking_id));
        }

        let lease = self.ledger.acquire(booking.trip_id).await?;
        // Re-read under the trip lock: a concurrent cancel may have landed in between.
        let booking = self.load(booking_id).await?;
        let (trip, cancelled) = lease.cancel_booking(booking).await?;

        info!(
            "Booking {} cancelled by {} on trip {} ({} seat(s) left)",
            cancelled.id,
            requester,
            trip.id,
            trip.available_seats()
        );

        let event = BookingCancelledEvent {
            booking_id: cancelled.id,
            trip_id: trip.id,
            cancelled_by: requester,
            available_seats: trip.available_seats(),
            timestamp: Utc::now().timestamp(),
        };
        let key = trip.id.to_string();
        publish_event(self.events.as_ref(), BOOKING_CANCELLED_TOPIC, &key, &event).await;

        Ok(())
    }

    /// Every booking of the calling rider, cancelled ones included.
    pub async fn list_mine(&self, caller: &dyn IdentityContext) -> EngineResult<Vec<Booking>> {
        let rider_id = caller.current_user_id().ok_or(EngineError::Forbidden)?;
        Ok(self.bookings.find_by_rider_id(rider_id).await?)
    }

    pub async fn list_for_trip(&self, trip_id: Uuid) -> EngineResult<Vec<Booking>> {
        Ok(self.bookings.find_by_trip_id(trip_id).await?)
    }

    /// Administrators only
    pub async fn list_all(&self, caller: &dyn IdentityContext) -> EngineResult<Vec<Booking>> {
        if !caller.is_admin() {
            return Err(EngineError::Forbidden);
        }
        Ok(self.bookings.find_all().await?)
    }

    async fn load(&self, booking_id: Uuid) -> EngineResult<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| EngineError::booking_not_found(booking_id))
    }
}
