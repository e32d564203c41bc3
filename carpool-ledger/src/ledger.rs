use carpool_core::repository::{SeatStore, TripStore};
use carpool_core::{Booking, EngineError, EngineResult, Trip, TripChanges, TripError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{error, warn};
use uuid::Uuid;

/// Seat accounting for trips.
///
/// The ledger is the only code path that moves a persisted trip's seat counters. Every
/// mutation runs inside a [`SeatLease`], which holds a per-trip lock from the read of
/// `available_seats` until the store has accepted or refused the change. The store writes
/// the counters and the booking as one unit, guarded by the counters read under the lease,
/// so a second engine instance on the same store cannot slip a change in between. Leases on
/// different trips never contend.
pub struct CapacityLedger {
    trips: Arc<dyn TripStore>,
    seats: Arc<dyn SeatStore>,
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl CapacityLedger {
    pub fn new(trips: Arc<dyn TripStore>, seats: Arc<dyn SeatStore>) -> Self {
        Self {
            trips,
            seats,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Take one seat if any is left. A full trip is left untouched.
    pub fn reserve_seat(trip: &mut Trip) -> bool {
        trip.take_seat()
    }

    /// Give one seat back. A release past the trip's capacity is a caller bug and is refused.
    pub fn release_seat(trip: &mut Trip) -> Result<(), TripError> {
        trip.return_seat().inspect_err(|e| {
            error!(
                "Seat release rejected for trip {} (total {}, available {}): {}",
                trip.id,
                trip.total_seats(),
                trip.available_seats(),
                e
            );
        })
    }

    /// Lock a trip and load its current state.
    ///
    /// The lock is released when the returned lease is consumed or dropped.
    pub async fn acquire(&self, trip_id: Uuid) -> EngineResult<SeatLease<'_>> {
        let guard = self.lock_for(trip_id).lock_owned().await;
        let trip = self
            .trips
            .find_by_id(trip_id)
            .await?
            .ok_or_else(|| EngineError::trip_not_found(trip_id))?;

        Ok(SeatLease {
            ledger: self,
            trip,
            _guard: guard,
        })
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn lock_for(&self, trip_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // A lock only the map references has no holder and no waiter.
        locks.retain(|id, lock| *id == trip_id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(trip_id).or_default())
    }
}

/// Exclusive access to one trip for the duration of a single seat mutation.
pub struct SeatLease<'a> {
    ledger: &'a CapacityLedger,
    trip: Trip,
    _guard: OwnedMutexGuard<()>,
}

impl SeatLease<'_> {
    /// The trip as loaded under the lock
    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    /// Take a seat and create the rider's confirmed booking as one unit.
    pub async fn commit_booking(mut self, rider_id: Uuid) -> EngineResult<(Trip, Booking)> {
        let expected = self.trip.seat_counters();
        if !CapacityLedger::reserve_seat(&mut self.trip) {
            return Err(EngineError::NoSeatsAvailable(self.trip.id));
        }

        let booking = Booking::confirmed(self.trip.id, rider_id);
        let committed = self.ledger.seats.commit_seat_change(&self.trip, expected, &booking).await;
        committed.map_err(|e| {
            warn!("Seat change on trip {} not applied: {}", self.trip.id, e);
            e.into()
        })
    }

    /// Return the booking's seat and mark the booking cancelled as one unit.
    pub async fn cancel_booking(mut self, mut booking: Booking) -> EngineResult<(Trip, Booking)> {
        if booking.trip_id != self.trip.id {
            return Err(EngineError::InvalidArgument(format!(
                "booking {} does not belong to trip {}",
                booking.id, self.trip.id
            )));
        }

        let expected = self.trip.seat_counters();
        booking.cancel()?;
        CapacityLedger::release_seat(&mut self.trip)?;

        let committed = self.ledger.seats.commit_seat_change(&self.trip, expected, &booking).await;
        committed.map_err(|e| {
            warn!("Cancellation of booking {} not applied: {}", booking.id, e);
            e.into()
        })
    }

    /// Apply an edit that may change capacity, preserving the booked seat count.
    pub async fn resize(mut self, changes: &TripChanges) -> EngineResult<Trip> {
        let expected = self.trip.seat_counters();
        self.trip.apply_changes(changes)?;
        Ok(self.ledger.seats.update_capacity(&self.trip, expected).await?)
    }

    /// Delete the trip; the store cascades to its bookings.
    pub async fn remove(self) -> EngineResult<()> {
        self.ledger.trips.delete(self.trip.id).await?;
        Ok(())
    }
}
