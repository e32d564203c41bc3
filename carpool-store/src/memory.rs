use async_trait::async_trait;
use carpool_core::events::EventPublisher;
use carpool_core::repository::{
    BookingStore, ConversationStore, SeatStore, TripStore, UserDirectory,
};
use carpool_core::{Booking, SeatCounters, StoreError, StoreResult, Stores, Trip, UserProfile};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// In-process implementation of every store the engine consumes.
///
/// Records are kept in insertion order, so listings are stable across calls.
#[derive(Default)]
pub struct InMemoryStore {
    trips: RwLock<Vec<Trip>>,
    bookings: RwLock<Vec<Booking>>,
    users: RwLock<Vec<UserProfile>>,
    conversations: RwLock<HashSet<(Uuid, Uuid)>>,
    fail_trip_save: AtomicBool,
    fail_booking_save: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle this store with an event publisher.
    pub fn stores(self: &Arc<Self>, events: Arc<dyn EventPublisher>) -> Stores {
        Stores {
            trips: self.clone(),
            bookings: self.clone(),
            seats: self.clone(),
            users: self.clone(),
            conversations: self.clone(),
            events,
        }
    }

    /// Make the next trip write fail with a backend error.
    pub fn fail_next_trip_save(&self) {
        self.fail_trip_save.store(true, Ordering::SeqCst);
    }

    /// Make the next booking write fail with a backend error.
    pub fn fail_next_booking_save(&self) {
        self.fail_booking_save.store(true, Ordering::SeqCst);
    }

    pub fn insert_user(&self, user: UserProfile) -> StoreResult<UserProfile> {
        let mut users = write(&self.users)?;
        users.retain(|u| u.id != user.id);
        users.push(user.clone());
        Ok(user)
    }

    pub fn open_conversation(&self, a: Uuid, b: Uuid) -> StoreResult<()> {
        write(&self.conversations)?.insert(conversation_key(a, b));
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
}

fn injected_failure(flag: &AtomicBool, what: &str) -> StoreResult<()> {
    if flag.swap(false, Ordering::SeqCst) {
        return Err(StoreError::Backend(format!("injected {what} write failure")));
    }
    Ok(())
}

/// Mirrors the partial unique index over active bookings.
fn ensure_single_active(bookings: &[Booking], booking: &Booking) -> StoreResult<()> {
    let duplicate = booking.is_active()
        && bookings.iter().any(|b| {
            b.id != booking.id
                && b.is_active()
                && b.trip_id == booking.trip_id
                && b.rider_id == booking.rider_id
        });
    if duplicate {
        return Err(StoreError::Conflict(format!(
            "rider {} already holds an active booking on trip {}",
            booking.rider_id, booking.trip_id
        )));
    }
    Ok(())
}

/// Position of the stored trip, provided its counters still match `expected`.
fn guarded_position(trips: &[Trip], trip_id: Uuid, expected: SeatCounters) -> StoreResult<usize> {
    let index = trips
        .iter()
        .position(|t| t.id == trip_id)
        .ok_or_else(|| StoreError::Conflict(format!("trip {trip_id} does not exist")))?;
    if trips[index].seat_counters() != expected {
        return Err(StoreError::Conflict(format!(
            "seat counters of trip {trip_id} changed concurrently"
        )));
    }
    Ok(index)
}

fn conversation_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b { (a, b) } else { (b, a) }
}

fn upsert<T: Clone>(records: &mut Vec<T>, record: &T, same: impl Fn(&T) -> bool) {
    match records.iter_mut().find(|r| same(r)) {
        Some(existing) => *existing = record.clone(),
        None => records.push(record.clone()),
    }
}

#[async_trait]
impl TripStore for InMemoryStore {
    async fn save(&self, trip: &Trip) -> StoreResult<Trip> {
        injected_failure(&self.fail_trip_save, "trip")?;
        let mut trips = write(&self.trips)?;
        let Some(existing) = trips.iter_mut().find(|t| t.id == trip.id) else {
            trips.push(trip.clone());
            return Ok(trip.clone());
        };

        // Stored counters win: they only move through the seat store
        let mut merged = trip.snapshot();
        merged.total_seats = existing.total_seats();
        merged.available_seats = existing.available_seats();
        *existing = Trip::restore(merged).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(existing.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Trip>> {
        Ok(read(&self.trips)?.iter().find(|t| t.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        // Take both locks so the cascade is never observed half done
        let mut trips = write(&self.trips)?;
        let mut bookings = write(&self.bookings)?;
        trips.retain(|t| t.id != id);
        bookings.retain(|b| b.trip_id != id);
        Ok(())
    }

    async fn find_by_driver_id(&self, driver_id: Uuid) -> StoreResult<Vec<Trip>> {
        Ok(read(&self.trips)?.iter().filter(|t| t.driver_id == driver_id).cloned().collect())
    }

    async fn find_by_destination(&self, needle: &str) -> StoreResult<Vec<Trip>> {
        let needle = needle.trim().to_lowercase();
        Ok(read(&self.trips)?
            .iter()
            .filter(|t| t.destination_address.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> StoreResult<Vec<Trip>> {
        Ok(read(&self.trips)?.clone())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn save(&self, booking: &Booking) -> StoreResult<Booking> {
        injected_failure(&self.fail_booking_save, "booking")?;
        if !read(&self.trips)?.iter().any(|t| t.id == booking.trip_id) {
            return Err(StoreError::Conflict(format!("trip {} does not exist", booking.trip_id)));
        }

        let mut bookings = write(&self.bookings)?;
        ensure_single_active(&bookings, booking)?;
        upsert(&mut bookings, booking, |b| b.id == booking.id);
        Ok(booking.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(read(&self.bookings)?.iter().find(|b| b.id == id).cloned())
    }

    async fn find_by_rider_id(&self, rider_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(read(&self.bookings)?.iter().filter(|b| b.rider_id == rider_id).cloned().collect())
    }

    async fn find_by_trip_id(&self, trip_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(read(&self.bookings)?.iter().filter(|b| b.trip_id == trip_id).cloned().collect())
    }

    async fn exists_active_by_trip_and_rider(
        &self,
        trip_id: Uuid,
        rider_id: Uuid,
    ) -> StoreResult<bool> {
        Ok(read(&self.bookings)?
            .iter()
            .any(|b| b.trip_id == trip_id && b.rider_id == rider_id && b.is_active()))
    }

    async fn find_all(&self) -> StoreResult<Vec<Booking>> {
        Ok(read(&self.bookings)?.clone())
    }
}

#[async_trait]
impl SeatStore for InMemoryStore {
    async fn commit_seat_change(
        &self,
        trip: &Trip,
        expected: SeatCounters,
        booking: &Booking,
    ) -> StoreResult<(Trip, Booking)> {
        // Same lock order as delete
        let mut trips = write(&self.trips)?;
        let mut bookings = write(&self.bookings)?;

        // All checks precede the first mutation
        let index = guarded_position(&trips, trip.id, expected)?;
        injected_failure(&self.fail_trip_save, "trip")?;
        if booking.trip_id != trip.id {
            return Err(StoreError::Conflict(format!(
                "booking {} does not belong to trip {}",
                booking.id, trip.id
            )));
        }
        injected_failure(&self.fail_booking_save, "booking")?;
        ensure_single_active(&bookings, booking)?;

        trips[index] = trip.clone();
        upsert(&mut bookings, booking, |b| b.id == booking.id);
        Ok((trip.clone(), booking.clone()))
    }

    async fn update_capacity(&self, trip: &Trip, expected: SeatCounters) -> StoreResult<Trip> {
        let mut trips = write(&self.trips)?;
        let index = guarded_position(&trips, trip.id, expected)?;
        injected_failure(&self.fail_trip_save, "trip")?;
        trips[index] = trip.clone();
        Ok(trip.clone())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserProfile>> {
        Ok(read(&self.users)?.iter().find(|u| u.id == id).cloned())
    }

    async fn list_enabled(&self) -> StoreResult<Vec<UserProfile>> {
        Ok(read(&self.users)?.iter().filter(|u| u.is_active_member()).cloned().collect())
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn exists_between(&self, a: Uuid, b: Uuid) -> StoreResult<bool> {
        Ok(read(&self.conversations)?.contains(&conversation_key(a, b)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// Keeps every published event in memory
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PublishedEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn topics(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.topic).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> StoreResult<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| StoreError::Backend("event log lock poisoned".to_string()))?;
        events.push(PublishedEvent {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}
