use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A carpool trip offered by a driver.
///
/// Seat counters are private: `0 <= available_seats <= total_seats` holds for every value
/// of this type. Only [`Trip::take_seat`], [`Trip::return_seat`] and
/// [`Trip::apply_changes`] move them, and the capacity ledger is the only caller of those
/// on persisted trips.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub departure_address: String,
    pub destination_address: String,
    pub departure_time: DateTime<Utc>,
    total_seats: u32,
    available_seats: u32,
    pub recurring: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw column values of a stored trip, validated by [`Trip::restore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub departure_address: String,
    pub destination_address: String,
    pub departure_time: DateTime<Utc>,
    pub total_seats: u32,
    pub available_seats: u32,
    pub recurring: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A trip's seat counters as read at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatCounters {
    pub total: u32,
    pub available: u32,
}

/// Editable attributes of a trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripChanges {
    pub departure_address: String,
    pub destination_address: String,
    pub departure_time: DateTime<Utc>,
    pub total_seats: u32,
}

impl Trip {
    pub fn new(
        driver_id: Uuid,
        departure_address: impl Into<String>,
        destination_address: impl Into<String>,
        departure_time: DateTime<Utc>,
        total_seats: u32,
        recurring: bool,
    ) -> Result<Self, TripError> {
        let departure_address = departure_address.into();
        let destination_address = destination_address.into();
        validate_route(&departure_address, &destination_address)?;
        if total_seats == 0 {
            return Err(TripError::InvalidSeatCount(total_seats));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            driver_id,
            departure_address,
            destination_address,
            departure_time,
            total_seats,
            available_seats: total_seats,
            recurring,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a trip read back from storage, refusing counters that break the seat invariant.
    pub fn restore(snapshot: TripSnapshot) -> Result<Self, TripError> {
        if snapshot.total_seats == 0 || snapshot.available_seats > snapshot.total_seats {
            return Err(TripError::InconsistentCounters {
                trip_id: snapshot.id,
                total: snapshot.total_seats,
                available: snapshot.available_seats,
            });
        }

        Ok(Self {
            id: snapshot.id,
            driver_id: snapshot.driver_id,
            departure_address: snapshot.departure_address,
            destination_address: snapshot.destination_address,
            departure_time: snapshot.departure_time,
            total_seats: snapshot.total_seats,
            available_seats: snapshot.available_seats,
            recurring: snapshot.recurring,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        })
    }

    pub fn total_seats(&self) -> u32 {
        self.total_seats
    }

    pub fn available_seats(&self) -> u32 {
        self.available_seats
    }

    pub fn seat_counters(&self) -> SeatCounters {
        SeatCounters {
            total: self.total_seats,
            available: self.available_seats,
        }
    }

    /// Seats currently committed to active bookings.
    pub fn booked_seats(&self) -> u32 {
        self.total_seats - self.available_seats
    }

    pub fn is_driven_by(&self, user_id: Uuid) -> bool {
        self.driver_id == user_id
    }

    /// Human readable "from -> to" label used in contact listings.
    pub fn route_label(&self) -> String {
        format!("{} -> {}", self.departure_address, self.destination_address)
    }

    /// Decrement the available seats if any are left. Returns false without mutating otherwise.
    pub fn take_seat(&mut self) -> bool {
        if self.available_seats == 0 {
            return false;
        }
        self.available_seats -= 1;
        self.updated_at = Utc::now();
        true
    }

    /// Give one seat back. Rejected when the trip is already fully available.
    pub fn return_seat(&mut self) -> Result<(), TripError> {
        if self.available_seats >= self.total_seats {
            return Err(TripError::SeatOverflow { trip_id: self.id });
        }
        self.available_seats += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Apply an edit, keeping the number of booked seats exactly as it was.
    pub fn apply_changes(&mut self, changes: &TripChanges) -> Result<(), TripError> {
        validate_route(&changes.departure_address, &changes.destination_address)?;
        if changes.total_seats == 0 {
            return Err(TripError::InvalidSeatCount(changes.total_seats));
        }

        let booked = self.booked_seats();
        if changes.total_seats < booked {
            return Err(TripError::CapacityBelowBookings {
                booked,
                requested: changes.total_seats,
            });
        }

        self.departure_address = changes.departure_address.clone();
        self.destination_address = changes.destination_address.clone();
        self.departure_time = changes.departure_time;
        self.total_seats = changes.total_seats;
        self.available_seats = changes.total_seats - booked;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn snapshot(&self) -> TripSnapshot {
        TripSnapshot {
            id: self.id,
            driver_id: self.driver_id,
            departure_address: self.departure_address.clone(),
            destination_address: self.destination_address.clone(),
            departure_time: self.departure_time,
            total_seats: self.total_seats,
            available_seats: self.available_seats,
            recurring: self.recurring,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn validate_route(departure: &str, destination: &str) -> Result<(), TripError> {
    if departure.trim().is_empty() {
        return Err(TripError::BlankAddress("departure"));
    }
    if destination.trim().is_empty() {
        return Err(TripError::BlankAddress("destination"));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TripError {
    #[error("Total seats must be at least 1, got {0}")]
    InvalidSeatCount(u32),

    #[error("The {0} address must not be blank")]
    BlankAddress(&'static str),

    #[error("Cannot set {requested} seat(s): {booked} already booked")]
    CapacityBelowBookings {
        booked: u32,
        requested: u32,
    },

    #[error("Releasing a seat on trip {trip_id} would exceed its capacity")]
    SeatOverflow {
        trip_id: Uuid,
    },

    #[error("Trip {trip_id} has inconsistent counters: total {total}, available {available}")]
    InconsistentCounters {
        trip_id: Uuid,
        total: u32,
        available: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(total: u32) -> Trip {
        Trip::new(Uuid::new_v4(), "Main St 1", "Airport", Utc::now(), total, false).unwrap()
    }

    fn changes(total: u32) -> TripChanges {
        TripChanges {
            departure_address: "Main St 1".to_string(),
            destination_address: "Central Station".to_string(),
            departure_time: Utc::now(),
            total_seats: total,
        }
    }

    #[test]
    fn test_new_trip_is_fully_available() {
        let trip = trip(3);
        assert_eq!(trip.total_seats(), 3);
        assert_eq!(trip.available_seats(), 3);
        assert_eq!(trip.booked_seats(), 0);
    }

    #[test]
    fn test_zero_seats_rejected() {
        let result = Trip::new(Uuid::new_v4(), "A", "B", Utc::now(), 0, false);
        assert_eq!(result.unwrap_err(), TripError::InvalidSeatCount(0));
    }

    #[test]
    fn test_blank_destination_rejected() {
        let result = Trip::new(Uuid::new_v4(), "A", "   ", Utc::now(), 2, true);
        assert_eq!(result.unwrap_err(), TripError::BlankAddress("destination"));
    }

    #[test]
    fn test_seat_lifecycle() {
        let mut trip = trip(1);

        assert!(trip.take_seat());
        assert_eq!(trip.available_seats(), 0);

        // Full trip refuses without mutating
        assert!(!trip.take_seat());
        assert_eq!(trip.available_seats(), 0);

        trip.return_seat().unwrap();
        assert_eq!(trip.available_seats(), 1);
    }

    #[test]
    fn test_return_seat_never_exceeds_total() {
        let mut trip = trip(2);
        let err = trip.return_seat().unwrap_err();
        assert_eq!(err, TripError::SeatOverflow { trip_id: trip.id });
        assert_eq!(trip.available_seats(), 2);
    }

    #[test]
    fn test_apply_changes_keeps_booked_seats() {
        let mut trip = trip(4);
        for _ in 0..3 {
            assert!(trip.take_seat());
        }

        let err = trip.apply_changes(&changes(2)).unwrap_err();
        assert_eq!(err, TripError::CapacityBelowBookings { booked: 3, requested: 2 });
        assert_eq!(trip.total_seats(), 4);
        assert_eq!(trip.available_seats(), 1);

        trip.apply_changes(&changes(3)).unwrap();
        assert_eq!(trip.total_seats(), 3);
        assert_eq!(trip.available_seats(), 0);
        assert_eq!(trip.destination_address, "Central Station");

        trip.apply_changes(&changes(6)).unwrap();
        assert_eq!(trip.available_seats(), 3);
    }

    #[test]
    fn test_restore_rejects_inconsistent_counters() {
        let mut snapshot = trip(2).snapshot();
        snapshot.available_seats = 5;

        let err = Trip::restore(snapshot).unwrap_err();
        assert!(matches!(err, TripError::InconsistentCounters { total: 2, available: 5, .. }));
    }

    #[test]
    fn test_route_label() {
        assert_eq!(trip(1).route_label(), "Main St 1 -> Airport");
    }

    #[test]
    fn test_seat_counters_follow_seat_moves() {
        let mut trip = trip(3);
        let before = trip.seat_counters();

        assert!(trip.take_seat());
        assert_eq!(before, SeatCounters { total: 3, available: 3 });
        assert_eq!(trip.seat_counters(), SeatCounters { total: 3, available: 2 });
    }
}
