use uuid::Uuid;

pub const TRIP_PROPOSED_TOPIC: &str = "trips.proposed";
pub const TRIP_UPDATED_TOPIC: &str = "trips.updated";
pub const TRIP_DELETED_TOPIC: &str = "trips.deleted";
pub const BOOKING_RESERVED_TOPIC: &str = "bookings.reserved";
pub const BOOKING_CANCELLED_TOPIC: &str = "bookings.cancelled";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct TripProposedEvent {
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub total_seats: u32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct TripUpdatedEvent {
    pub trip_id: Uuid,
    pub updated_by: Uuid,
    pub total_seats: u32,
    pub available_seats: u32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct TripDeletedEvent {
    pub trip_id: Uuid,
    pub deleted_by: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct SeatReservedEvent {
    pub booking_id: Uuid,
    pub trip_id: Uuid,
    pub rider_id: Uuid,
    pub available_seats: u32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub trip_id: Uuid,
    pub cancelled_by: Uuid,
    pub available_seats: u32,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_reserved_wire_shape() {
        let event = SeatReservedEvent {
            booking_id: Uuid::nil(),
            trip_id: Uuid::nil(),
            rider_id: Uuid::nil(),
            available_seats: 2,
            timestamp: 1_700_000_000,
        };

        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["available_seats"], 2);
        assert_eq!(value["timestamp"], 1_700_000_000_i64);
        assert!(value.get("rider_id").is_some());
    }
}
