mod common;

use carpool_core::{Caller, EngineError, IdentityContext, Trip, TripChanges};
use carpool_shared::events::{TRIP_DELETED_TOPIC, TRIP_PROPOSED_TOPIC, TRIP_UPDATED_TOPIC};
use common::{proposal, Harness};
use uuid::Uuid;

fn resize(trip: &Trip, total_seats: u32) -> TripChanges {
    TripChanges {
        departure_address: trip.departure_address.clone(),
        destination_address: trip.destination_address.clone(),
        departure_time: trip.departure_time,
        total_seats,
    }
}

#[tokio::test]
async fn test_propose_starts_with_every_seat_free() {
    let h = Harness::new();
    let driver = h.user("driver");

    let trip = h.trip(&driver, 4).await;

    assert_eq!(trip.total_seats(), 4);
    assert_eq!(trip.available_seats(), 4);
    assert_eq!(Some(trip.driver_id), driver.current_user_id());
    assert_eq!(h.events.topics(), vec![TRIP_PROPOSED_TOPIC.to_string()]);
}

#[tokio::test]
async fn test_propose_rejects_zero_seats_and_blank_addresses() {
    let h = Harness::new();
    let driver = h.user("driver");

    let err = h.engine.trips.propose(&driver, proposal("Bern", 0)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));

    let err = h.engine.trips.propose(&driver, proposal("   ", 2)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));

    let err = h.engine.trips.propose(&Caller::anonymous(), proposal("Bern", 2)).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));

    assert!(h.engine.trips.search_by_destination("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_capacity_cannot_drop_below_booked_seats() {
    let h = Harness::new();
    let driver = h.user("driver");
    let trip = h.trip(&driver, 4).await;
    for rider in ["a", "b", "c"] {
        h.engine.reservations.reserve(&h.user(rider), trip.id).await.unwrap();
    }
    assert_eq!(h.stored_trip(&trip).await.available_seats(), 1);

    let err = h.engine.trips.edit(&driver, trip.id, resize(&trip, 2)).await.unwrap_err();
    assert!(matches!(err, EngineError::CapacityBelowBookings { booked: 3 }));
    assert!(err.to_string().contains("3 seat(s)"));
    let unchanged = h.stored_trip(&trip).await;
    assert_eq!((unchanged.total_seats(), unchanged.available_seats()), (4, 1));

    let resized = h.engine.trips.edit(&driver, trip.id, resize(&trip, 3)).await.unwrap();
    assert_eq!((resized.total_seats(), resized.available_seats()), (3, 0));
}

#[tokio::test]
async fn test_growing_capacity_frees_seats() {
    let h = Harness::new();
    let driver = h.user("driver");
    let trip = h.trip(&driver, 2).await;
    h.engine.reservations.reserve(&h.user("rider"), trip.id).await.unwrap();

    let mut changes = resize(&trip, 5);
    changes.destination_address = "Lucerne".to_string();
    let edited = h.engine.trips.edit(&driver, trip.id, changes).await.unwrap();

    assert_eq!((edited.total_seats(), edited.available_seats()), (5, 4));
    assert_eq!(edited.destination_address, "Lucerne");
    assert!(h.events.topics().contains(&TRIP_UPDATED_TOPIC.to_string()));
}

#[tokio::test]
async fn test_only_driver_or_admin_may_edit() {
    let h = Harness::new();
    let driver = h.user("driver");
    let stranger = h.user("stranger");
    let admin = h.admin("admin");
    let trip = h.trip(&driver, 2).await;

    let err = h.engine.trips.edit(&stranger, trip.id, resize(&trip, 3)).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));
    let anonymous = Caller::anonymous();
    let err = h.engine.trips.edit(&anonymous, trip.id, resize(&trip, 3)).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));

    let edited = h.engine.trips.edit(&admin, trip.id, resize(&trip, 3)).await.unwrap();
    assert_eq!(edited.total_seats(), 3);
    // Admin edits do not change who drives
    assert_eq!(Some(edited.driver_id), driver.current_user_id());
}

#[tokio::test]
async fn test_edit_unknown_trip_is_not_found() {
    let h = Harness::new();
    let driver = h.user("driver");
    let trip = h.trip(&driver, 2).await;

    let err = h.engine.trips.edit(&driver, Uuid::new_v4(), resize(&trip, 3)).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "Trip", .. }));
}

#[tokio::test]
async fn test_delete_removes_trip_and_its_bookings() {
    let h = Harness::new();
    let driver = h.user("driver");
    let rider = h.user("rider");
    let trip = h.trip(&driver, 2).await;
    let booking = h.engine.reservations.reserve(&rider, trip.id).await.unwrap();

    let err = h.engine.trips.delete(&rider, trip.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));

    h.engine.trips.delete(&driver, trip.id).await.unwrap();

    assert!(matches!(h.engine.trips.find(trip.id).await, Err(EngineError::NotFound { .. })));
    assert!(h.engine.reservations.list_for_trip(trip.id).await.unwrap().is_empty());
    assert!(h.engine.reservations.list_mine(&rider).await.unwrap().is_empty());
    let err = h.engine.reservations.cancel(&rider, booking.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "Booking", .. }));
    assert!(h.events.topics().contains(&TRIP_DELETED_TOPIC.to_string()));
}

#[tokio::test]
async fn test_admin_may_delete_any_trip() {
    let h = Harness::new();
    let trip = h.trip(&h.user("driver"), 2).await;

    h.engine.trips.delete(&h.admin("admin"), trip.id).await.unwrap();

    let err = h.engine.trips.delete(&h.admin("other-admin"), trip.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn test_can_edit() {
    let h = Harness::new();
    let driver = h.user("driver");
    let trip = h.trip(&driver, 2).await;

    assert!(h.engine.trips.can_edit(&driver, trip.id).await);
    assert!(h.engine.trips.can_edit(&h.admin("admin"), trip.id).await);
    assert!(!h.engine.trips.can_edit(&h.user("stranger"), trip.id).await);
    assert!(!h.engine.trips.can_edit(&Caller::anonymous(), trip.id).await);
    assert!(!h.engine.trips.can_edit(&driver, Uuid::new_v4()).await);
}

#[tokio::test]
async fn test_search_and_listing() {
    let h = Harness::new();
    let driver = h.user("driver");
    let other = h.user("other");
    h.trip_to(&driver, "Zurich Airport", 2).await;
    h.trip_to(&driver, "Basel SBB", 2).await;
    h.trip_to(&other, "zurich hb", 3).await;

    assert_eq!(h.engine.trips.search_by_destination("ZURICH").await.unwrap().len(), 2);
    assert_eq!(h.engine.trips.search_by_destination("basel").await.unwrap().len(), 1);
    assert!(h.engine.trips.search_by_destination("Geneva").await.unwrap().is_empty());
    assert_eq!(h.engine.trips.search_by_destination("  ").await.unwrap().len(), 3);

    let driver_id = driver.current_user_id().unwrap();
    let mine = h.engine.trips.list_by_driver(driver_id).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|t| t.is_driven_by(driver_id)));
}
