#![allow(dead_code)]

use carpool_booking::{Engine, TripProposal};
use carpool_core::{Caller, Trip, UserProfile, ADMIN_ROLE};
use carpool_store::{InMemoryStore, RecordingPublisher};
use chrono::{Duration, Utc};
use std::sync::Arc;

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub events: Arc<RecordingPublisher>,
    pub engine: Engine,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(RecordingPublisher::new());
        let engine = Engine::new(store.stores(events.clone()));
        Self { store, events, engine }
    }

    pub fn user(&self, username: &str) -> Caller {
        let profile = UserProfile::new(username, format!("{username} (display)"));
        self.store.insert_user(profile.clone()).unwrap().caller()
    }

    pub fn admin(&self, username: &str) -> Caller {
        let profile =
            UserProfile::new(username, format!("{username} (admin)")).with_role(ADMIN_ROLE);
        self.store.insert_user(profile.clone()).unwrap().caller()
    }

    pub async fn trip(&self, driver: &Caller, seats: u32) -> Trip {
        self.trip_to(driver, "Zurich Airport", seats).await
    }

    pub async fn trip_to(&self, driver: &Caller, destination: &str, seats: u32) -> Trip {
        self.engine
            .trips
            .propose(driver, proposal(destination, seats))
            .await
            .expect("Failed to propose trip")
    }

    pub async fn stored_trip(&self, trip: &Trip) -> Trip {
        self.engine.trips.find(trip.id).await.expect("trip should exist")
    }
}

pub fn proposal(destination: &str, seats: u32) -> TripProposal {
    TripProposal {
        departure_address: "Bahnhofstrasse 1, Winterthur".to_string(),
        destination_address: destination.to_string(),
        departure_time: Utc::now() + Duration::days(1),
        total_seats: seats,
        recurring: false,
    }
}
