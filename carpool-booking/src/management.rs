use carpool_core::events::{publish_event, EventPublisher};
use carpool_core::repository::TripStore;
use carpool_core::{EngineError, EngineResult, IdentityContext, Trip, TripChanges};
use carpool_ledger::CapacityLedger;
use carpool_shared::events::{
    TripDeletedEvent, TripProposedEvent, TripUpdatedEvent, TRIP_DELETED_TOPIC, TRIP_PROPOSED_TOPIC,
    TRIP_UPDATED_TOPIC,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A new trip offered by the calling driver
#[derive(Debug, Clone, Deserialize)]
pub struct TripProposal {
    pub departure_address: String,
    pub destination_address: String,
    pub departure_time: DateTime<Utc>,
    pub total_seats: u32,
    pub recurring: bool,
}

/// Driver and administrator use cases on trips.
pub struct TripManagementService {
    ledger: Arc<CapacityLedger>,
    trips: Arc<dyn TripStore>,
    events: Arc<dyn EventPublisher>,
}

impl TripManagementService {
    pub fn new(
        ledger: Arc<CapacityLedger>,
        trips: Arc<dyn TripStore>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { ledger, trips, events }
    }

    /// Create a trip driven by the caller, with every seat available.
    #[instrument(skip(self, caller, proposal), fields(driver = ?caller.current_user_id()))]
    pub async fn propose(
        &self,
        caller: &dyn IdentityContext,
        proposal: TripProposal,
    ) -> EngineResult<Trip> {
        let driver_id = caller.current_user_id().ok_or(EngineError::Forbidden)?;

        let trip = Trip::new(
            driver_id,
            proposal.departure_address,
            proposal.destination_address,
            proposal.departure_time,
            proposal.total_seats,
            proposal.recurring,
        )?;
        let trip = self.trips.save(&trip).await?;

        info!("Trip {} proposed by {} with {} seat(s)", trip.id, driver_id, trip.total_seats());

        let event = TripProposedEvent {
            trip_id: trip.id,
            driver_id,
            total_seats: trip.total_seats(),
            timestamp: Utc::now().timestamp(),
        };
        let key = trip.id.to_string();
        publish_event(self.events.as_ref(), TRIP_PROPOSED_TOPIC, &key, &event).await;

        Ok(trip)
    }

    /// Change route, time or capacity. Capacity may not drop below the seats already booked.
    #[instrument(skip(self, caller, changes), fields(requester = ?caller.current_user_id()))]
    pub async fn edit(
        &self,
        caller: &dyn IdentityContext,
        trip_id: Uuid,
        changes: TripChanges,
    ) -> EngineResult<Trip> {
        let lease = self.ledger.acquire(trip_id).await?;
        let requester = authorize(caller, lease.trip())?;

        let trip = lease.resize(&changes).await.inspect_err(|e| {
            if let EngineError::CapacityBelowBookings { booked } = e {
                warn!(
                    "Rejected resize of trip {} to {} seat(s): {} booked",
                    trip_id, changes.total_seats, booked
                );
            }
        })?;

        info!(
            "Trip {} updated by {}: {} total, {} available",
            trip.id,
            requester,
            trip.total_seats(),
            trip.available_seats()
        );

        let event = TripUpdatedEvent {
            trip_id: trip.id,
            updated_by: requester,
            total_seats: trip.total_seats(),
            available_seats: trip.available_seats(),
            timestamp: Utc::now().timestamp(),
        };
        publish_event(self.events.as_ref(), TRIP_UPDATED_TOPIC, &trip.id.to_string(), &event).await;

        Ok(trip)
    }

    /// Remove a trip together with all of its bookings.
    #[instrument(skip(self, caller), fields(requester = ?caller.current_user_id()))]
    pub async fn delete(&self, caller: &dyn IdentityContext, trip_id: Uuid) -> EngineResult<()> {
        let lease = self.ledger.acquire(trip_id).await?;
        let requester = authorize(caller, lease.trip())?;

        lease.remove().await?;
        info!("Trip {} deleted by {}", trip_id, requester);

        let event = TripDeletedEvent {
            trip_id,
            deleted_by: requester,
            timestamp: Utc::now().timestamp(),
        };
        publish_event(self.events.as_ref(), TRIP_DELETED_TOPIC, &trip_id.to_string(), &event).await;

        Ok(())
    }

    /// Whether edit controls should be offered to the caller. Never fails.
    pub async fn can_edit(&self, caller: &dyn IdentityContext, trip_id: Uuid) -> bool {
        match self.trips.find_by_id(trip_id).await {
            Ok(Some(trip)) => authorize(caller, &trip).is_ok(),
            Ok(None) => false,
            Err(e) => {
                warn!("Could not load trip {} for edit check: {}", trip_id, e);
                false
            }
        }
    }

    pub async fn find(&self, trip_id: Uuid) -> EngineResult<Trip> {
        self.trips
            .find_by_id(trip_id)
            .await?
            .ok_or_else(|| EngineError::trip_not_found(trip_id))
    }

    pub async fn list_by_driver(&self, driver_id: Uuid) -> EngineResult<Vec<Trip>> {
        Ok(self.trips.find_by_driver_id(driver_id).await?)
    }

    /// Case-insensitive substring search on the destination. A blank query lists every trip.
    pub async fn search_by_destination(&self, query: &str) -> EngineResult<Vec<Trip>> {
        if query.trim().is_empty() {
            return Ok(self.trips.find_all().await?);
        }
        Ok(self.trips.find_by_destination(query.trim()).await?)
    }
}

/// The trip's driver and administrators may manage a trip.
fn authorize(caller: &dyn IdentityContext, trip: &Trip) -> EngineResult<Uuid> {
    let requester = caller.current_user_id().ok_or(EngineError::Forbidden)?;
    if trip.is_driven_by(requester) || caller.is_admin() {
        Ok(requester)
    } else {
        Err(EngineError::Forbidden)
    }
}
