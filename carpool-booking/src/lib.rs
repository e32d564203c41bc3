pub mod eligibility;
pub mod management;
pub mod reservation;

pub use eligibility::{Contact, ContactRelation, EligibilityGraph};
pub use management::{TripManagementService, TripProposal};
pub use reservation::ReservationService;

use carpool_core::Stores;
use carpool_ledger::CapacityLedger;
use std::sync::Arc;

/// The rider, driver and messaging entry points, sharing one capacity ledger.
pub struct Engine {
    pub reservations: ReservationService,
    pub trips: TripManagementService,
    pub eligibility: EligibilityGraph,
}

impl Engine {
    pub fn new(stores: Stores) -> Self {
        let ledger = Arc::new(CapacityLedger::new(stores.trips.clone(), stores.seats.clone()));

        Self {
            reservations: ReservationService::new(
                ledger.clone(),
                stores.bookings.clone(),
                stores.events.clone(),
            ),
            trips: TripManagementService::new(ledger, stores.trips.clone(), stores.events.clone()),
            eligibility: EligibilityGraph::new(
                stores.trips,
                stores.bookings,
                stores.users,
                stores.conversations,
            ),
        }
    }
}
