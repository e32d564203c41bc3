use carpool_core::repository::{BookingStore, ConversationStore, TripStore, UserDirectory};
use carpool_core::{EngineResult, IdentityContext, Trip, UserProfile};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

const ADMIN_CONTEXT: &str = "Administrator";

/// How a contact is related to the current user
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactRelation {
    /// Drives a trip the current user booked
    DriverOnTrip,
    /// Booked a trip the current user drives
    PassengerOnTrip,
    AdminChannel,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Contact {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub relation: ContactRelation,
    /// Route of the first trip linking the two users, or "Administrator"
    pub context: String,
}

impl Contact {
    fn new(profile: &UserProfile, relation: ContactRelation, context: String) -> Self {
        Self {
            user_id: profile.id,
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
            relation,
            context,
        }
    }
}

/// Who may message whom, derived on every call from bookings, trips and roles.
///
/// Cancelled bookings still count: a rider keeps contact with a driver after cancelling.
pub struct EligibilityGraph {
    trips: Arc<dyn TripStore>,
    bookings: Arc<dyn BookingStore>,
    users: Arc<dyn UserDirectory>,
    conversations: Arc<dyn ConversationStore>,
}

impl EligibilityGraph {
    pub fn new(
        trips: Arc<dyn TripStore>,
        bookings: Arc<dyn BookingStore>,
        users: Arc<dyn UserDirectory>,
        conversations: Arc<dyn ConversationStore>,
    ) -> Self {
        Self { trips, bookings, users, conversations }
    }

    pub async fn can_message(
        &self,
        caller: &dyn IdentityContext,
        target_id: Uuid,
    ) -> EngineResult<bool> {
        let Some(current_id) = caller.current_user_id() else {
            return Ok(false);
        };
        if current_id == target_id {
            return Ok(false);
        }
        if caller.is_admin() {
            return Ok(true);
        }

        // Admins are reply-only: reachable once a thread exists
        if let Some(target) = self.users.find_by_id(target_id).await? {
            if target.is_admin()
                && self.conversations.exists_between(current_id, target_id).await?
            {
                return Ok(true);
            }
        }

        if self.drives_trip_booked_by(target_id, current_id).await? {
            return Ok(true);
        }
        self.drives_trip_booked_by(current_id, target_id).await
    }

    /// Everyone the caller may start or continue a conversation with, each listed once.
    pub async fn contactable_contacts(
        &self,
        caller: &dyn IdentityContext,
    ) -> EngineResult<Vec<Contact>> {
        let Some(current_id) = caller.current_user_id() else {
            return Ok(Vec::new());
        };

        if caller.is_admin() {
            return Ok(self
                .users
                .list_enabled()
                .await?
                .iter()
                .filter(|user| !user.is_admin() && user.id != current_id)
                .map(|user| {
                    Contact::new(user, ContactRelation::AdminChannel, ADMIN_CONTEXT.to_string())
                })
                .collect());
        }

        let mut seen = HashSet::from([current_id]);
        let mut contacts = Vec::new();

        // Drivers of trips the caller booked
        let mut trips_by_id: HashMap<Uuid, Option<Trip>> = HashMap::new();
        for booking in self.bookings.find_by_rider_id(current_id).await? {
            if !trips_by_id.contains_key(&booking.trip_id) {
                let trip = self.trips.find_by_id(booking.trip_id).await?;
                trips_by_id.insert(booking.trip_id, trip);
            }
            let Some(Some(trip)) = trips_by_id.get(&booking.trip_id) else {
                continue;
            };
            if seen.contains(&trip.driver_id) {
                continue;
            }
            if let Some(driver) = self.users.find_by_id(trip.driver_id).await? {
                seen.insert(driver.id);
                let context = trip.route_label();
                contacts.push(Contact::new(&driver, ContactRelation::DriverOnTrip, context));
            }
        }

        // Passengers of trips the caller drives
        for trip in self.trips.find_by_driver_id(current_id).await? {
            for booking in self.bookings.find_by_trip_id(trip.id).await? {
                if seen.contains(&booking.rider_id) {
                    continue;
                }
                if let Some(rider) = self.users.find_by_id(booking.rider_id).await? {
                    seen.insert(rider.id);
                    let context = trip.route_label();
                    contacts.push(Contact::new(&rider, ContactRelation::PassengerOnTrip, context));
                }
            }
        }

        // Admins who already opened a thread
        for admin in self.users.list_enabled().await?.iter().filter(|user| user.is_admin()) {
            if seen.contains(&admin.id) {
                continue;
            }
            if self.conversations.exists_between(current_id, admin.id).await? {
                seen.insert(admin.id);
                let context = ADMIN_CONTEXT.to_string();
                contacts.push(Contact::new(admin, ContactRelation::AdminChannel, context));
            }
        }

        Ok(contacts)
    }

    /// True when `driver_id` drives any trip `rider_id` ever booked, cancelled or not.
    async fn drives_trip_booked_by(&self, driver_id: Uuid, rider_id: Uuid) -> EngineResult<bool> {
        let driven: HashSet<Uuid> = self
            .trips
            .find_by_driver_id(driver_id)
            .await?
            .into_iter()
            .map(|trip| trip.id)
            .collect();
        if driven.is_empty() {
            return Ok(false);
        }

        Ok(self
            .bookings
            .find_by_rider_id(rider_id)
            .await?
            .iter()
            .any(|booking| driven.contains(&booking.trip_id)))
    }
}
