pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod memory;
pub mod seat_repo;
pub mod telemetry;
pub mod trip_repo;
pub mod user_repo;

use std::sync::Arc;

use carpool_core::{StoreError, Stores};
use tracing::info;

pub use booking_repo::PgBookingStore;
pub use database::DbClient;
pub use events::LogEventPublisher;
pub use memory::{InMemoryStore, RecordingPublisher};
pub use seat_repo::PgSeatStore;
pub use trip_repo::PgTripStore;
pub use user_repo::PgUserDirectory;

use app_config::{Config, StoreBackend};

/// Build the store bundle for the configured backend.
pub async fn connect(config: &Config) -> Result<Stores, StoreError> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory stores");
            let store = Arc::new(InMemoryStore::new());
            Ok(store.stores(Arc::new(LogEventPublisher)))
        }
        StoreBackend::Postgres => {
            let database = config.database.as_ref().ok_or_else(|| {
                StoreError::Backend(
                    "postgres backend selected without a [database] section".to_string(),
                )
            })?;

            let db = DbClient::new(database).await?;
            if config.store.run_migrations {
                db.migrate().await?;
            }

            let users = Arc::new(PgUserDirectory::new(db.pool.clone()));
            Ok(Stores {
                trips: Arc::new(PgTripStore::new(db.pool.clone())),
                bookings: Arc::new(PgBookingStore::new(db.pool.clone())),
                seats: Arc::new(PgSeatStore::new(db.pool.clone())),
                users: users.clone(),
                conversations: users,
                events: Arc::new(LogEventPublisher),
            })
        }
    }
}
