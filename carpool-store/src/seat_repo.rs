use async_trait::async_trait;
use carpool_core::repository::SeatStore;
use carpool_core::{Booking, SeatCounters, StoreResult, Trip};
use sqlx::PgPool;
use tracing::debug;

use crate::booking_repo::write_booking;
use crate::database::map_sqlx_error;
use crate::trip_repo::write_seat_counters;

/// Seat writes against Postgres.
///
/// The counter update is conditional on the counters the caller read, which makes it safe
/// across engine instances sharing one database. A seat change and its booking share one
/// transaction; dropping the transaction on any error rolls both back.
pub struct PgSeatStore {
    pool: PgPool,
}

impl PgSeatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeatStore for PgSeatStore {
    async fn commit_seat_change(
        &self,
        trip: &Trip,
        expected: SeatCounters,
        booking: &Booking,
    ) -> StoreResult<(Trip, Booking)> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let trip = write_seat_counters(&mut tx, trip, expected).await?;
        let booking = write_booking(&mut tx, booking).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!("Committed seat change on trip {} with booking {}", trip.id, booking.id);
        Ok((trip, booking))
    }

    async fn update_capacity(&self, trip: &Trip, expected: SeatCounters) -> StoreResult<Trip> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        write_seat_counters(&mut conn, trip, expected).await
    }
}
