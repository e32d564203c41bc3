use async_trait::async_trait;
use carpool_core::repository::BookingStore;
use carpool_core::{Booking, BookingStatus, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::map_sqlx_error;

const BOOKING_COLUMNS: &str = "id, trip_id, rider_id, status, created_at, updated_at";

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_by(&self, column: &str, id: Uuid) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE {column} = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    trip_id: Uuid,
    rider_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<BookingStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Booking {
            id: row.id,
            trip_id: row.trip_id,
            rider_id: row.rider_id,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Insert a booking, or update the status of an existing one.
pub(crate) async fn write_booking(
    conn: &mut PgConnection,
    booking: &Booking,
) -> StoreResult<Booking> {
    let sql = format!(
        r#"
        INSERT INTO bookings ({BOOKING_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at
        RETURNING {BOOKING_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, BookingRow>(&sql)
        .bind(booking.id)
        .bind(booking.trip_id)
        .bind(booking.rider_id)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    Booking::try_from(row)
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn save(&self, booking: &Booking) -> StoreResult<Booking> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        write_booking(&mut conn, booking).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.fetch_by("id", id).await?.into_iter().next())
    }

    async fn find_by_rider_id(&self, rider_id: Uuid) -> StoreResult<Vec<Booking>> {
        self.fetch_by("rider_id", rider_id).await
    }

    async fn find_by_trip_id(&self, trip_id: Uuid) -> StoreResult<Vec<Booking>> {
        self.fetch_by("trip_id", trip_id).await
    }

    async fn exists_active_by_trip_and_rider(
        &self,
        trip_id: Uuid,
        rider_id: Uuid,
    ) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE trip_id = $1 AND rider_id = $2 AND status IN ('PENDING', 'CONFIRMED')
            )
            "#,
        )
        .bind(trip_id)
        .bind(rider_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn find_all(&self) -> StoreResult<Vec<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_is_corrupt() {
        let now = Utc::now();
        let row = BookingRow {
            id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            rider_id: Uuid::new_v4(),
            status: "EXPIRED".to_string(),
            created_at: now,
            updated_at: now,
        };

        assert!(matches!(Booking::try_from(row), Err(StoreError::Corrupt(_))));
    }
}
