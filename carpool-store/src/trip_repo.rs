use async_trait::async_trait;
use carpool_core::repository::TripStore;
use carpool_core::trip::TripSnapshot;
use carpool_core::{SeatCounters, StoreError, StoreResult, Trip};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::{map_sqlx_error, seat_count};

const TRIP_COLUMNS: &str = "id, driver_id, departure_address, destination_address, departure_time, \
     total_seats, available_seats, recurring, created_at, updated_at";

pub struct PgTripStore {
    pool: PgPool,
}

impl PgTripStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(
        &self,
        clause: &str,
        bind: impl Into<BindValue>,
    ) -> StoreResult<Vec<Trip>> {
        let sql =
            format!("SELECT {TRIP_COLUMNS} FROM trips WHERE {clause} ORDER BY created_at, id");
        let query = sqlx::query_as::<_, TripRow>(&sql);
        let rows = match bind.into() {
            BindValue::Id(id) => query.bind(id),
            BindValue::Text(text) => query.bind(text),
        }
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Trip::try_from).collect()
    }
}

enum BindValue {
    Id(Uuid),
    Text(String),
}

impl From<Uuid> for BindValue {
    fn from(id: Uuid) -> Self {
        BindValue::Id(id)
    }
}

impl From<String> for BindValue {
    fn from(text: String) -> Self {
        BindValue::Text(text)
    }
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    driver_id: Uuid,
    departure_address: String,
    destination_address: String,
    departure_time: DateTime<Utc>,
    total_seats: i32,
    available_seats: i32,
    recurring: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TripRow> for Trip {
    type Error = StoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        Trip::restore(TripSnapshot {
            id: row.id,
            driver_id: row.driver_id,
            departure_address: row.departure_address,
            destination_address: row.destination_address,
            departure_time: row.departure_time,
            total_seats: seat_count("total_seats", row.total_seats)?,
            available_seats: seat_count("available_seats", row.available_seats)?,
            recurring: row.recurring,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

/// Escape LIKE wildcards so the needle matches literally.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn to_column(value: u32) -> StoreResult<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::Backend(format!("seat count {value} out of range")))
}

/// Write the trip's counters and schedule, provided the stored counters still equal `expected`.
pub(crate) async fn write_seat_counters(
    conn: &mut PgConnection,
    trip: &Trip,
    expected: SeatCounters,
) -> StoreResult<Trip> {
    let sql = format!(
        r#"
        UPDATE trips SET
            departure_address = $2,
            destination_address = $3,
            departure_time = $4,
            total_seats = $5,
            available_seats = $6,
            recurring = $7,
            updated_at = $8
        WHERE id = $1 AND total_seats = $9 AND available_seats = $10
        RETURNING {TRIP_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, TripRow>(&sql)
        .bind(trip.id)
        .bind(&trip.departure_address)
        .bind(&trip.destination_address)
        .bind(trip.departure_time)
        .bind(to_column(trip.total_seats())?)
        .bind(to_column(trip.available_seats())?)
        .bind(trip.recurring)
        .bind(trip.updated_at)
        .bind(to_column(expected.total)?)
        .bind(to_column(expected.available)?)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    match row {
        Some(row) => Trip::try_from(row),
        None => Err(StoreError::Conflict(format!(
            "trip {} is gone or its seat counters changed concurrently",
            trip.id
        ))),
    }
}

#[async_trait]
impl TripStore for PgTripStore {
    async fn save(&self, trip: &Trip) -> StoreResult<Trip> {
        let sql = format!(
            r#"
            INSERT INTO trips ({TRIP_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                departure_address = EXCLUDED.departure_address,
                destination_address = EXCLUDED.destination_address,
                departure_time = EXCLUDED.departure_time,
                recurring = EXCLUDED.recurring,
                updated_at = EXCLUDED.updated_at
            RETURNING {TRIP_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(trip.id)
            .bind(trip.driver_id)
            .bind(&trip.departure_address)
            .bind(&trip.destination_address)
            .bind(trip.departure_time)
            .bind(to_column(trip.total_seats())?)
            .bind(to_column(trip.available_seats())?)
            .bind(trip.recurring)
            .bind(trip.created_at)
            .bind(trip.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Trip::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Trip>> {
        Ok(self.fetch_where("id = $1", id).await?.into_iter().next())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        // bookings.trip_id is ON DELETE CASCADE
        sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_by_driver_id(&self, driver_id: Uuid) -> StoreResult<Vec<Trip>> {
        self.fetch_where("driver_id = $1", driver_id).await
    }

    async fn find_by_destination(&self, needle: &str) -> StoreResult<Vec<Trip>> {
        self.fetch_where("destination_address ILIKE $1", like_pattern(needle)).await
    }

    async fn find_all(&self) -> StoreResult<Vec<Trip>> {
        let sql = format!("SELECT {TRIP_COLUMNS} FROM trips ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(Trip::try_from).collect()
    }
}
