use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parkwise_common::models::parking::Booking;
use sqlx::PgPool;
use uuid::Uuid;

const BOOKING_COLUMNS: &str =
    "booking_id, user_id, slot_id, start_time, end_time, price, created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub slot_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.booking_id,
            user_id: row.user_id,
            slot_id: row.slot_id,
            start_time: row.start_time,
            end_time: row.end_time,
            price: row.price,
            created_at: row.created_at,
        }
    }
}

/// Data needed to record a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub slot_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub price: Option<f64>,
}

pub struct BookingRepo;

impl BookingRepo {
    pub async fn create(pool: &PgPool, booking: &NewBooking) -> Result<BookingRow> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            INSERT INTO booking (booking_id, user_id, slot_id, start_time, end_time, price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(booking.user_id)
        .bind(booking.slot_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.price)
        .fetch_one(pool)
        .await
        .context("Failed to create booking")?;
        Ok(row)
    }

    /// Bookings newest first. `user_id` restricts the listing to one user.
    pub async fn list(
        pool: &PgPool,
        user_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BookingRow>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS} FROM booking
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY start_time DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list bookings")?;
        Ok(rows)
    }

    /// Claim an empty slot for `user_id` and open a booking on it, in one
    /// statement. Returns `None` if the slot is missing or not empty.
    pub async fn start(
        pool: &PgPool,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<BookingRow>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            WITH claimed AS (
                UPDATE slot
                SET status = 'occupied', updated_at = NOW()
                WHERE slot_id = $2 AND status = 'empty'
                RETURNING slot_id
            )
            INSERT INTO booking (booking_id, user_id, slot_id, start_time)
            SELECT $1, $3, slot_id, NOW() FROM claimed
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(slot_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to start booking")?;
        Ok(row)
    }

    /// Close the open booking on a slot, price it at `hourly_rate` per hour
    /// (rounded to cents) and mark the slot empty again. `user_id` restricts
    /// the release to that user's booking. Returns `None` if nothing matched.
    pub async fn finish(
        pool: &PgPool,
        slot_id: Uuid,
        user_id: Option<Uuid>,
        hourly_rate: f64,
    ) -> Result<Option<BookingRow>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            WITH closed AS (
                UPDATE booking
                SET end_time = NOW(),
                    price = ROUND(
                        (EXTRACT(EPOCH FROM (NOW() - start_time))::float8 / 3600.0
                            * $3::float8)::numeric,
                        2
                    )::float8
                WHERE slot_id = $1
                  AND end_time IS NULL
                  AND ($2::uuid IS NULL OR user_id = $2)
                RETURNING {BOOKING_COLUMNS}
            ),
            freed AS (
                UPDATE slot
                SET status = 'empty', updated_at = NOW()
                WHERE slot_id IN (SELECT slot_id FROM closed)
            )
            SELECT {BOOKING_COLUMNS} FROM closed
            "#
        ))
        .bind(slot_id)
        .bind(user_id)
        .bind(hourly_rate)
        .fetch_optional(pool)
        .await
        .context("Failed to finish booking")?;
        Ok(row)
    }
}
