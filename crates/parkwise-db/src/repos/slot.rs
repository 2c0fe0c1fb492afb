use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parkwise_common::models::parking::{DashboardStats, Slot, SlotStatus};
use sqlx::PgPool;
use uuid::Uuid;

const SLOT_COLUMNS: &str = "slot_id, slot_number, status, vehicle_type, created_at, updated_at";

/// Slot row from database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SlotRow {
    pub slot_id: Uuid,
    pub slot_number: i32,
    pub status: String,
    pub vehicle_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlotRow {
    pub fn into_slot(self) -> Result<Slot> {
        let status = self
            .status
            .parse::<SlotStatus>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid status stored for slot {}", self.slot_id))?;
        Ok(Slot {
            id: self.slot_id,
            slot_number: self.slot_number,
            status,
            vehicle_type: self.vehicle_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for parking slot operations
pub struct SlotRepo;

impl SlotRepo {
    /// Create a slot. A taken `slot_number` surfaces as a unique violation.
    pub async fn create(
        pool: &PgPool,
        slot_number: i32,
        status: SlotStatus,
        vehicle_type: Option<&str>,
    ) -> Result<SlotRow> {
        let row = sqlx::query_as::<_, SlotRow>(&format!(
            r#"
            INSERT INTO slot (slot_id, slot_number, status, vehicle_type)
            VALUES ($1, $2, $3, $4)
            RETURNING {SLOT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(slot_number)
        .bind(status.as_str())
        .bind(vehicle_type)
        .fetch_one(pool)
        .await
        .context("Failed to create slot")?;
        Ok(row)
    }

    pub async fn get(pool: &PgPool, slot_id: Uuid) -> Result<Option<SlotRow>> {
        let row = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slot WHERE slot_id = $1"
        ))
        .bind(slot_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get slot")?;
        Ok(row)
    }

    /// All slots ordered by slot number
    pub async fn list(pool: &PgPool) -> Result<Vec<SlotRow>> {
        let rows = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slot ORDER BY slot_number"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list slots")?;
        Ok(rows)
    }

    /// Partial update; `None` fields keep their stored value.
    pub async fn update(
        pool: &PgPool,
        slot_id: Uuid,
        status: Option<SlotStatus>,
        vehicle_type: Option<&str>,
    ) -> Result<Option<SlotRow>> {
        let row = sqlx::query_as::<_, SlotRow>(&format!(
            r#"
            UPDATE slot
            SET status = COALESCE($2, status),
                vehicle_type = COALESCE($3, vehicle_type),
                updated_at = NOW()
            WHERE slot_id = $1
            RETURNING {SLOT_COLUMNS}
            "#
        ))
        .bind(slot_id)
        .bind(status.map(|s| s.as_str()))
        .bind(vehicle_type)
        .fetch_optional(pool)
        .await
        .context("Failed to update slot")?;
        Ok(row)
    }

    /// Returns `false` if nothing was deleted.
    pub async fn delete(pool: &PgPool, slot_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM slot WHERE slot_id = $1")
            .bind(slot_id)
            .execute(pool)
            .await
            .context("Failed to delete slot")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(pool: &PgPool) -> Result<DashboardStats> {
        let (total_slots, empty_slots, occupied_slots, reserved_slots, total_bookings): (
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'empty'),
                COUNT(*) FILTER (WHERE status = 'occupied'),
                COUNT(*) FILTER (WHERE status = 'reserved'),
                (SELECT COUNT(*) FROM booking)
            FROM slot
            "#,
        )
        .fetch_one(pool)
        .await
        .context("Failed to compute dashboard stats")?;

        Ok(DashboardStats {
            total_slots,
            empty_slots,
            occupied_slots,
            reserved_slots,
            total_bookings,
        })
    }
}
