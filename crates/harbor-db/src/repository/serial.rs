//! # Serial Unit Repository
//!
//! Database operations for individually tracked units (serial / IMEI).
//!
//! ## Reservation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                              │
//! │    UPDATE serial_units SET status = 'sold' …                        │
//! │      WHERE id IN (SELECT id FROM serial_units                       │
//! │                   WHERE variant_id = ? AND status = 'available'     │
//! │                   ORDER BY created_at LIMIT n)                      │
//! │      RETURNING *                                                    │
//! │                                                                     │
//! │    returned == n  ──► COMMIT, hand the exact units back            │
//! │    returned  < n  ──► ROLLBACK, report how many were available     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//! The caller always learns WHICH units it got; restoration later flips
//! exactly those ids back, never "any n units of the variant".

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use harbor_core::{SerialStatus, SerialUnit};

/// Outcome of an attempt to reserve `n` serial units.
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    /// Exactly the requested units, now marked sold.
    Reserved(Vec<SerialUnit>),
    /// Fewer than requested were available; nothing was changed.
    Insufficient { available: i64 },
}

const SERIAL_COLUMNS: &str =
    "id, variant_id, serial_or_imei, status, sold_to, sold_at, created_at";

/// Repository for serial unit database operations.
#[derive(Debug, Clone)]
pub struct SerialUnitRepository {
    pool: SqlitePool,
}

impl SerialUnitRepository {
    /// Creates a new SerialUnitRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SerialUnitRepository { pool }
    }

    /// Inserts a new serial unit.
    ///
    /// The `UNIQUE(variant_id, serial_or_imei)` constraint surfaces as
    /// `DbError::UniqueViolation` on duplicate serials.
    pub async fn insert(&self, unit: &SerialUnit) -> DbResult<()> {
        debug!(id = %unit.id, variant_id = %unit.variant_id, "Inserting serial unit");

        sqlx::query(
            "INSERT INTO serial_units \
                (id, variant_id, serial_or_imei, status, sold_to, sold_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&unit.id)
        .bind(&unit.variant_id)
        .bind(&unit.serial_or_imei)
        .bind(unit.status)
        .bind(&unit.sold_to)
        .bind(unit.sold_at)
        .bind(unit.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a serial unit by id.
    pub async fn find(&self, id: &str) -> DbResult<Option<SerialUnit>> {
        let unit = sqlx::query_as::<_, SerialUnit>(&format!(
            "SELECT {SERIAL_COLUMNS} FROM serial_units WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(unit)
    }

    /// Looks a unit up by its serial / IMEI within one variant.
    pub async fn find_by_serial(
        &self,
        variant_id: &str,
        serial: &str,
    ) -> DbResult<Option<SerialUnit>> {
        let unit = sqlx::query_as::<_, SerialUnit>(&format!(
            "SELECT {SERIAL_COLUMNS} FROM serial_units \
             WHERE variant_id = ?1 AND serial_or_imei = ?2"
        ))
        .bind(variant_id)
        .bind(serial)
        .fetch_optional(&self.pool)
        .await?;

        Ok(unit)
    }

    /// Lists all units of a variant, oldest first.
    pub async fn list_for_variant(&self, variant_id: &str) -> DbResult<Vec<SerialUnit>> {
        let units = sqlx::query_as::<_, SerialUnit>(&format!(
            "SELECT {SERIAL_COLUMNS} FROM serial_units \
             WHERE variant_id = ?1 ORDER BY created_at, id"
        ))
        .bind(variant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(units)
    }

    /// Counts units of a variant currently available for sale.
    pub async fn count_available(&self, variant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM serial_units \
             WHERE variant_id = ?1 AND status = 'available'",
        )
        .bind(variant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Reserves `quantity` available units of a variant, oldest first.
    ///
    /// All-or-nothing: either exactly `quantity` units flip to `sold`
    /// within one transaction, or the transaction rolls back and
    /// [`ReserveOutcome::Insufficient`] reports the available count.
    pub async fn reserve(
        &self,
        variant_id: &str,
        quantity: i64,
        sold_to: Option<&str>,
    ) -> DbResult<ReserveOutcome> {
        debug!(variant_id = %variant_id, quantity = %quantity, "Reserving serial units");

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let reserved = sqlx::query_as::<_, SerialUnit>(&format!(
            "UPDATE serial_units SET status = 'sold', sold_to = ?3, sold_at = ?4 \
             WHERE id IN ( \
                 SELECT id FROM serial_units \
                 WHERE variant_id = ?1 AND status = 'available' \
                 ORDER BY created_at, id LIMIT ?2 \
             ) \
             RETURNING {SERIAL_COLUMNS}"
        ))
        .bind(variant_id)
        .bind(quantity)
        .bind(sold_to)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        if (reserved.len() as i64) < quantity {
            let available = reserved.len() as i64;
            tx.rollback().await?;
            return Ok(ReserveOutcome::Insufficient { available });
        }

        tx.commit().await?;
        Ok(ReserveOutcome::Reserved(reserved))
    }

    /// Restores exactly the given unit ids to `available`.
    ///
    /// Only `sold` units flip back; a unit damaged in the meantime stays
    /// damaged. Returns the number of units actually restored.
    pub async fn restore(&self, unit_ids: &[String]) -> DbResult<u64> {
        debug!(count = unit_ids.len(), "Restoring serial units");

        let mut tx = self.pool.begin().await?;
        let mut restored = 0u64;

        for id in unit_ids {
            let result = sqlx::query(
                "UPDATE serial_units \
                 SET status = 'available', sold_to = NULL, sold_at = NULL \
                 WHERE id = ?1 AND status = 'sold'",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;

            restored += result.rows_affected();
        }

        tx.commit().await?;
        Ok(restored)
    }

    /// Marks one unit as damaged, pulling it out of sellable stock.
    pub async fn mark_damaged(&self, id: &str) -> DbResult<SerialUnit> {
        debug!(id = %id, "Marking serial unit damaged");

        sqlx::query("UPDATE serial_units SET status = 'damaged' WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("SerialUnit", id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
