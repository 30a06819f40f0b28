//! # Order Repository
//!
//! Database operations for warehouse orders and their line items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Warehouse Order Lifecycle                            │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── insert_order() → WarehouseOrder { status: Pending }            │
//! │         (items and their stock reservations already decided)           │
//! │                                                                         │
//! │  2. ADVANCE                                                            │
//! │     └── set_status_if(Pending → Confirmed)                             │
//! │     └── set_status_if(Confirmed → Shipped) + set_item_shipment()       │
//! │     └── set_status_if(Shipped → Completed)                             │
//! │                                                                         │
//! │  3. (OPTIONAL) CANCEL                                                  │
//! │     └── mark_cancelled() from Pending/Confirmed only                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every status change is a CONDITIONAL update (`WHERE status = from`).
//! Two racing transitions cannot both win: the loser's UPDATE matches
//! zero rows and the caller sees that without any read-modify-write gap.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use harbor_core::{OrderStatus, WarehouseOrder, WarehouseOrderItem};

const ORDER_COLUMNS: &str = "id, tenant_id, order_number, status, subtotal_cents, tax_cents, \
     total_cents, cancel_reason, cancelled_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, name_snapshot, quantity, \
     unit_price_cents, tax_class, tax_cents, subtotal_cents, reserved_serials, \
     shipped_quantity, shipped_serials, created_at";

/// Repository for warehouse order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<WarehouseOrder>> {
        let order = sqlx::query_as::<_, WarehouseOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM warehouse_orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets all line items for an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<WarehouseOrderItem>> {
        let items = sqlx::query_as::<_, WarehouseOrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM warehouse_order_items \
             WHERE order_id = ?1 ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Inserts an order together with its line items in one transaction.
    pub async fn insert_order(
        &self,
        order: &WarehouseOrder,
        items: &[WarehouseOrderItem],
    ) -> DbResult<()> {
        debug!(id = %order.id, order_number = %order.order_number, items = items.len(),
               "Inserting warehouse order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO warehouse_orders ({ORDER_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ))
        .bind(&order.id)
        .bind(&order.tenant_id)
        .bind(&order.order_number)
        .bind(order.status)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.total_cents)
        .bind(&order.cancel_reason)
        .bind(order.cancelled_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(&format!(
                "INSERT INTO warehouse_order_items ({ITEM_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ))
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.tax_class)
            .bind(item.tax_cents)
            .bind(item.subtotal_cents)
            .bind(&item.reserved_serials)
            .bind(item.shipped_quantity)
            .bind(&item.shipped_serials)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Advances the order status, but only if it currently holds `from`.
    ///
    /// ## Returns
    /// * `Ok(true)` - the transition was applied
    /// * `Ok(false)` - order exists but its status was not `from`
    /// * `Err(NotFound)` - no such order
    pub async fn set_status_if(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> DbResult<bool> {
        debug!(id = %id, from = %from, to = %to, "Transitioning order status");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE warehouse_orders SET status = ?3, updated_at = ?4 \
             WHERE id = ?1 AND status = ?2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        if self.get_by_id(id).await?.is_some() {
            Ok(false)
        } else {
            Err(DbError::not_found("WarehouseOrder", id))
        }
    }

    /// Marks an order cancelled with a reason, but only from a
    /// cancellable status.
    ///
    /// Same conditional shape as [`set_status_if`](Self::set_status_if):
    /// `rows_affected == 0` with an existing row means the order was
    /// already past the point of cancellation.
    pub async fn mark_cancelled(&self, id: &str, reason: &str) -> DbResult<bool> {
        debug!(id = %id, reason = %reason, "Cancelling order");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE warehouse_orders SET \
                status = 'cancelled', cancel_reason = ?2, cancelled_at = ?3, updated_at = ?3 \
             WHERE id = ?1 AND status IN ('pending', 'confirmed')",
        )
        .bind(id)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        if self.get_by_id(id).await?.is_some() {
            Ok(false)
        } else {
            Err(DbError::not_found("WarehouseOrder", id))
        }
    }

    /// Records the shipment snapshot on one line item.
    pub async fn set_item_shipment(
        &self,
        item_id: &str,
        shipped_quantity: i64,
        shipped_serials: &str,
    ) -> DbResult<()> {
        debug!(item_id = %item_id, shipped_quantity = %shipped_quantity,
               "Recording item shipment");

        let result = sqlx::query(
            "UPDATE warehouse_order_items SET \
                shipped_quantity = ?2, shipped_serials = ?3 \
             WHERE id = ?1",
        )
        .bind(item_id)
        .bind(shipped_quantity)
        .bind(shipped_serials)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("WarehouseOrderItem", item_id));
        }

        Ok(())
    }

    /// Overwrites an order's aggregates and drifted line-item tax fields
    /// in one transaction.
    ///
    /// Used by reconciliation repair: either every correction lands or
    /// none does. `item_repairs` carries `(item_id, tax_cents,
    /// subtotal_cents)` triples.
    pub async fn apply_repair(
        &self,
        id: &str,
        subtotal_cents: i64,
        tax_cents: i64,
        total_cents: i64,
        item_repairs: &[(String, i64, i64)],
    ) -> DbResult<()> {
        debug!(id = %id, items = item_repairs.len(), "Applying order repair");

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE warehouse_orders SET \
                subtotal_cents = ?2, tax_cents = ?3, total_cents = ?4, updated_at = ?5 \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(subtotal_cents)
        .bind(tax_cents)
        .bind(total_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("WarehouseOrder", id));
        }

        for (item_id, item_tax, item_subtotal) in item_repairs {
            sqlx::query(
                "UPDATE warehouse_order_items SET tax_cents = ?2, subtotal_cents = ?3 \
                 WHERE id = ?1",
            )
            .bind(item_id)
            .bind(item_tax)
            .bind(item_subtotal)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Lists order ids, oldest first (reconciliation sweep input).
    pub async fn list_ids(&self) -> DbResult<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM warehouse_orders ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids)
    }

    /// Generates the next order number for today: `WO-YYYYMMDD-NNNN`.
    pub async fn next_order_number(&self) -> DbResult<String> {
        let date_part = Utc::now().format("%Y%m%d").to_string();
        let prefix = format!("WO-{}-%", date_part);

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM warehouse_orders WHERE order_number LIKE ?1")
                .bind(&prefix)
                .fetch_one(&self.pool)
                .await?;

        Ok(format!("WO-{}-{:04}", date_part, count + 1))
    }
}

/// Generates a new order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new order item ID.
pub fn generate_order_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use harbor_core::{TaxClass, DEFAULT_TENANT_ID};

    fn test_order(id: &str, number: &str) -> WarehouseOrder {
        let now = Utc::now();
        WarehouseOrder {
            id: id.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            order_number: number.to_string(),
            status: OrderStatus::Pending,
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            cancel_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn test_item(id: &str, order_id: &str) -> WarehouseOrderItem {
        WarehouseOrderItem {
            id: id.to_string(),
            order_id: order_id.to_string(),
            product_id: "v1".to_string(),
            name_snapshot: "Widget".to_string(),
            quantity: 2,
            unit_price_cents: 1000,
            tax_class: TaxClass::Standard23,
            tax_cents: 374,
            subtotal_cents: 1626,
            reserved_serials: "[]".to_string(),
            shipped_quantity: None,
            shipped_serials: None,
            created_at: Utc::now(),
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_fetch_with_items() {
        let db = test_db().await;
        let repo = db.orders();

        let order = test_order("o1", "WO-20260831-0001");
        let items = vec![test_item("i1", "o1"), test_item("i2", "o1")];
        repo.insert_order(&order, &items).await.unwrap();

        let fetched = repo.get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(fetched.status, OrderStatus::Pending);
        assert_eq!(repo.get_items("o1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_conditional_transition() {
        let db = test_db().await;
        let repo = db.orders();
        repo.insert_order(&test_order("o1", "WO-20260831-0001"), &[])
            .await
            .unwrap();

        assert!(repo
            .set_status_if("o1", OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap());

        // Replaying the same transition finds no matching row
        assert!(!repo
            .set_status_if("o1", OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap());

        let order = repo.get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cancel_window() {
        let db = test_db().await;
        let repo = db.orders();
        repo.insert_order(&test_order("o1", "WO-20260831-0001"), &[])
            .await
            .unwrap();

        repo.set_status_if("o1", OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        repo.set_status_if("o1", OrderStatus::Confirmed, OrderStatus::Shipped)
            .await
            .unwrap();

        // Shipped orders can no longer be cancelled
        assert!(!repo.mark_cancelled("o1", "changed mind").await.unwrap());
        let order = repo.get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert!(order.cancel_reason.is_none());
    }
}
