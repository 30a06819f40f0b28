//! # Order Lifecycle
//!
//! The warehouse order state machine and its stock side effects.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                                                                     │
//! │   pending ──► confirmed ──► shipped ──► completed                   │
//! │      │            │                                                 │
//! │      └────────────┴──────► cancelled                                │
//! │                                                                     │
//! │   Stock is reserved at CREATE and held through every forward        │
//! │   transition. Only CANCEL gives it back, restoring exactly what     │
//! │   the order's snapshots say was taken.                              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transition legality lives on `OrderStatus::can_transition_to` in
//! harbor-core; persistence enforces it a second time with conditional
//! updates (`WHERE status = from`), so a race loses cleanly instead of
//! double-applying.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::ProductCatalog;
use crate::error::{ServiceError, ServiceResult};
use crate::ledger::InventoryLedger;
use harbor_core::validation::validate_quantity;
use harbor_core::{
    compute, encode_serial_list, CoreError, Money, OrderStatus, PriceConvention, TaxRole,
    ValidationError, WarehouseOrder, WarehouseOrderItem, DEFAULT_TENANT_ID,
};
use harbor_db::Database;

/// One requested order line.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

/// Warehouse order orchestration service.
#[derive(Debug, Clone)]
pub struct OrderLifecycle {
    db: Database,
    catalog: ProductCatalog,
    ledger: InventoryLedger,
}

impl OrderLifecycle {
    /// Creates a new OrderLifecycle.
    pub fn new(db: Database) -> Self {
        let catalog = ProductCatalog::new(db.clone());
        let ledger = InventoryLedger::new(db.clone());
        OrderLifecycle {
            db,
            catalog,
            ledger,
        }
    }

    /// Gets an order with its line items.
    pub async fn get(&self, order_id: &str) -> ServiceResult<(WarehouseOrder, Vec<WarehouseOrderItem>)> {
        let order = self
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        let items = self.db.orders().get_items(order_id).await?;
        Ok((order, items))
    }

    /// Creates a pending order, reserving stock line by line.
    ///
    /// Pricing: unit wholesale price, quoted tax-INCLUSIVE, computed with
    /// role = purchase (margin-scheme goods carry no deductible VAT on
    /// the purchase side).
    ///
    /// If any line fails (missing variant, insufficient stock), every
    /// reservation made for the earlier lines is rolled back before the
    /// error propagates.
    pub async fn create(
        &self,
        lines: Vec<OrderLine>,
    ) -> ServiceResult<(WarehouseOrder, Vec<WarehouseOrderItem>)> {
        if lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }

        let order_id = Uuid::new_v4().to_string();
        debug!(order_id = %order_id, lines = lines.len(), "Creating warehouse order");

        // (variant_id, quantity, reserved unit ids) for rollback
        let mut reservations: Vec<(String, i64, Vec<String>)> = Vec::new();
        let mut items: Vec<WarehouseOrderItem> = Vec::new();
        let now = Utc::now();

        let mut subtotal = Money::zero();
        let mut tax = Money::zero();
        let mut total = Money::zero();

        for line in &lines {
            let built = self.build_line(&order_id, line, now).await;
            match built {
                Ok((item, unit_ids)) => {
                    subtotal += Money::from_cents(item.subtotal_cents);
                    tax += Money::from_cents(item.tax_cents);
                    total += Money::from_cents(item.line_total_cents());
                    reservations.push((line.product_id.clone(), line.quantity, unit_ids));
                    items.push(item);
                }
                Err(err) => {
                    self.rollback_reservations(&reservations).await;
                    return Err(err);
                }
            }
        }

        let order = WarehouseOrder {
            id: order_id.clone(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            order_number: self.db.orders().next_order_number().await?,
            status: OrderStatus::Pending,
            subtotal_cents: subtotal.cents(),
            tax_cents: tax.cents(),
            total_cents: total.cents(),
            cancel_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.db.orders().insert_order(&order, &items).await {
            self.rollback_reservations(&reservations).await;
            return Err(err.into());
        }

        info!(order_id = %order_id, order_number = %order.order_number,
              total = %total, "Warehouse order created");
        Ok((order, items))
    }

    /// Confirms a pending order.
    ///
    /// Every line's product must still resolve; a dangling reference is
    /// surfaced as [`CoreError::DanglingLineItem`], never skipped.
    pub async fn confirm(&self, order_id: &str) -> ServiceResult<WarehouseOrder> {
        let (_, items) = self.get(order_id).await?;

        for item in &items {
            if self.catalog.try_lookup(&item.product_id).await?.is_none() {
                return Err(ServiceError::Domain(CoreError::DanglingLineItem {
                    order_id: order_id.to_string(),
                    product_id: item.product_id.clone(),
                }));
            }
        }

        self.transition(order_id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
    }

    /// Ships a confirmed order, snapshotting what left the warehouse.
    ///
    /// The snapshot pins the exact serial ids (or quantity) dispatched,
    /// so a later cancellation restores precisely those units even if
    /// the item rows are edited in between.
    pub async fn ship(&self, order_id: &str) -> ServiceResult<WarehouseOrder> {
        let order = self
            .transition(order_id, OrderStatus::Confirmed, OrderStatus::Shipped)
            .await?;

        let items = self.db.orders().get_items(order_id).await?;
        for item in &items {
            self.db
                .orders()
                .set_item_shipment(&item.id, item.quantity, &item.reserved_serials)
                .await?;
        }

        info!(order_id = %order_id, items = items.len(), "Order shipped");
        Ok(order)
    }

    /// Completes a shipped order. Terminal; no stock mutation.
    pub async fn complete(&self, order_id: &str) -> ServiceResult<WarehouseOrder> {
        self.transition(order_id, OrderStatus::Shipped, OrderStatus::Completed)
            .await
    }

    /// Cancels a pending or confirmed order and gives its stock back.
    ///
    /// ## Restoration
    /// Per item, the shipment snapshot wins when present; otherwise the
    /// reserved serials (or the original quantity). Serial-tracked lines
    /// flip exactly the snapshotted unit ids back to available.
    ///
    /// ## Idempotence
    /// The cancelled status is claimed FIRST with a conditional update.
    /// A second cancel finds no cancellable row and gets
    /// [`CoreError::AlreadyCancelled`], so stock cannot be restored
    /// twice.
    pub async fn cancel(&self, order_id: &str, reason: &str) -> ServiceResult<WarehouseOrder> {
        if reason.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "reason".to_string(),
            }
            .into());
        }

        let cancelled = self.db.orders().mark_cancelled(order_id, reason).await?;
        if !cancelled {
            let order = self
                .db
                .orders()
                .get_by_id(order_id)
                .await?
                .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

            return Err(match order.status {
                OrderStatus::Cancelled => ServiceError::Domain(CoreError::AlreadyCancelled {
                    order_id: order_id.to_string(),
                }),
                current => ServiceError::Domain(CoreError::InvalidTransition {
                    order_id: order_id.to_string(),
                    current: current.to_string(),
                    requested: OrderStatus::Cancelled.to_string(),
                }),
            });
        }

        let items = self.db.orders().get_items(order_id).await?;
        for item in &items {
            self.restore_item(order_id, item).await?;
        }

        let (order, _) = self.get(order_id).await?;
        info!(order_id = %order_id, reason = %reason, "Order cancelled, stock restored");
        Ok(order)
    }

    /// Restores one cancelled line from its snapshots.
    async fn restore_item(&self, order_id: &str, item: &WarehouseOrderItem) -> ServiceResult<()> {
        if self.catalog.try_lookup(&item.product_id).await?.is_none() {
            warn!(order_id = %order_id, product_id = %item.product_id,
                  "Skipping restore for dangling product");
            return Ok(());
        }

        let serial_ids = match item.shipped_serial_ids()? {
            Some(ids) if !ids.is_empty() => ids,
            Some(_) | None => item.reserved_serial_ids()?,
        };

        if serial_ids.is_empty() {
            let quantity = item.shipped_quantity.unwrap_or(item.quantity);
            self.ledger.restore(&item.product_id, quantity).await?;
        } else {
            self.ledger
                .restore_serials(&item.product_id, &serial_ids)
                .await?;
        }

        Ok(())
    }

    /// Builds one priced, reserved line item.
    async fn build_line(
        &self,
        order_id: &str,
        line: &OrderLine,
        now: chrono::DateTime<Utc>,
    ) -> ServiceResult<(WarehouseOrderItem, Vec<String>)> {
        validate_quantity(line.quantity)?;
        let located = self.catalog.lookup(&line.product_id).await?;

        let units = self
            .ledger
            .reserve(&line.product_id, line.quantity, Some(order_id))
            .await?;
        let unit_ids: Vec<String> = units.into_iter().map(|u| u.id).collect();

        let breakdown = compute(
            located.variant.tax_class,
            TaxRole::Purchase,
            PriceConvention::Inclusive,
            located.variant.wholesale_price(),
            located.variant.cost_price(),
            line.quantity,
        )?;

        let item = WarehouseOrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            product_id: line.product_id.clone(),
            name_snapshot: located.variant.name.clone(),
            quantity: line.quantity,
            unit_price_cents: located.variant.wholesale_price_cents,
            tax_class: located.variant.tax_class,
            tax_cents: breakdown.tax.cents(),
            subtotal_cents: (breakdown.gross - breakdown.tax).cents(),
            reserved_serials: encode_serial_list(&unit_ids),
            shipped_quantity: None,
            shipped_serials: None,
            created_at: now,
        };

        Ok((item, unit_ids))
    }

    /// Applies a conditional transition, mapping a lost race or wrong
    /// starting state to [`CoreError::InvalidTransition`].
    async fn transition(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> ServiceResult<WarehouseOrder> {
        let moved = self.db.orders().set_status_if(order_id, from, to).await?;

        if !moved {
            let order = self
                .db
                .orders()
                .get_by_id(order_id)
                .await?
                .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

            return Err(ServiceError::Domain(CoreError::InvalidTransition {
                order_id: order_id.to_string(),
                current: order.status.to_string(),
                requested: to.to_string(),
            }));
        }

        info!(order_id = %order_id, from = %from, to = %to, "Order transitioned");
        let (order, _) = self.get(order_id).await?;
        Ok(order)
    }

    /// Best-effort rollback of reservations made before a create failed.
    async fn rollback_reservations(&self, reservations: &[(String, i64, Vec<String>)]) {
        for (variant_id, quantity, unit_ids) in reservations {
            let result = if unit_ids.is_empty() {
                self.ledger.restore(variant_id, *quantity).await
            } else {
                self.ledger.restore_serials(variant_id, unit_ids).await
            };

            if let Err(err) = result {
                warn!(variant_id = %variant_id, error = %err,
                      "Failed to roll back reservation");
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NewVariant;
    use harbor_core::{Representation, SerialStatus, SerialUnit, TaxClass};
    use harbor_db::{DbConfig, VariantStore};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    // Wholesale 12.30 inclusive at 23% => net 10.00, tax 2.30 per unit
    async fn quantity_variant(db: &Database, stock: i64, tax_class: TaxClass) -> String {
        let catalog = ProductCatalog::new(db.clone());
        let variant = catalog
            .register(NewVariant {
                name: "Cable".to_string(),
                brand: "Acme".to_string(),
                model: "M1".to_string(),
                color: None,
                representation: Representation::Quantity,
                cost_price_cents: 600,
                wholesale_price_cents: 1230,
                retail_price_cents: 2000,
                tax_class,
                location: None,
                condition_grade: None,
            })
            .await
            .unwrap();
        db.variants()
            .set_stock(VariantStore::Primary, &variant.id, stock)
            .await
            .unwrap();
        variant.id
    }

    async fn serial_variant(db: &Database, units: usize) -> String {
        let catalog = ProductCatalog::new(db.clone());
        let variant = catalog
            .register(NewVariant {
                name: "Phone".to_string(),
                brand: "Acme".to_string(),
                model: "P1".to_string(),
                color: None,
                representation: Representation::SerialTracked,
                cost_price_cents: 20_000,
                wholesale_price_cents: 36_900,
                retail_price_cents: 49_900,
                tax_class: TaxClass::Standard23,
                location: None,
                condition_grade: None,
            })
            .await
            .unwrap();
        for n in 0..units {
            db.serial_units()
                .insert(&SerialUnit {
                    id: Uuid::new_v4().to_string(),
                    variant_id: variant.id.clone(),
                    serial_or_imei: format!("IMEI-{:03}", n),
                    status: SerialStatus::Available,
                    sold_to: None,
                    sold_at: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        db.variants()
            .set_stock(VariantStore::Primary, &variant.id, units as i64)
            .await
            .unwrap();
        variant.id
    }

    fn line(product_id: &str, quantity: i64) -> OrderLine {
        OrderLine {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_create_prices_inclusive_and_reserves() {
        let db = test_db().await;
        let lifecycle = OrderLifecycle::new(db.clone());
        let id = quantity_variant(&db, 5, TaxClass::Standard23).await;

        let (order, items) = lifecycle.create(vec![line(&id, 2)]).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].tax_cents, 460);
        assert_eq!(items[0].subtotal_cents, 2000);
        assert_eq!(order.subtotal_cents, 2000);
        assert_eq!(order.tax_cents, 460);
        assert_eq!(order.total_cents, 2460);
        assert_eq!(order.subtotal_cents + order.tax_cents, order.total_cents);

        let ledger = InventoryLedger::new(db);
        assert_eq!(ledger.available(&id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_margin_purchase_carries_no_tax() {
        let db = test_db().await;
        let lifecycle = OrderLifecycle::new(db.clone());
        let id = quantity_variant(&db, 5, TaxClass::MarginVat).await;

        let (order, items) = lifecycle.create(vec![line(&id, 3)]).await.unwrap();

        assert_eq!(items[0].tax_cents, 0);
        assert_eq!(items[0].subtotal_cents, 3 * 1230);
        assert_eq!(order.tax_cents, 0);
        assert_eq!(order.total_cents, 3 * 1230);
    }

    #[tokio::test]
    async fn test_full_forward_path() {
        let db = test_db().await;
        let lifecycle = OrderLifecycle::new(db.clone());
        let id = serial_variant(&db, 2).await;

        let (order, _) = lifecycle.create(vec![line(&id, 2)]).await.unwrap();
        let order = lifecycle.confirm(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);

        let order = lifecycle.ship(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);

        // Shipment snapshot pins the dispatched units
        let items = db.orders().get_items(&order.id).await.unwrap();
        assert_eq!(items[0].shipped_quantity, Some(2));
        assert_eq!(
            items[0].shipped_serial_ids().unwrap().unwrap(),
            items[0].reserved_serial_ids().unwrap()
        );

        let order = lifecycle.complete(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_earlier_reservations() {
        let db = test_db().await;
        let lifecycle = OrderLifecycle::new(db.clone());
        let first = quantity_variant(&db, 5, TaxClass::Standard23).await;
        let second = serial_variant(&db, 1).await;

        let err = lifecycle
            .create(vec![line(&first, 4), line(&second, 3)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::InsufficientStock { .. })
        ));

        // First line's reservation was undone; no order row exists
        let ledger = InventoryLedger::new(db.clone());
        assert_eq!(ledger.available(&first).await.unwrap(), 5);
        assert!(db.orders().list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_restores_exact_serials() {
        let db = test_db().await;
        let lifecycle = OrderLifecycle::new(db.clone());
        let ledger = InventoryLedger::new(db.clone());
        let id = serial_variant(&db, 3).await;

        let (order, items) = lifecycle.create(vec![line(&id, 2)]).await.unwrap();
        let reserved = items[0].reserved_serial_ids().unwrap();
        assert_eq!(ledger.available(&id).await.unwrap(), 1);

        lifecycle.cancel(&order.id, "customer withdrew").await.unwrap();

        assert_eq!(ledger.available(&id).await.unwrap(), 3);
        for unit_id in &reserved {
            let unit = db.serial_units().find(unit_id).await.unwrap().unwrap();
            assert_eq!(unit.status, SerialStatus::Available);
            assert!(unit.sold_to.is_none());
        }

        let (order, _) = lifecycle.get(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.cancel_reason.as_deref(), Some("customer withdrew"));
        assert!(order.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn test_double_cancel_never_double_restores() {
        let db = test_db().await;
        let lifecycle = OrderLifecycle::new(db.clone());
        let ledger = InventoryLedger::new(db.clone());
        let id = quantity_variant(&db, 5, TaxClass::Standard23).await;

        let (order, _) = lifecycle.create(vec![line(&id, 2)]).await.unwrap();
        lifecycle.cancel(&order.id, "first").await.unwrap();
        assert_eq!(ledger.available(&id).await.unwrap(), 5);

        let err = lifecycle.cancel(&order.id, "second").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::AlreadyCancelled { .. })
        ));
        assert!(err.is_state_error());

        // Stock untouched by the rejected replay
        assert_eq!(ledger.available(&id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_cancel_after_ship_rejected() {
        let db = test_db().await;
        let lifecycle = OrderLifecycle::new(db.clone());
        let ledger = InventoryLedger::new(db.clone());
        let id = quantity_variant(&db, 5, TaxClass::Standard23).await;

        let (order, _) = lifecycle.create(vec![line(&id, 2)]).await.unwrap();
        lifecycle.confirm(&order.id).await.unwrap();
        lifecycle.ship(&order.id).await.unwrap();

        let err = lifecycle.cancel(&order.id, "too late").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::InvalidTransition { .. })
        ));

        let (order, _) = lifecycle.get(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(ledger.available(&id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_skipping_confirm_rejected() {
        let db = test_db().await;
        let lifecycle = OrderLifecycle::new(db.clone());
        let id = quantity_variant(&db, 5, TaxClass::Standard23).await;

        let (order, _) = lifecycle.create(vec![line(&id, 1)]).await.unwrap();
        let err = lifecycle.ship(&order.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::InvalidTransition { .. })
        ));

        let (order, _) = lifecycle.get(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_confirm_surfaces_dangling_line() {
        let db = test_db().await;
        let lifecycle = OrderLifecycle::new(db.clone());
        let id = quantity_variant(&db, 5, TaxClass::Standard23).await;

        let (order, _) = lifecycle.create(vec![line(&id, 1)]).await.unwrap();

        // Simulate a variant row lost to a botched migration
        sqlx::query("DELETE FROM variants WHERE id = ?1")
            .bind(&id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = lifecycle.confirm(&order.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::DanglingLineItem { .. })
        ));
        assert!(err.is_state_error());

        let (order, _) = lifecycle.get(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }
}
