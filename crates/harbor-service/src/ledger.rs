//! # Inventory Ledger
//!
//! Stock reservation and restoration across both representations.
//!
//! ## Two Representations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Quantity          ── counter on the variant row                   │
//! │    reserve(3)      ── conditional decrement, no unit identity      │
//! │    restore(3)      ── increment + reactivate                       │
//! │                                                                     │
//! │  SerialTracked     ── one row per physical unit                    │
//! │    reserve(3)      ── flip 3 available units to sold, all-or-      │
//! │                       nothing, caller learns WHICH units           │
//! │    restore([ids])  ── flip exactly those ids back                  │
//! │                                                                     │
//! │  After every serial mutation:                                      │
//! │    variant.stock_quantity = count(status = available)              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//! Every reservation either fully succeeds or leaves stock byte-for-byte
//! unchanged. There is no partial fulfilment.

use tracing::{debug, info};

use crate::catalog::{LocatedVariant, ProductCatalog};
use crate::error::{ServiceError, ServiceResult};
use harbor_core::validation::validate_quantity;
use harbor_core::{CoreError, Representation, SerialUnit, ValidationError};
use harbor_db::{Database, ReserveOutcome};

/// Stock reservation and restoration service.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    db: Database,
    catalog: ProductCatalog,
}

impl InventoryLedger {
    /// Creates a new InventoryLedger.
    pub fn new(db: Database) -> Self {
        let catalog = ProductCatalog::new(db.clone());
        InventoryLedger { db, catalog }
    }

    /// Currently sellable stock of a variant.
    pub async fn available(&self, variant_id: &str) -> ServiceResult<i64> {
        let located = self.catalog.lookup(variant_id).await?;
        Ok(located.variant.stock_quantity)
    }

    /// Reserves `quantity` units of a variant.
    ///
    /// For serial-tracked variants the reserved units come back so the
    /// caller can snapshot their ids; quantity-counted variants return
    /// an empty list.
    ///
    /// ## Errors
    /// * [`CoreError::InsufficientStock`] - fewer units than requested;
    ///   stock is unchanged
    /// * [`CoreError::VariantNotFound`] - id resolves in no store
    pub async fn reserve(
        &self,
        variant_id: &str,
        quantity: i64,
        sold_to: Option<&str>,
    ) -> ServiceResult<Vec<SerialUnit>> {
        validate_quantity(quantity)?;
        let located = self.catalog.lookup(variant_id).await?;

        match located.variant.representation {
            Representation::Quantity => {
                let reserved = self
                    .db
                    .variants()
                    .reserve_quantity(located.store, variant_id, quantity)
                    .await?;

                if !reserved {
                    let available = self
                        .db
                        .variants()
                        .stock_of(located.store, variant_id)
                        .await?
                        .unwrap_or(0);
                    return Err(ServiceError::Domain(CoreError::InsufficientStock {
                        variant_id: variant_id.to_string(),
                        available,
                        requested: quantity,
                    }));
                }

                info!(variant_id = %variant_id, quantity = %quantity, "Reserved quantity stock");
                Ok(Vec::new())
            }
            Representation::SerialTracked => {
                match self
                    .db
                    .serial_units()
                    .reserve(variant_id, quantity, sold_to)
                    .await?
                {
                    ReserveOutcome::Reserved(units) => {
                        self.sync_serial_stock(&located).await?;
                        info!(variant_id = %variant_id, quantity = %quantity,
                              "Reserved serial units");
                        Ok(units)
                    }
                    ReserveOutcome::Insufficient { available } => {
                        Err(ServiceError::Domain(CoreError::InsufficientStock {
                            variant_id: variant_id.to_string(),
                            available,
                            requested: quantity,
                        }))
                    }
                }
            }
        }
    }

    /// Restores quantity-counted stock.
    ///
    /// Serial-tracked variants restore through
    /// [`restore_serials`](Self::restore_serials); handing them a bare
    /// count would invent unit identities.
    pub async fn restore(&self, variant_id: &str, quantity: i64) -> ServiceResult<()> {
        validate_quantity(quantity)?;
        let located = self.catalog.lookup(variant_id).await?;

        match located.variant.representation {
            Representation::Quantity => {
                self.db
                    .variants()
                    .restore_quantity(located.store, variant_id, quantity)
                    .await?;
                info!(variant_id = %variant_id, quantity = %quantity, "Restored quantity stock");
                Ok(())
            }
            Representation::SerialTracked => Err(ValidationError::InvalidFormat {
                field: "variant_id".to_string(),
                reason: "serial-tracked variants restore by unit ids".to_string(),
            }
            .into()),
        }
    }

    /// Restores exactly the given serial units and resyncs the derived
    /// stock count.
    ///
    /// Units damaged while sold stay damaged; only `sold` units flip
    /// back to `available`.
    pub async fn restore_serials(
        &self,
        variant_id: &str,
        unit_ids: &[String],
    ) -> ServiceResult<()> {
        if unit_ids.is_empty() {
            return Ok(());
        }

        let located = self.catalog.lookup(variant_id).await?;
        let restored = self.db.serial_units().restore(unit_ids).await?;
        self.sync_serial_stock(&located).await?;

        info!(variant_id = %variant_id, requested = unit_ids.len(), restored = %restored,
              "Restored serial units");
        Ok(())
    }

    /// Marks one unit damaged (out of sellable stock) and resyncs the
    /// derived count.
    pub async fn damage_serial(
        &self,
        variant_id: &str,
        serial_or_imei: &str,
    ) -> ServiceResult<SerialUnit> {
        let located = self.catalog.lookup(variant_id).await?;

        let unit = self
            .db
            .serial_units()
            .find_by_serial(variant_id, serial_or_imei)
            .await?
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "serial_or_imei".to_string(),
                reason: format!("no unit '{}' on variant {}", serial_or_imei, variant_id),
            })?;

        let unit = self.db.serial_units().mark_damaged(&unit.id).await?;
        self.sync_serial_stock(&located).await?;

        info!(variant_id = %variant_id, serial = %serial_or_imei, "Serial unit damaged");
        Ok(unit)
    }

    /// Rewrites the variant's cached stock to `count(status = available)`.
    async fn sync_serial_stock(&self, located: &LocatedVariant) -> ServiceResult<()> {
        let available = self
            .db
            .serial_units()
            .count_available(&located.variant.id)
            .await?;

        debug!(variant_id = %located.variant.id, available = %available,
               "Syncing derived stock");

        self.db
            .variants()
            .set_stock(located.store, &located.variant.id, available)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NewVariant;
    use chrono::Utc;
    use harbor_core::{SerialStatus, TaxClass};
    use harbor_db::{DbConfig, VariantStore};
    use uuid::Uuid;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn draft(name: &str, representation: Representation) -> NewVariant {
        NewVariant {
            name: name.to_string(),
            brand: "Acme".to_string(),
            model: "M1".to_string(),
            color: None,
            representation,
            cost_price_cents: 500,
            wholesale_price_cents: 800,
            retail_price_cents: 1200,
            tax_class: TaxClass::Standard23,
            location: None,
            condition_grade: None,
        }
    }

    async fn quantity_variant(db: &Database, stock: i64) -> String {
        let catalog = ProductCatalog::new(db.clone());
        let variant = catalog
            .register(draft("Cable", Representation::Quantity))
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
            .register(draft("Phone", Representation::SerialTracked))
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

    #[tokio::test]
    async fn test_insufficient_quantity_leaves_stock_unchanged() {
        let db = test_db().await;
        let ledger = InventoryLedger::new(db.clone());
        let id = quantity_variant(&db, 2).await;

        let err = ledger.reserve(&id, 5, None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::InsufficientStock {
                available: 2,
                requested: 5,
                ..
            })
        ));
        assert_eq!(ledger.available(&id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_serial_reserve_returns_units_and_syncs_count() {
        let db = test_db().await;
        let ledger = InventoryLedger::new(db.clone());
        let id = serial_variant(&db, 3).await;

        let units = ledger.reserve(&id, 2, Some("cust-1")).await.unwrap();
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.sold_to.as_deref() == Some("cust-1")));

        // Derived count tracks the unit rows
        assert_eq!(ledger.available(&id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_serial_insufficient_is_all_or_nothing() {
        let db = test_db().await;
        let ledger = InventoryLedger::new(db.clone());
        let id = serial_variant(&db, 2).await;

        let err = ledger.reserve(&id, 3, None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            })
        ));
        assert_eq!(ledger.available(&id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_restore_serials_reactivates_and_recounts() {
        let db = test_db().await;
        let ledger = InventoryLedger::new(db.clone());
        let id = serial_variant(&db, 1).await;

        let units = ledger.reserve(&id, 1, None).await.unwrap();
        assert_eq!(ledger.available(&id).await.unwrap(), 0);

        let unit_ids: Vec<String> = units.into_iter().map(|u| u.id).collect();
        ledger.restore_serials(&id, &unit_ids).await.unwrap();

        assert_eq!(ledger.available(&id).await.unwrap(), 1);
        let located = ProductCatalog::new(db).lookup(&id).await.unwrap();
        assert!(located.variant.is_active);
    }

    #[tokio::test]
    async fn test_damage_pulls_unit_from_stock() {
        let db = test_db().await;
        let ledger = InventoryLedger::new(db.clone());
        let id = serial_variant(&db, 2).await;

        let unit = ledger.damage_serial(&id, "IMEI-000").await.unwrap();
        assert_eq!(unit.status, SerialStatus::Damaged);
        assert_eq!(ledger.available(&id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_restore_rejected_for_serial_tracked() {
        let db = test_db().await;
        let ledger = InventoryLedger::new(db.clone());
        let id = serial_variant(&db, 1).await;

        let err = ledger.restore(&id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::Validation(_))
        ));
    }
}
