//! # Reconciliation Service
//!
//! Detects and optionally repairs drift between stored money aggregates
//! and what the tax engine derives from the persisted line items.
//!
//! ## Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Report ── read-only audit: recompute, diff, log, touch nothing    │
//! │  Apply  ── same sweep, but each drifted entity is repaired in one  │
//! │            per-entity transaction (aggregates + drifted items)     │
//! │                                                                     │
//! │  Drift below 1 cent is rounding noise and never reported.          │
//! │  No lock is held across entities; an apply failure on one entity   │
//! │  leaves every other entity's repair intact.                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Recomputation runs the SAME tax path the engines used at write time,
//! against the CURRENT catalog cost basis. For invoice lines whose
//! variant has left the catalog, the cost basis frozen on the line is
//! used instead.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::ProductCatalog;
use crate::error::{ServiceError, ServiceResult};
use harbor_core::{
    compute, CoreError, Money, PriceConvention, TaxRole, TOLERANCE_CENTS,
};
use harbor_db::Database;

/// Whether a sweep only reports drift or also repairs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Read-only audit.
    Report,
    /// Overwrite drifted aggregates and item tax fields.
    Apply,
}

/// One money component whose stored value disagrees with recomputation.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentDrift {
    /// `subtotal` / `tax` / `total`, or `item:{id}:tax`,
    /// `item:{id}:subtotal` (orders), `item:{id}:total` (invoices).
    pub component: String,
    pub stored_cents: i64,
    pub recomputed_cents: i64,
}

impl ComponentDrift {
    fn beyond_tolerance(component: &str, stored: i64, recomputed: i64) -> Option<ComponentDrift> {
        if (stored - recomputed).abs() > TOLERANCE_CENTS {
            Some(ComponentDrift {
                component: component.to_string(),
                stored_cents: stored,
                recomputed_cents: recomputed,
            })
        } else {
            None
        }
    }
}

/// All drift found on one order or invoice.
#[derive(Debug, Clone, Serialize)]
pub struct EntityDrift {
    pub entity_id: String,
    pub components: Vec<ComponentDrift>,
    /// True when the sweep ran in apply mode and the repair committed.
    pub repaired: bool,
}

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    pub scanned: usize,
    pub drifted: Vec<EntityDrift>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty()
    }

    fn merge(mut self, other: ReconciliationReport) -> ReconciliationReport {
        self.scanned += other.scanned;
        self.drifted.extend(other.drifted);
        self
    }
}

/// Recomputed money state of one entity.
struct Recomputed {
    subtotal_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    /// `(item_id, tax_cents, companion_cents)` for every line, where the
    /// companion is the line subtotal (orders) or gross total (invoices).
    items: Vec<(String, i64, i64)>,
}

/// Drift detection and repair over orders and invoices.
#[derive(Debug, Clone)]
pub struct ReconciliationService {
    db: Database,
    catalog: ProductCatalog,
}

impl ReconciliationService {
    /// Creates a new ReconciliationService.
    pub fn new(db: Database) -> Self {
        let catalog = ProductCatalog::new(db.clone());
        ReconciliationService { db, catalog }
    }

    /// Sweeps orders and invoices.
    pub async fn run(&self, mode: ReconcileMode) -> ServiceResult<ReconciliationReport> {
        let orders = self.reconcile_orders(mode).await?;
        let invoices = self.reconcile_invoices(mode).await?;
        let report = orders.merge(invoices);

        info!(scanned = report.scanned, drifted = report.drifted.len(), mode = ?mode,
              "Reconciliation sweep finished");
        Ok(report)
    }

    /// Sweeps every warehouse order.
    pub async fn reconcile_orders(&self, mode: ReconcileMode) -> ServiceResult<ReconciliationReport> {
        let mut report = ReconciliationReport::default();

        for order_id in self.db.orders().list_ids().await? {
            report.scanned += 1;
            let (recomputed, components) = self.diff_order(&order_id).await?;

            if components.is_empty() {
                debug!(order_id = %order_id, "Order aggregates consistent");
                continue;
            }

            warn!(order_id = %order_id, drift = components.len(), "Order aggregate drift");

            let repaired = if mode == ReconcileMode::Apply {
                self.db
                    .orders()
                    .apply_repair(
                        &order_id,
                        recomputed.subtotal_cents,
                        recomputed.tax_cents,
                        recomputed.total_cents,
                        &recomputed.items,
                    )
                    .await?;
                true
            } else {
                false
            };

            report.drifted.push(EntityDrift {
                entity_id: order_id,
                components,
                repaired,
            });
        }

        Ok(report)
    }

    /// Sweeps every sales invoice.
    pub async fn reconcile_invoices(
        &self,
        mode: ReconcileMode,
    ) -> ServiceResult<ReconciliationReport> {
        let mut report = ReconciliationReport::default();

        for invoice_id in self.db.invoices().list_ids().await? {
            report.scanned += 1;
            let (recomputed, components) = self.diff_invoice(&invoice_id).await?;

            if components.is_empty() {
                debug!(invoice_id = %invoice_id, "Invoice aggregates consistent");
                continue;
            }

            warn!(invoice_id = %invoice_id, drift = components.len(), "Invoice aggregate drift");

            let repaired = if mode == ReconcileMode::Apply {
                self.db
                    .invoices()
                    .apply_repair(
                        &invoice_id,
                        recomputed.subtotal_cents,
                        recomputed.tax_cents,
                        recomputed.total_cents,
                        &recomputed.items,
                    )
                    .await?;
                true
            } else {
                false
            };

            report.drifted.push(EntityDrift {
                entity_id: invoice_id,
                components,
                repaired,
            });
        }

        Ok(report)
    }

    /// Verifies one order, failing on the first component out of
    /// tolerance.
    pub async fn verify_order(&self, order_id: &str) -> ServiceResult<()> {
        let (_, components) = self.diff_order(order_id).await?;
        Self::verdict(order_id, components)
    }

    /// Verifies one invoice, failing on the first component out of
    /// tolerance.
    pub async fn verify_invoice(&self, invoice_id: &str) -> ServiceResult<()> {
        let (_, components) = self.diff_invoice(invoice_id).await?;
        Self::verdict(invoice_id, components)
    }

    fn verdict(entity_id: &str, components: Vec<ComponentDrift>) -> ServiceResult<()> {
        match components.into_iter().next() {
            None => Ok(()),
            Some(drift) => Err(ServiceError::Domain(CoreError::Consistency {
                entity_id: entity_id.to_string(),
                component: drift.component,
                stored_cents: drift.stored_cents,
                recomputed_cents: drift.recomputed_cents,
            })),
        }
    }

    /// Recomputes one order and diffs it against the stored values.
    async fn diff_order(
        &self,
        order_id: &str,
    ) -> ServiceResult<(Recomputed, Vec<ComponentDrift>)> {
        let order = self
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        let items = self.db.orders().get_items(order_id).await?;

        let mut recomputed = Recomputed {
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            items: Vec::new(),
        };
        let mut components = Vec::new();

        for item in &items {
            // Purchase-side margin lines carry zero tax whatever the cost
            // basis, so a vanished variant costs nothing here
            let cost_basis = match self.catalog.try_lookup(&item.product_id).await? {
                Some(located) => located.variant.cost_price(),
                None => Money::zero(),
            };

            let breakdown = compute(
                item.tax_class,
                TaxRole::Purchase,
                PriceConvention::Inclusive,
                Money::from_cents(item.unit_price_cents),
                cost_basis,
                item.quantity,
            )?;

            let tax = breakdown.tax.cents();
            let subtotal = (breakdown.gross - breakdown.tax).cents();

            recomputed.subtotal_cents += subtotal;
            recomputed.tax_cents += tax;
            recomputed.total_cents += breakdown.gross.cents();

            // Any drifted component enrols the line for repair
            let before = components.len();
            components.extend(ComponentDrift::beyond_tolerance(
                &format!("item:{}:tax", item.id),
                item.tax_cents,
                tax,
            ));
            components.extend(ComponentDrift::beyond_tolerance(
                &format!("item:{}:subtotal", item.id),
                item.subtotal_cents,
                subtotal,
            ));
            if components.len() > before {
                recomputed.items.push((item.id.clone(), tax, subtotal));
            }
        }

        Self::diff_aggregates(
            &mut components,
            (order.subtotal_cents, order.tax_cents, order.total_cents),
            &recomputed,
        );

        Ok((recomputed, components))
    }

    /// Recomputes one invoice and diffs it against the stored values.
    async fn diff_invoice(
        &self,
        invoice_id: &str,
    ) -> ServiceResult<(Recomputed, Vec<ComponentDrift>)> {
        let invoice = self
            .db
            .invoices()
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| CoreError::InvoiceNotFound(invoice_id.to_string()))?;
        let items = self.db.invoices().get_items(invoice_id).await?;

        let mut recomputed = Recomputed {
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            items: Vec::new(),
        };
        let mut components = Vec::new();

        for item in &items {
            // Current catalog cost basis, falling back to the cost frozen
            // on the line when the variant is gone
            let cost_basis = match self.catalog.try_lookup(&item.product_id).await? {
                Some(located) => located.variant.cost_price(),
                None => Money::from_cents(item.cost_basis_cents),
            };

            let breakdown = compute(
                item.tax_class,
                TaxRole::Sale,
                PriceConvention::Exclusive,
                Money::from_cents(item.unit_price_cents),
                cost_basis,
                item.quantity,
            )?;

            let tax = breakdown.tax.cents();
            let gross = breakdown.gross.cents();

            recomputed.subtotal_cents += gross - tax;
            recomputed.tax_cents += tax;
            recomputed.total_cents += gross;

            // Any drifted component enrols the line for repair
            let before = components.len();
            components.extend(ComponentDrift::beyond_tolerance(
                &format!("item:{}:tax", item.id),
                item.tax_cents,
                tax,
            ));
            components.extend(ComponentDrift::beyond_tolerance(
                &format!("item:{}:total", item.id),
                item.total_price_cents,
                gross,
            ));
            if components.len() > before {
                recomputed.items.push((item.id.clone(), tax, gross));
            }
        }

        Self::diff_aggregates(
            &mut components,
            (
                invoice.subtotal_cents,
                invoice.tax_cents,
                invoice.total_cents,
            ),
            &recomputed,
        );

        Ok((recomputed, components))
    }

    fn diff_aggregates(
        components: &mut Vec<ComponentDrift>,
        (stored_subtotal, stored_tax, stored_total): (i64, i64, i64),
        recomputed: &Recomputed,
    ) {
        components.extend(ComponentDrift::beyond_tolerance(
            "subtotal",
            stored_subtotal,
            recomputed.subtotal_cents,
        ));
        components.extend(ComponentDrift::beyond_tolerance(
            "tax",
            stored_tax,
            recomputed.tax_cents,
        ));
        components.extend(ComponentDrift::beyond_tolerance(
            "total",
            stored_total,
            recomputed.total_cents,
        ));
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NewVariant;
    use crate::invoice::{InvoiceLine, SalesInvoiceEngine};
    use crate::lifecycle::{OrderLifecycle, OrderLine};
    use harbor_core::{Representation, TaxClass};
    use harbor_db::{DbConfig, VariantStore};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn variant(db: &Database, tax_class: TaxClass, cost: i64, retail: i64) -> String {
        let catalog = ProductCatalog::new(db.clone());
        let created = catalog
            .register(NewVariant {
                name: "Widget".to_string(),
                brand: "Acme".to_string(),
                model: "M1".to_string(),
                color: None,
                representation: Representation::Quantity,
                cost_price_cents: cost,
                wholesale_price_cents: 1230,
                retail_price_cents: retail,
                tax_class,
                location: None,
                condition_grade: None,
            })
            .await
            .unwrap();
        db.variants()
            .set_stock(VariantStore::Primary, &created.id, 50)
            .await
            .unwrap();
        created.id
    }

    #[tokio::test]
    async fn test_clean_sweep_reports_nothing() {
        let db = test_db().await;
        let id = variant(&db, TaxClass::Standard23, 500, 2000).await;

        OrderLifecycle::new(db.clone())
            .create(vec![OrderLine {
                product_id: id.clone(),
                quantity: 2,
            }])
            .await
            .unwrap();
        SalesInvoiceEngine::new(db.clone())
            .create(
                None,
                vec![InvoiceLine {
                    product_id: id,
                    quantity: 3,
                    unit_price_cents: None,
                }],
            )
            .await
            .unwrap();

        let report = ReconciliationService::new(db)
            .run(ReconcileMode::Report)
            .await
            .unwrap();

        assert_eq!(report.scanned, 2);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_report_detects_but_never_mutates() {
        let db = test_db().await;
        let id = variant(&db, TaxClass::Standard23, 500, 2000).await;

        let (invoice, items) = SalesInvoiceEngine::new(db.clone())
            .create(
                None,
                vec![InvoiceLine {
                    product_id: id,
                    quantity: 1,
                    unit_price_cents: None,
                }],
            )
            .await
            .unwrap();

        // Corrupt the stored line tax well past tolerance
        sqlx::query("UPDATE sales_invoice_items SET tax_cents = tax_cents + 100 WHERE id = ?1")
            .bind(&items[0].id)
            .execute(db.pool())
            .await
            .unwrap();

        let service = ReconciliationService::new(db.clone());
        let report = service.reconcile_invoices(ReconcileMode::Report).await.unwrap();

        assert_eq!(report.drifted.len(), 1);
        assert!(!report.drifted[0].repaired);
        assert!(report.drifted[0]
            .components
            .iter()
            .any(|c| c.component.ends_with(":tax")));

        // Report mode left the corruption in place
        let stored = db.invoices().get_items(&invoice.id).await.unwrap();
        assert_eq!(stored[0].tax_cents, items[0].tax_cents + 100);

        let err = service.verify_invoice(&invoice.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::Consistency { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_repairs_drift() {
        let db = test_db().await;
        let id = variant(&db, TaxClass::Standard23, 500, 2000).await;

        let (order, items) = OrderLifecycle::new(db.clone())
            .create(vec![OrderLine {
                product_id: id,
                quantity: 2,
            }])
            .await
            .unwrap();

        sqlx::query(
            "UPDATE warehouse_order_items SET tax_cents = 9999, subtotal_cents = 1 WHERE id = ?1",
        )
        .bind(&items[0].id)
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query("UPDATE warehouse_orders SET tax_cents = 9999 WHERE id = ?1")
            .bind(&order.id)
            .execute(db.pool())
            .await
            .unwrap();

        let service = ReconciliationService::new(db.clone());
        let report = service.reconcile_orders(ReconcileMode::Apply).await.unwrap();
        assert_eq!(report.drifted.len(), 1);
        assert!(report.drifted[0].repaired);

        // The repaired rows match the recomputation and verify is clean
        let repaired = db.orders().get_items(&order.id).await.unwrap();
        assert_eq!(repaired[0].tax_cents, items[0].tax_cents);
        assert_eq!(repaired[0].subtotal_cents, items[0].subtotal_cents);
        service.verify_order(&order.id).await.unwrap();

        let header = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(header.subtotal_cents + header.tax_cents, header.total_cents);
    }

    #[tokio::test]
    async fn test_apply_repairs_item_total_with_correct_tax() {
        let db = test_db().await;
        let id = variant(&db, TaxClass::Standard23, 500, 2000).await;

        let (invoice, items) = SalesInvoiceEngine::new(db.clone())
            .create(
                None,
                vec![InvoiceLine {
                    product_id: id,
                    quantity: 1,
                    unit_price_cents: None,
                }],
            )
            .await
            .unwrap();

        // Corrupt only the stored line total; the line tax stays correct
        sqlx::query(
            "UPDATE sales_invoice_items SET total_price_cents = total_price_cents + 500 \
             WHERE id = ?1",
        )
        .bind(&items[0].id)
        .execute(db.pool())
        .await
        .unwrap();

        let service = ReconciliationService::new(db.clone());
        let report = service.reconcile_invoices(ReconcileMode::Apply).await.unwrap();

        assert!(!report.is_clean());
        assert!(report.drifted[0]
            .components
            .iter()
            .any(|c| c.component.ends_with(":total")));

        let repaired = db.invoices().get_items(&invoice.id).await.unwrap();
        assert_eq!(repaired[0].total_price_cents, items[0].total_price_cents);
        service.verify_invoice(&invoice.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_repairs_item_subtotal_with_correct_tax() {
        let db = test_db().await;
        let id = variant(&db, TaxClass::Standard23, 500, 2000).await;

        let (order, items) = OrderLifecycle::new(db.clone())
            .create(vec![OrderLine {
                product_id: id,
                quantity: 2,
            }])
            .await
            .unwrap();

        sqlx::query(
            "UPDATE warehouse_order_items SET subtotal_cents = subtotal_cents + 250 \
             WHERE id = ?1",
        )
        .bind(&items[0].id)
        .execute(db.pool())
        .await
        .unwrap();

        let service = ReconciliationService::new(db.clone());
        let report = service.reconcile_orders(ReconcileMode::Apply).await.unwrap();

        assert!(!report.is_clean());
        assert!(report.drifted[0]
            .components
            .iter()
            .any(|c| c.component.ends_with(":subtotal")));

        let repaired = db.orders().get_items(&order.id).await.unwrap();
        assert_eq!(repaired[0].subtotal_cents, items[0].subtotal_cents);
        service.verify_order(&order.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_margin_recompute_falls_back_to_frozen_cost() {
        let db = test_db().await;
        // Margin sale: cost 20.00, retail 50.00
        let id = variant(&db, TaxClass::MarginVat, 2000, 5000).await;

        let (invoice, _) = SalesInvoiceEngine::new(db.clone())
            .create(
                None,
                vec![InvoiceLine {
                    product_id: id.clone(),
                    quantity: 3,
                    unit_price_cents: None,
                }],
            )
            .await
            .unwrap();

        // Variant disappears entirely; the cost frozen on the line keeps
        // the recomputation aligned
        sqlx::query("DELETE FROM variants WHERE id = ?1")
            .bind(&id)
            .execute(db.pool())
            .await
            .unwrap();

        let service = ReconciliationService::new(db);
        service.verify_invoice(&invoice.id).await.unwrap();
    }
}
