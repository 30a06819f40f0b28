//! # Sales Invoice Engine
//!
//! Builds finalized sales invoices from line requests.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  per line:                                                          │
//! │    catalog lookup ──► reserve stock (sold_to = customer)           │
//! │                  ──► tax with role = sale                          │
//! │                                                                     │
//! │  standard bands: unit prices quoted tax-EXCLUSIVE                  │
//! │  margin scheme:  tax lives inside the margin of the quoted price   │
//! │                                                                     │
//! │  line subtotal = total − tax for EVERY classification, so          │
//! │  Σ subtotal + Σ tax == Σ total holds without special cases         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//! A failed line rolls back every reservation made for the earlier lines
//! before the error propagates; no invoice row exists for a partial sale.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::ProductCatalog;
use crate::error::ServiceResult;
use crate::ledger::InventoryLedger;
use harbor_core::validation::{validate_price_cents, validate_quantity};
use harbor_core::{
    compute, encode_serial_list, CoreError, InvoiceStatus, Money, PriceConvention, SalesInvoice,
    SalesInvoiceItem, TaxRole, ValidationError, DEFAULT_TENANT_ID,
};
use harbor_db::Database;

/// One requested invoice line.
///
/// `unit_price_cents` overrides the catalog retail price when set
/// (negotiated price, damage discount).
#[derive(Debug, Clone)]
pub struct InvoiceLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: Option<i64>,
}

/// Sales invoice orchestration service.
#[derive(Debug, Clone)]
pub struct SalesInvoiceEngine {
    db: Database,
    catalog: ProductCatalog,
    ledger: InventoryLedger,
}

impl SalesInvoiceEngine {
    /// Creates a new SalesInvoiceEngine.
    pub fn new(db: Database) -> Self {
        let catalog = ProductCatalog::new(db.clone());
        let ledger = InventoryLedger::new(db.clone());
        SalesInvoiceEngine {
            db,
            catalog,
            ledger,
        }
    }

    /// Gets an invoice with its line items.
    pub async fn get(
        &self,
        invoice_id: &str,
    ) -> ServiceResult<(SalesInvoice, Vec<SalesInvoiceItem>)> {
        let invoice = self
            .db
            .invoices()
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| CoreError::InvoiceNotFound(invoice_id.to_string()))?;
        let items = self.db.invoices().get_items(invoice_id).await?;
        Ok((invoice, items))
    }

    /// Creates a finalized invoice, reserving stock line by line.
    pub async fn create(
        &self,
        customer: Option<String>,
        lines: Vec<InvoiceLine>,
    ) -> ServiceResult<(SalesInvoice, Vec<SalesInvoiceItem>)> {
        if lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }

        let invoice_id = Uuid::new_v4().to_string();
        debug!(invoice_id = %invoice_id, lines = lines.len(), "Creating sales invoice");

        let mut reservations: Vec<(String, i64, Vec<String>)> = Vec::new();
        let mut items: Vec<SalesInvoiceItem> = Vec::new();
        let now = Utc::now();

        let mut subtotal = Money::zero();
        let mut tax = Money::zero();
        let mut total = Money::zero();

        for line in &lines {
            match self.build_line(&invoice_id, line, customer.as_deref(), now).await {
                Ok((item, unit_ids)) => {
                    subtotal += Money::from_cents(item.subtotal_cents());
                    tax += Money::from_cents(item.tax_cents);
                    total += Money::from_cents(item.total_price_cents);
                    reservations.push((line.product_id.clone(), line.quantity, unit_ids));
                    items.push(item);
                }
                Err(err) => {
                    self.rollback_reservations(&reservations).await;
                    return Err(err);
                }
            }
        }

        let invoice = SalesInvoice {
            id: invoice_id.clone(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            invoice_number: self.db.invoices().next_invoice_number().await?,
            status: InvoiceStatus::Finalized,
            subtotal_cents: subtotal.cents(),
            tax_cents: tax.cents(),
            total_cents: total.cents(),
            customer,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.db.invoices().insert_invoice(&invoice, &items).await {
            self.rollback_reservations(&reservations).await;
            return Err(err.into());
        }

        info!(invoice_id = %invoice_id, invoice_number = %invoice.invoice_number,
              total = %total, "Sales invoice created");
        Ok((invoice, items))
    }

    /// Builds one priced, reserved invoice line.
    async fn build_line(
        &self,
        invoice_id: &str,
        line: &InvoiceLine,
        customer: Option<&str>,
        now: chrono::DateTime<Utc>,
    ) -> ServiceResult<(SalesInvoiceItem, Vec<String>)> {
        validate_quantity(line.quantity)?;
        let located = self.catalog.lookup(&line.product_id).await?;

        let unit_price_cents = match line.unit_price_cents {
            Some(cents) => {
                validate_price_cents("unit_price_cents", cents)?;
                cents
            }
            None => located.variant.retail_price_cents,
        };

        // Serial units record who they went to
        let sold_to = customer.unwrap_or(invoice_id);
        let units = self
            .ledger
            .reserve(&line.product_id, line.quantity, Some(sold_to))
            .await?;
        let unit_ids: Vec<String> = units.into_iter().map(|u| u.id).collect();

        let breakdown = compute(
            located.variant.tax_class,
            TaxRole::Sale,
            PriceConvention::Exclusive,
            Money::from_cents(unit_price_cents),
            located.variant.cost_price(),
            line.quantity,
        )?;

        let item = SalesInvoiceItem {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            product_id: line.product_id.clone(),
            name_snapshot: located.variant.name.clone(),
            quantity: line.quantity,
            unit_price_cents,
            total_price_cents: breakdown.gross.cents(),
            tax_class: located.variant.tax_class,
            tax_cents: breakdown.tax.cents(),
            cost_basis_cents: located.variant.cost_price_cents,
            serial_refs: encode_serial_list(&unit_ids),
            created_at: now,
        };

        Ok((item, unit_ids))
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
