//! # Product Catalog
//!
//! Variant lookup across the two physical stores.
//!
//! ## Lookup Priority
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  lookup("7f3a…")                                                    │
//! │       │                                                             │
//! │       ├── 1. variants          ── hit ──► LocatedVariant           │
//! │       │                                                             │
//! │       └── 2. legacy_variants   ── hit ──► LocatedVariant           │
//! │                                                                     │
//! │  miss in both ──► CoreError::VariantNotFound                       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//! A missing variant is FATAL for the line that referenced it. It is
//! never priced as zero; an unpriced line silently corrupts every
//! aggregate built on top of it.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use harbor_core::validation::{validate_name, validate_price_cents, validate_uuid};
use harbor_core::{CoreError, ProductVariant, Representation, TaxClass, DEFAULT_TENANT_ID};
use harbor_db::{Database, VariantStore};

/// A variant together with the store it was found in.
///
/// Stock mutations must hit the same table the lookup resolved, so the
/// store tag travels with the row.
#[derive(Debug, Clone)]
pub struct LocatedVariant {
    pub store: VariantStore,
    pub variant: ProductVariant,
}

/// Request payload for registering a new variant.
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub name: String,
    pub brand: String,
    pub model: String,
    pub color: Option<String>,
    pub representation: Representation,
    pub cost_price_cents: i64,
    pub wholesale_price_cents: i64,
    pub retail_price_cents: i64,
    pub tax_class: TaxClass,
    pub location: Option<String>,
    pub condition_grade: Option<String>,
}

/// Read-mostly catalog facade over the variant stores.
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    db: Database,
}

impl ProductCatalog {
    /// Creates a new ProductCatalog.
    pub fn new(db: Database) -> Self {
        ProductCatalog { db }
    }

    /// Resolves a variant id across the stores in priority order.
    ///
    /// First hit wins. A miss in every store is
    /// [`CoreError::VariantNotFound`].
    pub async fn lookup(&self, variant_id: &str) -> ServiceResult<LocatedVariant> {
        validate_uuid("variant_id", variant_id)?;

        match self.try_lookup(variant_id).await? {
            Some(located) => Ok(located),
            None => Err(ServiceError::Domain(CoreError::VariantNotFound(
                variant_id.to_string(),
            ))),
        }
    }

    /// Like [`lookup`](Self::lookup) but a miss is `None`, for callers
    /// that treat absence as data (dangling-line detection,
    /// reconciliation fallbacks).
    pub async fn try_lookup(&self, variant_id: &str) -> ServiceResult<Option<LocatedVariant>> {
        for store in VariantStore::PRIORITY {
            if let Some(variant) = self.db.variants().find_in(store, variant_id).await? {
                debug!(variant_id = %variant_id, store = ?store, "Catalog hit");
                return Ok(Some(LocatedVariant { store, variant }));
            }
        }

        debug!(variant_id = %variant_id, "Catalog miss");
        Ok(None)
    }

    /// Registers a new variant in the primary store with zero stock.
    ///
    /// Stock arrives later through the inventory ledger (quantity
    /// restock or serial unit intake).
    pub async fn register(&self, new: NewVariant) -> ServiceResult<ProductVariant> {
        validate_name(&new.name)?;
        validate_price_cents("cost_price_cents", new.cost_price_cents)?;
        validate_price_cents("wholesale_price_cents", new.wholesale_price_cents)?;
        validate_price_cents("retail_price_cents", new.retail_price_cents)?;

        let now = Utc::now();
        let variant = ProductVariant {
            id: Uuid::new_v4().to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            name: new.name,
            brand: new.brand,
            model: new.model,
            color: new.color,
            representation: new.representation,
            cost_price_cents: new.cost_price_cents,
            wholesale_price_cents: new.wholesale_price_cents,
            retail_price_cents: new.retail_price_cents,
            tax_class: new.tax_class,
            stock_quantity: 0,
            location: new.location,
            condition_grade: new.condition_grade,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.db.variants().insert(VariantStore::Primary, &variant).await?;
        Ok(variant)
    }

    /// Soft-deactivates a variant wherever it lives.
    ///
    /// The row survives for the orders and invoices that reference it.
    pub async fn deactivate(&self, variant_id: &str) -> ServiceResult<()> {
        let located = self.lookup(variant_id).await?;
        self.db
            .variants()
            .soft_deactivate(located.store, &located.variant.id)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
