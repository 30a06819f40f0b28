//! # Variant Repository
//!
//! Database operations for product variants across the two physical stores.
//!
//! ## Two Stores, One Catalog
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lookup(id)                                                             │
//! │       │                                                                 │
//! │       ├──► variants          (primary store)   ── hit? return          │
//! │       │                                                                 │
//! │       └──► legacy_variants   (historical rows)                         │
//! │                                                                         │
//! │  Pre-migration intake wrote to legacy_variants; old orders still       │
//! │  reference those rows. The catalog tries each store in this fixed      │
//! │  priority order and the first hit wins.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Updates
//! All stock mutations are single conditional updates. The decrement path
//! is `SET stock_quantity = stock_quantity − ? WHERE … AND stock_quantity
//! >= ?`: two concurrent reservations of the last unit cannot both
//! succeed, because only one UPDATE finds the predicate true.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use harbor_core::ProductVariant;

/// The physical store a variant row lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantStore {
    /// Current intake writes here.
    Primary,
    /// Historical rows; read-mostly.
    Legacy,
}

impl VariantStore {
    /// Fixed catalog lookup priority order.
    pub const PRIORITY: [VariantStore; 2] = [VariantStore::Primary, VariantStore::Legacy];

    /// The backing table name. Enum-controlled, so interpolating it into
    /// SQL is safe.
    pub const fn table(&self) -> &'static str {
        match self {
            VariantStore::Primary => "variants",
            VariantStore::Legacy => "legacy_variants",
        }
    }
}

/// Column list shared by every variant SELECT.
const VARIANT_COLUMNS: &str = "id, tenant_id, name, brand, model, color, representation, \
     cost_price_cents, wholesale_price_cents, retail_price_cents, tax_class, \
     stock_quantity, location, condition_grade, is_active, created_at, updated_at";

/// Repository for variant database operations.
#[derive(Debug, Clone)]
pub struct VariantRepository {
    pool: SqlitePool,
}

impl VariantRepository {
    /// Creates a new VariantRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VariantRepository { pool }
    }

    /// Gets a variant by id from one store.
    pub async fn find_in(
        &self,
        store: VariantStore,
        id: &str,
    ) -> DbResult<Option<ProductVariant>> {
        let sql = format!(
            "SELECT {VARIANT_COLUMNS} FROM {} WHERE id = ?1",
            store.table()
        );

        let variant = sqlx::query_as::<_, ProductVariant>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(variant)
    }

    /// Lists active variants in one store, sorted by name.
    pub async fn list_active(
        &self,
        store: VariantStore,
        limit: u32,
    ) -> DbResult<Vec<ProductVariant>> {
        let sql = format!(
            "SELECT {VARIANT_COLUMNS} FROM {} WHERE is_active = 1 ORDER BY name LIMIT ?1",
            store.table()
        );

        let variants = sqlx::query_as::<_, ProductVariant>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(variants)
    }

    /// Inserts a new variant into one store.
    pub async fn insert(&self, store: VariantStore, variant: &ProductVariant) -> DbResult<()> {
        debug!(id = %variant.id, store = ?store, name = %variant.name, "Inserting variant");

        let sql = format!(
            "INSERT INTO {} ({VARIANT_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            store.table()
        );

        sqlx::query(&sql)
            .bind(&variant.id)
            .bind(&variant.tenant_id)
            .bind(&variant.name)
            .bind(&variant.brand)
            .bind(&variant.model)
            .bind(&variant.color)
            .bind(variant.representation)
            .bind(variant.cost_price_cents)
            .bind(variant.wholesale_price_cents)
            .bind(variant.retail_price_cents)
            .bind(variant.tax_class)
            .bind(variant.stock_quantity)
            .bind(&variant.location)
            .bind(&variant.condition_grade)
            .bind(variant.is_active)
            .bind(variant.created_at)
            .bind(variant.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Updates prices, location, grade and activity of an existing variant.
    ///
    /// Stock is deliberately NOT updatable here - stock moves only through
    /// the conditional reserve/restore operations below.
    pub async fn update(&self, store: VariantStore, variant: &ProductVariant) -> DbResult<()> {
        debug!(id = %variant.id, store = ?store, "Updating variant");

        let now = Utc::now();

        let sql = format!(
            "UPDATE {} SET \
                name = ?2, brand = ?3, model = ?4, color = ?5, \
                cost_price_cents = ?6, wholesale_price_cents = ?7, \
                retail_price_cents = ?8, tax_class = ?9, location = ?10, \
                condition_grade = ?11, is_active = ?12, updated_at = ?13 \
             WHERE id = ?1",
            store.table()
        );

        let result = sqlx::query(&sql)
            .bind(&variant.id)
            .bind(&variant.name)
            .bind(&variant.brand)
            .bind(&variant.model)
            .bind(&variant.color)
            .bind(variant.cost_price_cents)
            .bind(variant.wholesale_price_cents)
            .bind(variant.retail_price_cents)
            .bind(variant.tax_class)
            .bind(&variant.location)
            .bind(&variant.condition_grade)
            .bind(variant.is_active)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", &variant.id));
        }

        Ok(())
    }

    /// Atomically reserves quantity-counted stock.
    ///
    /// ## Decrement-If-Sufficient
    /// ```text
    /// ❌ WRONG: read stock, check, write back (lost update under races)
    /// ✅ CORRECT: UPDATE … SET stock_quantity = stock_quantity − ?
    ///            WHERE id = ? AND stock_quantity >= ?
    /// ```
    ///
    /// ## Returns
    /// * `Ok(true)` - stock reserved
    /// * `Ok(false)` - row exists but stock was insufficient (unchanged)
    /// * `Err(NotFound)` - no such variant in this store
    pub async fn reserve_quantity(
        &self,
        store: VariantStore,
        id: &str,
        quantity: i64,
    ) -> DbResult<bool> {
        debug!(id = %id, store = ?store, quantity = %quantity, "Reserving quantity stock");

        let now = Utc::now();

        let sql = format!(
            "UPDATE {} SET \
                stock_quantity = stock_quantity - ?2, updated_at = ?3 \
             WHERE id = ?1 AND stock_quantity >= ?2",
            store.table()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(quantity)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Distinguish "insufficient" from "absent"
        if self.find_in(store, id).await?.is_some() {
            Ok(false)
        } else {
            Err(DbError::not_found("Variant", id))
        }
    }

    /// Restores quantity-counted stock and reactivates the variant if the
    /// resulting stock is positive.
    pub async fn restore_quantity(
        &self,
        store: VariantStore,
        id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(id = %id, store = ?store, quantity = %quantity, "Restoring quantity stock");

        let now = Utc::now();

        // SET expressions see the pre-update row, so both columns use the
        // old stock_quantity consistently
        let sql = format!(
            "UPDATE {} SET \
                stock_quantity = stock_quantity + ?2, \
                is_active = CASE WHEN stock_quantity + ?2 > 0 THEN 1 ELSE is_active END, \
                updated_at = ?3 \
             WHERE id = ?1",
            store.table()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(quantity)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id));
        }

        Ok(())
    }

    /// Sets the derived stock level of a serial-tracked variant.
    ///
    /// Called after serial-unit mutations with `count(status = available)`
    /// so the cached count always matches the units. Reactivates the
    /// variant when the new stock is positive.
    pub async fn set_stock(&self, store: VariantStore, id: &str, stock: i64) -> DbResult<()> {
        debug!(id = %id, store = ?store, stock = %stock, "Setting derived stock");

        let now = Utc::now();

        let sql = format!(
            "UPDATE {} SET \
                stock_quantity = ?2, \
                is_active = CASE WHEN ?2 > 0 THEN 1 ELSE is_active END, \
                updated_at = ?3 \
             WHERE id = ?1",
            store.table()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(stock)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id));
        }

        Ok(())
    }

    /// Current stock level, or None if the variant is absent from this store.
    pub async fn stock_of(&self, store: VariantStore, id: &str) -> DbResult<Option<i64>> {
        let sql = format!(
            "SELECT stock_quantity FROM {} WHERE id = ?1",
            store.table()
        );

        let stock: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(stock)
    }

    /// Soft-deactivates a variant (`is_active = false`).
    ///
    /// ## Why Soft Delete?
    /// - Historical orders and invoices still reference the row
    /// - Restoration reactivates it when stock comes back
    pub async fn soft_deactivate(&self, store: VariantStore, id: &str) -> DbResult<()> {
        debug!(id = %id, store = ?store, "Soft-deactivating variant");

        let now = Utc::now();

        let sql = format!(
            "UPDATE {} SET is_active = 0, updated_at = ?2 WHERE id = ?1",
            store.table()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id));
        }

        Ok(())
    }

    /// Counts active variants in one store (for diagnostics).
    pub async fn count(&self, store: VariantStore) -> DbResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE is_active = 1",
            store.table()
        );

        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;

        Ok(count)
    }
}

/// Helper to generate a new variant ID.
pub fn generate_variant_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use harbor_core::{Representation, TaxClass, DEFAULT_TENANT_ID};

    fn test_variant(id: &str, stock: i64) -> ProductVariant {
        let now = Utc::now();
        ProductVariant {
            id: id.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            name: format!("Variant {}", id),
            brand: "Acme".to_string(),
            model: "M1".to_string(),
            color: None,
            representation: Representation::Quantity,
            cost_price_cents: 500,
            wholesale_price_cents: 800,
            retail_price_cents: 1200,
            tax_class: TaxClass::Standard23,
            stock_quantity: stock,
            location: None,
            condition_grade: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find_per_store() {
        let db = test_db().await;
        let repo = db.variants();

        repo.insert(VariantStore::Primary, &test_variant("p1", 5))
            .await
            .unwrap();
        repo.insert(VariantStore::Legacy, &test_variant("l1", 2))
            .await
            .unwrap();

        assert!(repo
            .find_in(VariantStore::Primary, "p1")
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_in(VariantStore::Legacy, "p1")
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_in(VariantStore::Legacy, "l1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_reserve_quantity_conditional() {
        let db = test_db().await;
        let repo = db.variants();
        repo.insert(VariantStore::Primary, &test_variant("v1", 3))
            .await
            .unwrap();

        // Reserve within stock
        assert!(repo
            .reserve_quantity(VariantStore::Primary, "v1", 2)
            .await
            .unwrap());
        assert_eq!(
            repo.stock_of(VariantStore::Primary, "v1").await.unwrap(),
            Some(1)
        );

        // Over-reserve fails and leaves stock unchanged
        assert!(!repo
            .reserve_quantity(VariantStore::Primary, "v1", 2)
            .await
            .unwrap());
        assert_eq!(
            repo.stock_of(VariantStore::Primary, "v1").await.unwrap(),
            Some(1)
        );

        // Absent variant is NotFound, not "insufficient"
        assert!(matches!(
            repo.reserve_quantity(VariantStore::Primary, "ghost", 1).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_restore_reactivates() {
        let db = test_db().await;
        let repo = db.variants();

        let mut v = test_variant("v1", 1);
        repo.insert(VariantStore::Primary, &v).await.unwrap();

        assert!(repo
            .reserve_quantity(VariantStore::Primary, "v1", 1)
            .await
            .unwrap());
        repo.soft_deactivate(VariantStore::Primary, "v1").await.unwrap();

        repo.restore_quantity(VariantStore::Primary, "v1", 1)
            .await
            .unwrap();

        v = repo
            .find_in(VariantStore::Primary, "v1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(v.stock_quantity, 1);
        assert!(v.is_active);
    }

    #[tokio::test]
    async fn test_set_stock() {
        let db = test_db().await;
        let repo = db.variants();
        repo.insert(VariantStore::Primary, &test_variant("v1", 0))
            .await
            .unwrap();

        repo.set_stock(VariantStore::Primary, "v1", 7).await.unwrap();
        assert_eq!(
            repo.stock_of(VariantStore::Primary, "v1").await.unwrap(),
            Some(7)
        );
    }
}
