//! # Invoice Repository
//!
//! Database operations for sales invoices and their line items.
//!
//! An invoice is written fully formed: the engine computes every line's
//! tax breakdown and the aggregates first, then the header and all items
//! land in one transaction. There is no draft-accumulation phase the way
//! an interactive register would have.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use harbor_core::{SalesInvoice, SalesInvoiceItem};

const INVOICE_COLUMNS: &str = "id, tenant_id, invoice_number, status, subtotal_cents, \
     tax_cents, total_cents, customer, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, invoice_id, product_id, name_snapshot, quantity, \
     unit_price_cents, total_price_cents, tax_class, tax_cents, cost_basis_cents, \
     serial_refs, created_at";

/// Repository for sales invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Gets an invoice by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SalesInvoice>> {
        let invoice = sqlx::query_as::<_, SalesInvoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM sales_invoices WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Gets all line items for an invoice.
    pub async fn get_items(&self, invoice_id: &str) -> DbResult<Vec<SalesInvoiceItem>> {
        let items = sqlx::query_as::<_, SalesInvoiceItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sales_invoice_items \
             WHERE invoice_id = ?1 ORDER BY created_at, id"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Inserts an invoice together with its line items in one transaction.
    pub async fn insert_invoice(
        &self,
        invoice: &SalesInvoice,
        items: &[SalesInvoiceItem],
    ) -> DbResult<()> {
        debug!(id = %invoice.id, invoice_number = %invoice.invoice_number,
               items = items.len(), "Inserting sales invoice");

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO sales_invoices ({INVOICE_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ))
        .bind(&invoice.id)
        .bind(&invoice.tenant_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.status)
        .bind(invoice.subtotal_cents)
        .bind(invoice.tax_cents)
        .bind(invoice.total_cents)
        .bind(&invoice.customer)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(&format!(
                "INSERT INTO sales_invoice_items ({ITEM_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ))
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.total_price_cents)
            .bind(item.tax_class)
            .bind(item.tax_cents)
            .bind(item.cost_basis_cents)
            .bind(&item.serial_refs)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Overwrites an invoice's aggregates and drifted line-item tax fields
    /// in one transaction.
    ///
    /// `item_repairs` carries `(item_id, tax_cents, total_price_cents)`
    /// triples.
    pub async fn apply_repair(
        &self,
        id: &str,
        subtotal_cents: i64,
        tax_cents: i64,
        total_cents: i64,
        item_repairs: &[(String, i64, i64)],
    ) -> DbResult<()> {
        debug!(id = %id, items = item_repairs.len(), "Applying invoice repair");

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE sales_invoices SET \
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
            return Err(DbError::not_found("SalesInvoice", id));
        }

        for (item_id, item_tax, item_total) in item_repairs {
            sqlx::query(
                "UPDATE sales_invoice_items SET tax_cents = ?2, total_price_cents = ?3 \
                 WHERE id = ?1",
            )
            .bind(item_id)
            .bind(item_tax)
            .bind(item_total)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Lists invoice ids, oldest first (reconciliation sweep input).
    pub async fn list_ids(&self) -> DbResult<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM sales_invoices ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids)
    }

    /// Generates the next invoice number for today: `INV-YYYYMMDD-NNNN`.
    pub async fn next_invoice_number(&self) -> DbResult<String> {
        let date_part = Utc::now().format("%Y%m%d").to_string();
        let prefix = format!("INV-{}-%", date_part);

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales_invoices WHERE invoice_number LIKE ?1")
                .bind(&prefix)
                .fetch_one(&self.pool)
                .await?;

        Ok(format!("INV-{}-{:04}", date_part, count + 1))
    }
}

/// Generates a new invoice ID.
pub fn generate_invoice_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new invoice item ID.
pub fn generate_invoice_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use harbor_core::{InvoiceStatus, TaxClass, DEFAULT_TENANT_ID};

    fn test_invoice(id: &str, number: &str) -> SalesInvoice {
        let now = Utc::now();
        SalesInvoice {
            id: id.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            invoice_number: number.to_string(),
            status: InvoiceStatus::Finalized,
            subtotal_cents: 1000,
            tax_cents: 230,
            total_cents: 1230,
            customer: Some("ACME Ltd".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn test_item(id: &str, invoice_id: &str) -> SalesInvoiceItem {
        SalesInvoiceItem {
            id: id.to_string(),
            invoice_id: invoice_id.to_string(),
            product_id: "v1".to_string(),
            name_snapshot: "Widget".to_string(),
            quantity: 1,
            unit_price_cents: 1000,
            total_price_cents: 1230,
            tax_class: TaxClass::Standard23,
            tax_cents: 230,
            cost_basis_cents: 500,
            serial_refs: "[]".to_string(),
            created_at: Utc::now(),
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let db = test_db().await;
        let repo = db.invoices();

        repo.insert_invoice(
            &test_invoice("inv1", "INV-20260831-0001"),
            &[test_item("i1", "inv1")],
        )
        .await
        .unwrap();

        let invoice = repo.get_by_id("inv1").await.unwrap().unwrap();
        assert_eq!(invoice.total_cents, 1230);

        let items = repo.get_items("inv1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].subtotal_cents(), 1000);
    }

    #[tokio::test]
    async fn test_duplicate_invoice_number_rejected() {
        let db = test_db().await;
        let repo = db.invoices();

        repo.insert_invoice(&test_invoice("inv1", "INV-20260831-0001"), &[])
            .await
            .unwrap();
        let err = repo
            .insert_invoice(&test_invoice("inv2", "INV-20260831-0001"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_apply_repair() {
        let db = test_db().await;
        let repo = db.invoices();

        repo.insert_invoice(
            &test_invoice("inv1", "INV-20260831-0001"),
            &[test_item("i1", "inv1")],
        )
        .await
        .unwrap();

        repo.apply_repair("inv1", 1000, 231, 1231, &[("i1".to_string(), 231, 1231)])
            .await
            .unwrap();

        let items = repo.get_items("inv1").await.unwrap();
        assert_eq!(items[0].tax_cents, 231);
        assert_eq!(repo.get_by_id("inv1").await.unwrap().unwrap().tax_cents, 231);
    }
}
