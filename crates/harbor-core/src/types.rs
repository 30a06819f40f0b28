//! # Domain Types
//!
//! Core domain types used throughout Harbor.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌───────────────────┐   ┌──────────────────┐   │
//! │  │  ProductVariant  │   │  WarehouseOrder   │   │   SalesInvoice   │   │
//! │  │  ──────────────  │   │  ───────────────  │   │  ──────────────  │   │
//! │  │  id (UUID)       │   │  id (UUID)        │   │  id (UUID)       │   │
//! │  │  representation  │   │  order_number     │   │  invoice_number  │   │
//! │  │  tax_class       │   │  status           │   │  status          │   │
//! │  │  stock_quantity  │   │  subtotal/tax/tot │   │  subtotal/tax/tot│   │
//! │  └────────┬─────────┘   └────────┬──────────┘   └────────┬─────────┘   │
//! │           │ owns                 │ has many              │ has many    │
//! │  ┌────────▼─────────┐   ┌────────▼──────────┐   ┌────────▼─────────┐   │
//! │  │   SerialUnit     │   │ WarehouseOrderItem│   │ SalesInvoiceItem │   │
//! │  │  serial_or_imei  │   │ reserved_serials  │   │ serial_refs      │   │
//! │  │  status          │   │ shipment snapshot │   │ cost_basis       │   │
//! │  └──────────────────┘   └───────────────────┘   └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (order_number, invoice_number, serial_or_imei) -
//!   human-readable, unique per tenant
//!
//! ## Representation as a Sum Type
//! A variant is either [`Representation::Quantity`] (stock is a bare count)
//! or [`Representation::SerialTracked`] (stock is the count of `available`
//! serial units). Every consumer matches exhaustively on this enum - there
//! is no "check if the serials array exists" fallback anywhere.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::tax::TaxClass;

// =============================================================================
// Representation
// =============================================================================

/// How stock for a variant is physically tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    /// Aggregate count only (accessories, consumables).
    Quantity,
    /// Unit-level identity via serial number / IMEI (devices).
    SerialTracked,
}

// =============================================================================
// Serial Unit Status
// =============================================================================

/// Status of one serial-tracked unit.
///
/// Invariant maintained by the inventory ledger: after every mutation,
/// `variant.stock_quantity == count(units where status = available)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SerialStatus {
    /// In the warehouse, sellable.
    Available,
    /// Reserved by an order or sold on an invoice.
    Sold,
    /// Physically present but unsellable.
    Damaged,
}

impl SerialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerialStatus::Available => "available",
            SerialStatus::Sold => "sold",
            SerialStatus::Damaged => "damaged",
        }
    }
}

// =============================================================================
// Product Variant
// =============================================================================

/// A product variant in the catalog.
///
/// Created at intake, mutated by price/location/status edits, and
/// soft-deactivated (never hard-deleted) once stock reaches zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductVariant {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this variant belongs to (plain field, no isolation here).
    pub tenant_id: String,

    /// Display name.
    pub name: String,

    /// Brand (e.g. "Apple").
    pub brand: String,

    /// Model (e.g. "iPhone 13").
    pub model: String,

    /// Optional color.
    pub color: Option<String>,

    /// Quantity-counted or serial-tracked.
    pub representation: Representation,

    /// Acquisition cost per unit, in cents. Cost basis for margin VAT.
    pub cost_price_cents: i64,

    /// Wholesale (trade) price per unit, in cents. Quoted tax-inclusive.
    pub wholesale_price_cents: i64,

    /// Retail price per unit, in cents. Quoted tax-exclusive.
    pub retail_price_cents: i64,

    /// Tax classification driving every computation for this variant.
    pub tax_class: TaxClass,

    /// Current stock level. For SerialTracked variants this is derived:
    /// `count(serial units where status = available)`.
    pub stock_quantity: i64,

    /// Optional physical location (shelf/bin).
    pub location: Option<String>,

    /// Optional condition grade label (reference table value).
    pub condition_grade: Option<String>,

    /// Whether the variant is active (soft deactivation only).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    /// Returns the acquisition cost as Money.
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// Returns the wholesale price as Money (tax-inclusive).
    #[inline]
    pub fn wholesale_price(&self) -> Money {
        Money::from_cents(self.wholesale_price_cents)
    }

    /// Returns the retail price as Money (tax-exclusive).
    #[inline]
    pub fn retail_price(&self) -> Money {
        Money::from_cents(self.retail_price_cents)
    }
}

// =============================================================================
// Serial Unit
// =============================================================================

/// One serial-tracked physical unit, owned exclusively by its variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SerialUnit {
    pub id: String,
    pub variant_id: String,
    /// Serial number or IMEI. Unique per variant.
    pub serial_or_imei: String,
    pub status: SerialStatus,
    /// Customer or order reference the unit was sold/reserved to.
    pub sold_to: Option<String>,
    pub sold_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Warehouse order lifecycle status.
///
/// ## State Machine
/// ```text
/// pending ──► confirmed ──► shipped ──► completed
///    │            │
///    └────────────┴──► cancelled
/// ```
///
/// `cancelled` is reachable only from `pending` and `confirmed`: a shipped
/// or completed order's goods have physically left the warehouse and must
/// come back through a return process, not cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the state machine permits moving from `self` to `target`.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Shipped, Completed)
        )
    }

    /// Whether an order in this status may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Warehouse Order
// =============================================================================

/// A wholesale warehouse order (purchase side).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WarehouseOrder {
    pub id: String,
    pub tenant_id: String,
    /// Unique business number (e.g. `WO-20260831-0042`).
    pub order_number: String,
    pub status: OrderStatus,
    /// Sum of item subtotals (net), in cents.
    pub subtotal_cents: i64,
    /// Sum of item tax amounts, in cents.
    pub tax_cents: i64,
    /// Grand total, in cents. Invariant: subtotal + tax == total (±1c).
    pub total_cents: i64,
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WarehouseOrder {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One line of a warehouse order.
///
/// Uses the snapshot pattern: the variant's name and wholesale price are
/// frozen at order time, and the exact serial units reserved for the line
/// are recorded so cancellation restores precisely those units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WarehouseOrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Variant name at order time (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Wholesale unit price at order time, tax-inclusive, in cents.
    pub unit_price_cents: i64,
    pub tax_class: TaxClass,
    pub tax_cents: i64,
    /// Net line amount, in cents.
    pub subtotal_cents: i64,
    /// JSON array of serial-unit ids reserved at creation.
    /// Empty array (`[]`) for quantity-counted lines.
    pub reserved_serials: String,
    /// Shipment snapshot: dispatched quantity, set at ship time.
    pub shipped_quantity: Option<i64>,
    /// Shipment snapshot: JSON array of dispatched serial-unit ids.
    pub shipped_serials: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WarehouseOrderItem {
    /// Gross line amount (subtotal + tax).
    #[inline]
    pub fn line_total_cents(&self) -> i64 {
        self.subtotal_cents + self.tax_cents
    }

    /// Parses the serial-unit ids reserved for this line.
    pub fn reserved_serial_ids(&self) -> CoreResult<Vec<String>> {
        parse_serial_list("reserved_serials", &self.reserved_serials)
    }

    /// Parses the shipment snapshot serial-unit ids, if the line shipped.
    pub fn shipped_serial_ids(&self) -> CoreResult<Option<Vec<String>>> {
        match &self.shipped_serials {
            Some(raw) => Ok(Some(parse_serial_list("shipped_serials", raw)?)),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Sales invoice status.
///
/// Invoices are created at sale finalization and immutable afterwards,
/// except for payment-status fields handled outside this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Being assembled; not yet posted.
    Draft,
    /// Finalized; stock is reserved and totals are fixed.
    Finalized,
    /// Reversed outside this core (kept for reconciliation reads).
    Voided,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Finalized => "finalized",
            InvoiceStatus::Voided => "voided",
        }
    }
}

// =============================================================================
// Sales Invoice
// =============================================================================

/// A retail sales invoice (sale side).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesInvoice {
    pub id: String,
    pub tenant_id: String,
    /// Unique business number (e.g. `INV-20260831-0042`).
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Customer reference, also recorded on sold serial units.
    pub customer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SalesInvoice {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One line of a sales invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesInvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    /// Variant name at sale time (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Retail unit price at sale time, in cents. Tax-exclusive for the
    /// standard bands; the quoted (gross) amount for margin-scheme lines.
    pub unit_price_cents: i64,
    /// Gross line amount, in cents.
    pub total_price_cents: i64,
    pub tax_class: TaxClass,
    pub tax_cents: i64,
    /// Unit acquisition cost at sale time, in cents. Margin cost basis,
    /// and the fallback when the variant is gone from the catalog.
    pub cost_basis_cents: i64,
    /// JSON array of serial-unit ids sold on this line (`[]` for
    /// quantity-counted lines).
    pub serial_refs: String,
    pub created_at: DateTime<Utc>,
}

impl SalesInvoiceItem {
    /// Net line amount. Always `total − tax`, which keeps the aggregate
    /// invariant intact for every classification including margin VAT.
    #[inline]
    pub fn subtotal_cents(&self) -> i64 {
        self.total_price_cents - self.tax_cents
    }

    /// Parses the serial-unit ids sold on this line.
    pub fn serial_ref_ids(&self) -> CoreResult<Vec<String>> {
        parse_serial_list("serial_refs", &self.serial_refs)
    }
}

// =============================================================================
// JSON Snapshot Helpers
// =============================================================================

/// Serializes a list of serial-unit ids for a JSON snapshot column.
pub fn encode_serial_list(ids: &[String]) -> String {
    // Vec<String> → JSON array cannot fail
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

fn parse_serial_list(field: &str, raw: &str) -> CoreResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
