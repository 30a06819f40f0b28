//! # harbor-core: Pure Business Logic for Harbor
//!
//! This crate is the **heart** of Harbor. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Harbor Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Callers (route handlers, batch jobs, CLI)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                      harbor-service                             │   │
//! │  │   Catalog • InventoryLedger • OrderLifecycle • Invoicing •      │   │
//! │  │   Reconciliation                                                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ harbor-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │   money   │  │    tax    │  │ validation│   │   │
//! │  │   │  Variant  │  │   Money   │  │ TaxClass  │  │   rules   │   │   │
//! │  │   │   Order   │  │  rounding │  │  compute  │  │   checks  │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  harbor-db (Database Layer)                     │   │
//! │  │            SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ProductVariant, WarehouseOrder, SalesInvoice, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`tax`] - Multi-scheme VAT engine (standard rates + margin scheme)
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, critical for
//!    reconciliation to reproduce stored aggregates
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are cents (i64)
//! 4. **Explicit Errors**: typed errors, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use harbor_core::Money` instead of
// `use harbor_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use tax::{compute, PriceConvention, TaxBreakdown, TaxClass, TaxRate, TaxRole};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default tenant ID (single-tenant runtime with multi-tenant schema).
///
/// The schema carries tenant_id on every owned entity, but tenant
/// resolution lives outside this core; the id is a plain field with no
/// isolation guarantee.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Tolerance for aggregate comparisons, in cents.
///
/// `subtotal + tax == total` and reconciliation diffs are enforced within
/// this bound - 0.01 currency units, exactly one minor unit.
pub const TOLERANCE_CENTS: i64 = 1;
