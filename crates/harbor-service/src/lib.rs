//! # harbor-service: Merchandise Services for Harbor
//!
//! The orchestration layer: everything that combines catalog data, stock
//! state and tax math into business operations lives here.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Harbor Service Layer                              │
//! │                                                                         │
//! │  ┌──────────────────┐        ┌──────────────────┐                      │
//! │  │  ProductCatalog  │◄───────│ InventoryLedger  │                      │
//! │  │                  │        │                  │                      │
//! │  │ Cross-store      │        │ Reserve/restore  │                      │
//! │  │ variant lookup   │        │ both stock reprs │                      │
//! │  └────────▲─────────┘        └────────▲─────────┘                      │
//! │           │                           │                                │
//! │     ┌─────┴───────────────────────────┴─────┐                          │
//! │     │                                       │                          │
//! │  ┌──┴───────────────┐   ┌──────────────────┴┐  ┌──────────────────┐   │
//! │  │  OrderLifecycle  │   │ SalesInvoiceEngine│  │ Reconciliation   │   │
//! │  │                  │   │                   │  │ Service          │   │
//! │  │ pending→…→done   │   │ Finalized invoice │  │                  │   │
//! │  │ cancel+restore   │   │ with sale-side tax│  │ Drift audit and  │   │
//! │  └──────────────────┘   └───────────────────┘  │ repair           │   │
//! │                                                └──────────────────┘   │
//! │                                                                         │
//! │  DEPENDENCIES:                                                         │
//! │  • harbor-core: Money, tax math, domain types (pure, no I/O)           │
//! │  • harbor-db: repositories over SQLite                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`catalog`] - Variant lookup across the physical stores
//! - [`ledger`] - Stock reservation and restoration
//! - [`lifecycle`] - Warehouse order state machine
//! - [`invoice`] - Sales invoice construction
//! - [`reconcile`] - Aggregate drift detection and repair
//! - [`error`] - One error type over domain and storage failures

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod error;
pub mod invoice;
pub mod ledger;
pub mod lifecycle;
pub mod reconcile;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{LocatedVariant, NewVariant, ProductCatalog};
pub use error::{ServiceError, ServiceResult};
pub use invoice::{InvoiceLine, SalesInvoiceEngine};
pub use ledger::InventoryLedger;
pub use lifecycle::{OrderLifecycle, OrderLine};
pub use reconcile::{
    ComponentDrift, EntityDrift, ReconcileMode, ReconciliationReport, ReconciliationService,
};
