//! # Repository Module
//!
//! Database repository implementations for Harbor.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Service (InventoryLedger, OrderLifecycle, …)                          │
//! │       │                                                                 │
//! │       │  db.variants().reserve_quantity(Primary, id, 3)                │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  VariantRepository                                                     │
//! │  ├── find_in(&self, store, id)                                         │
//! │  ├── reserve_quantity(&self, store, id, qty)                           │
//! │  ├── restore_quantity(&self, store, id, qty)                           │
//! │  └── set_stock(&self, store, id, stock)                                │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • SQL is isolated in one place                                        │
//! │  • Conditional updates live next to the tables they guard              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`VariantRepository`] - Variant CRUD and conditional stock updates
//! - [`SerialUnitRepository`] - Serial unit tracking and reservation
//! - [`OrderRepository`] - Warehouse order and line item operations
//! - [`InvoiceRepository`] - Sales invoice and line item operations
//!
//! [`VariantRepository`]: variant::VariantRepository
//! [`SerialUnitRepository`]: serial::SerialUnitRepository
//! [`OrderRepository`]: order::OrderRepository
//! [`InvoiceRepository`]: invoice::InvoiceRepository

pub mod invoice;
pub mod order;
pub mod serial;
pub mod variant;
