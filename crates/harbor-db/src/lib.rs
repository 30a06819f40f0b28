//! # harbor-db: Database Layer for Harbor
//!
//! This crate provides database access for the Harbor merchandise system.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Harbor Data Flow                                 │
//! │                                                                         │
//! │  Service call (ledger.reserve, lifecycle.ship, …)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     harbor-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (variant.rs)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ VariantRepo   │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │◄───│ SerialRepo    │    │              │  │   │
//! │  │   │ Management    │    │ OrderRepo     │    │              │  │   │
//! │  │   │               │    │ InvoiceRepo   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (file, or :memory: for tests)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (variant, serial, order, invoice)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harbor_db::{Database, DbConfig};
//!
//! // Create database with default config (migrations run on connect)
//! let config = DbConfig::new("path/to/harbor.db");
//! let db = Database::new(config).await?;
//!
//! // Use repositories
//! let variant = db.variants().find_in(VariantStore::Primary, &id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::invoice::InvoiceRepository;
pub use repository::order::OrderRepository;
pub use repository::serial::{ReserveOutcome, SerialUnitRepository};
pub use repository::variant::{VariantRepository, VariantStore};
