//! # Error Types
//!
//! Domain-specific error types for harbor-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  harbor-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  harbor-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  harbor-service errors                                                 │
//! │  └── ServiceError     - Wraps both for callers                         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Taxonomy (matches the operational contract)
//! - validation errors and not-found errors abort the triggering operation
//!   immediately and propagate to the caller
//! - state errors abort only the offending transition, leaving the entity
//!   unchanged
//! - consistency errors are advisory: data only changes when reconciliation
//!   is explicitly run in apply mode
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, counts, statuses)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product variant cannot be found in any store.
    ///
    /// ## When This Occurs
    /// - Variant id exists in neither the primary nor the legacy store
    /// - Variant was soft-deactivated and filtered out by the caller
    ///
    /// A missing variant is fatal for the affected line item - it must
    /// never be priced as zero.
    #[error("Product variant not found: {0}")]
    VariantNotFound(String),

    /// Warehouse order cannot be found.
    #[error("Warehouse order not found: {0}")]
    OrderNotFound(String),

    /// Sales invoice cannot be found.
    #[error("Sales invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Reservation would exceed available stock.
    ///
    /// ## When This Occurs
    /// - Quantity reservation where `requested > stock_quantity`
    /// - Serial reservation where fewer than `requested` units are
    ///   `available`
    ///
    /// The conditional update guarantees stock is unchanged when this
    /// error is returned.
    #[error("Insufficient stock for {variant_id}: available {available}, requested {requested}")]
    InsufficientStock {
        variant_id: String,
        available: i64,
        requested: i64,
    },

    /// The order is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Cancelling a shipped or completed order
    /// - Shipping an order that was never confirmed
    /// - A line item's product no longer resolves at confirm time
    #[error("Order {order_id} is {current}, cannot move to {requested}")]
    InvalidTransition {
        order_id: String,
        current: String,
        requested: String,
    },

    /// Re-cancelling an already-cancelled order.
    ///
    /// Reported as a benign state error rather than a silent success so
    /// stock is never double-restored.
    #[error("Order {order_id} is already cancelled")]
    AlreadyCancelled { order_id: String },

    /// A line item references a product that no longer resolves.
    ///
    /// Surfaced at confirm time rather than silently skipped.
    #[error("Order {order_id} line references missing product {product_id}")]
    DanglingLineItem {
        order_id: String,
        product_id: String,
    },

    /// A stored aggregate disagrees with its recomputation beyond tolerance.
    ///
    /// Advisory by default: only reconciliation in apply mode mutates data.
    #[error(
        "{entity_id}: stored {component} {stored_cents}c differs from recomputed {recomputed_cents}c"
    )]
    Consistency {
        entity_id: String,
        component: String,
        stored_cents: i64,
        recomputed_cents: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when input doesn't meet requirements. Used for early
/// validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed snapshot JSON).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in the allowed set (e.g., unknown tax classification).
    #[error("{field} '{value}' must be one of: {allowed:?}")]
    NotAllowed {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    /// Duplicate value (e.g., duplicate serial number or order number).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            variant_id: "v-123".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for v-123: available 3, requested 5"
        );

        let err = CoreError::InvalidTransition {
            order_id: "WO-1".to_string(),
            current: "shipped".to_string(),
            requested: "cancelled".to_string(),
        };
        assert_eq!(err.to_string(), "Order WO-1 is shipped, cannot move to cancelled");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "serial_or_imei".to_string(),
        };
        assert_eq!(err.to_string(), "serial_or_imei is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "product_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
