//! # Tax Engine
//!
//! Multi-scheme VAT computation: the same line amount produces different
//! `{net, tax, gross}` splits depending on tax classification, transaction
//! role (purchase vs. sale) and price convention (inclusive vs. exclusive).
//!
//! ## Scheme Matrix
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  classification │ role      │ rule                                      │
//! │  ───────────────┼───────────┼───────────────────────────────────────    │
//! │  Standard23     │ any       │ flat 23% on the full amount               │
//! │  Standard135    │ any       │ flat 13.5% on the full amount             │
//! │  MarginVat      │ purchase  │ tax = 0 (no input VAT on margin goods)    │
//! │  MarginVat      │ sale      │ 23% embedded in the margin only:          │
//! │                 │           │   margin = max(0, sale − cost) × qty      │
//! │                 │           │   tax    = margin − margin/1.23           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The price convention is an explicit input on every call, never inferred
//! from the entity type. Wholesale/warehouse orders quote tax-inclusive
//! prices; sales invoices quote tax-exclusive prices. Margin-scheme amounts
//! are treated the same under either convention because the scheme has no
//! itemizable VAT.
//!
//! ## Worked Example (margin sale)
//! ```rust
//! use harbor_core::money::Money;
//! use harbor_core::tax::{compute, PriceConvention, TaxClass, TaxRole};
//!
//! // cost €20, sale €50, quantity 3 → margin €90.00
//! let breakdown = compute(
//!     TaxClass::MarginVat,
//!     TaxRole::Sale,
//!     PriceConvention::Inclusive,
//!     Money::from_cents(5000),
//!     Money::from_cents(2000),
//!     3,
//! )
//! .unwrap();
//! assert_eq!(breakdown.tax.cents(), 1683);  // €16.83 = 90 × 23/123
//! assert_eq!(breakdown.net.cents(), 7317);  // margin net of VAT
//! assert_eq!(breakdown.gross.cents(), 15000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 2300 bps = 23% (Irish standard VAT), 1350 bps = 13.5% (reduced rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

/// The rate embedded in margin-scheme sales is fixed at the standard 23%,
/// independent of the goods' usual rate band.
pub const MARGIN_SCHEME_RATE: TaxRate = TaxRate::from_bps(2300);

// =============================================================================
// Classification, Role, Convention
// =============================================================================

/// Tax classification of a product variant.
///
/// An exhaustive enum: "unknown classification" can only arise at the
/// string boundary ([`TaxClass::parse`]) and is a [`ValidationError`]
/// there - never a silent zero inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum TaxClass {
    /// Standard 23% VAT on the full transacted amount.
    #[serde(rename = "standard_23")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "standard_23"))]
    Standard23,
    /// Reduced 13.5% VAT on the full transacted amount.
    #[serde(rename = "standard_13_5")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "standard_13_5"))]
    Standard135,
    /// Margin scheme (second-hand goods): VAT only on the sale margin.
    #[serde(rename = "margin_vat")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "margin_vat"))]
    MarginVat,
}

impl TaxClass {
    /// String representation, matching the persisted column values.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxClass::Standard23 => "standard_23",
            TaxClass::Standard135 => "standard_13_5",
            TaxClass::MarginVat => "margin_vat",
        }
    }

    /// Parses a persisted classification string.
    ///
    /// Unknown values are a [`ValidationError`], not a default rate.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "standard_23" => Ok(TaxClass::Standard23),
            "standard_13_5" => Ok(TaxClass::Standard135),
            "margin_vat" => Ok(TaxClass::MarginVat),
            other => Err(ValidationError::NotAllowed {
                field: "tax_class".to_string(),
                value: other.to_string(),
                allowed: vec![
                    "standard_23".to_string(),
                    "standard_13_5".to_string(),
                    "margin_vat".to_string(),
                ],
            }),
        }
    }

    /// The flat rate for the standard bands; `None` for the margin scheme,
    /// where the rate applies to the margin rather than the amount.
    pub const fn standard_rate(&self) -> Option<TaxRate> {
        match self {
            TaxClass::Standard23 => Some(TaxRate::from_bps(2300)),
            TaxClass::Standard135 => Some(TaxRate::from_bps(1350)),
            TaxClass::MarginVat => None,
        }
    }
}

impl fmt::Display for TaxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the transaction the computation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRole {
    /// Buying stock in (warehouse orders).
    Purchase,
    /// Selling stock out (sales invoices).
    Sale,
}

/// Whether the quoted amount already contains VAT.
///
/// Carried explicitly with every monetary computation: inferring the
/// convention from entity type is exactly the drift this engine exists
/// to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceConvention {
    /// Amount includes VAT (wholesale/warehouse order prices).
    Inclusive,
    /// Amount excludes VAT (sales invoice unit prices).
    Exclusive,
}

// =============================================================================
// Computation
// =============================================================================

/// The result of one tax computation, all components in minor units.
///
/// For the standard bands, `net + tax == gross` always holds.
/// For a margin-scheme sale, `gross` is the full sale amount, `tax` is the
/// VAT embedded in the margin and `net` is the margin net of that VAT -
/// the three do not sum, because most of the sale amount is cost recovery
/// outside the scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub net: Money,
    pub tax: Money,
    pub gross: Money,
}

/// Computes `{net, tax, gross}` for one line.
///
/// ## Arguments
/// * `class` - tax classification of the variant
/// * `role` - purchase or sale side
/// * `convention` - whether `unit_amount` includes VAT
/// * `unit_amount` - quoted unit price
/// * `cost_basis` - unit acquisition cost; only meaningful for a
///   margin-scheme sale, ignored otherwise
/// * `quantity` - scales all results; must be positive
///
/// ## Errors
/// * [`ValidationError::MustBePositive`] for a non-positive quantity
/// * [`ValidationError::OutOfRange`] for a negative amount
pub fn compute(
    class: TaxClass,
    role: TaxRole,
    convention: PriceConvention,
    unit_amount: Money,
    cost_basis: Money,
    quantity: i64,
) -> Result<TaxBreakdown, ValidationError> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if unit_amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "unit_amount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    let amount = unit_amount.multiply_quantity(quantity);

    let breakdown = match class {
        TaxClass::MarginVat => match role {
            // A buyer acquiring margin-scheme goods never records input tax.
            TaxRole::Purchase => TaxBreakdown {
                net: amount,
                tax: Money::zero(),
                gross: amount,
            },
            TaxRole::Sale => {
                let margin = (amount - cost_basis.multiply_quantity(quantity)).max(Money::zero());
                // Negative or zero margin never produces negative tax.
                let tax = margin.tax_in_inclusive(MARGIN_SCHEME_RATE);
                TaxBreakdown {
                    net: margin - tax,
                    tax,
                    gross: amount,
                }
            }
        },
        TaxClass::Standard23 | TaxClass::Standard135 => {
            // standard_rate() is Some for both standard bands
            let rate = class.standard_rate().unwrap_or_default();
            match convention {
                PriceConvention::Inclusive => {
                    let net = amount.net_of_inclusive(rate);
                    TaxBreakdown {
                        net,
                        tax: amount - net,
                        gross: amount,
                    }
                }
                PriceConvention::Exclusive => {
                    let tax = amount.tax_on_exclusive(rate);
                    TaxBreakdown {
                        net: amount,
                        tax,
                        gross: amount + tax,
                    }
                }
            }
        }
    };

    Ok(breakdown)
}

// =============================================================================
// Unit Tests
// =============================================================================
