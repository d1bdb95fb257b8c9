//! # Price Resolver
//!
//! Pure price resolution for a (product, channel) price record and a
//! requested quantity. No I/O, no mutation; the Order Converter calls this
//! at checkout to recompute authoritative totals, and the Cart Manager
//! calls it when snapshotting an add-time price.
//!
//! ## Tier Selection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Volume tiers: [{min_qty: 50, price: 900}, {min_qty: 100, price: 850}] │
//! │  Base price: 1000                                                       │
//! │                                                                         │
//! │  quantity 10  → no tier qualifies        → unit price 1000             │
//! │  quantity 60  → tier 50 qualifies        → unit price  900             │
//! │  quantity 100 → tiers 50 and 100 qualify → unit price  850             │
//! │                                                                         │
//! │  Rule: among tiers with min_qty <= quantity, the LARGEST min_qty wins  │
//! │  (closest-from-below match).                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::money::{Money, TaxRate};
use crate::validation::{validate_price_cents, validate_tax_rate_bps};

// =============================================================================
// Volume Tier
// =============================================================================

/// A quantity threshold at which a lower per-unit price applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeTier {
    /// Minimum quantity for this tier to apply.
    pub min_qty: i64,
    /// Per-unit price at or above `min_qty`.
    pub price: Money,
}

// =============================================================================
// Price Record
// =============================================================================

/// The published price of one product on one channel.
///
/// Immutable once published: a price change creates a new record rather
/// than mutating one that past orders were resolved against. Construction
/// validates the tier set, so a `PriceRecord` in hand is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    base_price: Money,
    tax_rate: TaxRate,
    min_order_qty: i64,
    /// Sorted ascending by `min_qty`; unique `min_qty`; non-increasing price.
    volume_tiers: Vec<VolumeTier>,
}

impl PriceRecord {
    /// Builds a validated price record.
    ///
    /// ## Rules
    /// - `base_price >= 0`
    /// - `tax_rate < 100%`
    /// - `min_order_qty >= 1`
    /// - tiers: unique `min_qty >= 1`, and price must not increase as
    ///   `min_qty` increases (a tier never prices above the base price
    ///   either — that would be a discount that raises the price)
    ///
    /// Malformed tier sets are rejected here rather than tolerated in the
    /// resolver, so resolution itself has no failure modes.
    pub fn new(
        base_price: Money,
        tax_rate: TaxRate,
        min_order_qty: i64,
        mut volume_tiers: Vec<VolumeTier>,
    ) -> ValidationResult<Self> {
        validate_price_cents(base_price.cents())?;
        validate_tax_rate_bps(tax_rate.bps())?;
        if min_order_qty < 1 {
            return Err(ValidationError::MustBePositive {
                field: "min_order_qty".to_string(),
            });
        }

        volume_tiers.sort_by_key(|t| t.min_qty);

        let mut previous: Option<&VolumeTier> = None;
        for tier in &volume_tiers {
            if tier.min_qty < 1 {
                return Err(ValidationError::MustBePositive {
                    field: "volume_tiers.min_qty".to_string(),
                });
            }
            if tier.price.is_negative() {
                return Err(ValidationError::MustBeNonNegative {
                    field: "volume_tiers.price".to_string(),
                });
            }
            if tier.price > base_price {
                return Err(ValidationError::InvalidFormat {
                    field: "volume_tiers".to_string(),
                    reason: format!(
                        "tier at min_qty {} prices above the base price",
                        tier.min_qty
                    ),
                });
            }
            if let Some(prev) = previous {
                if prev.min_qty == tier.min_qty {
                    return Err(ValidationError::InvalidFormat {
                        field: "volume_tiers".to_string(),
                        reason: format!("duplicate min_qty {}", tier.min_qty),
                    });
                }
                if tier.price > prev.price {
                    return Err(ValidationError::InvalidFormat {
                        field: "volume_tiers".to_string(),
                        reason: format!(
                            "price increases between min_qty {} and {}",
                            prev.min_qty, tier.min_qty
                        ),
                    });
                }
            }
            previous = Some(tier);
        }

        Ok(PriceRecord {
            base_price,
            tax_rate,
            min_order_qty,
            volume_tiers,
        })
    }

    /// Convenience constructor for a record with no volume tiers.
    pub fn flat(base_price: Money, tax_rate: TaxRate, min_order_qty: i64) -> ValidationResult<Self> {
        PriceRecord::new(base_price, tax_rate, min_order_qty, Vec::new())
    }

    /// Per-unit price before any volume tier applies.
    #[inline]
    pub fn base_price(&self) -> Money {
        self.base_price
    }

    /// Tax rate for lines resolved against this record.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    /// Minimum quantity per addition on this channel.
    #[inline]
    pub fn min_order_qty(&self) -> i64 {
        self.min_order_qty
    }

    /// The validated tier set, ascending by `min_qty`.
    #[inline]
    pub fn volume_tiers(&self) -> &[VolumeTier] {
        &self.volume_tiers
    }

    /// Unit price for a quantity: the largest qualifying tier, or the base
    /// price when no tier qualifies.
    pub fn unit_price_for(&self, quantity: i64) -> Money {
        self.volume_tiers
            .iter()
            .rev()
            .find(|tier| tier.min_qty <= quantity)
            .map(|tier| tier.price)
            .unwrap_or(self.base_price)
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// The authoritative pricing of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    /// Per-unit price after tier selection.
    pub unit_price: Money,
    /// `unit_price * quantity`, before tax.
    pub total_price: Money,
    /// Tax on `total_price`.
    pub tax_amount: Money,
    /// `total_price + tax_amount`, exactly.
    pub total_with_tax: Money,
    /// `(base_price - unit_price) * quantity`, reported for display only
    /// when positive. `None` means no tier discount applied.
    pub discount: Option<Money>,
}

/// Resolves the price of `quantity` units against a price record.
///
/// Deterministic and total: `quantity >= 1` is the caller's contract
/// (validated at the cart boundary), and the record is well-formed by
/// construction, so there is nothing left to fail.
///
/// ## Example
/// ```rust
/// use storefront_core::money::{Money, TaxRate};
/// use storefront_core::pricing::{resolve_price, PriceRecord, VolumeTier};
///
/// let record = PriceRecord::new(
///     Money::from_cents(1000),
///     TaxRate::from_bps(1000),
///     10,
///     vec![VolumeTier { min_qty: 50, price: Money::from_cents(900) }],
/// ).unwrap();
///
/// let resolved = resolve_price(&record, 60);
/// assert_eq!(resolved.unit_price.cents(), 900);
/// assert_eq!(resolved.discount.unwrap().cents(), 6000);
/// ```
pub fn resolve_price(record: &PriceRecord, quantity: i64) -> ResolvedPrice {
    let unit_price = record.unit_price_for(quantity);
    let total_price = unit_price.multiply_quantity(quantity);
    let tax_amount = total_price.calculate_tax(record.tax_rate());
    let total_with_tax = total_price + tax_amount;

    let discount_amount = (record.base_price() - unit_price).multiply_quantity(quantity);
    let discount = discount_amount.is_positive().then_some(discount_amount);

    ResolvedPrice {
        unit_price,
        total_price,
        tax_amount,
        total_with_tax,
        discount,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
