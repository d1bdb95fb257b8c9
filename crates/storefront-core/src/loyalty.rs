//! # Loyalty Ledger Rules
//!
//! Pure rules for the customer points ledger. One point offsets one cent of
//! an order subtotal, so points math is plain integer arithmetic against
//! [`Money`] cents.
//!
//! These functions decide how many points an order earns and how many of
//! the requested points can be spent. They never touch the stored balance:
//! the Order Converter applies the resulting delta in its transaction, and
//! it alone also checks the customer actually holds the points being spent.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Checkout                                                               │
//! │                                                                         │
//! │  subtotal ──► points_earned(channel, subtotal) ──► earned              │
//! │  requested ─► apply_points_usage(requested, subtotal) ──► used         │
//! │                                                                         │
//! │  total = subtotal − used            (never negative: used ≤ subtotal)  │
//! │  balance += earned − used           (atomic, in the Order Converter)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::channel::Channel;
use crate::money::Money;

/// Default earn rate: 1% of the subtotal, in basis points.
pub const DEFAULT_EARN_RATE_BPS: u32 = 100;

/// Points earned by an order with the given pre-tax subtotal.
///
/// Returns `floor(subtotal * rate)` on loyalty-eligible channels and `0`
/// elsewhere (wholesale buyers do not participate in the points program;
/// see the channel policy table).
pub fn points_earned_at_rate(channel: Channel, subtotal: Money, rate_bps: u32) -> i64 {
    if !channel.is_loyalty_eligible() {
        return 0;
    }
    // i128 for the same overflow headroom as tax math
    ((subtotal.cents().max(0) as i128 * rate_bps as i128) / 10_000) as i64
}

/// Points earned at the standard rate of [`DEFAULT_EARN_RATE_BPS`].
pub fn points_earned(channel: Channel, subtotal: Money) -> i64 {
    points_earned_at_rate(channel, subtotal, DEFAULT_EARN_RATE_BPS)
}

/// Clamps a requested points spend to the order subtotal.
///
/// Guarantees `actual_used <= subtotal`, which is what keeps an order total
/// from going negative. Deliberately does NOT check the customer's actual
/// balance: that requires storage access and belongs to the Order
/// Converter, which rejects overdrafts before committing.
pub fn apply_points_usage(requested: i64, subtotal: Money) -> i64 {
    requested.max(0).min(subtotal.cents().max(0))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_earned_one_percent() {
        let earned = points_earned(Channel::Retail, Money::from_cents(10_000));
        assert_eq!(earned, 100);
    }

    #[test]
    fn test_points_earned_floors() {
        // 1.99 at 1% = 1.99 points → 1
        assert_eq!(points_earned(Channel::Retail, Money::from_cents(199)), 1);
        assert_eq!(points_earned(Channel::Retail, Money::from_cents(99)), 0);
    }

    #[test]
    fn test_wholesale_earns_nothing() {
        assert_eq!(points_earned(Channel::Wholesale, Money::from_cents(1_000_000)), 0);
        assert_eq!(points_earned(Channel::Dealer, Money::from_cents(1_000_000)), 10_000);
    }

    #[test]
    fn test_custom_rate() {
        let earned = points_earned_at_rate(Channel::Retail, Money::from_cents(10_000), 500);
        assert_eq!(earned, 500); // 5%
    }

    #[test]
    fn test_usage_clamped_to_subtotal() {
        // Cart subtotal 10,000; request 15,000 → spend exactly the subtotal
        assert_eq!(apply_points_usage(15_000, Money::from_cents(10_000)), 10_000);
        assert_eq!(apply_points_usage(5_000, Money::from_cents(10_000)), 5_000);
    }

    #[test]
    fn test_usage_never_exceeds_subtotal() {
        for requested in [0, 1, 999, 10_000, i64::MAX] {
            for subtotal in [0, 1, 500, 10_000] {
                let used = apply_points_usage(requested, Money::from_cents(subtotal));
                assert!(used <= subtotal);
                assert!(used >= 0);
            }
        }
    }

    #[test]
    fn test_usage_negative_request_is_zero() {
        assert_eq!(apply_points_usage(-50, Money::from_cents(10_000)), 0);
    }
}
