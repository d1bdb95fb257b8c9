//! # Sales Channels
//!
//! The storefront sells one catalog to three buyer classes. The channel a
//! request arrives on selects the price record, the minimum-order policy,
//! loyalty eligibility, and the payment methods offered at checkout.
//!
//! ## Channel Policy Table
//! ```text
//! ┌───────────┬──────────────────┬─────────────────┬───────────────────────┐
//! │ Channel   │ Default min qty  │ Loyalty points  │ Payment methods       │
//! ├───────────┼──────────────────┼─────────────────┼───────────────────────┤
//! │ dealer    │ 1                │ eligible        │ card, invoice         │
//! │ wholesale │ 10               │ not eligible    │ bank transfer,        │
//! │           │                  │                 │ invoice               │
//! │ retail    │ 1                │ eligible        │ card, cash on         │
//! │           │                  │                 │ delivery              │
//! └───────────┴──────────────────┴─────────────────┴───────────────────────┘
//! ```
//!
//! The table is pure data: const fns on [`Channel`], no storage lookup.
//! Per-product minimum order quantities on a price record override the
//! channel default.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Channel
// =============================================================================

/// Buyer classification that selects pricing, minimum-order, and loyalty
/// policy. Immutable for the lifetime of a cart and an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Franchised dealers buying under a membership agreement.
    Dealer,
    /// Bulk buyers; volume tiers matter most here.
    Wholesale,
    /// The public storefront.
    Retail,
}

impl Channel {
    /// All channels, for iteration in seeds and tests.
    pub const ALL: [Channel; 3] = [Channel::Dealer, Channel::Wholesale, Channel::Retail];

    /// Returns this channel's static policy row.
    pub const fn policy(&self) -> ChannelPolicy {
        match self {
            Channel::Dealer => ChannelPolicy {
                default_min_order_qty: 1,
                loyalty_eligible: true,
                allowed_payment_methods: &[PaymentMethod::Card, PaymentMethod::Invoice],
            },
            Channel::Wholesale => ChannelPolicy {
                default_min_order_qty: 10,
                loyalty_eligible: false,
                allowed_payment_methods: &[PaymentMethod::BankTransfer, PaymentMethod::Invoice],
            },
            Channel::Retail => ChannelPolicy {
                default_min_order_qty: 1,
                loyalty_eligible: true,
                allowed_payment_methods: &[PaymentMethod::Card, PaymentMethod::CashOnDelivery],
            },
        }
    }

    /// Whether orders on this channel accrue loyalty points.
    #[inline]
    pub const fn is_loyalty_eligible(&self) -> bool {
        self.policy().loyalty_eligible
    }

    /// Whether this channel accepts the given payment method.
    pub fn allows_payment_method(&self, method: PaymentMethod) -> bool {
        self.policy()
            .allowed_payment_methods
            .iter()
            .any(|m| *m == method)
    }

    /// Upper-case code used as the order number prefix.
    pub const fn code(&self) -> &'static str {
        match self {
            Channel::Dealer => "DEALER",
            Channel::Wholesale => "WHOLESALE",
            Channel::Retail => "RETAIL",
        }
    }
}

/// Lower-case name, matching the serde and database representation.
impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Dealer => "dealer",
            Channel::Wholesale => "wholesale",
            Channel::Retail => "retail",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Channel Policy
// =============================================================================

/// One row of the channel policy table. Pure data, no behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    /// Minimum quantity per add-to-cart when the price record does not
    /// specify its own minimum.
    pub default_min_order_qty: i64,

    /// Whether orders on this channel earn and spend loyalty points.
    pub loyalty_eligible: bool,

    /// Payment methods offered at checkout.
    pub allowed_payment_methods: &'static [PaymentMethod],
}

// =============================================================================
// Payment Method
// =============================================================================

/// How an order is paid. Which methods are offered depends on the channel;
/// see [`Channel::policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment through the external gateway.
    Card,
    /// Bank transfer against the order number.
    BankTransfer,
    /// Invoice on account (net terms).
    Invoice,
    /// Cash collected by the carrier on delivery.
    CashOnDelivery,
}

// =============================================================================
// Unit Tests
// =============================================================================
