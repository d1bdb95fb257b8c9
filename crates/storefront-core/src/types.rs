//! # Domain Types
//!
//! Core domain types for the storefront order engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Cart       │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  code (business)│   │  channel        │   │  order_number   │       │
//! │  │  allowed        │   │  owner (customer│   │  line snapshots │       │
//! │  │  channels       │   │  OR session)    │   │  points ledger  │       │
//! │  └─────────────────┘   │  expires_at     │   │  deltas         │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Cart is EPHEMERAL: superseded when expired, deleted at checkout.      │
//! │  Order is IMMUTABLE: denormalized line snapshots survive catalog       │
//! │  changes; only status fields advance after creation.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Entities have a UUID `id` for relations plus a business identifier
//! (product `code`, `order_number`) that humans read.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::{Channel, PaymentMethod};
use crate::error::{CoreError, CoreResult};
use crate::money::{Money, TaxRate};
use crate::validation::{validate_address, validate_points};

/// How long an active cart lives before lazy expiry hides it.
pub const CART_TTL_DAYS: i64 = 7;

// =============================================================================
// Product
// =============================================================================

/// A catalog product. Pricing lives on per-channel price records, not here;
/// the product row carries identity and channel availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier shown on orders and exports.
    pub code: String,

    /// Display name, snapshotted onto order lines.
    pub name: String,

    /// Optional description for product detail views.
    pub description: Option<String>,

    /// Consignment stock marker, carried through to purchase exports.
    pub is_consignment: bool,

    /// Channel availability flags. A product absent from a channel is
    /// Forbidden there even if a price record exists.
    pub sells_dealer: bool,
    pub sells_wholesale: bool,
    pub sells_retail: bool,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether this product may be sold on the given channel.
    pub fn allows(&self, channel: Channel) -> bool {
        match channel {
            Channel::Dealer => self.sells_dealer,
            Channel::Wholesale => self.sells_wholesale,
            Channel::Retail => self.sells_retail,
        }
    }
}

// =============================================================================
// Cart Ownership
// =============================================================================

/// The owner key of a cart: a customer id when authenticated, otherwise the
/// anonymous session id. Exactly one of the two, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartOwner {
    Customer(String),
    Session(String),
}

impl CartOwner {
    /// Customer id when authenticated.
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            CartOwner::Customer(id) => Some(id),
            CartOwner::Session(_) => None,
        }
    }

    /// Session id when anonymous.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            CartOwner::Customer(_) => None,
            CartOwner::Session(id) => Some(id),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A mutable pre-order basket scoped to (channel, owner).
///
/// Ephemeral by design: created lazily on first add, hidden once
/// `expires_at` passes (a fresh cart is created instead; expired carts are
/// never resurrected), and deleted when converted to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Cart {
    pub id: String,
    pub channel: Channel,
    /// Set when the owner is an authenticated customer.
    pub customer_id: Option<String>,
    /// Set when the owner is an anonymous session.
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Creation + [`CART_TTL_DAYS`].
    pub expires_at: DateTime<Utc>,
}

impl Cart {
    /// Expiry timestamp for a cart created at `now`.
    pub fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(CART_TTL_DAYS)
    }

    /// Whether the cart is past its expiry at the given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// The owner key this cart is scoped to.
    pub fn owner(&self) -> Option<CartOwner> {
        match (&self.customer_id, &self.session_id) {
            (Some(id), _) => Some(CartOwner::Customer(id.clone())),
            (None, Some(id)) => Some(CartOwner::Session(id.clone())),
            (None, None) => None,
        }
    }
}

// =============================================================================
// Cart Item
// =============================================================================

/// A line in a cart, keyed uniquely by `(cart_id, product_id)`.
///
/// `unit_price_cents` is a display snapshot of the base price at add-time.
/// It is NOT authoritative: checkout re-resolves every line against the
/// current price record so volume tiers reflect the final quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Base price snapshot at add-time (display only).
    pub unit_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    /// Returns the snapshotted unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment status of an order. Orders are created `Pending`; later
/// transitions are driven by fulfilment outside this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

/// Payment status, advanced by the payment gateway integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

// =============================================================================
// Order
// =============================================================================

/// An immutable record created by converting a cart.
///
/// Everything needed to reproduce the invoice is denormalized here and on
/// [`OrderItem`]; later catalog or price changes never retroactively alter
/// a placed order. Only `status` / `payment_status` advance afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    /// Human-traceable business number: `{CHANNEL}-{epochMillis}-{random6}`.
    pub order_number: String,
    pub channel: Channel,
    /// None for anonymous (session) checkouts; points require a customer.
    pub customer_id: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub billing_address: String,
    /// Sum of line totals, before tax and before points.
    pub subtotal_cents: i64,
    /// Sum of line taxes.
    pub tax_cents: i64,
    /// Loyalty points credited by this order.
    pub points_earned: i64,
    /// Loyalty points spent against the subtotal. Invariant: `<= subtotal`.
    pub points_used: i64,
    /// `subtotal - points_used`. Invariant: `>= 0`.
    pub total_cents: i64,
    /// Set by fulfilment once delivery is confirmed; exported downstream.
    pub delivery_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Order {
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

    /// Net change this order applies to the customer's points balance.
    #[inline]
    pub fn points_delta(&self) -> i64 {
        self.points_earned - self.points_used
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A denormalized line snapshot on an order.
/// Frozen at checkout; the product row may change or vanish afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product code at time of checkout (frozen).
    pub product_code: String,
    /// Product name at time of checkout (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Tier-resolved unit price at checkout (frozen).
    pub unit_price_cents: i64,
    /// `unit_price * quantity` (frozen).
    pub total_price_cents: i64,
    /// Tax rate applied, in basis points (frozen).
    pub tax_rate_bps: u32,
    /// Consignment marker at time of checkout (frozen, for exports).
    pub is_consignment: bool,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A registered buyer. The points balance is mutated only by the Order
/// Converter's atomic increment, never read-modify-written in application
/// code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    /// The channel this customer buys on.
    pub channel: Channel,
    pub name: String,
    pub email: String,
    /// Loyalty point balance. Invariant: never driven negative by an order.
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Checkout Request
// =============================================================================

/// The checkout contract. The cart being converted is named by the
/// checkout call itself; this carries everything else the order needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    /// Defaults to the shipping address when absent.
    pub billing_address: Option<String>,
    pub payment_method: PaymentMethod,
    /// Points the buyer asks to spend; clamped to the subtotal and checked
    /// against the balance at checkout. Defaults to 0.
    #[serde(default)]
    pub points_to_use: i64,
}

impl CheckoutRequest {
    /// Validates the channel-independent fields. Runs before any
    /// persistence is touched; the payment policy check needs the cart's
    /// channel, so it lives in [`Self::validate_payment_method`].
    pub fn validate(&self) -> CoreResult<()> {
        validate_address("shipping_address", &self.shipping_address)?;
        if let Some(billing) = &self.billing_address {
            validate_address("billing_address", billing)?;
        }
        validate_points(self.points_to_use)?;
        Ok(())
    }

    /// Checks the requested payment method against the channel policy.
    pub fn validate_payment_method(&self, channel: Channel) -> CoreResult<()> {
        if !channel.allows_payment_method(self.payment_method) {
            return Err(CoreError::PaymentMethodNotAllowed {
                channel,
                method: self.payment_method,
            });
        }
        Ok(())
    }

    /// Billing address, falling back to shipping.
    pub fn billing_or_shipping(&self) -> &str {
        self.billing_address
            .as_deref()
            .unwrap_or(&self.shipping_address)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
