//! # storefront-core: Pure Business Logic for the Storefront Engine
//!
//! This crate is the **heart** of the multi-channel storefront. It contains
//! all pricing, loyalty, and checkout business rules as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storefront Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Storefront web layer (outside this repo)             │   │
//! │  │    catalog pages ──► cart actions ──► checkout ──► reports     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐ │   │
//! │  │   │  money   │ │ pricing  │ │ loyalty  │ │ channel / types  │ │   │
//! │  │   │  Money   │ │ resolver │ │  points  │ │ policy table,    │ │   │
//! │  │   │  TaxRate │ │  tiers   │ │  rules   │ │ Cart, Order      │ │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 storefront-db (Database Layer)                  │   │
//! │  │      carts, atomic checkout, points ledger, repositories        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`channel`] - Sales channels and the static channel policy table
//! - [`money`] - Money and tax rate types with integer arithmetic
//! - [`pricing`] - Price records, volume tiers, and the price resolver
//! - [`loyalty`] - Loyalty point earn and usage rules
//! - [`types`] - Domain aggregates (Product, Cart, Order, Customer)
//! - [`validation`] - Input validation
//! - [`export`] - Purchase export data contract
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: checkout recomputes totals through these
//!    functions, so same input = same output is what makes orders auditable
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are cents (i64); one loyalty
//!    point offsets one cent
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::money::{Money, TaxRate};
//! use storefront_core::pricing::{resolve_price, PriceRecord, VolumeTier};
//!
//! let record = PriceRecord::new(
//!     Money::from_cents(1000),
//!     TaxRate::from_bps(1000),
//!     10,
//!     vec![VolumeTier { min_qty: 50, price: Money::from_cents(900) }],
//! ).unwrap();
//!
//! // 60 units crosses the 50-unit tier
//! let resolved = resolve_price(&record, 60);
//! assert_eq!(resolved.total_price.cents(), 54_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod channel;
pub mod error;
pub mod export;
pub mod loyalty;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use storefront_core::Money` instead of
// `use storefront_core::money::Money`

pub use channel::{Channel, ChannelPolicy, PaymentMethod};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use pricing::{resolve_price, PriceRecord, ResolvedPrice, VolumeTier};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single item per cart line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 10000 instead of 100).
/// Wholesale buyers needing more place multiple orders.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;
