//! # storefront-db: Persistence Layer for the Storefront Order Engine
//!
//! This crate provides database access for the storefront order engine.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Data Flow                                │
//! │                                                                         │
//! │  Storefront request (add to cart, checkout, export)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   storefront-db (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ catalog, cart │    │  (embedded)  │  │   │
//! │  │   │               │    │ customer,     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ order         │    │ 001_init.sql │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   Pricing, loyalty, and checkout rules come from                │   │
//! │  │   storefront-core; this crate owns transactions and SQL.        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL, foreign keys on)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and operation error types
//! - [`repository`] - Repository implementations (catalog, cart, customer, order)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_db::{Database, DbConfig};
//! use storefront_core::{CartOwner, Channel};
//!
//! let db = Database::new(DbConfig::new("path/to/storefront.db")).await?;
//!
//! let owner = CartOwner::Customer("cust-1".into());
//! db.carts().add_item(Channel::Retail, &owner, "prod-1", 2).await?;
//!
//! let cart = db.carts().get_active(Channel::Retail, &owner).await?.unwrap();
//! let order = db.orders().checkout(&cart.cart.id, &request).await?;
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

pub use error::{CartError, CheckoutError, DbError, ReportError};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::{CartRepository, CartWithItems};
pub use repository::catalog::{CatalogRepository, ChannelOffer};
pub use repository::customer::CustomerRepository;
pub use repository::order::OrderRepository;
