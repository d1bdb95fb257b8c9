//! # Repository Module
//!
//! Database repository implementations for the storefront order engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Storefront request                                                    │
//! │       │                                                                 │
//! │       │  db.carts().add_item(channel, owner, product, qty)             │
//! │       ▼                                                                 │
//! │  CartRepository ──── validates, then one transaction                   │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • SQL is isolated in one place per aggregate                          │
//! │  • Transaction boundaries match business operations                    │
//! │  • Easy to exercise against an in-memory database                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Products and per-channel price records
//! - [`cart::CartRepository`] - Cart lifecycle and item upserts
//! - [`customer::CustomerRepository`] - Accounts and the points balance
//! - [`order::OrderRepository`] - Atomic checkout and purchase exports

pub mod cart;
pub mod catalog;
pub mod customer;
pub mod order;

// =============================================================================
// Shared Test Fixtures
// =============================================================================
