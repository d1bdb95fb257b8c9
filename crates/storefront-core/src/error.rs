//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                    │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  storefront-db errors (separate crate)                                 │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── CheckoutError    - Atomic checkout failure taxonomy               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CheckoutError → caller            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, channel, limits)
//! 3. Errors are enum variants, never String
//! 4. Business errors carry enough detail for the caller to correct the
//!    request; invariant violations deliberately do not leak internals

use thiserror::Error;

use crate::channel::{Channel, PaymentMethod};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. All of them are
/// local-recoverable: no side effect has occurred when one is returned, so
/// the caller can adjust the request and retry.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found, is inactive, or has no published price
    /// record for the requested channel.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product exists but its allowed-channel set excludes this channel.
    ///
    /// ## When This Occurs
    /// - A retail shopper requests a dealer-only part
    /// - A catalog entry was withdrawn from one channel but not the others
    #[error("Product {product_id} is not sold on the {channel} channel")]
    ChannelForbidden {
        product_id: String,
        channel: Channel,
    },

    /// The quantity being added is below the product's minimum order
    /// quantity for this channel.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (qty: 5)
    ///      │
    ///      ▼
    /// Price record: min_order_qty = 10
    ///      │
    ///      ▼
    /// BelowMinimumOrder { min_order_qty: 10, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "minimum order quantity is 10"
    /// ```
    #[error("Minimum order quantity is {min_order_qty}, requested {requested}")]
    BelowMinimumOrder {
        product_id: String,
        min_order_qty: i64,
        requested: i64,
    },

    /// The requested payment method is not allowed for this channel.
    #[error("Payment method {method:?} is not available on the {channel} channel")]
    PaymentMethodNotAllowed {
        channel: Channel,
        method: PaymentMethod,
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
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs and before any
/// persistence is touched.
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

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Invalid format (e.g., invalid UUID, malformed tier set).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A date range request is inverted or spans too long a period.
    #[error("Invalid date range: {reason}")]
    InvalidDateRange { reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::BelowMinimumOrder {
            product_id: "p-1".to_string(),
            min_order_qty: 10,
            requested: 5,
        };
        assert_eq!(err.to_string(), "Minimum order quantity is 10, requested 5");

        let err = CoreError::ChannelForbidden {
            product_id: "p-1".to_string(),
            channel: Channel::Retail,
        };
        assert!(err.to_string().contains("retail"));
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "shipping_address".to_string(),
        };
        assert_eq!(err.to_string(), "shipping_address is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
