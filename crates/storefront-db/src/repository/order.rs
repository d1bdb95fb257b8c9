//! # Order Repository
//!
//! Atomic cart-to-order conversion and the purchase export read path.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Checkout (single transaction)                          │
//! │                                                                         │
//! │  0. VALIDATE REQUEST FIELDS (before the transaction opens)             │
//! │  1. LOAD CART (unexpired, by id)          ── missing → EmptyCart       │
//! │  2. CHECK PAYMENT METHOD against the cart's channel policy             │
//! │  3. LOAD ITEMS                             ── none → EmptyCart         │
//! │  4. RE-RESOLVE every line against the CURRENT price record             │
//! │     (volume tiers apply to final quantities; cart snapshots ignored)   │
//! │  5. POINTS: earn from subtotal, clamp usage, check the balance         │
//! │  6. INSERT order + denormalized line snapshots                         │
//! │  7. APPLY points delta (atomic increment, overdraft-guarded)           │
//! │  8. DELETE the cart                        ── 0 rows → EmptyCart       │
//! │  9. COMMIT                                                              │
//! │                                                                         │
//! │  Any failure before COMMIT rolls everything back: no order without     │
//! │  cart deletion, no points movement without an order.                   │
//! │                                                                         │
//! │  Two concurrent checkouts of one cart: both price, one deletes the     │
//! │  cart row and commits; the other's DELETE hits 0 rows → EmptyCart.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CheckoutError, DbError, DbResult, ReportError};
use crate::repository::{cart, catalog};
use storefront_core::error::{CoreError, ValidationError};
use storefront_core::export::{render_purchase_lines, validate_report_range, PurchaseLine};
use storefront_core::loyalty::{apply_points_usage, points_earned};
use storefront_core::pricing::resolve_price;
use storefront_core::{
    Cart, Channel, CheckoutRequest, Money, Order, OrderItem, OrderStatus, PaymentStatus, TaxRate,
};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

const ORDER_COLUMNS: &str = "id, order_number, channel, customer_id, status, payment_status, \
     payment_method, shipping_address, billing_address, subtotal_cents, tax_cents, \
     points_earned, points_used, total_cents, delivery_date, created_at";

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    /// Converts a cart into an order. See the module docs for the exact
    /// transaction steps; on any error the store is left untouched.
    pub async fn checkout(
        &self,
        cart_id: &str,
        request: &CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        // Malformed requests never touch the store; only the payment
        // policy check needs the cart and waits for the load below.
        request.validate()?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let cart: Option<Cart> = sqlx::query_as(
            "SELECT id, channel, customer_id, session_id, created_at, expires_at \
             FROM carts WHERE id = ?1 AND expires_at > ?2",
        )
        .bind(cart_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;
        let cart = cart.ok_or(CheckoutError::EmptyCart)?;

        request.validate_payment_method(cart.channel)?;

        let items = cart::fetch_items(&mut tx, cart_id).await?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        // Price every line from the record that is current NOW. The cart's
        // add-time snapshots are display-only.
        let mut subtotal = Money::zero();
        let mut tax_total = Money::zero();
        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            let product = catalog::load_product(&mut tx, &item.product_id)
                .await?
                .filter(|p| p.is_active && p.allows(cart.channel))
                .ok_or_else(|| CheckoutError::ProductUnavailable {
                    product_id: item.product_id.clone(),
                })?;
            let record = catalog::load_current_price(&mut tx, &item.product_id, cart.channel)
                .await?
                .ok_or_else(|| CheckoutError::ProductUnavailable {
                    product_id: item.product_id.clone(),
                })?;

            let resolved = resolve_price(&record, item.quantity);
            subtotal += resolved.total_price;
            tax_total += resolved.tax_amount;
            lines.push((product, record, resolved, item));
        }

        // Points: earned only for account holders; spending requires one.
        let earned = match &cart.customer_id {
            Some(_) => points_earned(cart.channel, subtotal),
            None => 0,
        };
        if request.points_to_use > 0 && cart.customer_id.is_none() {
            return Err(CoreError::Validation(ValidationError::Required {
                field: "customer_id".to_string(),
            })
            .into());
        }
        let used = match &cart.customer_id {
            Some(customer_id) => {
                let used = apply_points_usage(request.points_to_use, subtotal);
                if used > 0 {
                    let available: Option<i64> =
                        sqlx::query_scalar("SELECT points FROM customers WHERE id = ?1")
                            .bind(customer_id)
                            .fetch_optional(&mut *tx)
                            .await?;
                    let available =
                        available.ok_or_else(|| DbError::not_found("Customer", customer_id))?;
                    if available < used {
                        return Err(CheckoutError::InsufficientPoints {
                            requested: used,
                            available,
                        });
                    }
                }
                used
            }
            None => 0,
        };

        let total = subtotal - Money::from_cents(used);
        // Both guaranteed by the clamp above; recheck before money moves.
        if total.is_negative() || used > subtotal.cents() {
            return Err(CheckoutError::InvariantViolation(format!(
                "total {} for subtotal {} and points_used {}",
                total, subtotal, used
            )));
        }

        let order = Order {
            id: Uuid::new_v4().to_string(),
            order_number: generate_order_number(cart.channel, now),
            channel: cart.channel,
            customer_id: cart.customer_id.clone(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: request.payment_method,
            shipping_address: request.shipping_address.trim().to_string(),
            billing_address: request.billing_or_shipping().trim().to_string(),
            subtotal_cents: subtotal.cents(),
            tax_cents: tax_total.cents(),
            points_earned: earned,
            points_used: used,
            total_cents: total.cents(),
            delivery_date: None,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, channel, customer_id,
                status, payment_status, payment_method,
                shipping_address, billing_address,
                subtotal_cents, tax_cents, points_earned, points_used, total_cents,
                delivery_date, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9,
                ?10, ?11, ?12, ?13, ?14,
                ?15, ?16
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(order.channel)
        .bind(&order.customer_id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.payment_method)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.points_earned)
        .bind(order.points_used)
        .bind(order.total_cents)
        .bind(order.delivery_date)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        for (product, record, resolved, item) in &lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, product_code, product_name,
                    quantity, unit_price_cents, total_price_cents,
                    tax_rate_bps, is_consignment, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order.id)
            .bind(&item.product_id)
            .bind(&product.code)
            .bind(&product.name)
            .bind(item.quantity)
            .bind(resolved.unit_price.cents())
            .bind(resolved.total_price.cents())
            .bind(record.tax_rate().bps())
            .bind(product.is_consignment)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let delta = earned - used;
        if delta != 0 {
            // Balance sufficiency was checked in this same transaction;
            // the guard is the storage-level backstop.
            let customer_id = cart.customer_id.as_deref().ok_or_else(|| {
                CheckoutError::InvariantViolation("points movement without a customer".to_string())
            })?;

            let result = sqlx::query(
                r#"
                UPDATE customers
                SET points = points + ?2, updated_at = ?3
                WHERE id = ?1 AND points + ?2 >= 0
                "#,
            )
            .bind(customer_id)
            .bind(delta)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Customer", customer_id).into());
            }
        }

        // Deleting the cart is what makes checkout exactly-once: a
        // concurrent conversion that lost the race finds 0 rows here.
        let result = sqlx::query("DELETE FROM carts WHERE id = ?1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CheckoutError::EmptyCart);
        }

        tx.commit().await?;

        info!(
            order_number = %order.order_number,
            channel = %order.channel,
            total_cents = order.total_cents,
            points_delta = delta,
            "Checkout committed"
        );

        Ok(order)
    }

    // -------------------------------------------------------------------------
    // Reads and Status
    // -------------------------------------------------------------------------

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets an order by its business number.
    pub async fn get_by_order_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets the line snapshots of an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, product_code, product_name,
                   quantity, unit_price_cents, total_price_cents,
                   tax_rate_bps, is_consignment, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Advances an order's fulfilment status.
    pub async fn update_status(&self, order_id: &str, status: OrderStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET status = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        debug!(order_id = %order_id, ?status, "Order status updated");
        Ok(())
    }

    /// Advances an order's payment status.
    pub async fn update_payment_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET payment_status = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        Ok(())
    }

    /// Records the confirmed delivery date, which then appears in exports.
    pub async fn set_delivery_date(&self, order_id: &str, date: NaiveDate) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET delivery_date = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(date)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Purchase Export
    // -------------------------------------------------------------------------

    /// Loads finalized purchase lines with order dates inside the given
    /// range (inclusive). Cancelled orders are excluded.
    ///
    /// The range is validated first: inverted or over-long ranges are
    /// rejected without touching the database.
    pub async fn purchase_lines(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PurchaseLine>, ReportError> {
        validate_report_range(start, end)?;

        let rows = sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT o.order_number, o.created_at AS order_date, o.delivery_date,
                   i.product_code, i.product_name, i.quantity,
                   i.unit_price_cents, i.total_price_cents,
                   i.is_consignment, i.tax_rate_bps
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE o.status <> 'cancelled'
              AND date(o.created_at) >= date(?1)
              AND date(o.created_at) <= date(?2)
            ORDER BY o.created_at, o.order_number, i.created_at, i.id
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ExportRow::into_line).collect())
    }

    /// Renders the purchase export for a date range as delimited text.
    pub async fn export_purchase_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, ReportError> {
        let lines = self.purchase_lines(start, end).await?;
        Ok(render_purchase_lines(&lines))
    }
}

// =============================================================================
// Export Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ExportRow {
    order_number: String,
    order_date: DateTime<Utc>,
    delivery_date: Option<NaiveDate>,
    product_code: String,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
    total_price_cents: i64,
    is_consignment: bool,
    tax_rate_bps: u32,
}

impl ExportRow {
    /// Line tax is derived from the frozen snapshot, so the export stays
    /// stable under later catalog changes.
    fn into_line(self) -> PurchaseLine {
        let amount = Money::from_cents(self.total_price_cents);
        let rate = TaxRate::from_bps(self.tax_rate_bps);
        let tax = amount.calculate_tax(rate);

        PurchaseLine {
            order_number: self.order_number,
            order_date: self.order_date,
            delivery_date: self.delivery_date,
            product_code: self.product_code,
            product_name: self.product_name,
            quantity: self.quantity,
            unit_price: Money::from_cents(self.unit_price_cents),
            amount,
            is_consignment: self.is_consignment,
            tax_rate: Some(rate),
            tax_amount: Some(tax),
            amount_with_tax: Some(amount + tax),
        }
    }
}

// =============================================================================
// Order Number Generation
// =============================================================================

/// Generates an order number: `{CHANNEL}-{epochMillis}-{random6}`.
///
/// The random suffix disambiguates same-millisecond checkouts; the UNIQUE
/// index on `order_number` is the final arbiter, and a collision surfaces
/// as a retryable unique violation.
fn generate_order_number(channel: Channel, now: DateTime<Utc>) -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let suffix = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) % 1_000_000;
    format!("{}-{}-{:06}", channel.code(), now.timestamp_millis(), suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::generate_order_number;
    use crate::error::CheckoutError;
    use crate::repository::testutil::{seed_customer, seed_price, seed_product, test_db};
    use crate::pool::Database;
    use storefront_core::error::CoreError;
    use storefront_core::money::Money;
    use storefront_core::pricing::VolumeTier;
    use storefront_core::{CartOwner, Channel, CheckoutRequest, OrderStatus, PaymentMethod};

    fn request(method: PaymentMethod, points: i64) -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: "1-2-3 Harbor St".to_string(),
            billing_address: None,
            payment_method: method,
            points_to_use: points,
        }
    }

    /// Product at 1000c base, 10% tax, tier 50+ → 900c, sold everywhere.
    async fn seed_standard_product(db: &Database) -> String {
        let product_id = seed_product(db, "STD-01").await;
        for channel in Channel::ALL {
            seed_price(
                db,
                &product_id,
                channel,
                1000,
                1000,
                1,
                vec![VolumeTier {
                    min_qty: 50,
                    price: Money::from_cents(900),
                }],
            )
            .await;
        }
        product_id
    }

    #[tokio::test]
    async fn test_checkout_happy_path() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let customer_id = seed_customer(&db, Channel::Retail, 0).await;
        let owner = CartOwner::Customer(customer_id.clone());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 10)
            .await
            .unwrap();

        let order = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 0))
            .await
            .unwrap();

        assert_eq!(order.subtotal_cents, 10_000);
        assert_eq!(order.tax_cents, 1_000);
        assert_eq!(order.points_earned, 100);
        assert_eq!(order.points_used, 0);
        assert_eq!(order.total_cents, 10_000);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.order_number.starts_with("RETAIL-"));

        let lines = db.orders().get_items(&order.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_code, "STD-01");
        assert_eq!(lines[0].unit_price_cents, 1000);
        assert_eq!(lines[0].total_price_cents, 10_000);
        assert_eq!(lines[0].tax_rate_bps, 1000);

        // Cart is gone, points are credited
        assert!(db
            .carts()
            .get_active(Channel::Retail, &owner)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            db.customers().points_balance(&customer_id).await.unwrap(),
            100
        );
    }

    #[tokio::test]
    async fn test_checkout_resolves_tier_on_final_quantity() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let owner = CartOwner::Session("tier-sess".to_string());

        // Two adds of 30 cross the 50-unit tier only in aggregate
        db.carts()
            .add_item(Channel::Retail, &owner, &product_id, 30)
            .await
            .unwrap();
        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 30)
            .await
            .unwrap();

        let order = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 0))
            .await
            .unwrap();

        assert_eq!(order.subtotal_cents, 54_000); // 60 × 900
        let lines = db.orders().get_items(&order.id).await.unwrap();
        assert_eq!(lines[0].unit_price_cents, 900);
    }

    #[tokio::test]
    async fn test_checkout_empty_or_unknown_cart() {
        let db = test_db().await;
        let owner = CartOwner::Session("empty-sess".to_string());

        let err = db
            .orders()
            .checkout("no-such-cart", &request(PaymentMethod::Card, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));

        let cart = db
            .carts()
            .find_or_create(Channel::Retail, &owner)
            .await
            .unwrap();
        let err = db
            .orders()
            .checkout(&cart.id, &request(PaymentMethod::Card, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_second_checkout_finds_nothing() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let owner = CartOwner::Session("twice-sess".to_string());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 1)
            .await
            .unwrap();

        db.orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 0))
            .await
            .unwrap();

        let err = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_points_spent_and_earned_in_one_movement() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let customer_id = seed_customer(&db, Channel::Retail, 5_000).await;
        let owner = CartOwner::Customer(customer_id.clone());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 10)
            .await
            .unwrap();

        let order = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 2_000))
            .await
            .unwrap();

        assert_eq!(order.points_used, 2_000);
        assert_eq!(order.points_earned, 100); // 1% of the full subtotal
        assert_eq!(order.total_cents, 8_000);

        // 5000 − 2000 + 100
        assert_eq!(
            db.customers().points_balance(&customer_id).await.unwrap(),
            3_100
        );
    }

    #[tokio::test]
    async fn test_points_request_clamped_to_subtotal() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let customer_id = seed_customer(&db, Channel::Retail, 20_000).await;
        let owner = CartOwner::Customer(customer_id.clone());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 10)
            .await
            .unwrap();

        let order = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 15_000))
            .await
            .unwrap();

        assert_eq!(order.points_used, 10_000);
        assert_eq!(order.total_cents, 0);
        assert_eq!(
            db.customers().points_balance(&customer_id).await.unwrap(),
            10_100
        );
    }

    #[tokio::test]
    async fn test_insufficient_points_rolls_back() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let customer_id = seed_customer(&db, Channel::Retail, 500).await;
        let owner = CartOwner::Customer(customer_id.clone());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 10)
            .await
            .unwrap();

        let err = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 2_000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientPoints {
                requested: 2_000,
                available: 500
            }
        ));

        // Nothing moved: cart intact, balance intact, no order rows
        let view = db
            .carts()
            .get_active(Channel::Retail, &owner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(
            db.customers().points_balance(&customer_id).await.unwrap(),
            500
        );
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_failure_after_order_insert_rolls_back() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let customer_id = seed_customer(&db, Channel::Retail, 5_000).await;
        let owner = CartOwner::Customer(customer_id.clone());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 10)
            .await
            .unwrap();

        // Fail the points movement, which runs after the order and line
        // rows are written inside the transaction
        sqlx::query(
            "CREATE TRIGGER points_outage BEFORE UPDATE ON customers \
             BEGIN SELECT RAISE(ABORT, 'points ledger unavailable'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 2_000))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Db(_)));

        sqlx::query("DROP TRIGGER points_outage")
            .execute(db.pool())
            .await
            .unwrap();

        // The half-written order rolled back with everything else
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let order_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(orders, 0);
        assert_eq!(order_items, 0);
        assert_eq!(
            db.customers().points_balance(&customer_id).await.unwrap(),
            5_000
        );
        let view = db
            .carts()
            .get_active(Channel::Retail, &owner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].quantity, 10);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_cart_read() {
        let db = test_db().await;

        // A blank shipping address fails field validation, which runs
        // ahead of the cart lookup: even a nonexistent cart reports the
        // validation error, not EmptyCart
        let mut bad = request(PaymentMethod::Card, 0);
        bad.shipping_address = "   ".to_string();

        let err = db
            .orders()
            .checkout("no-such-cart", &bad)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Domain(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_anonymous_checkout_earns_nothing_and_cannot_spend() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let owner = CartOwner::Session("anon-sess".to_string());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 10)
            .await
            .unwrap();

        let err = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Domain(_)));

        let order = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 0))
            .await
            .unwrap();
        assert_eq!(order.points_earned, 0);
        assert!(order.customer_id.is_none());
    }

    #[tokio::test]
    async fn test_wholesale_checkout_earns_no_points() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let customer_id = seed_customer(&db, Channel::Wholesale, 0).await;
        let owner = CartOwner::Customer(customer_id.clone());

        let item = db
            .carts()
            .add_item(Channel::Wholesale, &owner, &product_id, 100)
            .await
            .unwrap();

        let order = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::BankTransfer, 0))
            .await
            .unwrap();

        assert_eq!(order.points_earned, 0);
        assert_eq!(
            db.customers().points_balance(&customer_id).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_payment_method_must_match_channel() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let owner = CartOwner::Session("pay-sess".to_string());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 1)
            .await
            .unwrap();

        let err = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::BankTransfer, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Domain(CoreError::PaymentMethodNotAllowed { .. })
        ));

        // The rejected attempt left the cart alone
        assert!(db
            .carts()
            .get_active(Channel::Retail, &owner)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_deactivated_product_blocks_checkout() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let owner = CartOwner::Session("gone-sess".to_string());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 1)
            .await
            .unwrap();

        db.catalog().deactivate_product(&product_id).await.unwrap();

        let err = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ProductUnavailable { .. }));

        // Cart survives for the buyer to fix
        assert!(db
            .carts()
            .get_active(Channel::Retail, &owner)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_purchase_export_roundtrip() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let owner = CartOwner::Session("export-sess".to_string());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 10)
            .await
            .unwrap();
        let order = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 0))
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        let lines = db.orders().purchase_lines(today, today).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].order_number, order.order_number);
        assert_eq!(lines[0].amount.cents(), 10_000);
        assert_eq!(lines[0].tax_amount.unwrap().cents(), 1_000);
        assert_eq!(lines[0].amount_with_tax.unwrap().cents(), 11_000);
        assert!(lines[0].delivery_date.is_none());

        let report = db.orders().export_purchase_report(today, today).await.unwrap();
        assert!(report.starts_with('\u{feff}'));
        assert!(report.contains(&order.order_number));

        // Cancelled orders drop out of the export
        db.orders()
            .update_status(&order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(db
            .orders()
            .purchase_lines(today, today)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_export_range_validated_before_query() {
        let db = test_db().await;
        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap();

        let err = db.orders().purchase_lines(today, yesterday).await.unwrap_err();
        assert!(matches!(err, crate::error::ReportError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delivery_date_appears_in_export() {
        let db = test_db().await;
        let product_id = seed_standard_product(&db).await;
        let owner = CartOwner::Session("deliv-sess".to_string());

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 1)
            .await
            .unwrap();
        let order = db
            .orders()
            .checkout(&item.cart_id, &request(PaymentMethod::Card, 0))
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        db.orders().set_delivery_date(&order.id, today).await.unwrap();

        let lines = db.orders().purchase_lines(today, today).await.unwrap();
        assert_eq!(lines[0].delivery_date, Some(today));
    }

    #[test]
    fn test_order_number_shape() {
        let number = generate_order_number(Channel::Wholesale, Utc::now());
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "WHOLESALE");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
    }
}
