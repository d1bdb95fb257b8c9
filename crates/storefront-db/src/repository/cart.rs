//! # Cart Repository
//!
//! Cart lifecycle and item management.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cart Lifecycle                                    │
//! │                                                                         │
//! │  1. FIRST ADD                                                          │
//! │     └── add_item() finds or lazily creates the (channel, owner) cart   │
//! │                                                                         │
//! │  2. REPEATED ADDS                                                      │
//! │     └── upsert-with-increment on (cart_id, product_id):                │
//! │         concurrent adds of the same product serialize in SQLite        │
//! │         and both increments land (idempotent row, summed quantity)     │
//! │                                                                         │
//! │  3. EXPIRY (lazy)                                                      │
//! │     └── reads ignore carts past expires_at; the next add creates a     │
//! │         fresh cart, never resurrects the old one                       │
//! │                                                                         │
//! │  4. END OF LIFE                                                        │
//! │     └── remove() by the owner, purge_expired() sweep, or deletion by   │
//! │         the checkout transaction (see the order repository)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `unit_price_cents` stored per line is a display snapshot taken on the
//! line's first add. Checkout ignores it and re-resolves against the current
//! price record.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CartError, DbError, DbResult};
use crate::repository::catalog;
use storefront_core::error::{CoreError, ValidationError};
use storefront_core::money::Money;
use storefront_core::validation::validate_quantity;
use storefront_core::{Cart, CartItem, CartOwner, Channel, MAX_ITEM_QUANTITY};

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

/// A cart together with its lines, as shown to the storefront.
#[derive(Debug, Clone)]
pub struct CartWithItems {
    pub cart: Cart,
    pub items: Vec<CartItem>,
}

impl CartWithItems {
    /// Display subtotal from the add-time price snapshots. Not what the
    /// buyer is charged: checkout re-resolves tiers against final
    /// quantities.
    pub fn display_subtotal(&self) -> Money {
        self.items
            .iter()
            .map(|i| i.unit_price().multiply_quantity(i.quantity))
            .fold(Money::zero(), |acc, m| acc + m)
    }
}

const CART_COLUMNS: &str = "id, channel, customer_id, session_id, created_at, expires_at";

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Finds the active cart for (channel, owner), creating one if none
    /// exists. Expired carts are ignored, never resurrected.
    pub async fn find_or_create(&self, channel: Channel, owner: &CartOwner) -> DbResult<Cart> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let cart = match find_active(&mut tx, channel, owner, now).await? {
            Some(cart) => cart,
            None => create_cart(&mut tx, channel, owner, now).await?,
        };

        tx.commit().await?;
        Ok(cart)
    }

    /// Adds `quantity` of a product to the owner's active cart.
    ///
    /// ## What This Does (one transaction)
    /// 1. Validates the quantity
    /// 2. Loads the product and its current price record for the channel,
    ///    rejecting unknown/inactive products, channel-forbidden products,
    ///    and additions below the channel minimum order quantity
    /// 3. Finds or lazily creates the (channel, owner) cart
    /// 4. Upserts the line: `ON CONFLICT ... quantity = quantity + excluded`
    ///
    /// Returns the resulting line (with the summed quantity on repeat adds).
    pub async fn add_item(
        &self,
        channel: Channel,
        owner: &CartOwner,
        product_id: &str,
        quantity: i64,
    ) -> Result<CartItem, CartError> {
        validate_quantity(quantity)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let product = catalog::load_product(&mut tx, product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        if !product.allows(channel) {
            return Err(CoreError::ChannelForbidden {
                product_id: product_id.to_string(),
                channel,
            }
            .into());
        }

        // A product without a current price record is not offered on this
        // channel, whatever its availability flags say.
        let record = catalog::load_current_price(&mut tx, product_id, channel)
            .await?
            .ok_or_else(|| CoreError::ChannelForbidden {
                product_id: product_id.to_string(),
                channel,
            })?;

        // Minimum order quantity applies to each addition.
        if quantity < record.min_order_qty() {
            return Err(CoreError::BelowMinimumOrder {
                product_id: product_id.to_string(),
                min_order_qty: record.min_order_qty(),
                requested: quantity,
            }
            .into());
        }

        let cart = match find_active(&mut tx, channel, owner, now).await? {
            Some(cart) => cart,
            None => create_cart(&mut tx, channel, owner, now).await?,
        };

        debug!(
            cart_id = %cart.id,
            product_id = %product_id,
            quantity,
            "Upserting cart item"
        );

        // Atomic increment at the storage layer: two concurrent adds of the
        // same product both land, summed, on a single row.
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, unit_price_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = quantity + excluded.quantity
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&cart.id)
        .bind(product_id)
        .bind(quantity)
        .bind(record.base_price().cents())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let item = fetch_item(&mut tx, &cart.id, product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart item", product_id))?;

        if item.quantity > MAX_ITEM_QUANTITY {
            // Dropping the transaction rolls the increment back.
            return Err(CartError::Domain(
                ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: 1,
                    max: MAX_ITEM_QUANTITY,
                }
                .into(),
            ));
        }

        tx.commit().await?;
        Ok(item)
    }

    /// Sets a line's quantity directly. Zero removes the line (idempotent).
    ///
    /// Returns the updated line, or `None` when the line was removed.
    pub async fn update_item_quantity(
        &self,
        channel: Channel,
        owner: &CartOwner,
        product_id: &str,
        quantity: i64,
    ) -> Result<Option<CartItem>, CartError> {
        if quantity < 0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "quantity".to_string(),
            }
            .into());
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 0,
                max: MAX_ITEM_QUANTITY,
            }
            .into());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let cart = find_active(&mut tx, channel, owner, now)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", "active"))?;

        if quantity == 0 {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1 AND product_id = ?2")
                .bind(&cart.id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(None);
        }

        // The new quantity must still satisfy the channel minimum.
        let record = catalog::load_current_price(&mut tx, product_id, channel)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        if quantity < record.min_order_qty() {
            return Err(CoreError::BelowMinimumOrder {
                product_id: product_id.to_string(),
                min_order_qty: record.min_order_qty(),
                requested: quantity,
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE cart_items SET quantity = ?3 WHERE cart_id = ?1 AND product_id = ?2",
        )
        .bind(&cart.id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart item", product_id).into());
        }

        let item = fetch_item(&mut tx, &cart.id, product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart item", product_id))?;

        tx.commit().await?;
        Ok(Some(item))
    }

    /// Gets the active cart with its lines, or `None` when the owner has no
    /// live cart on the channel.
    pub async fn get_active(
        &self,
        channel: Channel,
        owner: &CartOwner,
    ) -> DbResult<Option<CartWithItems>> {
        let now = Utc::now();
        let mut conn = self.pool.acquire().await?;

        let Some(cart) = find_active(&mut conn, channel, owner, now).await? else {
            return Ok(None);
        };
        let items = fetch_items(&mut conn, &cart.id).await?;

        Ok(Some(CartWithItems { cart, items }))
    }

    /// Gets the lines of a cart by id.
    pub async fn get_items(&self, cart_id: &str) -> DbResult<Vec<CartItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_items(&mut conn, cart_id).await
    }

    /// Deletes the owner's carts on the channel, lines included. Idempotent:
    /// removing a missing cart is not an error.
    pub async fn remove(&self, channel: Channel, owner: &CartOwner) -> DbResult<()> {
        let result = match owner {
            CartOwner::Customer(id) => {
                sqlx::query("DELETE FROM carts WHERE channel = ?1 AND customer_id = ?2")
                    .bind(channel)
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
            CartOwner::Session(id) => {
                sqlx::query("DELETE FROM carts WHERE channel = ?1 AND session_id = ?2")
                    .bind(channel)
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
        };

        debug!(
            channel = %channel,
            removed = result.rows_affected(),
            "Removed carts"
        );
        Ok(())
    }

    /// Sweeps expired carts. Reads already ignore them (lazy expiry); this
    /// reclaims the rows.
    pub async fn purge_expired(&self) -> DbResult<u64> {
        let now = Utc::now();

        let result = sqlx::query("DELETE FROM carts WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            debug!(purged, "Purged expired carts");
        }
        Ok(purged)
    }
}

// =============================================================================
// Connection-Level Helpers
// =============================================================================

/// Finds the owner's newest unexpired cart on the channel.
async fn find_active(
    conn: &mut SqliteConnection,
    channel: Channel,
    owner: &CartOwner,
    now: DateTime<Utc>,
) -> DbResult<Option<Cart>> {
    let cart = match owner {
        CartOwner::Customer(id) => {
            let sql = format!(
                "SELECT {CART_COLUMNS} FROM carts \
                 WHERE channel = ?1 AND customer_id = ?2 AND expires_at > ?3 \
                 ORDER BY created_at DESC LIMIT 1"
            );
            sqlx::query_as::<_, Cart>(&sql)
                .bind(channel)
                .bind(id)
                .bind(now)
                .fetch_optional(&mut *conn)
                .await?
        }
        CartOwner::Session(id) => {
            let sql = format!(
                "SELECT {CART_COLUMNS} FROM carts \
                 WHERE channel = ?1 AND session_id = ?2 AND expires_at > ?3 \
                 ORDER BY created_at DESC LIMIT 1"
            );
            sqlx::query_as::<_, Cart>(&sql)
                .bind(channel)
                .bind(id)
                .bind(now)
                .fetch_optional(&mut *conn)
                .await?
        }
    };

    Ok(cart)
}

/// Inserts a fresh cart for (channel, owner).
async fn create_cart(
    conn: &mut SqliteConnection,
    channel: Channel,
    owner: &CartOwner,
    now: DateTime<Utc>,
) -> DbResult<Cart> {
    let cart = Cart {
        id: Uuid::new_v4().to_string(),
        channel,
        customer_id: owner.customer_id().map(str::to_string),
        session_id: owner.session_id().map(str::to_string),
        created_at: now,
        expires_at: Cart::expiry_from(now),
    };

    debug!(cart_id = %cart.id, channel = %channel, "Creating cart");

    sqlx::query(
        r#"
        INSERT INTO carts (id, channel, customer_id, session_id, created_at, expires_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&cart.id)
    .bind(cart.channel)
    .bind(&cart.customer_id)
    .bind(&cart.session_id)
    .bind(cart.created_at)
    .bind(cart.expires_at)
    .execute(&mut *conn)
    .await?;

    Ok(cart)
}

async fn fetch_item(
    conn: &mut SqliteConnection,
    cart_id: &str,
    product_id: &str,
) -> DbResult<Option<CartItem>> {
    let item = sqlx::query_as::<_, CartItem>(
        r#"
        SELECT id, cart_id, product_id, quantity, unit_price_cents, created_at
        FROM cart_items
        WHERE cart_id = ?1 AND product_id = ?2
        "#,
    )
    .bind(cart_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(item)
}

pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    cart_id: &str,
) -> DbResult<Vec<CartItem>> {
    let items = sqlx::query_as::<_, CartItem>(
        r#"
        SELECT id, cart_id, product_id, quantity, unit_price_cents, created_at
        FROM cart_items
        WHERE cart_id = ?1
        ORDER BY created_at, id
        "#,
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::error::{CartError, DbError};
    use crate::repository::testutil::{seed_price, seed_product, test_db};
    use storefront_core::error::CoreError;
    use storefront_core::{CartOwner, Channel};

    fn session_owner(tag: &str) -> CartOwner {
        CartOwner::Session(format!("sess-{tag}"))
    }

    #[tokio::test]
    async fn test_add_creates_cart_and_line() {
        let db = test_db().await;
        let product_id = seed_product(&db, "ADD-01").await;
        seed_price(&db, &product_id, Channel::Retail, 1000, 1000, 1, vec![]).await;
        let owner = session_owner("a");

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 3)
            .await
            .unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.unit_price_cents, 1000);

        let view = db
            .carts()
            .get_active(Channel::Retail, &owner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.display_subtotal().cents(), 3000);
    }

    #[tokio::test]
    async fn test_repeat_add_increments_single_row() {
        let db = test_db().await;
        let product_id = seed_product(&db, "ADD-02").await;
        seed_price(&db, &product_id, Channel::Retail, 1000, 0, 1, vec![]).await;
        let owner = session_owner("b");

        db.carts()
            .add_item(Channel::Retail, &owner, &product_id, 2)
            .await
            .unwrap();

        // Price changes between adds must not disturb the line snapshot.
        seed_price(&db, &product_id, Channel::Retail, 1500, 0, 1, vec![]).await;

        let item = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 5)
            .await
            .unwrap();

        assert_eq!(item.quantity, 7);
        assert_eq!(item.unit_price_cents, 1000);

        let view = db
            .carts()
            .get_active(Channel::Retail, &owner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.items.len(), 1);
    }

    #[tokio::test]
    async fn test_minimum_order_quantity_per_addition() {
        let db = test_db().await;
        let product_id = seed_product(&db, "MIN-01").await;
        seed_price(&db, &product_id, Channel::Wholesale, 1000, 0, 10, vec![]).await;
        let owner = session_owner("c");

        let err = db
            .carts()
            .add_item(Channel::Wholesale, &owner, &product_id, 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CartError::Domain(CoreError::BelowMinimumOrder { min_order_qty: 10, .. })
        ));

        // Nothing was created by the rejected add
        assert!(db
            .carts()
            .get_active(Channel::Wholesale, &owner)
            .await
            .unwrap()
            .is_none());

        db.carts()
            .add_item(Channel::Wholesale, &owner, &product_id, 10)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_channel_forbidden_product() {
        use chrono::Utc;
        use storefront_core::Product;
        use uuid::Uuid;

        let db = test_db().await;
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            code: "DEALER-ONLY".to_string(),
            name: "Dealer special".to_string(),
            description: None,
            is_consignment: false,
            sells_dealer: true,
            sells_wholesale: false,
            sells_retail: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.catalog().insert_product(&product).await.unwrap();
        seed_price(&db, &product.id, Channel::Dealer, 1000, 0, 1, vec![]).await;

        let err = db
            .carts()
            .add_item(Channel::Retail, &session_owner("d"), &product.id, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CartError::Domain(CoreError::ChannelForbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_product_not_found() {
        let db = test_db().await;
        let err = db
            .carts()
            .add_item(Channel::Retail, &session_owner("e"), "no-such-id", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CartError::Domain(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_carts_are_scoped_per_channel() {
        let db = test_db().await;
        let product_id = seed_product(&db, "SCOPE-01").await;
        seed_price(&db, &product_id, Channel::Retail, 1000, 0, 1, vec![]).await;
        seed_price(&db, &product_id, Channel::Dealer, 800, 0, 1, vec![]).await;
        let owner = session_owner("f");

        let retail = db
            .carts()
            .add_item(Channel::Retail, &owner, &product_id, 1)
            .await
            .unwrap();
        let dealer = db
            .carts()
            .add_item(Channel::Dealer, &owner, &product_id, 1)
            .await
            .unwrap();

        assert_ne!(retail.cart_id, dealer.cart_id);
        assert_eq!(dealer.unit_price_cents, 800);
    }

    #[tokio::test]
    async fn test_expired_cart_is_superseded() {
        let db = test_db().await;
        let owner = session_owner("g");

        let old = db
            .carts()
            .find_or_create(Channel::Retail, &owner)
            .await
            .unwrap();

        // Backdate the expiry past the cutoff
        sqlx::query("UPDATE carts SET expires_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::days(1))
            .bind(&old.id)
            .execute(db.pool())
            .await
            .unwrap();

        assert!(db
            .carts()
            .get_active(Channel::Retail, &owner)
            .await
            .unwrap()
            .is_none());

        let fresh = db
            .carts()
            .find_or_create(Channel::Retail, &owner)
            .await
            .unwrap();
        assert_ne!(fresh.id, old.id);

        assert_eq!(db.carts().purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_quantity_zero_removes_line() {
        let db = test_db().await;
        let product_id = seed_product(&db, "UPD-01").await;
        seed_price(&db, &product_id, Channel::Retail, 1000, 0, 1, vec![]).await;
        let owner = session_owner("h");

        db.carts()
            .add_item(Channel::Retail, &owner, &product_id, 4)
            .await
            .unwrap();

        let updated = db
            .carts()
            .update_item_quantity(Channel::Retail, &owner, &product_id, 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.quantity, 2);

        let removed = db
            .carts()
            .update_item_quantity(Channel::Retail, &owner, &product_id, 0)
            .await
            .unwrap();
        assert!(removed.is_none());

        let view = db
            .carts()
            .get_active(Channel::Retail, &owner)
            .await
            .unwrap()
            .unwrap();
        assert!(view.items.is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let db = test_db().await;
        let owner = session_owner("i");

        // Removing a cart that never existed is fine
        db.carts().remove(Channel::Retail, &owner).await.unwrap();

        db.carts()
            .find_or_create(Channel::Retail, &owner)
            .await
            .unwrap();
        db.carts().remove(Channel::Retail, &owner).await.unwrap();
        db.carts().remove(Channel::Retail, &owner).await.unwrap();

        assert!(db
            .carts()
            .get_active(Channel::Retail, &owner)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_quantity_without_cart_fails() {
        let db = test_db().await;
        let err = db
            .carts()
            .update_item_quantity(Channel::Retail, &session_owner("j"), "anything", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Db(DbError::NotFound { .. })));
    }
}
