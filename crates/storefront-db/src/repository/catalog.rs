//! # Catalog Repository
//!
//! Database operations for products and per-channel price records.
//!
//! ## Price Record Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Price Record Lifecycle                                │
//! │                                                                         │
//! │  publish_price(product, channel, record)                               │
//! │       │                                                                 │
//! │       ├── retire current record (is_current = 0)                       │
//! │       ├── insert new record + its volume tiers                         │
//! │       └── (one transaction; at most one current per product+channel)   │
//! │                                                                         │
//! │  current_price(product, channel)                                       │
//! │       └── loads the current record and rebuilds PriceRecord,           │
//! │           re-running its invariant checks                              │
//! │                                                                         │
//! │  Carts snapshot the base price for display; checkout re-resolves       │
//! │  against the record that is current at conversion time.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use storefront_core::pricing::{PriceRecord, VolumeTier};
use storefront_core::{Channel, Money, Product, TaxRate};

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

/// A product together with its current price record on one channel.
#[derive(Debug, Clone)]
pub struct ChannelOffer {
    pub product: Product,
    pub price: PriceRecord,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// Inserts a product.
    pub async fn insert_product(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, code = %product.code, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, description, is_consignment,
                sells_dealer, sells_wholesale, sells_retail,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.is_consignment)
        .bind(product.sells_dealer)
        .bind(product.sells_wholesale)
        .bind(product.sells_retail)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by ID (regardless of active state).
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, code, name, description, is_consignment,
                   sells_dealer, sells_wholesale, sells_retail,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its business code.
    pub async fn get_product_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, code, name, description, is_consignment,
                   sells_dealer, sells_wholesale, sells_retail,
                   is_active, created_at, updated_at
            FROM products
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products offered on a channel.
    pub async fn list_for_channel(&self, channel: Channel) -> DbResult<Vec<Product>> {
        let column = match channel {
            Channel::Dealer => "sells_dealer",
            Channel::Wholesale => "sells_wholesale",
            Channel::Retail => "sells_retail",
        };

        let sql = format!(
            r#"
            SELECT id, code, name, description, is_consignment,
                   sells_dealer, sells_wholesale, sells_retail,
                   is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1 AND {column} = 1
            ORDER BY code
            "#
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Soft-deletes a product. Existing order snapshots are unaffected.
    pub async fn deactivate_product(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET is_active = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Price Records
    // -------------------------------------------------------------------------

    /// Publishes a price record as the current price for (product, channel),
    /// retiring any previous current record in the same transaction.
    ///
    /// Returns the new record's id.
    pub async fn publish_price(
        &self,
        product_id: &str,
        channel: Channel,
        record: &PriceRecord,
    ) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(
            product_id = %product_id,
            channel = %channel,
            base_cents = record.base_price().cents(),
            tiers = record.volume_tiers().len(),
            "Publishing price record"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE price_records SET is_current = 0
            WHERE product_id = ?1 AND channel = ?2 AND is_current = 1
            "#,
        )
        .bind(product_id)
        .bind(channel)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO price_records (
                id, product_id, channel,
                base_price_cents, tax_rate_bps, min_order_qty,
                is_current, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
            "#,
        )
        .bind(&id)
        .bind(product_id)
        .bind(channel)
        .bind(record.base_price().cents())
        .bind(record.tax_rate().bps())
        .bind(record.min_order_qty())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for tier in record.volume_tiers() {
            sqlx::query(
                r#"
                INSERT INTO volume_tiers (id, price_record_id, min_qty, price_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(tier.min_qty)
            .bind(tier.price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(id)
    }

    /// Gets the current price record for (product, channel), if any.
    pub async fn current_price(
        &self,
        product_id: &str,
        channel: Channel,
    ) -> DbResult<Option<PriceRecord>> {
        let mut conn = self.pool.acquire().await?;
        load_current_price(&mut conn, product_id, channel).await
    }

    /// Gets the active product plus its current price on a channel.
    ///
    /// Returns `None` when the product is missing, inactive, or has no
    /// current price record on that channel. Channel availability flags are
    /// NOT checked here; callers decide whether a flag miss is Forbidden.
    pub async fn get_offer(
        &self,
        product_id: &str,
        channel: Channel,
    ) -> DbResult<Option<ChannelOffer>> {
        let mut conn = self.pool.acquire().await?;

        let Some(product) = load_product(&mut conn, product_id).await? else {
            return Ok(None);
        };
        if !product.is_active {
            return Ok(None);
        }
        let Some(price) = load_current_price(&mut conn, product_id, channel).await? else {
            return Ok(None);
        };

        Ok(Some(ChannelOffer { product, price }))
    }
}

// =============================================================================
// Connection-Level Loaders
// =============================================================================
// These run on a caller-supplied connection so the cart and checkout
// transactions can read the catalog inside their own transaction.

/// Loads a product row on the given connection.
pub(crate) async fn load_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, code, name, description, is_consignment,
               sells_dealer, sells_wholesale, sells_retail,
               is_active, created_at, updated_at
        FROM products
        WHERE id = ?1
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

#[derive(Debug, sqlx::FromRow)]
struct PriceRow {
    id: String,
    base_price_cents: i64,
    tax_rate_bps: u32,
    min_order_qty: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct TierRow {
    min_qty: i64,
    price_cents: i64,
}

/// Loads the current price record for (product, channel) on the given
/// connection, rebuilding the validated [`PriceRecord`].
pub(crate) async fn load_current_price(
    conn: &mut SqliteConnection,
    product_id: &str,
    channel: Channel,
) -> DbResult<Option<PriceRecord>> {
    let row = sqlx::query_as::<_, PriceRow>(
        r#"
        SELECT id, base_price_cents, tax_rate_bps, min_order_qty
        FROM price_records
        WHERE product_id = ?1 AND channel = ?2 AND is_current = 1
        "#,
    )
    .bind(product_id)
    .bind(channel)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let tiers = sqlx::query_as::<_, TierRow>(
        r#"
        SELECT min_qty, price_cents
        FROM volume_tiers
        WHERE price_record_id = ?1
        ORDER BY min_qty
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    let tiers = tiers
        .into_iter()
        .map(|t| VolumeTier {
            min_qty: t.min_qty,
            price: Money::from_cents(t.price_cents),
        })
        .collect();

    // PriceRecord::new re-runs the publish-time invariants; a failure here
    // means the stored record no longer forms a valid tier ladder.
    let record = PriceRecord::new(
        Money::from_cents(row.base_price_cents),
        TaxRate::from_bps(row.tax_rate_bps),
        row.min_order_qty,
        tiers,
    )
    .map_err(|e| DbError::Corrupt(format!("price record {}: {}", row.id, e)))?;

    Ok(Some(record))
}

// =============================================================================
// Unit Tests
// =============================================================================
