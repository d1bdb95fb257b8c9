//! # Customer Repository
//!
//! Accounts and the loyalty points balance.
//!
//! ## Points Balance Discipline
//! The balance column is never read-modify-written in application code.
//! All movements go through [`CustomerRepository::add_points`] (or the
//! checkout transaction's equivalent statement), an atomic relative
//! increment guarded against overdraft at the storage layer.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::Customer;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a customer.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, channel, name, email, points, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&customer.id)
        .bind(customer.channel)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(customer.points)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, channel, name, email, points, created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Gets a customer's points balance.
    pub async fn points_balance(&self, id: &str) -> DbResult<i64> {
        let points: Option<i64> = sqlx::query_scalar("SELECT points FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        points.ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Applies a relative points movement and returns the new balance.
    ///
    /// The guard `points + delta >= 0` makes a debit beyond the balance a
    /// no-op, reported as a failed query rather than a silent clamp.
    pub async fn add_points(&self, id: &str, delta: i64) -> DbResult<i64> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET points = points + ?2, updated_at = ?3
            WHERE id = ?1 AND points + ?2 >= 0
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing customer from an overdraft
            return match self.get_by_id(id).await? {
                Some(customer) => Err(DbError::QueryFailed(format!(
                    "points movement of {} would overdraw balance {}",
                    delta, customer.points
                ))),
                None => Err(DbError::not_found("Customer", id)),
            };
        }

        self.points_balance(id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::repository::testutil::{seed_customer, test_db};
    use storefront_core::Channel;

    #[tokio::test]
    async fn test_points_accumulate() {
        let db = test_db().await;
        let id = seed_customer(&db, Channel::Retail, 0).await;

        assert_eq!(db.customers().add_points(&id, 100).await.unwrap(), 100);
        assert_eq!(db.customers().add_points(&id, 50).await.unwrap(), 150);
        assert_eq!(db.customers().add_points(&id, -150).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overdraft_rejected_and_balance_unchanged() {
        let db = test_db().await;
        let id = seed_customer(&db, Channel::Retail, 30).await;

        let err = db.customers().add_points(&id, -31).await.unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));

        assert_eq!(db.customers().points_balance(&id).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_missing_customer_not_found() {
        let db = test_db().await;
        let err = db.customers().add_points("ghost", 10).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
