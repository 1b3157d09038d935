//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `StoreService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skillstore_core::domain::{
    FileKind, Order, OrderStatus, Product, ProductKind, User, UserCredentials,
};
use skillstore_core::ports::{PortError, PortResult, StoreService};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StoreService` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    name: Option<String>,
    billing_customer_id: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            billing_customer_id: self.billing_customer_id,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    name: Option<String>,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            name: self.name,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ProductRecord {
    id: Uuid,
    name: String,
    description: String,
    price_cents: i64,
    kind: String,
    is_active: bool,
}
impl ProductRecord {
    fn to_domain(self) -> PortResult<Product> {
        let kind = ProductKind::parse(&self.kind)
            .ok_or_else(|| PortError::Unexpected(format!("unknown product kind {}", self.kind)))?;
        Ok(Product {
            id: self.id,
            name: self.name,
            description: self.description,
            price_cents: self.price_cents,
            kind,
            is_active: self.is_active,
        })
    }
}

#[derive(FromRow)]
struct OrderRecord {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    amount_cents: i64,
    status: String,
    checkout_session_ref: Option<String>,
    payment_ref: Option<String>,
    download_count: i32,
    fulfilled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl OrderRecord {
    fn to_domain(self) -> PortResult<Order> {
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| PortError::Unexpected(format!("unknown order status {}", self.status)))?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            product_id: self.product_id,
            amount_cents: self.amount_cents,
            status,
            checkout_session_ref: self.checkout_session_ref,
            payment_ref: self.payment_ref,
            download_count: self.download_count,
            fulfilled_at: self.fulfilled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, product_id, amount_cents, status, \
     checkout_session_ref, payment_ref, download_count, fulfilled_at, created_at, updated_at";

//=========================================================================================
// `StoreService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StoreService for PgStore {
    async fn create_user_with_email(
        &self,
        email: &str,
        name: Option<&str>,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, name, hashed_password) VALUES ($1, $2, $3, $4) \
             RETURNING id, email, name, billing_customer_id",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("User {} already exists", email))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, name, billing_customer_id FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, name, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn set_billing_customer(&self, user_id: Uuid, customer_ref: &str) -> PortResult<()> {
        sqlx::query("UPDATE users SET billing_customer_id = $2 WHERE id = $1")
            .bind(user_id)
            .bind(customer_ref)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        row.map(|(user_id,)| user_id).ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_product_by_id(&self, product_id: Uuid) -> PortResult<Product> {
        let record = sqlx::query_as::<_, ProductRecord>(
            "SELECT id, name, description, price_cents, kind, is_active \
             FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))?;
        record.to_domain()
    }

    async fn create_order(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        amount_cents: i64,
    ) -> PortResult<Order> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "INSERT INTO orders (id, user_id, product_id, amount_cents, status) \
             VALUES ($1, $2, $3, $4, 'pending') RETURNING {ORDER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_id)
        .bind(amount_cents)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn set_order_checkout_session(
        &self,
        order_id: Uuid,
        session_ref: &str,
    ) -> PortResult<()> {
        sqlx::query("UPDATE orders SET checkout_session_ref = $2, updated_at = now() WHERE id = $1")
            .bind(order_id)
            .bind(session_ref)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_order_by_id(&self, order_id: Uuid) -> PortResult<Order> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))?;
        record.to_domain()
    }

    async fn get_order_by_checkout_session(&self, session_ref: &str) -> PortResult<Order> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE checkout_session_ref = $1"
        ))
        .bind(session_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Order for session {} not found", session_ref)))?;
        record.to_domain()
    }

    async fn find_completed_order(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> PortResult<Option<Order>> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id = $1 AND product_id = $2 AND status = 'completed' LIMIT 1"
        ))
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(OrderRecord::to_domain).transpose()
    }

    async fn mark_order_completed(
        &self,
        order_id: Uuid,
        payment_ref: &str,
        fulfilled_at: DateTime<Utc>,
    ) -> PortResult<()> {
        // Compare-then-write: only a pending order may complete, so a
        // concurrent duplicate event leaves the row untouched.
        sqlx::query(
            "UPDATE orders SET status = 'completed', payment_ref = $2, fulfilled_at = $3, \
             updated_at = now() WHERE id = $1 AND status = 'pending'",
        )
        .bind(order_id)
        .bind(payment_ref)
        .bind(fulfilled_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn mark_order_failed_by_checkout_session(&self, session_ref: &str) -> PortResult<()> {
        sqlx::query(
            "UPDATE orders SET status = 'failed', updated_at = now() \
             WHERE checkout_session_ref = $1 AND status = 'pending'",
        )
        .bind(session_ref)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn mark_order_failed_by_payment(&self, payment_ref: &str) -> PortResult<()> {
        sqlx::query(
            "UPDATE orders SET status = 'failed', updated_at = now() \
             WHERE payment_ref = $1 AND status = 'pending'",
        )
        .bind(payment_ref)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn increment_download_count(&self, order_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "UPDATE orders SET download_count = download_count + 1, updated_at = now() \
             WHERE id = $1",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn record_download(
        &self,
        order_id: Uuid,
        file_kind: FileKind,
        requester_ip: &str,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO download_logs (id, order_id, file_kind, requester_ip) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(file_kind.as_str())
        .bind(requester_ip)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
