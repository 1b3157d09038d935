//! crates/skillstore_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{FileKind, Order, Product, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait StoreService: Send + Sync {
    // --- User Management ---
    async fn create_user_with_email(
        &self,
        email: &str,
        name: Option<&str>,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    /// Attaches the payment provider's customer reference to a user.
    async fn set_billing_customer(&self, user_id: Uuid, customer_ref: &str) -> PortResult<()>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Products ---
    async fn get_product_by_id(&self, product_id: Uuid) -> PortResult<Product>;

    // --- Orders ---
    async fn create_order(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        amount_cents: i64,
    ) -> PortResult<Order>;

    async fn set_order_checkout_session(
        &self,
        order_id: Uuid,
        session_ref: &str,
    ) -> PortResult<()>;

    async fn get_order_by_id(&self, order_id: Uuid) -> PortResult<Order>;

    async fn get_order_by_checkout_session(&self, session_ref: &str) -> PortResult<Order>;

    /// Returns the user's completed order for a product, if one exists.
    /// Used as the idempotent-purchase guard at checkout.
    async fn find_completed_order(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> PortResult<Option<Order>>;

    /// Marks a pending order completed, stamping the fulfillment time and the
    /// provider's transaction reference. Must be a no-op for orders that are
    /// already terminal (compare-then-write).
    async fn mark_order_completed(
        &self,
        order_id: Uuid,
        payment_ref: &str,
        fulfilled_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Marks the pending order with this checkout-session reference failed.
    async fn mark_order_failed_by_checkout_session(&self, session_ref: &str) -> PortResult<()>;

    /// Marks the pending order with this payment reference failed.
    async fn mark_order_failed_by_payment(&self, payment_ref: &str) -> PortResult<()>;

    async fn increment_download_count(&self, order_id: Uuid) -> PortResult<()>;

    /// Appends one audit row per successful download.
    async fn record_download(
        &self,
        order_id: Uuid,
        file_kind: FileKind,
        requester_ip: &str,
    ) -> PortResult<()>;
}

/// A checkout session created at the payment provider.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Everything the provider needs to open a hosted checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub customer_ref: String,
    pub product_name: String,
    pub amount_cents: i64,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Creates a billing customer at the provider and returns its reference.
    async fn create_customer(&self, email: &str, name: Option<&str>) -> PortResult<String>;

    /// Creates a hosted checkout session for a single product purchase.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> PortResult<CheckoutSession>;
}

/// An outbound email, already rendered.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait MailerService: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> PortResult<()>;
}
