//! Shared test fixtures: in-memory implementations of the service ports and
//! helpers for building application state without a database or network.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use api_lib::config::Config;
use api_lib::web::state::AppState;
use skillstore_core::domain::{
    FileKind, Order, OrderStatus, Product, ProductKind, User, UserCredentials,
};
use skillstore_core::ports::{
    CheckoutSession, CheckoutSessionRequest, EmailMessage, MailerService, PaymentService,
    PortError, PortResult, StoreService,
};

pub const DOWNLOAD_SECRET: &str = "test-download-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const ADMIN_TOKEN: &str = "test-admin-token";

//=========================================================================================
// In-Memory Store
//=========================================================================================

struct StoredUser {
    user: User,
    hashed_password: String,
}

#[derive(Default)]
struct StoreInner {
    users: HashMap<Uuid, StoredUser>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    downloads: Vec<(Uuid, FileKind, String)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.insert_user_with_password(user, "argon2-hash-placeholder");
    }

    pub fn insert_user_with_password(&self, user: User, hashed_password: &str) {
        self.inner.lock().unwrap().users.insert(
            user.id,
            StoredUser {
                user,
                hashed_password: hashed_password.to_string(),
            },
        );
    }

    pub fn insert_auth_session(&self, session_id: &str, user_id: Uuid, expires_at: DateTime<Utc>) {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
    }

    pub fn insert_product(&self, product: Product) {
        self.inner
            .lock()
            .unwrap()
            .products
            .insert(product.id, product);
    }

    pub fn insert_order(&self, order: Order) {
        self.inner.lock().unwrap().orders.insert(order.id, order);
    }

    pub fn order(&self, order_id: Uuid) -> Order {
        self.inner.lock().unwrap().orders[&order_id].clone()
    }

    pub fn order_count(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }

    pub fn download_log(&self) -> Vec<(Uuid, FileKind, String)> {
        self.inner.lock().unwrap().downloads.clone()
    }
}

#[async_trait]
impl StoreService for MemoryStore {
    async fn create_user_with_email(
        &self,
        email: &str,
        name: Option<&str>,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.values().any(|u| u.user.email == email) {
            return Err(PortError::Conflict(format!("User {} already exists", email)));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.map(str::to_string),
            billing_customer_id: None,
        };
        inner.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.inner
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.user.email == email)
            .map(|u| UserCredentials {
                user_id: u.user.id,
                email: u.user.email.clone(),
                name: u.user.name.clone(),
                hashed_password: u.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn set_billing_customer(&self, user_id: Uuid, customer_ref: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        stored.user.billing_customer_id = Some(customer_ref.to_string());
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .get(session_id)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(user_id, _)| *user_id)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.inner.lock().unwrap().sessions.remove(session_id);
        Ok(())
    }

    async fn get_product_by_id(&self, product_id: Uuid) -> PortResult<Product> {
        self.inner
            .lock()
            .unwrap()
            .products
            .get(&product_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn create_order(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        amount_cents: i64,
    ) -> PortResult<Order> {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            amount_cents,
            status: OrderStatus::Pending,
            checkout_session_ref: None,
            payment_ref: None,
            download_count: 0,
            fulfilled_at: None,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .unwrap()
            .orders
            .insert(order.id, order.clone());
        Ok(order)
    }

    async fn set_order_checkout_session(
        &self,
        order_id: Uuid,
        session_ref: &str,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))?;
        order.checkout_session_ref = Some(session_ref.to_string());
        Ok(())
    }

    async fn get_order_by_id(&self, order_id: Uuid) -> PortResult<Order> {
        self.inner
            .lock()
            .unwrap()
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn get_order_by_checkout_session(&self, session_ref: &str) -> PortResult<Order> {
        self.inner
            .lock()
            .unwrap()
            .orders
            .values()
            .find(|o| o.checkout_session_ref.as_deref() == Some(session_ref))
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!("Order for session {} not found", session_ref))
            })
    }

    async fn find_completed_order(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> PortResult<Option<Order>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .orders
            .values()
            .find(|o| {
                o.user_id == user_id
                    && o.product_id == product_id
                    && o.status == OrderStatus::Completed
            })
            .cloned())
    }

    async fn mark_order_completed(
        &self,
        order_id: Uuid,
        payment_ref: &str,
        fulfilled_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))?;
        // Compare-then-write, mirroring the SQL `WHERE status = 'pending'`.
        if order.status == OrderStatus::Pending {
            order.status = OrderStatus::Completed;
            order.payment_ref = Some(payment_ref.to_string());
            order.fulfilled_at = Some(fulfilled_at);
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_order_failed_by_checkout_session(&self, session_ref: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for order in inner.orders.values_mut() {
            if order.checkout_session_ref.as_deref() == Some(session_ref)
                && order.status == OrderStatus::Pending
            {
                order.status = OrderStatus::Failed;
                order.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn mark_order_failed_by_payment(&self, payment_ref: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for order in inner.orders.values_mut() {
            if order.payment_ref.as_deref() == Some(payment_ref)
                && order.status == OrderStatus::Pending
            {
                order.status = OrderStatus::Failed;
                order.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn increment_download_count(&self, order_id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))?;
        order.download_count += 1;
        Ok(())
    }

    async fn record_download(
        &self,
        order_id: Uuid,
        file_kind: FileKind,
        requester_ip: &str,
    ) -> PortResult<()> {
        self.inner
            .lock()
            .unwrap()
            .downloads
            .push((order_id, file_kind, requester_ip.to_string()));
        Ok(())
    }
}

//=========================================================================================
// Recording Mailer and Fake Payments
//=========================================================================================

pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
    fail_all: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_all: false,
        }
    }

    /// A mailer whose every send fails, for exercising best-effort paths.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_all: true,
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }
}

#[async_trait]
impl MailerService for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> PortResult<()> {
        if self.fail_all {
            return Err(PortError::Unexpected("mailer down".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct FakePayments {
    counter: AtomicUsize,
}

impl FakePayments {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PaymentService for FakePayments {
    async fn create_customer(&self, _email: &str, _name: Option<&str>) -> PortResult<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("cus_test_{}", n))
    }

    async fn create_checkout_session(
        &self,
        _request: &CheckoutSessionRequest,
    ) -> PortResult<CheckoutSession> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(CheckoutSession {
            id: format!("cs_test_{}", n),
            url: format!("https://checkout.example.com/pay/cs_test_{}", n),
        })
    }
}

//=========================================================================================
// Fixture Builders
//=========================================================================================

pub fn test_config(storage_root: PathBuf) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        base_url: "https://shop.example.com".to_string(),
        download_secret: DOWNLOAD_SECRET.to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        stripe_secret_key: "sk_test_unused".to_string(),
        resend_api_key: None,
        email_from: "noreply@example.com".to_string(),
        storage_root,
        admin_token: Some(ADMIN_TOKEN.to_string()),
        download_rate_window_secs: 60,
        download_rate_max: 5,
        download_link_ttl_days: 7,
    }
}

pub fn test_state(store: Arc<MemoryStore>, mailer: Arc<RecordingMailer>) -> Arc<AppState> {
    test_state_with_config(store, mailer, test_config(temp_storage_root()))
}

pub fn test_state_with_config(
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
    config: Config,
) -> Arc<AppState> {
    Arc::new(AppState::new(
        store,
        Arc::new(FakePayments::new()),
        mailer,
        Arc::new(config),
    ))
}

/// A unique, not-yet-created directory under the system temp dir.
pub fn temp_storage_root() -> PathBuf {
    std::env::temp_dir().join(format!("skillstore-test-{}", Uuid::new_v4()))
}

pub fn sample_user() -> User {
    User {
        id: Uuid::new_v4(),
        email: "buyer@example.com".to_string(),
        name: Some("Sam Buyer".to_string()),
        billing_customer_id: Some("cus_existing".to_string()),
    }
}

pub fn sample_product() -> Product {
    Product {
        id: Uuid::new_v4(),
        name: "Script Analysis Pro".to_string(),
        description: "Comprehensive script breakdown and analysis.".to_string(),
        price_cents: 29999,
        kind: ProductKind::Skill,
        is_active: true,
    }
}

pub fn pending_order(user: &User, product: &Product, session_ref: &str) -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        user_id: user.id,
        product_id: product.id,
        amount_cents: product.price_cents,
        status: OrderStatus::Pending,
        checkout_session_ref: Some(session_ref.to_string()),
        payment_ref: None,
        download_count: 0,
        fulfilled_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn completed_order(user: &User, product: &Product, session_ref: &str) -> Order {
    let mut order = pending_order(user, product, session_ref);
    order.status = OrderStatus::Completed;
    order.payment_ref = Some("pi_test_1".to_string());
    order.fulfilled_at = Some(Utc::now());
    order
}
