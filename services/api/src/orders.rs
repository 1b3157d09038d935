//! services/api/src/orders.rs
//!
//! The order lifecycle: checkout initiation, webhook-driven completion and
//! failure, and the notification trigger that delivers signed download links.
//!
//! Orders move `pending` -> `completed` or `pending` -> `failed` and never
//! leave a terminal state. All transitions are compare-then-write against the
//! store; there is no application-level locking.

use chrono::{Duration, Utc};
use skillstore_core::domain::{FileKind, Order, Product, User};
use skillstore_core::ports::{
    CheckoutSession, CheckoutSessionRequest, EmailMessage, MailerService, PaymentService,
    PortError, PortResult, StoreService,
};
use skillstore_core::token::{self, DownloadToken};
use tracing::{error, info, warn};
use uuid::Uuid;

/// The settings the notification trigger needs to mint download links.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub base_url: String,
    pub download_secret: String,
    pub link_ttl_days: i64,
}

impl DeliveryConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            download_secret: config.download_secret.clone(),
            link_ttl_days: config.download_link_ttl_days,
        }
    }
}

//=========================================================================================
// Checkout Initiation
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("billing customer not found for user")]
    MissingBillingIdentity,
    #[error("product not found or not available")]
    ProductUnavailable,
    #[error("product already purchased")]
    AlreadyPurchased,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Creates a pending order and a provider checkout session for it.
///
/// Requires the user to carry a billing-customer reference, the product to be
/// active, and no prior completed order for the same (user, product) pair.
/// The order snapshots the current product price.
pub async fn begin_checkout(
    store: &dyn StoreService,
    payments: &dyn PaymentService,
    base_url: &str,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<CheckoutSession, CheckoutError> {
    let user = store.get_user_by_id(user_id).await?;
    let customer_ref = user
        .billing_customer_id
        .ok_or(CheckoutError::MissingBillingIdentity)?;

    let product = match store.get_product_by_id(product_id).await {
        Ok(product) if product.is_active => product,
        Ok(_) | Err(PortError::NotFound(_)) => return Err(CheckoutError::ProductUnavailable),
        Err(e) => return Err(e.into()),
    };

    if store
        .find_completed_order(user_id, product_id)
        .await?
        .is_some()
    {
        return Err(CheckoutError::AlreadyPurchased);
    }

    let order = store
        .create_order(user_id, product_id, product.price_cents)
        .await?;

    let session = payments
        .create_checkout_session(&CheckoutSessionRequest {
            customer_ref,
            product_name: product.name.clone(),
            amount_cents: order.amount_cents,
            user_id,
            product_id,
            success_url: format!(
                "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
                base_url
            ),
            cancel_url: format!("{}/checkout/cancel", base_url),
        })
        .await?;

    store
        .set_order_checkout_session(order.id, &session.id)
        .await?;

    info!(order_id = %order.id, session = %session.id, "checkout session created");
    Ok(session)
}

//=========================================================================================
// Webhook-Driven Completion
//=========================================================================================

/// What a completion attempt actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The order transitioned to completed and emails were attempted.
    Completed,
    /// The order was already terminal; nothing was changed and no email
    /// was re-sent.
    AlreadyTerminal,
    /// No order carries this checkout-session reference. Acknowledged so the
    /// provider does not retry an event this system cannot map.
    Unmatched,
}

/// Handles a confirmed payment for a checkout session.
///
/// Idempotent with respect to duplicate delivery of the same event: the
/// current status is checked before mutating, and an already-terminal order
/// is a no-op that sends nothing.
pub async fn complete_checkout_session(
    store: &dyn StoreService,
    mailer: &dyn MailerService,
    delivery: &DeliveryConfig,
    session_ref: &str,
    payment_ref: Option<&str>,
) -> PortResult<CompletionOutcome> {
    let order = match store.get_order_by_checkout_session(session_ref).await {
        Ok(order) => order,
        Err(PortError::NotFound(_)) => {
            warn!(session = session_ref, "no order for checkout session");
            return Ok(CompletionOutcome::Unmatched);
        }
        Err(e) => return Err(e),
    };

    if order.status.is_terminal() {
        info!(order_id = %order.id, status = order.status.as_str(), "duplicate completion event ignored");
        return Ok(CompletionOutcome::AlreadyTerminal);
    }

    store
        .mark_order_completed(order.id, payment_ref.unwrap_or_default(), Utc::now())
        .await?;
    info!(order_id = %order.id, "order completed");

    // Emails are a notification side effect, not a correctness gate: any
    // failure from here on is logged and swallowed.
    let (user, product) = match load_recipient(store, &order).await {
        Ok(pair) => pair,
        Err(e) => {
            error!(order_id = %order.id, error = %e, "could not load recipient for emails");
            return Ok(CompletionOutcome::Completed);
        }
    };

    if let Err(e) = mailer
        .send(&purchase_confirmation_email(&user, &product, &order))
        .await
    {
        error!(order_id = %order.id, error = %e, "failed to send purchase confirmation email");
    }

    if let Err(e) = mailer
        .send(&delivery_email(delivery, &user, &product, &order))
        .await
    {
        error!(order_id = %order.id, error = %e, "failed to send delivery email");
    }

    Ok(CompletionOutcome::Completed)
}

async fn load_recipient(store: &dyn StoreService, order: &Order) -> PortResult<(User, Product)> {
    let user = store.get_user_by_id(order.user_id).await?;
    let product = store.get_product_by_id(order.product_id).await?;
    Ok((user, product))
}

//=========================================================================================
// Administrative Re-Delivery
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum ResendError {
    #[error("order not found")]
    NotFound,
    #[error("order is not completed")]
    NotCompleted,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Re-mints download tokens and re-sends the delivery email for an order that
/// is already completed. Unlike the webhook path, a send failure here is
/// surfaced to the (administrative) caller.
pub async fn resend_delivery(
    store: &dyn StoreService,
    mailer: &dyn MailerService,
    delivery: &DeliveryConfig,
    order_id: Uuid,
) -> Result<(), ResendError> {
    let order = match store.get_order_by_id(order_id).await {
        Ok(order) => order,
        Err(PortError::NotFound(_)) => return Err(ResendError::NotFound),
        Err(e) => return Err(e.into()),
    };

    if !matches!(order.status, skillstore_core::domain::OrderStatus::Completed) {
        return Err(ResendError::NotCompleted);
    }

    let (user, product) = load_recipient(store, &order).await?;
    mailer
        .send(&delivery_email(delivery, &user, &product, &order))
        .await?;
    info!(order_id = %order.id, "delivery email re-sent");
    Ok(())
}

//=========================================================================================
// Notification Rendering
//=========================================================================================

/// Mints one signed download link per file kind, all sharing an expiry of
/// `link_ttl_days` from now.
pub fn delivery_links(
    delivery: &DeliveryConfig,
    order_id: Uuid,
    product_id: Uuid,
) -> Vec<(FileKind, String)> {
    let expires_at = Utc::now() + Duration::days(delivery.link_ttl_days);
    FileKind::ALL
        .iter()
        .map(|kind| {
            let token = DownloadToken::new(order_id, product_id, *kind, expires_at);
            let encoded = token::encode(&token, delivery.download_secret.as_bytes());
            (
                *kind,
                format!("{}/api/download?token={}", delivery.base_url, encoded),
            )
        })
        .collect()
}

fn greeting(user: &User) -> &str {
    user.name.as_deref().unwrap_or("there")
}

fn format_amount(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, (cents % 100).abs())
}

fn purchase_confirmation_email(user: &User, product: &Product, order: &Order) -> EmailMessage {
    let html = format!(
        "<p>Hi {},</p>\
         <p>Thanks for your purchase! We received your payment of {} for <strong>{}</strong>.</p>\
         <p>Your order reference is <code>{}</code>. A second email with your download links is on its way.</p>",
        greeting(user),
        format_amount(order.amount_cents),
        product.name,
        order.id,
    );
    EmailMessage {
        to: user.email.clone(),
        subject: format!("Order Confirmation - {}", product.name),
        html,
    }
}

fn delivery_email(
    delivery: &DeliveryConfig,
    user: &User,
    product: &Product,
    order: &Order,
) -> EmailMessage {
    let links = delivery_links(delivery, order.id, order.product_id);
    let link_list: String = links
        .iter()
        .map(|(kind, url)| {
            format!(
                "<li><a href=\"{}\">{}</a></li>",
                url,
                link_label(*kind, &product.name)
            )
        })
        .collect();
    let html = format!(
        "<p>Hi {},</p>\
         <p>Your <strong>{}</strong> is ready. Download everything below:</p>\
         <ul>{}</ul>\
         <p>These links expire in {} days. Order reference: <code>{}</code>.</p>",
        greeting(user),
        product.name,
        link_list,
        delivery.link_ttl_days,
        order.id,
    );
    EmailMessage {
        to: user.email.clone(),
        subject: format!("Your {} is Ready for Download!", product.name),
        html,
    }
}

fn link_label(kind: FileKind, product_name: &str) -> String {
    match kind {
        FileKind::Skill => format!("{} (skill package)", product_name),
        FileKind::Documentation => "Documentation (PDF)".to_string(),
        FileKind::Prompt => "Prompt text".to_string(),
    }
}
