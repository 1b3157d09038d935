//! services/api/src/web/mod.rs
//!
//! The HTTP surface: handlers, middleware, router assembly, and the master
//! OpenAPI definition.

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod download;
pub mod middleware;
pub mod ratelimit;
pub mod state;
pub mod webhook;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::web::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        checkout::checkout_handler,
        download::download_handler,
        webhook::stripe_webhook_handler,
        admin::resend_delivery_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            checkout::CheckoutRequest,
            checkout::CheckoutResponse,
            webhook::WebhookAck,
            admin::ResendResponse,
        )
    ),
    tags(
        (name = "Skill Store API", description = "Checkout, fulfillment, and signed-download endpoints.")
    )
)]
pub struct ApiDoc;

/// Assembles the application router. Shared by the server binary and the
/// integration tests.
pub fn api_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required). The webhook and download endpoints
    // authenticate by signature rather than by session.
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/api/download", get(download::download_handler))
        .route("/api/webhooks/stripe", post(webhook::stripe_webhook_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/checkout", post(checkout::checkout_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Administrative routes (shared-secret bearer check)
    let admin_routes = Router::new()
        .route(
            "/admin/orders/{order_id}/resend",
            post(admin::resend_delivery_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state)
}
