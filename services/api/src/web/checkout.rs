//! services/api/src/web/checkout.rs
//!
//! The checkout-initiation endpoint: creates a pending order and returns the
//! provider's hosted checkout session for the buyer to pay in.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::orders::{self, CheckoutError};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub product_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

/// POST /api/checkout - Begin a purchase for the authenticated user
#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutResponse),
        (status = 400, description = "Missing billing identity or already purchased"),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Product not found or inactive"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // A body that cannot parse into a product id is a caller error, not an
    // unprocessable entity.
    let Json(req) = payload
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid request: {}", e)))?;

    let session = orders::begin_checkout(
        state.store.as_ref(),
        state.payments.as_ref(),
        &state.config.base_url,
        user_id,
        req.product_id,
    )
    .await
    .map_err(|e| match e {
        CheckoutError::MissingBillingIdentity => (
            StatusCode::BAD_REQUEST,
            "Billing customer not found. Please contact support.".to_string(),
        ),
        CheckoutError::ProductUnavailable => (
            StatusCode::NOT_FOUND,
            "Product not found or not available".to_string(),
        ),
        CheckoutError::AlreadyPurchased => (
            StatusCode::BAD_REQUEST,
            "You have already purchased this product".to_string(),
        ),
        CheckoutError::Port(e) => {
            error!("Checkout failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred during checkout".to_string(),
            )
        }
    })?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}
