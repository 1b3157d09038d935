//! services/api/src/web/admin.rs
//!
//! Administrative endpoints, guarded by the shared-secret bearer check in
//! `middleware::require_admin`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::orders::{self, DeliveryConfig, ResendError};
use crate::web::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct ResendResponse {
    pub order_id: Uuid,
    pub resent: bool,
}

/// POST /admin/orders/{order_id}/resend - Re-send the delivery email
#[utoipa::path(
    post,
    path = "/admin/orders/{order_id}/resend",
    params(
        ("order_id" = Uuid, Path, description = "The order to re-deliver.")
    ),
    responses(
        (status = 200, description = "Delivery email re-sent", body = ResendResponse),
        (status = 400, description = "Order is not completed"),
        (status = 401, description = "Missing or invalid admin credential"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn resend_delivery_handler(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ResendResponse>, (StatusCode, String)> {
    let delivery = DeliveryConfig::from_config(&state.config);
    orders::resend_delivery(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &delivery,
        order_id,
    )
    .await
    .map_err(|e| match e {
        ResendError::NotFound => (StatusCode::NOT_FOUND, "Order not found".to_string()),
        ResendError::NotCompleted => (
            StatusCode::BAD_REQUEST,
            "Order is not completed".to_string(),
        ),
        ResendError::Port(e) => {
            error!("Resend failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to re-send delivery email".to_string(),
            )
        }
    })?;

    Ok(Json(ResendResponse {
        order_id,
        resent: true,
    }))
}
