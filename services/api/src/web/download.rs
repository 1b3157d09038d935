//! services/api/src/web/download.rs
//!
//! The download gate: rate-limits, verifies the signed token, re-checks the
//! order's completion, and streams the artifact with attachment headers.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use skillstore_core::domain::{FileKind, OrderStatus};
use skillstore_core::ports::PortError;
use skillstore_core::token;

use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
}

/// GET /api/download - Serve an artifact for a completed purchase
#[utoipa::path(
    get,
    path = "/api/download",
    params(
        ("token" = String, Query, description = "Signed download token from the delivery email.")
    ),
    responses(
        (status = 200, description = "File download", content_type = "application/octet-stream"),
        (status = 400, description = "Missing token"),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Token does not match the order's product"),
        (status = 404, description = "Order not found, not completed, or file missing"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Rate limit before doing any token work.
    let ip = client_ip(&headers);
    if !state.download_limiter.check(ip) {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            "Too many download attempts. Please try again later.".to_string(),
        ));
    }

    let token_str = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or((
            StatusCode::BAD_REQUEST,
            "Download token is required".to_string(),
        ))?;

    let payload = token::decode(&token_str, state.config.download_secret.as_bytes())
        .map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired download link".to_string(),
            )
        })?;

    // Re-check the authorization the token stands for: the order must exist
    // and be completed. A single message covers both so responses do not leak
    // which condition failed.
    let not_completed = (
        StatusCode::NOT_FOUND,
        "Order not found or not completed".to_string(),
    );
    let order = match state.store.get_order_by_id(payload.order_id).await {
        Ok(order) => order,
        Err(PortError::NotFound(_)) => return Err(not_completed),
        Err(e) => {
            error!("Failed to load order for download: {:?}", e);
            return Err(internal_error());
        }
    };
    if order.status != OrderStatus::Completed {
        return Err(not_completed);
    }

    // Defense against token reuse across products.
    if order.product_id != payload.product_id {
        return Err((
            StatusCode::FORBIDDEN,
            "Invalid product for this order".to_string(),
        ));
    }

    let product = state
        .store
        .get_product_by_id(order.product_id)
        .await
        .map_err(|e| {
            error!("Failed to load product for download: {:?}", e);
            internal_error()
        })?;

    let path = artifact_path(&state.config.storage_root, payload.product_id, payload.file_kind);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            // Valid authorization but no backing file is an operational
            // problem, reported distinctly from the auth failures above.
            error!(path = %path.display(), "Failed to read artifact: {:?}", e);
            return Err((
                StatusCode::NOT_FOUND,
                "File not found. Please contact support.".to_string(),
            ));
        }
    };

    state
        .store
        .increment_download_count(order.id)
        .await
        .map_err(|e| {
            error!("Failed to increment download count: {:?}", e);
            internal_error()
        })?;

    // Audit logging is best-effort: a write failure never fails the download.
    if let Err(e) = state
        .store
        .record_download(order.id, payload.file_kind, ip)
        .await
    {
        warn!("Failed to record download: {:?}", e);
    }

    let filename = format!(
        "{}-{}{}",
        slugify(&product.name),
        payload.file_kind.as_str(),
        payload.file_kind.extension()
    );

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                payload.file_kind.content_type().to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
            (header::CONTENT_LENGTH, bytes.len().to_string()),
            (
                header::CACHE_CONTROL,
                "no-cache, no-store, must-revalidate".to_string(),
            ),
            (header::PRAGMA, "no-cache".to_string()),
            (header::EXPIRES, "0".to_string()),
        ],
        bytes,
    ))
}

fn internal_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "An error occurred during download".to_string(),
    )
}

/// Best-effort client address for rate limiting and audit logging.
fn client_ip(headers: &HeaderMap) -> &str {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
}

/// Maps `(product_id, file_kind)` to the backing file under the storage root.
fn artifact_path(storage_root: &Path, product_id: Uuid, kind: FileKind) -> PathBuf {
    let subdir = match kind {
        FileKind::Skill => "skills",
        FileKind::Documentation => "documentation",
        FileKind::Prompt => "prompts",
    };
    storage_root
        .join(subdir)
        .join(format!("{}{}", product_id, kind.extension()))
}

/// Lowercases and collapses non-alphanumeric runs into single dashes.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
