//! services/api/src/web/webhook.rs
//!
//! The single entry point for payment-provider notifications. Verifies the
//! provider's signature over the raw body before trusting anything, then
//! dispatches by event type into the order state machine.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::orders::{self, DeliveryConfig};
use crate::web::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How far a webhook timestamp may drift from our clock before the request is
/// rejected as a possible replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Deserialize)]
pub struct WebhookData {
    pub object: WebhookObject,
}

#[derive(Deserialize)]
pub struct WebhookObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

//=========================================================================================
// Handler
//=========================================================================================

/// POST /api/webhooks/stripe - Receive payment-provider events
#[utoipa::path(
    post,
    path = "/api/webhooks/stripe",
    request_body = String,
    responses(
        (status = 200, description = "Event authenticated and dispatched", body = WebhookAck),
        (status = 400, description = "Missing or invalid signature"),
        (status = 500, description = "Internal processing error")
    )
)]
pub async fn stripe_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, (StatusCode, String)> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or((StatusCode::BAD_REQUEST, "No signature".to_string()))?;

    if !verify_signature_at(
        &body,
        signature,
        &state.config.webhook_secret,
        Utc::now().timestamp(),
    ) {
        return Err((
            StatusCode::BAD_REQUEST,
            "Webhook signature verification failed".to_string(),
        ));
    }

    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        error!("Unparsable webhook body: {:?}", e);
        (StatusCode::BAD_REQUEST, "Invalid event payload".to_string())
    })?;

    let internal = |e: skillstore_core::ports::PortError| {
        error!("Webhook handler error: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook handler failed".to_string(),
        )
    };

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let delivery = DeliveryConfig::from_config(&state.config);
            orders::complete_checkout_session(
                state.store.as_ref(),
                state.mailer.as_ref(),
                &delivery,
                &event.data.object.id,
                event.data.object.payment_intent.as_deref(),
            )
            .await
            .map_err(internal)?;
        }
        "checkout.session.expired" => {
            state
                .store
                .mark_order_failed_by_checkout_session(&event.data.object.id)
                .await
                .map_err(internal)?;
        }
        "payment_intent.payment_failed" => {
            state
                .store
                .mark_order_failed_by_payment(&event.data.object.id)
                .await
                .map_err(internal)?;
        }
        other => {
            // The provider's event vocabulary grows over time; unknown types
            // are acknowledged so it stops redelivering them.
            debug!(event_type = other, "unhandled webhook event type");
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

//=========================================================================================
// Signature Verification
//=========================================================================================

/// Verifies a `stripe-signature` header (`t=<timestamp>,v1=<hex hmac>`)
/// against the raw request body.
///
/// The MAC is HMAC-SHA256 over `"{timestamp}.{body}"` keyed with the shared
/// webhook secret; the comparison is constant-time and the timestamp must be
/// within [`SIGNATURE_TOLERANCE_SECS`] of `now_ts`.
pub fn verify_signature_at(
    payload: &[u8],
    signature_header: &str,
    webhook_secret: &str,
    now_ts: i64,
) -> bool {
    let mut timestamp: Option<&str> = None;
    let mut signature: Option<&str> = None;
    for part in signature_header.split(',') {
        match part.split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signature = Some(v),
            _ => {}
        }
    }
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return false;
    };

    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now_ts - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(webhook_secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    bool::from(expected.as_bytes().ct_eq(signature.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_a_valid_signature() {
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let now = Utc::now().timestamp();
        let header = sign(payload, SECRET, now);
        assert!(verify_signature_at(payload, &header, SECRET, now));
    }

    #[test]
    fn rejects_a_signature_from_the_wrong_secret() {
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let now = Utc::now().timestamp();
        let header = sign(payload, "wrong_secret", now);
        assert!(!verify_signature_at(payload, &header, SECRET, now));
    }

    #[test]
    fn rejects_a_modified_payload() {
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let modified = b"{\"type\":\"checkout.session.completed\",\"extra\":true}";
        let now = Utc::now().timestamp();
        let header = sign(payload, SECRET, now);
        assert!(!verify_signature_at(modified, &header, SECRET, now));
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let payload = b"{}";
        let now = Utc::now().timestamp();
        let header = sign(payload, SECRET, now - 600);
        assert!(!verify_signature_at(payload, &header, SECRET, now));
    }

    #[test]
    fn rejects_malformed_headers() {
        let now = Utc::now().timestamp();
        for header in ["", "t=abc,v1=def", "v1=aaaa", "t=123", "nonsense"] {
            assert!(!verify_signature_at(b"{}", header, SECRET, now), "{:?}", header);
        }
    }
}
