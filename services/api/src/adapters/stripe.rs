//! services/api/src/adapters/stripe.rs
//!
//! The Stripe implementation of the `PaymentService` port. Talks to the
//! form-encoded Stripe REST API with `reqwest`; the hosted checkout page
//! itself is entirely Stripe's.

use async_trait::async_trait;
use serde::Deserialize;
use skillstore_core::ports::{
    CheckoutSession, CheckoutSessionRequest, PaymentService, PortError, PortResult,
};

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

pub struct StripeAdapter {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeAdapter {
    pub fn new(secret_key: String) -> Self {
        Self::with_api_base(secret_key, DEFAULT_API_BASE.to_string())
    }

    /// Points the adapter at a different API origin (stripe-mock, tests).
    pub fn with_api_base(secret_key: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            api_base,
        }
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> PortResult<T> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("stripe request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "stripe returned {}: {}",
                status, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("unparsable stripe response: {}", e)))
    }
}

#[derive(Deserialize)]
struct CustomerResponse {
    id: String,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[async_trait]
impl PaymentService for StripeAdapter {
    async fn create_customer(&self, email: &str, name: Option<&str>) -> PortResult<String> {
        let mut form = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[source]".to_string(), "registration".to_string()),
        ];
        if let Some(name) = name {
            form.push(("name".to_string(), name.to_string()));
        }

        let customer: CustomerResponse = self.post_form("/v1/customers", &form).await?;
        Ok(customer.id)
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> PortResult<CheckoutSession> {
        let form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("customer".to_string(), request.customer_ref.clone()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                "usd".to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.amount_cents.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "metadata[user_id]".to_string(),
                request.user_id.to_string(),
            ),
            (
                "metadata[product_id]".to_string(),
                request.product_id.to_string(),
            ),
        ];

        let session: SessionResponse = self.post_form("/v1/checkout/sessions", &form).await?;
        let url = session.url.ok_or_else(|| {
            PortError::Unexpected("checkout session response carried no url".to_string())
        })?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}
