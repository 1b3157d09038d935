//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::ratelimit::FixedWindowLimiter;
use skillstore_core::ports::{MailerService, PaymentService, StoreService};
use std::sync::Arc;
use std::time::Duration;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub store: Arc<dyn StoreService>,
    pub payments: Arc<dyn PaymentService>,
    pub mailer: Arc<dyn MailerService>,
    pub config: Arc<Config>,
    /// Per-address limiter guarding the download endpoint. Process-local and
    /// advisory; a shared-store implementation can replace it for
    /// multi-instance deployments.
    pub download_limiter: FixedWindowLimiter,
}

impl AppState {
    pub fn new(
        store: Arc<dyn StoreService>,
        payments: Arc<dyn PaymentService>,
        mailer: Arc<dyn MailerService>,
        config: Arc<Config>,
    ) -> Self {
        let download_limiter = FixedWindowLimiter::new(
            Duration::from_secs(config.download_rate_window_secs),
            config.download_rate_max,
        );
        Self {
            store,
            payments,
            mailer,
            config,
            download_limiter,
        }
    }
}
