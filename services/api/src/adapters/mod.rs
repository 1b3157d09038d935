//! services/api/src/adapters/mod.rs
//!
//! Concrete implementations of the core service ports: the Postgres store,
//! the Stripe payments client, and the Resend mailer.

pub mod db;
pub mod mailer;
pub mod stripe;
