//! crates/skillstore_core/src/domain.rs
//!
//! Defines the pure, core data structures for the storefront.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The lifecycle status of an order.
///
/// Transitions are one-directional: `Pending` -> `Completed` or
/// `Pending` -> `Failed`. Terminal states never revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "completed" => Some(OrderStatus::Completed),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    /// Whether the status graph permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Failed)
        )
    }
}

/// Represents a single purchase attempt linking a user, a product, and a
/// payment lifecycle.
///
/// `amount_cents` is a snapshot of the product price at checkout time, so a
/// later price change never affects an in-flight order.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub amount_cents: i64,
    pub status: OrderStatus,
    /// The payment provider's checkout-session reference, set once the
    /// session has been created.
    pub checkout_session_ref: Option<String>,
    /// The payment provider's transaction reference, set on completion.
    pub payment_ref: Option<String>,
    pub download_count: i32,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The category of a purchasable product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductKind {
    Skill,
    Consulting,
    Template,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Skill => "skill",
            ProductKind::Consulting => "consulting",
            ProductKind::Template => "template",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "skill" => Some(ProductKind::Skill),
            "consulting" => Some(ProductKind::Consulting),
            "template" => Some(ProductKind::Template),
            _ => None,
        }
    }
}

/// Represents a purchasable digital product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub kind: ProductKind,
    pub is_active: bool,
}

/// One of the three downloadable artifacts delivered per product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Skill,
    Documentation,
    Prompt,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Skill, FileKind::Documentation, FileKind::Prompt];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Skill => "skill",
            FileKind::Documentation => "documentation",
            FileKind::Prompt => "prompt",
        }
    }

    /// File extension of the backing artifact, including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Skill => ".skill",
            FileKind::Documentation => ".pdf",
            FileKind::Prompt => ".txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileKind::Skill => "application/octet-stream",
            FileKind::Documentation => "application/pdf",
            FileKind::Prompt => "text/plain",
        }
    }
}

// Represents a user - used throughout the app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    /// The payment provider's customer reference, created at registration.
    pub billing_customer_id: Option<String>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_may_complete_or_fail() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Failed));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for terminal in [OrderStatus::Completed, OrderStatus::Failed] {
            for next in [
                OrderStatus::Pending,
                OrderStatus::Completed,
                OrderStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn no_edge_back_into_pending() {
        for from in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Failed,
        ] {
            assert!(!from.can_transition_to(OrderStatus::Pending));
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Failed,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("refunded"), None);
    }

    #[test]
    fn file_kind_metadata() {
        assert_eq!(FileKind::Skill.extension(), ".skill");
        assert_eq!(FileKind::Documentation.content_type(), "application/pdf");
        assert_eq!(FileKind::Prompt.as_str(), "prompt");
    }
}
