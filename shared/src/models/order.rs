//! Order Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle status.
///
/// The legal transition graph is a straight line towards `delivered` with a
/// `cancelled` exit from every non-terminal state:
///
/// ```text
/// created -> accepted -> preparing -> ready -> in_delivery -> delivered
///    \___________\___________\__________\____________\______> cancelled
/// ```
///
/// `delivered` and `cancelled` are terminal. Writing the current status again
/// is always allowed (idempotent update).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Accepted,
    Preparing,
    Ready,
    InDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Pure transition check backing every status write.
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        if self == to {
            return true;
        }
        matches!(
            (self, to),
            (Created, Accepted | Cancelled)
                | (Accepted, Preparing | Cancelled)
                | (Preparing, Ready | Cancelled)
                | (Ready, InDelivery | Cancelled)
                | (InDelivery, Delivered | Cancelled)
        )
    }

    /// True for states from which no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Accepted => "accepted",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::InDelivery => "in_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order entity.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub pickup_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_lon: Option<f64>,
    /// Line items, loaded with a separate query
    #[sqlx(skip)]
    #[serde(default)]
    pub items: Vec<OrderItem>,
    /// max(0, items total + delivery cost - discount), two fractional digits
    pub total_amount: f64,
    pub delivery_cost: f64,
    pub discount_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier_id: Option<Uuid>,
    /// Review rating (1..=5), set at most once per order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly when the order enters `delivered`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Order line item. Created with its order, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub price: f64,
}
