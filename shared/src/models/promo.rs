//! Promo code model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discount semantics of a promo code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
pub enum DiscountType {
    /// `amount` is subtracted, clamped to the order total
    Fixed,
    /// `amount` percent (0, 100] of items + delivery
    Percent,
    /// `amount` is ignored, the delivery cost is waived
    FreeDelivery,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Percent => "percent",
            Self::FreeDelivery => "free_delivery",
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Promo code entity. The code itself is the primary key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PromoCode {
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: f64,
    /// 0 = unbounded
    pub max_uses: i32,
    pub used_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
