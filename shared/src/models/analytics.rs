//! Analytics models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Temporal grouping for KPI period rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsGroupBy {
    None,
    Day,
    Week,
    Month,
}

impl AnalyticsGroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Parse a query-string value; unknown values are rejected at the boundary.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalyticsGroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time window and aggregation parameters for analytics queries.
///
/// The normalized filter is also the cache fingerprint: two requests with the
/// same normalized filter hit the same cache entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticsFilter {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub group_by: AnalyticsGroupBy,
    pub top_items_limit: i64,
    pub courier_limit: i64,
    pub include_periods: bool,
}

/// Aggregated business KPIs for a time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiMetrics {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub revenue: f64,
    pub orders_count: i64,
    pub avg_delivery_time_minutes: f64,
    pub average_check: f64,
    pub top_items: Vec<TopItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub periods: Vec<KpiPeriod>,
    pub generated_at: DateTime<Utc>,
    pub group_by: AnalyticsGroupBy,
}

/// KPI aggregate for one period bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiPeriod {
    /// `YYYY-MM-DD` for day/week buckets, `YYYY-MM` for month buckets
    pub period: String,
    pub revenue: f64,
    pub orders_count: i64,
    pub avg_delivery_time_minutes: f64,
}

/// One of the most-ordered items in the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopItem {
    pub name: String,
    pub quantity: i64,
    pub revenue: f64,
}

/// Per-courier delivery metrics. Couriers with zero deliveries in the window
/// still appear with zeroed aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierAnalytics {
    pub courier_id: Uuid,
    pub courier_name: String,
    pub rating: f64,
    pub deliveries: i64,
    pub revenue: f64,
    pub avg_delivery_time_minutes: f64,
}
