//! Analytics engine
//!
//! Aggregates delivered orders into KPI and per-courier metrics with a
//! fingerprint-keyed cache in front. The cache is best-effort in both
//! directions: a broken cache degrades to recomputation, never to an error.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;

use shared::error::AppResult;
use shared::models::{
    AnalyticsFilter, AnalyticsGroupBy, CourierAnalytics, KpiMetrics, KpiPeriod, TopItem,
};

use crate::cache::{Cache, KEY_PREFIX_STATS};
use crate::config::AnalyticsConfig;

pub struct AnalyticsService {
    pool: PgPool,
    cache: Cache,
    cfg: AnalyticsConfig,
}

impl AnalyticsService {
    pub fn new(pool: PgPool, cache: Cache, cfg: AnalyticsConfig) -> Self {
        Self { pool, cache, cfg }
    }

    /// KPI metrics for a window: summary, optional period buckets, top items.
    pub async fn get_kpis(&self, filter: AnalyticsFilter) -> AppResult<KpiMetrics> {
        let filter = self.normalize(filter);
        let key = cache_key("kpi", &filter);

        if let Ok(Some(cached)) = self.cache.get_json::<KpiMetrics>(&key).await {
            return Ok(cached);
        }

        let summary = self.fetch_summary(&filter).await?;
        let periods = self.fetch_periods(&filter).await?;
        let top_items = self.fetch_top_items(&filter).await?;

        let metrics = KpiMetrics {
            from: filter.from,
            to: filter.to,
            revenue: summary.0,
            orders_count: summary.1,
            avg_delivery_time_minutes: summary.2,
            average_check: summary.3,
            top_items,
            periods,
            generated_at: Utc::now(),
            group_by: filter.group_by,
        };

        if let Err(err) = self.cache.set_json(&key, &metrics, self.cfg.cache_ttl()).await {
            warn!(key = %key, error = %err, "failed to cache analytics result");
        }

        Ok(metrics)
    }

    /// Per-courier metrics; couriers with no deliveries in the window still
    /// appear zeroed.
    pub async fn get_courier_analytics(
        &self,
        filter: AnalyticsFilter,
    ) -> AppResult<Vec<CourierAnalytics>> {
        let filter = self.normalize(filter);
        let key = cache_key("couriers", &filter);

        if let Ok(Some(cached)) = self.cache.get_json::<Vec<CourierAnalytics>>(&key).await {
            return Ok(cached);
        }

        let rows = sqlx::query_as::<_, (uuid::Uuid, String, f64, i64, f64, f64)>(
            "SELECT c.id,
                    c.name,
                    c.rating,
                    COUNT(o.id) AS deliveries,
                    COALESCE(SUM(o.total_amount), 0)::double precision AS revenue,
                    COALESCE(AVG(EXTRACT(EPOCH FROM (o.delivered_at - o.created_at)) / 60), 0)::double precision AS avg_delivery_minutes
             FROM couriers c
             LEFT JOIN orders o ON o.courier_id = c.id
                 AND o.status = 'delivered'
                 AND o.delivered_at BETWEEN $1 AND $2
             GROUP BY c.id, c.name, c.rating
             ORDER BY deliveries DESC, revenue DESC, c.rating DESC, c.name ASC
             LIMIT $3",
        )
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.courier_limit)
        .fetch_all(&self.pool)
        .await?;

        let result: Vec<CourierAnalytics> = rows
            .into_iter()
            .map(
                |(courier_id, courier_name, rating, deliveries, revenue, avg)| CourierAnalytics {
                    courier_id,
                    courier_name,
                    rating,
                    deliveries,
                    revenue,
                    avg_delivery_time_minutes: avg,
                },
            )
            .collect();

        if let Err(err) = self.cache.set_json(&key, &result, self.cfg.cache_ttl()).await {
            warn!(key = %key, error = %err, "failed to cache analytics result");
        }

        Ok(result)
    }

    fn normalize(&self, mut filter: AnalyticsFilter) -> AnalyticsFilter {
        if filter.top_items_limit <= 0 {
            filter.top_items_limit = self.cfg.default_top_limit.max(1);
        }
        if filter.courier_limit <= 0 {
            filter.courier_limit = self.cfg.default_courier_limit.max(1);
        }
        filter.include_periods = filter.group_by != AnalyticsGroupBy::None;
        filter
    }

    async fn fetch_summary(&self, filter: &AnalyticsFilter) -> AppResult<(f64, i64, f64, f64)> {
        let row = sqlx::query_as::<_, (f64, i64, f64, f64)>(
            "SELECT COALESCE(SUM(total_amount), 0)::double precision AS revenue,
                    COUNT(*) AS orders_count,
                    COALESCE(AVG(EXTRACT(EPOCH FROM (delivered_at - created_at)) / 60), 0)::double precision AS avg_delivery_minutes,
                    COALESCE(AVG(total_amount), 0)::double precision AS average_check
             FROM orders
             WHERE status = 'delivered' AND delivered_at BETWEEN $1 AND $2",
        )
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn fetch_periods(&self, filter: &AnalyticsFilter) -> AppResult<Vec<KpiPeriod>> {
        if !filter.include_periods {
            return Ok(Vec::new());
        }

        let bucket = match filter.group_by {
            AnalyticsGroupBy::Week => "week",
            AnalyticsGroupBy::Month => "month",
            _ => "day",
        };

        let query = format!(
            "SELECT date_trunc('{bucket}', delivered_at) AS period,
                    COALESCE(SUM(total_amount), 0)::double precision AS revenue,
                    COUNT(*) AS orders_count,
                    COALESCE(AVG(EXTRACT(EPOCH FROM (delivered_at - created_at)) / 60), 0)::double precision AS avg_delivery_minutes
             FROM orders
             WHERE status = 'delivered' AND delivered_at BETWEEN $1 AND $2
             GROUP BY period
             ORDER BY period ASC"
        );

        let rows = sqlx::query_as::<_, (DateTime<Utc>, f64, i64, f64)>(&query)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(period, revenue, orders_count, avg)| KpiPeriod {
                period: format_period(period, filter.group_by),
                revenue,
                orders_count,
                avg_delivery_time_minutes: avg,
            })
            .collect())
    }

    async fn fetch_top_items(&self, filter: &AnalyticsFilter) -> AppResult<Vec<TopItem>> {
        let rows = sqlx::query_as::<_, (String, i64, f64)>(
            "SELECT oi.name,
                    COALESCE(SUM(oi.quantity), 0) AS total_quantity,
                    COALESCE(SUM(oi.price * oi.quantity), 0)::double precision AS revenue
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             WHERE o.status = 'delivered' AND o.delivered_at BETWEEN $1 AND $2
             GROUP BY oi.name
             ORDER BY total_quantity DESC, revenue DESC, oi.name ASC
             LIMIT $3",
        )
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.top_items_limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, quantity, revenue)| TopItem {
                name,
                quantity,
                revenue,
            })
            .collect())
    }
}

/// Composite cache fingerprint of a normalized filter.
pub fn cache_key(kind: &str, filter: &AnalyticsFilter) -> String {
    Cache::key(
        KEY_PREFIX_STATS,
        &format!(
            "{}:{}:{}:{}:{}:{}:{}",
            kind,
            filter.from.format("%Y-%m-%d"),
            filter.to.format("%Y-%m-%d"),
            filter.group_by,
            filter.top_items_limit,
            filter.courier_limit,
            filter.include_periods
        ),
    )
}

fn format_period(period: DateTime<Utc>, group_by: AnalyticsGroupBy) -> String {
    match group_by {
        AnalyticsGroupBy::Month => period.format("%Y-%m").to_string(),
        _ => period.format("%Y-%m-%d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn filter(group_by: AnalyticsGroupBy) -> AnalyticsFilter {
        AnalyticsFilter {
            from: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 3, 3, 23, 59, 59).unwrap(),
            group_by,
            top_items_limit: 5,
            courier_limit: 50,
            include_periods: group_by != AnalyticsGroupBy::None,
        }
    }

    #[test]
    fn cache_key_encodes_the_whole_filter() {
        let key = cache_key("kpi", &filter(AnalyticsGroupBy::Day));
        assert_eq!(key, "stats:kpi:2024-03-01:2024-03-03:day:5:50:true");
    }

    #[test]
    fn different_filters_never_collide() {
        let day = cache_key("kpi", &filter(AnalyticsGroupBy::Day));
        let week = cache_key("kpi", &filter(AnalyticsGroupBy::Week));
        let couriers = cache_key("couriers", &filter(AnalyticsGroupBy::Day));
        assert!(day != week);
        assert!(day != couriers);
    }

    #[test]
    fn period_labels_follow_the_bucket() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        assert_eq!(format_period(ts, AnalyticsGroupBy::Day), "2024-03-04");
        assert_eq!(format_period(ts, AnalyticsGroupBy::Week), "2024-03-04");
        assert_eq!(format_period(ts, AnalyticsGroupBy::Month), "2024-03");
    }
}
