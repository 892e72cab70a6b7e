//! Analytics API Handlers
//!
//! Query parsing (dates, grouping, limits), the per-request timeout budget,
//! and the CSV export format.

use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;

use shared::error::{AppError, AppResult};
use shared::models::{AnalyticsFilter, AnalyticsGroupBy, CourierAnalytics, KpiMetrics};

use crate::config::AnalyticsConfig;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub group_by: Option<String>,
    pub format: Option<String>,
    /// Top-items cap for the KPI endpoint
    pub top_limit: Option<String>,
    /// Courier cap for the courier endpoint
    pub limit: Option<String>,
}

/// Business KPIs, JSON or CSV.
pub async fn kpi(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Response> {
    let cfg = &state.config.analytics;
    let (filter, format) = parse_filter(&query, cfg)?;

    let metrics = with_timeout(cfg.request_timeout(), state.analytics.get_kpis(filter)).await?;

    match format {
        OutputFormat::Json => Ok(Json(metrics).into_response()),
        OutputFormat::Csv => Ok(csv_response(kpi_csv(&metrics), "kpi.csv")),
    }
}

/// Per-courier metrics, JSON or CSV.
pub async fn couriers(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Response> {
    let cfg = &state.config.analytics;
    let (filter, format) = parse_filter(&query, cfg)?;

    let metrics = with_timeout(
        cfg.request_timeout(),
        state.analytics.get_courier_analytics(filter),
    )
    .await?;

    match format {
        OutputFormat::Json => Ok(Json(metrics).into_response()),
        OutputFormat::Csv => Ok(csv_response(courier_csv(&metrics), "couriers.csv")),
    }
}

async fn with_timeout<T, F>(budget: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| AppError::cancelled("analytics request timed out"))?
}

fn parse_filter(
    query: &AnalyticsQuery,
    cfg: &AnalyticsConfig,
) -> AppResult<(AnalyticsFilter, OutputFormat)> {
    let today = Utc::now().date_naive();
    let max_range_days = cfg.max_range_days.max(1) as u64;

    let to_date = match query.to.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => parse_date(raw, "to")?,
        None => today,
    };
    let from_date = match query.from.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => parse_date(raw, "from")?,
        None => to_date
            .checked_sub_days(Days::new(max_range_days - 1))
            .unwrap_or(to_date),
    };

    if from_date > to_date {
        return Err(AppError::validation("'from' date must be before 'to' date"));
    }
    let min_allowed_from = to_date
        .checked_sub_days(Days::new(max_range_days - 1))
        .unwrap_or(to_date);
    if from_date < min_allowed_from {
        return Err(AppError::validation(format!(
            "date range too wide, max {} days",
            cfg.max_range_days.max(1)
        )));
    }

    let default_group_by =
        AnalyticsGroupBy::parse(&cfg.default_group_by).unwrap_or(AnalyticsGroupBy::None);
    let group_by = match query.group_by.as_deref().filter(|raw| !raw.is_empty()) {
        None => default_group_by,
        Some(raw) => AnalyticsGroupBy::parse(&raw.to_ascii_lowercase())
            .ok_or_else(|| AppError::validation("group_by must be one of: day, week, month, none"))?,
    };

    let format = match query
        .format
        .as_deref()
        .map(str::to_ascii_lowercase)
        .filter(|raw| !raw.is_empty())
    {
        None => OutputFormat::Json,
        Some(raw) if raw == "json" => OutputFormat::Json,
        Some(raw) if raw == "csv" => OutputFormat::Csv,
        Some(_) => return Err(AppError::validation("format must be json or csv")),
    };

    let filter = AnalyticsFilter {
        from: start_of_day(from_date),
        to: end_of_day(to_date),
        group_by,
        top_items_limit: parse_int_or(query.top_limit.as_deref(), cfg.default_top_limit),
        courier_limit: parse_int_or(query.limit.as_deref(), cfg.default_courier_limit),
        include_periods: group_by != AnalyticsGroupBy::None,
    };

    Ok((filter, format))
}

fn parse_date(raw: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("invalid '{field}' date, expected YYYY-MM-DD")))
}

/// Lenient integer parsing: anything non-positive or malformed falls back.
fn parse_int_or(raw: Option<&str>, default: i64) -> i64 {
    match raw.and_then(|raw| raw.parse::<i64>().ok()) {
        Some(value) if value > 0 => value,
        _ => default,
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(end))
}

// =========================================================================
// CSV export
// =========================================================================

fn csv_response(body: String, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    )
        .into_response()
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Two-section document: summary + period rows, blank line, top items.
fn kpi_csv(metrics: &KpiMetrics) -> String {
    let mut out = String::new();
    out.push_str("section,period,revenue,orders_count,avg_delivery_time_minutes\n");

    let range = format!(
        "{}..{}",
        metrics.from.format("%Y-%m-%d"),
        metrics.to.format("%Y-%m-%d")
    );
    let _ = writeln!(
        out,
        "summary,{},{:.2},{},{:.2}",
        csv_field(&range),
        metrics.revenue,
        metrics.orders_count,
        metrics.avg_delivery_time_minutes
    );

    for period in &metrics.periods {
        let _ = writeln!(
            out,
            "period,{},{:.2},{},{:.2}",
            csv_field(&period.period),
            period.revenue,
            period.orders_count,
            period.avg_delivery_time_minutes
        );
    }

    out.push('\n');
    out.push_str("section,item_name,quantity,revenue\n");
    for item in &metrics.top_items {
        let _ = writeln!(
            out,
            "top_item,{},{},{:.2}",
            csv_field(&item.name),
            item.quantity,
            item.revenue
        );
    }

    out
}

fn courier_csv(metrics: &[CourierAnalytics]) -> String {
    let mut out = String::new();
    out.push_str("courier_id,courier_name,deliveries,revenue,rating,avg_delivery_time_minutes\n");
    for row in metrics {
        let _ = writeln!(
            out,
            "{},{},{},{:.2},{:.2},{:.2}",
            row.courier_id,
            csv_field(&row.courier_name),
            row.deliveries,
            row.revenue,
            row.rating,
            row.avg_delivery_time_minutes
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{KpiPeriod, TopItem};
    use uuid::Uuid;

    fn cfg() -> AnalyticsConfig {
        AnalyticsConfig {
            cache_ttl_minutes: 10,
            max_range_days: 365,
            default_group_by: "none".to_string(),
            default_top_limit: 5,
            default_courier_limit: 50,
            timeout_seconds: 5,
        }
    }

    fn query(from: &str, to: &str) -> AnalyticsQuery {
        AnalyticsQuery {
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            group_by: None,
            format: None,
            top_limit: None,
            limit: None,
        }
    }

    #[test]
    fn parses_a_day_grouped_window() {
        let mut q = query("2024-03-01", "2024-03-03");
        q.group_by = Some("day".to_string());
        let (filter, format) = parse_filter(&q, &cfg()).unwrap();
        assert_eq!(format, OutputFormat::Json);
        assert_eq!(filter.group_by, AnalyticsGroupBy::Day);
        assert!(filter.include_periods);
        assert_eq!(filter.from.format("%Y-%m-%d %H:%M").to_string(), "2024-03-01 00:00");
        assert_eq!(filter.to.format("%Y-%m-%d").to_string(), "2024-03-03");
        assert_eq!(filter.top_items_limit, 5);
        assert_eq!(filter.courier_limit, 50);
    }

    #[test]
    fn rejects_inverted_range() {
        let q = query("2024-03-05", "2024-03-01");
        assert!(parse_filter(&q, &cfg()).is_err());
    }

    #[test]
    fn rejects_too_wide_range() {
        let mut narrow_cfg = cfg();
        narrow_cfg.max_range_days = 7;
        let q = query("2024-03-01", "2024-03-20");
        assert!(parse_filter(&q, &narrow_cfg).is_err());
    }

    #[test]
    fn rejects_unknown_group_by_and_format() {
        let mut q = query("2024-03-01", "2024-03-02");
        q.group_by = Some("hour".to_string());
        assert!(parse_filter(&q, &cfg()).is_err());

        let mut q = query("2024-03-01", "2024-03-02");
        q.format = Some("xml".to_string());
        assert!(parse_filter(&q, &cfg()).is_err());
    }

    #[test]
    fn malformed_limits_fall_back_to_defaults() {
        let mut q = query("2024-03-01", "2024-03-02");
        q.top_limit = Some("abc".to_string());
        q.limit = Some("-3".to_string());
        let (filter, _) = parse_filter(&q, &cfg()).unwrap();
        assert_eq!(filter.top_items_limit, 5);
        assert_eq!(filter.courier_limit, 50);
    }

    #[test]
    fn kpi_csv_has_two_sections() {
        let metrics = KpiMetrics {
            from: start_of_day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            to: end_of_day(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()),
            revenue: 600.0,
            orders_count: 3,
            avg_delivery_time_minutes: 42.5,
            average_check: 200.0,
            top_items: vec![TopItem {
                name: "Tea, green".to_string(),
                quantity: 7,
                revenue: 350.0,
            }],
            periods: vec![KpiPeriod {
                period: "2024-03-01".to_string(),
                revenue: 100.0,
                orders_count: 1,
                avg_delivery_time_minutes: 40.0,
            }],
            generated_at: Utc::now(),
            group_by: AnalyticsGroupBy::Day,
        };

        let csv = kpi_csv(&metrics);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "section,period,revenue,orders_count,avg_delivery_time_minutes"
        );
        assert_eq!(lines[1], "summary,2024-03-01..2024-03-03,600.00,3,42.50");
        assert_eq!(lines[2], "period,2024-03-01,100.00,1,40.00");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "section,item_name,quantity,revenue");
        // comma in the item name is quoted
        assert_eq!(lines[5], "top_item,\"Tea, green\",7,350.00");
    }

    #[test]
    fn courier_csv_columns() {
        let id = Uuid::new_v4();
        let csv = courier_csv(&[CourierAnalytics {
            courier_id: id,
            courier_name: "Bob".to_string(),
            rating: 4.5,
            deliveries: 12,
            revenue: 2400.0,
            avg_delivery_time_minutes: 33.0,
        }]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "courier_id,courier_name,deliveries,revenue,rating,avg_delivery_time_minutes"
        );
        assert_eq!(lines[1], format!("{id},Bob,12,2400.00,4.50,33.00"));
    }
}
