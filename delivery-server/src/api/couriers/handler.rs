//! Courier API Handlers

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use shared::error::{AppError, AppResult};
use shared::models::{Courier, CourierStatus, Review};

use crate::api::validate::{self, MAX_NAME_LEN, MAX_SHORT_TEXT_LEN};
use crate::api::{after_assignment, invalidate, AppJson};
use crate::cache::{Cache, KEY_PREFIX_COURIER};
use crate::services::couriers::{CourierOrderBy, CreateCourier, UpdateCourierStatus};
use crate::state::AppState;

const COURIER_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateCourierRequest {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct ListCouriersQuery {
    pub status: Option<CourierStatus>,
    pub min_rating: Option<f64>,
    pub order_by: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCourierStatusRequest {
    pub status: CourierStatus,
    pub current_lat: Option<f64>,
    pub current_lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AssignOrderRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Register a courier.
pub async fn create(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateCourierRequest>,
) -> AppResult<(StatusCode, Json<Courier>)> {
    validate::required_text(&req.name, "name", MAX_NAME_LEN)?;
    validate::required_text(&req.phone, "phone", MAX_SHORT_TEXT_LEN)?;

    let courier = state
        .couriers
        .create(CreateCourier {
            name: req.name,
            phone: req.phone,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(courier)))
}

/// List couriers with filters.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListCouriersQuery>,
) -> AppResult<Json<Vec<Courier>>> {
    let order_by = match query.order_by.as_deref() {
        None | Some("") => CourierOrderBy::CreatedAt,
        Some(raw) => CourierOrderBy::parse(raw)
            .ok_or_else(|| AppError::validation("order_by must be one of: created_at, rating"))?,
    };
    if let Some(min_rating) = query.min_rating {
        if !(0.0..=5.0).contains(&min_rating) {
            return Err(AppError::validation("min_rating must be between 0 and 5"));
        }
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let couriers = state
        .couriers
        .list(query.status, query.min_rating, order_by, limit, offset)
        .await?;
    Ok(Json(couriers))
}

/// Couriers currently accepting assignments.
pub async fn available(State(state): State<AppState>) -> AppResult<Json<Vec<Courier>>> {
    Ok(Json(state.couriers.available().await?))
}

/// Fetch one courier, read-through cached.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Courier>> {
    let cache_key = Cache::key(KEY_PREFIX_COURIER, &id.to_string());

    if let Ok(Some(courier)) = state.cache.get_json::<Courier>(&cache_key).await {
        return Ok(Json(courier));
    }

    let courier = state.couriers.get(id).await?;

    if let Err(err) = state
        .cache
        .set_json(&cache_key, &courier, COURIER_CACHE_TTL)
        .await
    {
        warn!(courier_id = %id, error = %err, "failed to cache courier");
    }

    Ok(Json(courier))
}

/// Courier status report: availability plus optional location.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<UpdateCourierStatusRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validate::optional_coordinates(req.current_lat, req.current_lon, "current")?;

    let current = state.couriers.get(id).await?;
    let old_status = current.status;

    state
        .couriers
        .update_status(
            id,
            UpdateCourierStatus {
                status: req.status,
                current_lat: req.current_lat,
                current_lon: req.current_lon,
            },
        )
        .await?;

    if let Err(err) = state
        .producer
        .publish_courier_status_changed(&current, old_status, req.status)
        .await
    {
        warn!(courier_id = %id, error = %err, "failed to publish courier status changed event");
    }
    if let (Some(lat), Some(lon)) = (req.current_lat, req.current_lon) {
        if let Err(err) = state.producer.publish_location_updated(id, lat, lon).await {
            warn!(courier_id = %id, error = %err, "failed to publish location updated event");
        }
    }

    invalidate(&state, KEY_PREFIX_COURIER, &id.to_string()).await;

    Ok(Json(serde_json::json!({
        "message": "Courier status updated successfully"
    })))
}

/// Manual assignment of an order to this courier.
pub async fn assign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<AssignOrderRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.couriers.assign_order_to_courier(req.order_id, id).await?;

    after_assignment(&state, req.order_id, id).await;

    Ok(Json(serde_json::json!({
        "message": "Order assigned to courier successfully"
    })))
}

/// Paged reviews of a courier, newest first.
pub async fn reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReviewsQuery>,
) -> AppResult<Json<Vec<Review>>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    // 404 on unknown courier rather than an empty page
    state.couriers.get(id).await?;

    let reviews = state.orders.courier_reviews(id, limit, offset).await?;
    Ok(Json(reviews))
}
