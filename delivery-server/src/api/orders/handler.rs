//! Order API Handlers

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use shared::error::AppResult;
use shared::models::{Courier, Order, OrderStatus, Review};

use crate::api::validate::{
    self, MAX_ADDRESS_LEN, MAX_NAME_LEN, MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN,
};
use crate::api::{after_assignment, invalidate, AppJson};
use crate::cache::{Cache, KEY_PREFIX_COURIER, KEY_PREFIX_ORDER};
use crate::services::orders::{
    CreateOrder, CreateOrderItem, CreateReview, UpdateOrderStatus,
};
use crate::state::AppState;

const ORDER_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

// =========================================================================
// Request / response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub pickup_address: String,
    #[serde(default)]
    pub items: Vec<CreateOrderItemRequest>,
    #[serde(default)]
    pub auto_assign: bool,
    pub pickup_lat: Option<f64>,
    pub pickup_lon: Option<f64>,
    pub delivery_lat: Option<f64>,
    pub delivery_lon: Option<f64>,
    pub promo_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderItemRequest {
    pub name: String,
    pub quantity: i32,
    pub price: f64,
}

/// Response for `auto_assign: true` creations; a plain order otherwise.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_courier: Option<Courier>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub courier_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub courier_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AutoAssignRequest {
    pub delivery_lat: f64,
    pub delivery_lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

// =========================================================================
// Handlers
// =========================================================================

/// Create an order; optionally bundle auto-assignment.
pub async fn create(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateOrderRequest>,
) -> AppResult<Response> {
    validate_create_order(&req)?;

    // Fill missing coordinates through the geocoder.
    let (pickup_lat, pickup_lon) = match (req.pickup_lat, req.pickup_lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => state.geocoder.geocode(&req.pickup_address).await?,
    };
    let (delivery_lat, delivery_lon) = match (req.delivery_lat, req.delivery_lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => state.geocoder.geocode(&req.delivery_address).await?,
    };

    let mut order = state
        .orders
        .create_order(CreateOrder {
            customer_name: req.customer_name,
            customer_phone: req.customer_phone,
            delivery_address: req.delivery_address,
            pickup_address: req.pickup_address,
            pickup_lat: Some(pickup_lat),
            pickup_lon: Some(pickup_lon),
            delivery_lat: Some(delivery_lat),
            delivery_lon: Some(delivery_lon),
            items: req
                .items
                .into_iter()
                .map(|item| CreateOrderItem {
                    name: item.name,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            promo_code: req.promo_code,
        })
        .await?;

    if let Err(err) = state.producer.publish_order_created(&order).await {
        warn!(order_id = %order.id, error = %err, "failed to publish order created event");
    }

    let cache_key = Cache::key(KEY_PREFIX_ORDER, &order.id.to_string());
    if let Err(err) = state.cache.set_json(&cache_key, &order, ORDER_CACHE_TTL).await {
        warn!(order_id = %order.id, error = %err, "failed to cache order");
    }

    if !req.auto_assign {
        return Ok((StatusCode::CREATED, Json(order)).into_response());
    }

    // Auto-assign runs after commit; a failure leaves the order created and
    // unassigned.
    let mut assigned_courier = None;
    match state
        .assignment
        .auto_assign(order.id, delivery_lat, delivery_lon)
        .await
    {
        Ok(courier) => {
            after_assignment(&state, order.id, courier.id).await;
            match state.orders.get_order(order.id).await {
                Ok(updated) => order = updated,
                Err(err) => {
                    warn!(order_id = %order.id, error = %err, "failed to reload order after auto-assign");
                }
            }
            assigned_courier = Some(courier);
        }
        Err(err) => {
            warn!(order_id = %order.id, error = %err, "auto-assign failed after order creation");
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order,
            assigned_courier,
        }),
    )
        .into_response())
}

/// List orders with filters, newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let orders = state
        .orders
        .get_orders(query.status, query.courier_id, limit, offset)
        .await?;
    Ok(Json(orders))
}

/// Fetch one order, read-through cached.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let cache_key = Cache::key(KEY_PREFIX_ORDER, &id.to_string());

    if let Ok(Some(order)) = state.cache.get_json::<Order>(&cache_key).await {
        return Ok(Json(order));
    }

    let order = state.orders.get_order(id).await?;

    if let Err(err) = state.cache.set_json(&cache_key, &order, ORDER_CACHE_TTL).await {
        warn!(order_id = %id, error = %err, "failed to cache order");
    }

    Ok(Json(order))
}

/// Transition an order's status.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<UpdateOrderStatusRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let current = state.orders.get_order(id).await?;
    let old_status = current.status;

    state
        .orders
        .update_status(
            id,
            UpdateOrderStatus {
                status: req.status,
                courier_id: req.courier_id,
            },
        )
        .await?;

    if let Err(err) = state
        .producer
        .publish_order_status_changed(id, old_status, req.status, req.courier_id)
        .await
    {
        warn!(order_id = %id, error = %err, "failed to publish order status changed event");
    }

    invalidate(&state, KEY_PREFIX_ORDER, &id.to_string()).await;

    Ok(Json(serde_json::json!({
        "message": "Order status updated successfully"
    })))
}

/// Explicit auto-assignment of the best courier.
pub async fn auto_assign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<AutoAssignRequest>,
) -> AppResult<Json<Courier>> {
    validate::coordinates(req.delivery_lat, req.delivery_lon, "delivery")?;

    let courier = state
        .assignment
        .auto_assign(id, req.delivery_lat, req.delivery_lon)
        .await?;

    after_assignment(&state, id, courier.id).await;

    Ok(Json(courier))
}

/// Review a delivered order.
pub async fn create_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    validate::optional_text(req.comment.as_deref(), "comment", MAX_NOTE_LEN)?;

    let review = state
        .orders
        .create_review(
            id,
            CreateReview {
                rating: req.rating,
                comment: req.comment,
            },
        )
        .await?;

    // The order now carries a rating and the courier aggregate moved.
    invalidate(&state, KEY_PREFIX_ORDER, &id.to_string()).await;
    invalidate(&state, KEY_PREFIX_COURIER, &review.courier_id.to_string()).await;

    Ok((StatusCode::CREATED, Json(review)))
}

fn validate_create_order(req: &CreateOrderRequest) -> AppResult<()> {
    validate::required_text(&req.customer_name, "customer_name", MAX_NAME_LEN)?;
    validate::required_text(&req.customer_phone, "customer_phone", MAX_SHORT_TEXT_LEN)?;
    validate::required_text(&req.delivery_address, "delivery_address", MAX_ADDRESS_LEN)?;
    validate::required_text(&req.pickup_address, "pickup_address", MAX_ADDRESS_LEN)?;

    if req.items.is_empty() {
        return Err(shared::error::AppError::validation(
            "order must contain at least one item",
        ));
    }
    for item in &req.items {
        validate::required_text(&item.name, "item name", MAX_NAME_LEN)?;
        if item.quantity <= 0 {
            return Err(shared::error::AppError::validation(
                "item quantity must be positive",
            ));
        }
        if item.price < 0.0 {
            return Err(shared::error::AppError::validation(
                "item price must be non-negative",
            ));
        }
    }

    validate::optional_coordinates(req.pickup_lat, req.pickup_lon, "pickup")?;
    validate::optional_coordinates(req.delivery_lat, req.delivery_lon, "delivery")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> CreateOrderRequest {
        CreateOrderRequest {
            customer_name: "Alice".to_string(),
            customer_phone: "+7900000".to_string(),
            delivery_address: "Delivery st. 1".to_string(),
            pickup_address: "Pickup st. 2".to_string(),
            items: vec![CreateOrderItemRequest {
                name: "A".to_string(),
                quantity: 2,
                price: 100.0,
            }],
            auto_assign: false,
            pickup_lat: None,
            pickup_lon: None,
            delivery_lat: None,
            delivery_lon: None,
            promo_code: None,
        }
    }

    #[test]
    fn accepts_a_well_formed_request() {
        assert!(validate_create_order(&base_request()).is_ok());
    }

    #[test]
    fn rejects_empty_items() {
        let mut req = base_request();
        req.items.clear();
        assert!(validate_create_order(&req).is_err());
    }

    #[test]
    fn rejects_non_positive_quantity_and_negative_price() {
        let mut req = base_request();
        req.items[0].quantity = 0;
        assert!(validate_create_order(&req).is_err());

        let mut req = base_request();
        req.items[0].price = -1.0;
        assert!(validate_create_order(&req).is_err());
    }

    #[test]
    fn rejects_half_supplied_coordinates() {
        let mut req = base_request();
        req.pickup_lat = Some(55.0);
        assert!(validate_create_order(&req).is_err());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let mut req = base_request();
        req.delivery_lat = Some(91.0);
        req.delivery_lon = Some(37.0);
        assert!(validate_create_order(&req).is_err());
    }
}
