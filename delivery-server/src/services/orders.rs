//! Order store
//!
//! Transactional order creation (pricing + promo in one transaction), the
//! status state machine, listing, and the review path which recomputes the
//! courier rating aggregate inside the review transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use shared::error::{AppError, AppResult};
use shared::models::{Order, OrderItem, OrderStatus, Review};
use shared::util::round2;

use crate::geo;
use crate::pricing::DeliveryPricing;

use super::promo::PromoService;

const ORDER_COLUMNS: &str = "id, customer_name, customer_phone, delivery_address, pickup_address, \
     pickup_lat, pickup_lon, delivery_lat, delivery_lon, total_amount, delivery_cost, \
     discount_amount, promo_code, status, courier_id, rating, review_comment, \
     created_at, updated_at, delivered_at";

/// Input for creating an order. Coordinates must be resolved (directly or via
/// the geocoder) before the store is called.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub pickup_address: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lon: Option<f64>,
    pub delivery_lat: Option<f64>,
    pub delivery_lon: Option<f64>,
    pub items: Vec<CreateOrderItem>,
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateOrderItem {
    pub name: String,
    pub quantity: i32,
    pub price: f64,
}

/// Input for a status transition.
#[derive(Debug, Clone, Copy)]
pub struct UpdateOrderStatus {
    pub status: OrderStatus,
    pub courier_id: Option<Uuid>,
}

/// Input for creating a review on a delivered order.
#[derive(Debug, Clone)]
pub struct CreateReview {
    pub rating: i32,
    pub comment: Option<String>,
}

pub struct OrderService {
    pool: PgPool,
    pricing: DeliveryPricing,
    promos: Arc<PromoService>,
}

impl OrderService {
    pub fn new(pool: PgPool, pricing: DeliveryPricing, promos: Arc<PromoService>) -> Self {
        Self {
            pool,
            pricing,
            promos,
        }
    }

    /// Create an order with its items in one transaction.
    ///
    /// The promo code, when present, is validated and charged inside the same
    /// transaction; a failed commit leaves no rows and no consumed use.
    pub async fn create_order(&self, req: CreateOrder) -> AppResult<Order> {
        let (Some(pickup_lat), Some(pickup_lon), Some(delivery_lat), Some(delivery_lon)) = (
            req.pickup_lat,
            req.pickup_lon,
            req.delivery_lat,
            req.delivery_lon,
        ) else {
            return Err(AppError::validation(
                "pickup and delivery coordinates are required for pricing",
            ));
        };

        let mut tx = self.pool.begin().await?;

        let items_total: f64 = req
            .items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum();

        let distance_km = geo::haversine_km(pickup_lat, pickup_lon, delivery_lat, delivery_lon);
        let delivery_cost = self.pricing.cost(distance_km);

        let discount_amount = match req.promo_code.as_deref() {
            Some(code) if !code.is_empty() => {
                self.promos
                    .apply_with_tx(&mut tx, code, items_total, delivery_cost)
                    .await?
            }
            _ => 0.0,
        };

        let total_amount = round2((items_total + delivery_cost - discount_amount).max(0.0));

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO orders (id, customer_name, customer_phone, delivery_address, pickup_address, \
             pickup_lat, pickup_lon, delivery_lat, delivery_lon, total_amount, delivery_cost, \
             discount_amount, promo_code, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(order_id)
        .bind(&req.customer_name)
        .bind(&req.customer_phone)
        .bind(&req.delivery_address)
        .bind(&req.pickup_address)
        .bind(pickup_lat)
        .bind(pickup_lon)
        .bind(delivery_lat)
        .bind(delivery_lon)
        .bind(total_amount)
        .bind(delivery_cost)
        .bind(discount_amount)
        .bind(&req.promo_code)
        .bind(OrderStatus::Created)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(req.items.len());
        for item in &req.items {
            let item_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO order_items (id, order_id, name, quantity, price) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(item_id)
            .bind(order_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;

            items.push(OrderItem {
                id: item_id,
                order_id,
                name: item.name.clone(),
                quantity: item.quantity,
                price: item.price,
            });
        }

        tx.commit().await?;

        info!(
            order_id = %order_id,
            customer_name = %req.customer_name,
            total_amount,
            "order created"
        );

        Ok(Order {
            id: order_id,
            customer_name: req.customer_name,
            customer_phone: req.customer_phone,
            delivery_address: req.delivery_address,
            pickup_address: req.pickup_address,
            pickup_lat: Some(pickup_lat),
            pickup_lon: Some(pickup_lon),
            delivery_lat: Some(delivery_lat),
            delivery_lon: Some(delivery_lon),
            items,
            total_amount,
            delivery_cost,
            discount_amount,
            promo_code: req.promo_code,
            status: OrderStatus::Created,
            courier_id: None,
            rating: None,
            review_comment: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
        })
    }

    /// Fetch one order with its items.
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<Order> {
        let mut order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("order not found"))?;

        order.items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, name, quantity, price FROM order_items WHERE order_id = $1 ORDER BY seq",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(order)
    }

    /// List orders, newest first. Items are not loaded for list views.
    pub async fn get_orders(
        &self,
        status: Option<OrderStatus>,
        courier_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Order>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1"));

        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(courier_id) = courier_id {
            qb.push(" AND courier_id = ").push_bind(courier_id);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset.max(0));

        let orders = qb.build_query_as::<Order>().fetch_all(&self.pool).await?;
        Ok(orders)
    }

    /// Transition an order's status under a row lock.
    ///
    /// `delivered_at` is stamped on entry into `delivered` and preserved on
    /// the idempotent `delivered -> delivered` write.
    pub async fn update_status(&self, order_id: Uuid, req: UpdateOrderStatus) -> AppResult<()> {
        if let Some(courier_id) = req.courier_id {
            if courier_id.is_nil() {
                return Err(AppError::validation("courier_id must be a valid id"));
            }
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, (OrderStatus, Option<Uuid>, Option<DateTime<Utc>>)>(
            "SELECT status, courier_id, delivered_at FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((current_status, current_courier, current_delivered_at)) = row else {
            return Err(AppError::not_found("order not found"));
        };

        if !current_status.can_transition_to(req.status) {
            return Err(AppError::conflict("invalid order status transition"));
        }

        let courier_id = req.courier_id.or(current_courier);
        let now = Utc::now();

        let delivered_at = if req.status == OrderStatus::Delivered {
            // keep the original stamp on the idempotent self-loop
            current_delivered_at.or(Some(now))
        } else {
            None
        };

        sqlx::query(
            "UPDATE orders SET status = $1, courier_id = $2, updated_at = $3, delivered_at = $4 WHERE id = $5",
        )
        .bind(req.status)
        .bind(courier_id)
        .bind(now)
        .bind(delivered_at)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(order_id = %order_id, new_status = %req.status, "order status updated");
        Ok(())
    }

    /// Create the single review of a delivered order and recompute the
    /// courier's rating aggregate, all in one transaction.
    pub async fn create_review(&self, order_id: Uuid, req: CreateReview) -> AppResult<Review> {
        if !(1..=5).contains(&req.rating) {
            return Err(AppError::validation("rating must be between 1 and 5"));
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, (Option<Uuid>, OrderStatus, Option<i32>)>(
            "SELECT courier_id, status, rating FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((courier_id, status, existing_rating)) = row else {
            return Err(AppError::not_found("order not found"));
        };
        let Some(courier_id) = courier_id else {
            return Err(AppError::conflict("order has no assigned courier"));
        };
        if status != OrderStatus::Delivered {
            return Err(AppError::conflict("order is not delivered yet"));
        }
        if existing_rating.is_some() {
            return Err(AppError::conflict("review already exists for this order"));
        }

        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            order_id,
            courier_id,
            rating: req.rating,
            comment: req.comment,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO reviews (id, order_id, courier_id, rating, comment, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(review.id)
        .bind(review.order_id)
        .bind(review.courier_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE orders SET rating = $1, review_comment = $2, updated_at = $3 WHERE id = $4")
            .bind(review.rating)
            .bind(&review.comment)
            .bind(now)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        // new_rating = round2((rating * total + new) / (total + 1))
        sqlx::query(
            "UPDATE couriers
             SET rating = round(((rating * total_reviews + $1) / (total_reviews + 1))::numeric, 2),
                 total_reviews = total_reviews + 1,
                 updated_at = $2
             WHERE id = $3",
        )
        .bind(f64::from(review.rating))
        .bind(now)
        .bind(courier_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            order_id = %order_id,
            courier_id = %courier_id,
            rating = review.rating,
            "review created, courier rating recomputed"
        );

        Ok(review)
    }

    /// Reviews of a courier, newest first.
    pub async fn courier_reviews(
        &self,
        courier_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT id, order_id, courier_id, rating, comment, created_at
             FROM reviews
             WHERE courier_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(courier_id)
        .bind(limit)
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }
}
