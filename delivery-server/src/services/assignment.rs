//! Courier auto-assignment
//!
//! Scores every available courier with a known location against the delivery
//! point and commits the best pick through the courier store's atomic
//! assignment. Scoring is in-memory and pure; the transactional row lock in
//! the store is the only serialization point, so a stale workload count can
//! at worst pick a slightly busier courier, never break the invariant.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use shared::error::{AppError, AppResult};
use shared::models::{Courier, OrderStatus};

use crate::geo;

use super::couriers::CourierService;
use super::orders::OrderService;

/// Distance beyond which the distance sub-score bottoms out.
const MAX_DISTANCE_KM: f64 = 50.0;
/// Active-order count at which the workload sub-score bottoms out.
const MAX_ACTIVE_ORDERS: f64 = 5.0;

/// Weights of the three scoring criteria. They sum to 1.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentWeights {
    pub distance: f64,
    pub rating: f64,
    pub workload: f64,
}

impl Default for AssignmentWeights {
    fn default() -> Self {
        Self {
            distance: 0.40,
            rating: 0.30,
            workload: 0.30,
        }
    }
}

/// Scoring breakdown for one candidate. Kept around for logging the reason a
/// courier was picked.
#[derive(Debug, Clone)]
pub struct CourierScore {
    pub courier_id: Uuid,
    pub courier_name: String,
    pub distance_km: f64,
    pub rating: f64,
    pub active_orders: i64,
    pub distance_score: f64,
    pub rating_score: f64,
    pub workload_score: f64,
    pub total_score: f64,
}

/// Score one candidate against the delivery point.
///
/// Callers must have filtered to couriers with a known location; a candidate
/// without coordinates scores as if standing at the maximum distance.
pub fn score_courier(
    courier: &Courier,
    delivery_lat: f64,
    delivery_lon: f64,
    active_orders: i64,
    weights: AssignmentWeights,
) -> CourierScore {
    let distance_km = match (courier.current_lat, courier.current_lon) {
        (Some(lat), Some(lon)) => geo::haversine_km(lat, lon, delivery_lat, delivery_lon),
        _ => MAX_DISTANCE_KM,
    };

    let distance_score = (1.0 - distance_km / MAX_DISTANCE_KM).max(0.0);
    let rating_score = courier.rating / 5.0;
    let workload_score = (1.0 - active_orders as f64 / MAX_ACTIVE_ORDERS).max(0.0);

    let total_score = distance_score * weights.distance
        + rating_score * weights.rating
        + workload_score * weights.workload;

    CourierScore {
        courier_id: courier.id,
        courier_name: courier.name.clone(),
        distance_km,
        rating: courier.rating,
        active_orders,
        distance_score,
        rating_score,
        workload_score,
        total_score,
    }
}

/// Pick the candidate with the strictly greatest total score; on a tie the
/// earliest candidate wins, so the result is stable in the input order.
pub fn best_candidate(scores: &[CourierScore]) -> Option<&CourierScore> {
    let mut best: Option<&CourierScore> = None;
    for score in scores {
        match best {
            Some(current) if score.total_score <= current.total_score => {}
            _ => best = Some(score),
        }
    }
    best
}

pub struct AssignmentService {
    pool: PgPool,
    orders: Arc<OrderService>,
    couriers: Arc<CourierService>,
}

impl AssignmentService {
    pub fn new(pool: PgPool, orders: Arc<OrderService>, couriers: Arc<CourierService>) -> Self {
        Self {
            pool,
            orders,
            couriers,
        }
    }

    /// Select and atomically assign the best courier for an order.
    ///
    /// Returns the courier reloaded after the assignment, so its `busy`
    /// status is reflected. A lost race surfaces as the store's conflict.
    pub async fn auto_assign(
        &self,
        order_id: Uuid,
        delivery_lat: f64,
        delivery_lon: f64,
    ) -> AppResult<Courier> {
        let order = self.orders.get_order(order_id).await?;

        if order.status != OrderStatus::Created {
            return Err(AppError::conflict("order is not in 'created' status"));
        }
        if order.courier_id.is_some() {
            return Err(AppError::conflict("order already has an assigned courier"));
        }

        let available = self.couriers.available().await?;
        if available.is_empty() {
            return Err(AppError::validation("no available couriers found"));
        }

        let candidates: Vec<&Courier> = available
            .iter()
            .filter(|c| c.current_lat.is_some() && c.current_lon.is_some())
            .collect();
        if candidates.is_empty() {
            return Err(AppError::validation(
                "no couriers with known location available",
            ));
        }

        let weights = AssignmentWeights::default();
        let mut scores = Vec::with_capacity(candidates.len());
        for courier in candidates {
            let active_orders = self.active_order_count(courier.id).await;
            scores.push(score_courier(
                courier,
                delivery_lat,
                delivery_lon,
                active_orders,
                weights,
            ));
        }

        let Some(best) = best_candidate(&scores) else {
            return Err(AppError::internal("candidate scoring produced no result"));
        };

        self.couriers
            .assign_order_to_courier(order_id, best.courier_id)
            .await?;

        info!(
            order_id = %order_id,
            courier_id = %best.courier_id,
            courier_name = %best.courier_name,
            total_score = best.total_score,
            distance_score = best.distance_score,
            rating_score = best.rating_score,
            workload_score = best.workload_score,
            distance_km = best.distance_km,
            active_orders = best.active_orders,
            "courier auto-assigned"
        );

        self.couriers.get(best.courier_id).await
    }

    /// Number of active orders carried by a courier.
    ///
    /// A failed count is not worth failing the assignment: log and assume an
    /// unloaded courier.
    async fn active_order_count(&self, courier_id: Uuid) -> i64 {
        let result = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM orders
             WHERE courier_id = $1
               AND status IN ('accepted', 'preparing', 'ready', 'in_delivery')",
        )
        .bind(courier_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok((count,)) => count,
            Err(err) => {
                warn!(courier_id = %courier_id, error = %err, "failed to count active orders, assuming 0");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::models::CourierStatus;

    fn courier(lat: f64, lon: f64, rating: f64) -> Courier {
        let now = Utc::now();
        Courier {
            id: Uuid::new_v4(),
            name: "test-courier".to_string(),
            phone: "+100000".to_string(),
            status: CourierStatus::Available,
            current_lat: Some(lat),
            current_lon: Some(lon),
            rating,
            total_reviews: 0,
            created_at: now,
            updated_at: now,
            last_seen_at: None,
        }
    }

    #[test]
    fn closer_courier_scores_higher() {
        let weights = AssignmentWeights::default();
        let near = score_courier(&courier(55.751, 37.618, 4.0), 55.75, 37.62, 0, weights);
        let far = score_courier(&courier(55.95, 37.90, 4.0), 55.75, 37.62, 0, weights);
        assert!(near.total_score > far.total_score);
    }

    #[test]
    fn loaded_courier_is_penalized() {
        let weights = AssignmentWeights::default();
        let c = courier(55.75, 37.62, 4.0);
        let idle = score_courier(&c, 55.75, 37.62, 0, weights);
        let busy = score_courier(&c, 55.75, 37.62, 3, weights);
        assert!(idle.total_score > busy.total_score);
    }

    #[test]
    fn sub_scores_bottom_out_at_zero() {
        let weights = AssignmentWeights::default();
        let remote = score_courier(&courier(10.0, 10.0, 0.0), -10.0, -10.0, 99, weights);
        assert_eq!(remote.distance_score, 0.0);
        assert_eq!(remote.workload_score, 0.0);
        assert_eq!(remote.total_score, 0.0);
    }

    #[test]
    fn best_candidate_prefers_strictly_greater() {
        let weights = AssignmentWeights::default();
        let a = score_courier(&courier(55.751, 37.618, 4.0), 55.75, 37.62, 0, weights);
        let b = score_courier(&courier(55.78, 37.70, 4.5), 55.75, 37.62, 0, weights);
        let scores = vec![a.clone(), b];
        let best = best_candidate(&scores).unwrap();
        assert!(best.total_score >= scores[1].total_score);
    }

    #[test]
    fn tie_goes_to_the_first_candidate() {
        let weights = AssignmentWeights::default();
        let first = score_courier(&courier(55.75, 37.62, 4.0), 55.75, 37.62, 0, weights);
        let second = score_courier(&courier(55.75, 37.62, 4.0), 55.75, 37.62, 0, weights);
        let scores = vec![first.clone(), second];
        assert_eq!(
            best_candidate(&scores).unwrap().courier_id,
            first.courier_id
        );
    }

    #[test]
    fn empty_candidate_set_has_no_best() {
        assert!(best_candidate(&[]).is_none());
    }

    #[test]
    fn default_weights_sum_to_one() {
        let w = AssignmentWeights::default();
        assert!((w.distance + w.rating + w.workload - 1.0).abs() < 1e-12);
    }
}
