//! Courier store
//!
//! CRUD, status reporting, and the mutually-exclusive assignment path. The
//! courier row lock plus two conditional updates make assignment first-commit
//! wins: losers observe zero affected rows and roll back.

use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use shared::error::{AppError, AppResult};
use shared::models::{Courier, CourierStatus, OrderStatus};

use super::unique_violation;

const COURIER_COLUMNS: &str = "id, name, phone, status, current_lat, current_lon, rating, \
     total_reviews, created_at, updated_at, last_seen_at";

/// Input for registering a courier.
#[derive(Debug, Clone)]
pub struct CreateCourier {
    pub name: String,
    pub phone: String,
}

/// Input for a courier status report.
#[derive(Debug, Clone, Copy)]
pub struct UpdateCourierStatus {
    pub status: CourierStatus,
    pub current_lat: Option<f64>,
    pub current_lon: Option<f64>,
}

/// Sort order for courier listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourierOrderBy {
    CreatedAt,
    Rating,
}

impl CourierOrderBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" => Some(Self::CreatedAt),
            "rating" => Some(Self::Rating),
            _ => None,
        }
    }
}

pub struct CourierService {
    pool: PgPool,
}

impl CourierService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, req: CreateCourier) -> AppResult<Courier> {
        let now = Utc::now();
        let courier = Courier {
            id: Uuid::new_v4(),
            name: req.name,
            phone: req.phone,
            status: CourierStatus::Offline,
            current_lat: None,
            current_lon: None,
            rating: 0.0,
            total_reviews: 0,
            created_at: now,
            updated_at: now,
            last_seen_at: None,
        };

        sqlx::query(
            "INSERT INTO couriers (id, name, phone, status, rating, total_reviews, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(courier.id)
        .bind(&courier.name)
        .bind(&courier.phone)
        .bind(courier.status)
        .bind(courier.rating)
        .bind(courier.total_reviews)
        .bind(courier.created_at)
        .bind(courier.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if unique_violation(&err) {
                AppError::conflict("courier with this phone already exists")
            } else {
                AppError::from(err)
            }
        })?;

        info!(courier_id = %courier.id, courier_name = %courier.name, "courier created");
        Ok(courier)
    }

    pub async fn get(&self, courier_id: Uuid) -> AppResult<Courier> {
        sqlx::query_as::<_, Courier>(&format!(
            "SELECT {COURIER_COLUMNS} FROM couriers WHERE id = $1"
        ))
        .bind(courier_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("courier not found"))
    }

    /// List couriers with optional filters.
    ///
    /// `Rating` order sorts by (rating DESC, total_reviews DESC, created_at
    /// DESC) so well-reviewed couriers with history rank first.
    pub async fn list(
        &self,
        status: Option<CourierStatus>,
        min_rating: Option<f64>,
        order_by: CourierOrderBy,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Courier>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COURIER_COLUMNS} FROM couriers WHERE 1=1"));

        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(min_rating) = min_rating {
            qb.push(" AND rating >= ").push_bind(min_rating);
        }

        match order_by {
            CourierOrderBy::Rating => {
                qb.push(" ORDER BY rating DESC, total_reviews DESC, created_at DESC");
            }
            CourierOrderBy::CreatedAt => {
                qb.push(" ORDER BY created_at DESC");
            }
        }

        if limit > 0 {
            qb.push(" LIMIT ").push_bind(limit);
        }
        if offset > 0 {
            qb.push(" OFFSET ").push_bind(offset);
        }

        let couriers = qb.build_query_as::<Courier>().fetch_all(&self.pool).await?;
        Ok(couriers)
    }

    /// Couriers currently accepting assignments.
    pub async fn available(&self) -> AppResult<Vec<Courier>> {
        self.list(
            Some(CourierStatus::Available),
            None,
            CourierOrderBy::CreatedAt,
            0,
            0,
        )
        .await
    }

    /// Record a courier status report; stamps `last_seen_at`.
    pub async fn update_status(
        &self,
        courier_id: Uuid,
        req: UpdateCourierStatus,
    ) -> AppResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE couriers
             SET status = $1, current_lat = $2, current_lon = $3, updated_at = $4, last_seen_at = $5
             WHERE id = $6",
        )
        .bind(req.status)
        .bind(req.current_lat)
        .bind(req.current_lon)
        .bind(now)
        .bind(now)
        .bind(courier_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("courier not found"));
        }

        info!(courier_id = %courier_id, new_status = %req.status, "courier status updated");
        Ok(())
    }

    /// Atomically assign an order to a courier.
    ///
    /// The courier row lock is the serialization point; the conditional
    /// updates on both sides are the guard against anything that moved before
    /// the lock was taken. First transaction to commit wins, everyone else
    /// gets a conflict and no side effects.
    pub async fn assign_order_to_courier(&self, order_id: Uuid, courier_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let status = sqlx::query_as::<_, (CourierStatus,)>(
            "SELECT status FROM couriers WHERE id = $1 FOR UPDATE",
        )
        .bind(courier_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((status,)) = status else {
            return Err(AppError::not_found("courier not found"));
        };
        if status != CourierStatus::Available {
            return Err(AppError::conflict("courier is not available"));
        }

        let now = Utc::now();

        let order_update = sqlx::query(
            "UPDATE orders SET courier_id = $1, status = $2, updated_at = $3 WHERE id = $4 AND status = $5",
        )
        .bind(courier_id)
        .bind(OrderStatus::Accepted)
        .bind(now)
        .bind(order_id)
        .bind(OrderStatus::Created)
        .execute(&mut *tx)
        .await?;

        if order_update.rows_affected() == 0 {
            return Err(AppError::conflict("order not found or already assigned"));
        }

        let courier_update = sqlx::query(
            "UPDATE couriers SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(CourierStatus::Busy)
        .bind(now)
        .bind(courier_id)
        .bind(CourierStatus::Available)
        .execute(&mut *tx)
        .await?;

        if courier_update.rows_affected() == 0 {
            return Err(AppError::conflict("courier is not available"));
        }

        tx.commit().await?;

        info!(order_id = %order_id, courier_id = %courier_id, "order assigned to courier");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::CourierOrderBy;

    #[test]
    fn order_by_parsing() {
        assert_eq!(
            CourierOrderBy::parse("created_at"),
            Some(CourierOrderBy::CreatedAt)
        );
        assert_eq!(CourierOrderBy::parse("rating"), Some(CourierOrderBy::Rating));
        assert_eq!(CourierOrderBy::parse("name"), None);
    }
}
