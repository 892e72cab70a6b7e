//! Promo code engine
//!
//! CRUD plus the transactional `apply_with_tx`, which runs inside the order
//! creation transaction: the `FOR UPDATE` on the code row serializes
//! concurrent applications so the usage cap can never be over-consumed.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use shared::error::{AppError, AppResult};
use shared::models::{DiscountType, PromoCode};
use shared::util::round2;

use super::unique_violation;

/// Longest accepted promo code.
pub const MAX_CODE_LEN: usize = 64;

const DEFAULT_LIST_LIMIT: i64 = 50;

/// Input for creating a promo code.
#[derive(Debug, Clone)]
pub struct CreatePromoCode {
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: f64,
    /// 0 = unbounded
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

/// Input for updating a promo code. The code itself is immutable.
#[derive(Debug, Clone)]
pub struct UpdatePromoCode {
    pub discount_type: DiscountType,
    pub amount: f64,
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

pub struct PromoService {
    pool: PgPool,
}

impl PromoService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, req: CreatePromoCode) -> AppResult<PromoCode> {
        if req.code.trim().is_empty() {
            return Err(AppError::validation("code must not be empty"));
        }
        if req.code.len() > MAX_CODE_LEN {
            return Err(AppError::validation(format!(
                "code is too long (max {MAX_CODE_LEN} chars)"
            )));
        }
        validate_payload(req.discount_type, req.amount)?;

        let now = Utc::now();
        let promo = PromoCode {
            code: req.code,
            discount_type: req.discount_type,
            amount: req.amount,
            max_uses: req.max_uses,
            used_count: 0,
            expires_at: req.expires_at,
            active: req.active,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO promo_codes (code, discount_type, amount, max_uses, used_count, expires_at, active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, 0, $5, $6, $7, $8)",
        )
        .bind(&promo.code)
        .bind(promo.discount_type)
        .bind(promo.amount)
        .bind(promo.max_uses)
        .bind(promo.expires_at)
        .bind(promo.active)
        .bind(promo.created_at)
        .bind(promo.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if unique_violation(&err) {
                AppError::conflict("promo code already exists")
            } else {
                AppError::from(err)
            }
        })?;

        info!(promo_code = %promo.code, "promo code created");
        Ok(promo)
    }

    pub async fn get(&self, code: &str) -> AppResult<PromoCode> {
        sqlx::query_as::<_, PromoCode>(
            "SELECT code, discount_type, amount, max_uses, used_count, expires_at, active, created_at, updated_at
             FROM promo_codes
             WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("promo code not found"))
    }

    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<PromoCode>> {
        let limit = if limit <= 0 { DEFAULT_LIST_LIMIT } else { limit };
        let promos = sqlx::query_as::<_, PromoCode>(
            "SELECT code, discount_type, amount, max_uses, used_count, expires_at, active, created_at, updated_at
             FROM promo_codes
             ORDER BY created_at DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(promos)
    }

    pub async fn update(&self, code: &str, req: UpdatePromoCode) -> AppResult<PromoCode> {
        validate_payload(req.discount_type, req.amount)?;

        let result = sqlx::query(
            "UPDATE promo_codes
             SET discount_type = $1, amount = $2, max_uses = $3, expires_at = $4, active = $5, updated_at = $6
             WHERE code = $7",
        )
        .bind(req.discount_type)
        .bind(req.amount)
        .bind(req.max_uses)
        .bind(req.expires_at)
        .bind(req.active)
        .bind(Utc::now())
        .bind(code)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("promo code not found"));
        }

        self.get(code).await
    }

    pub async fn delete(&self, code: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM promo_codes WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("promo code not found"));
        }
        Ok(())
    }

    /// Validate and charge one use of `code`, returning the discount.
    ///
    /// Runs entirely inside the caller's transaction; the row lock makes
    /// concurrent applications of the same code queue up behind each other.
    pub async fn apply_with_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
        items_total: f64,
        delivery_cost: f64,
    ) -> AppResult<f64> {
        let row = sqlx::query_as::<_, (DiscountType, f64, i32, i32, Option<DateTime<Utc>>, bool)>(
            "SELECT discount_type, amount, max_uses, used_count, expires_at, active
             FROM promo_codes
             WHERE code = $1
             FOR UPDATE",
        )
        .bind(code)
        .fetch_optional(&mut **tx)
        .await?;

        let Some((discount_type, amount, max_uses, used_count, expires_at, active)) = row else {
            return Err(AppError::not_found("promo code not found"));
        };

        if !active {
            return Err(AppError::conflict("promo code is inactive"));
        }
        if let Some(expires_at) = expires_at {
            if expires_at <= Utc::now() {
                return Err(AppError::conflict("promo code expired"));
            }
        }
        if max_uses > 0 && used_count >= max_uses {
            return Err(AppError::conflict("promo code usage limit reached"));
        }

        let discount = calculate_discount(discount_type, amount, items_total + delivery_cost, delivery_cost);

        sqlx::query(
            "UPDATE promo_codes SET used_count = used_count + 1, updated_at = $1 WHERE code = $2",
        )
        .bind(Utc::now())
        .bind(code)
        .execute(&mut **tx)
        .await?;

        Ok(discount)
    }
}

/// Discount for a code, clamped to the order total and rounded to two digits.
pub fn calculate_discount(
    discount_type: DiscountType,
    amount: f64,
    base_total: f64,
    delivery_cost: f64,
) -> f64 {
    match discount_type {
        DiscountType::Fixed => {
            if amount < 0.0 {
                return 0.0;
            }
            round2(amount.min(base_total))
        }
        DiscountType::Percent => {
            if amount <= 0.0 {
                return 0.0;
            }
            let percent = amount.min(100.0);
            round2(base_total * percent / 100.0)
        }
        DiscountType::FreeDelivery => round2(delivery_cost.max(0.0)),
    }
}

fn validate_payload(discount_type: DiscountType, amount: f64) -> AppResult<()> {
    match discount_type {
        DiscountType::Fixed => {
            if amount < 0.0 {
                return Err(AppError::validation(
                    "amount must be non-negative for fixed discount",
                ));
            }
        }
        DiscountType::Percent => {
            if amount <= 0.0 || amount > 100.0 {
                return Err(AppError::validation(
                    "percent amount must be between 0 and 100",
                ));
            }
        }
        // amount is ignored
        DiscountType::FreeDelivery => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorKind;

    #[test]
    fn percent_discount_matches_order_math() {
        // items 250 + delivery 200, 10% -> 45
        assert_eq!(
            calculate_discount(DiscountType::Percent, 10.0, 450.0, 200.0),
            45.0
        );
    }

    #[test]
    fn percent_above_hundred_is_clamped() {
        assert_eq!(
            calculate_discount(DiscountType::Percent, 150.0, 450.0, 200.0),
            450.0
        );
    }

    #[test]
    fn fixed_discount_cannot_exceed_total() {
        assert_eq!(
            calculate_discount(DiscountType::Fixed, 1000.0, 450.0, 200.0),
            450.0
        );
        assert_eq!(
            calculate_discount(DiscountType::Fixed, 50.0, 450.0, 200.0),
            50.0
        );
        assert_eq!(
            calculate_discount(DiscountType::Fixed, -5.0, 450.0, 200.0),
            0.0
        );
    }

    #[test]
    fn free_delivery_waives_delivery_cost_only() {
        assert_eq!(
            calculate_discount(DiscountType::FreeDelivery, 999.0, 450.0, 200.0),
            200.0
        );
        assert_eq!(
            calculate_discount(DiscountType::FreeDelivery, 0.0, 450.0, -1.0),
            0.0
        );
    }

    #[test]
    fn payload_validation_per_type() {
        assert!(validate_payload(DiscountType::Fixed, 0.0).is_ok());
        assert!(validate_payload(DiscountType::Fixed, -1.0).is_err());
        assert!(validate_payload(DiscountType::Percent, 100.0).is_ok());
        assert!(validate_payload(DiscountType::Percent, 0.0).is_err());
        assert!(validate_payload(DiscountType::Percent, 100.5).is_err());
        assert!(validate_payload(DiscountType::FreeDelivery, -42.0).is_ok());

        let err = validate_payload(DiscountType::Percent, 101.0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
