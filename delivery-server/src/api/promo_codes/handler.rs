//! Promo code API Handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use shared::error::AppResult;
use shared::models::{DiscountType, PromoCode};

use crate::api::AppJson;
use crate::services::promo::{CreatePromoCode, UpdatePromoCode};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePromoCodeRequest {
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: f64,
    #[serde(default)]
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromoCodeRequest {
    pub discount_type: DiscountType,
    pub amount: f64,
    #[serde(default)]
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListPromoCodesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn default_active() -> bool {
    true
}

pub async fn create(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreatePromoCodeRequest>,
) -> AppResult<(StatusCode, Json<PromoCode>)> {
    let promo = state
        .promos
        .create(CreatePromoCode {
            code: req.code,
            discount_type: req.discount_type,
            amount: req.amount,
            max_uses: req.max_uses,
            expires_at: req.expires_at,
            active: req.active,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(promo)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListPromoCodesQuery>,
) -> AppResult<Json<Vec<PromoCode>>> {
    let promos = state
        .promos
        .list(query.limit.unwrap_or(0), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(promos))
}

pub async fn get_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<PromoCode>> {
    Ok(Json(state.promos.get(&code).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(code): Path<String>,
    AppJson(req): AppJson<UpdatePromoCodeRequest>,
) -> AppResult<Json<PromoCode>> {
    let promo = state
        .promos
        .update(
            &code,
            UpdatePromoCode {
                discount_type: req.discount_type,
                amount: req.amount,
                max_uses: req.max_uses,
                expires_at: req.expires_at,
                active: req.active,
            },
        )
        .await?;
    Ok(Json(promo))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.promos.delete(&code).await?;
    Ok(Json(serde_json::json!({
        "message": "Promo code deleted successfully"
    })))
}
