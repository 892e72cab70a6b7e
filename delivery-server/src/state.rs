//! Shared application state

use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;

use shared::error::AppResult;

use crate::cache::Cache;
use crate::config::Config;
use crate::events::EventProducer;
use crate::pricing::DeliveryPricing;
use crate::services::analytics::AnalyticsService;
use crate::services::assignment::AssignmentService;
use crate::services::couriers::CourierService;
use crate::services::geocoding::GeocodingService;
use crate::services::orders::OrderService;
use crate::services::promo::PromoService;
use crate::services::rate_limit::RateLimiter;

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub cache: Cache,
    pub producer: Arc<EventProducer>,
    pub orders: Arc<OrderService>,
    pub couriers: Arc<CourierService>,
    pub assignment: Arc<AssignmentService>,
    pub promos: Arc<PromoService>,
    pub geocoder: Arc<GeocodingService>,
    pub analytics: Arc<AnalyticsService>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Process start, used by the health probes
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        pool: PgPool,
        cache: Cache,
        producer: Arc<EventProducer>,
    ) -> AppResult<Self> {
        let pricing = DeliveryPricing::new(config.pricing);
        let promos = Arc::new(PromoService::new(pool.clone()));
        let orders = Arc::new(OrderService::new(pool.clone(), pricing, promos.clone()));
        let couriers = Arc::new(CourierService::new(pool.clone()));
        let assignment = Arc::new(AssignmentService::new(
            pool.clone(),
            orders.clone(),
            couriers.clone(),
        ));
        let geocoder = Arc::new(GeocodingService::new(cache.clone(), &config.geocoding)?);
        let analytics = Arc::new(AnalyticsService::new(
            pool.clone(),
            cache.clone(),
            config.analytics.clone(),
        ));
        let rate_limiter = Arc::new(RateLimiter::new(
            Arc::new(cache.clone()),
            &config.rate_limit,
        ));

        Ok(Self {
            config,
            pool,
            cache,
            producer,
            orders,
            couriers,
            assignment,
            promos,
            geocoder,
            analytics,
            rate_limiter,
            started_at: Instant::now(),
        })
    }
}
