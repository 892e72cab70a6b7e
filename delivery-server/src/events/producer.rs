//! Typed event publisher
//!
//! One topic per event family (orders / couriers / locations); the message
//! key is the aggregate id so per-aggregate ordering survives partitioning.

use std::time::Duration;

use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use tracing::{debug, info};
use uuid::Uuid;

use shared::error::{AppError, AppResult};
use shared::models::{Courier, CourierStatus, Event, Order, OrderStatus};

use crate::config::{KafkaConfig, KafkaTopics};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct EventProducer {
    producer: FutureProducer,
    topics: KafkaTopics,
}

impl EventProducer {
    pub fn new(cfg: &KafkaConfig) -> AppResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", cfg.brokers.join(","))
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|err| {
                AppError::dependency(format!("failed to create kafka producer: {err}"))
            })?;

        info!(brokers = %cfg.brokers.join(","), "kafka producer created");
        Ok(Self {
            producer,
            topics: cfg.topics.clone(),
        })
    }

    pub async fn publish_order_created(&self, order: &Order) -> AppResult<()> {
        self.publish(&self.topics.orders, Event::order_created(order))
            .await
    }

    pub async fn publish_order_status_changed(
        &self,
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
        courier_id: Option<Uuid>,
    ) -> AppResult<()> {
        self.publish(
            &self.topics.orders,
            Event::order_status_changed(order_id, old_status, new_status, courier_id),
        )
        .await
    }

    pub async fn publish_courier_assigned(&self, order_id: Uuid, courier_id: Uuid) -> AppResult<()> {
        self.publish(
            &self.topics.couriers,
            Event::courier_assigned(order_id, courier_id),
        )
        .await
    }

    pub async fn publish_courier_status_changed(
        &self,
        courier: &Courier,
        old_status: CourierStatus,
        new_status: CourierStatus,
    ) -> AppResult<()> {
        self.publish(
            &self.topics.couriers,
            Event::courier_status_changed(courier.id, old_status, new_status),
        )
        .await
    }

    pub async fn publish_location_updated(
        &self,
        courier_id: Uuid,
        lat: f64,
        lon: f64,
    ) -> AppResult<()> {
        self.publish(
            &self.topics.locations,
            Event::location_updated(courier_id, lat, lon),
        )
        .await
    }

    async fn publish(&self, topic: &str, event: Event) -> AppResult<()> {
        let payload = serde_json::to_vec(&event)
            .map_err(|err| AppError::internal(format!("failed to encode event: {err}")))?;
        let key = event.partition_key();

        self.producer
            .send(
                FutureRecord::to(topic).key(&key).payload(&payload),
                Timeout::After(PUBLISH_TIMEOUT),
            )
            .await
            .map_err(|(err, _)| {
                AppError::dependency(format!(
                    "failed to publish {} to {topic}: {err}",
                    event.event_type()
                ))
            })?;

        debug!(event_id = %event.id, event_type = %event.event_type(), topic, "event published");
        Ok(())
    }

    /// Fetch broker metadata as a connectivity probe. Blocking; run it on a
    /// blocking thread from async contexts.
    pub fn check_connectivity(&self, timeout: Duration) -> AppResult<()> {
        self.producer
            .client()
            .fetch_metadata(None, timeout)
            .map(|_| ())
            .map_err(|err| AppError::dependency(format!("kafka metadata fetch failed: {err}")))
    }
}
