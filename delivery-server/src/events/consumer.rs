//! Event consumer
//!
//! Joins a consumer group on all three topics and dispatches each decoded
//! event to the handler registered for its type. Offsets are committed after
//! the handler returns, so delivery is at-least-once; a missing handler skips
//! the message, a failing handler is logged and the offset still advances.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use shared::error::{AppError, AppResult};
use shared::models::{Event, EventType};

use crate::config::KafkaConfig;

/// Handler for one event type.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> AppResult<()>;
}

type HandlerMap = HashMap<EventType, Arc<dyn EventHandler>>;

/// Decode a message payload and route it to its handler.
///
/// Unknown event types are skipped, not errors.
pub async fn dispatch(payload: &[u8], handlers: &HandlerMap) -> AppResult<()> {
    let event: Event = serde_json::from_slice(payload)
        .map_err(|err| AppError::internal(format!("failed to decode event: {err}")))?;

    match handlers.get(&event.event_type()) {
        Some(handler) => handler.handle(&event).await,
        None => {
            debug!(event_type = %event.event_type(), "no handler registered, skipping");
            Ok(())
        }
    }
}

pub struct EventConsumer {
    consumer: Arc<StreamConsumer>,
    topics: Vec<String>,
    handlers: HandlerMap,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl EventConsumer {
    pub fn new(cfg: &KafkaConfig) -> AppResult<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", cfg.brokers.join(","))
            .set("group.id", &cfg.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|err| {
                AppError::dependency(format!("failed to create kafka consumer: {err}"))
            })?;

        Ok(Self {
            consumer: Arc::new(consumer),
            topics: cfg.topics.all(),
            handlers: HashMap::new(),
            shutdown: CancellationToken::new(),
            task: None,
        })
    }

    /// Register a handler before `start`. The latest registration for a type
    /// wins.
    pub fn register_handler(&mut self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(event_type, handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Subscribe and spawn the poll loop.
    pub fn start(&mut self) -> AppResult<()> {
        let topic_refs: Vec<&str> = self.topics.iter().map(String::as_str).collect();
        self.consumer
            .subscribe(&topic_refs)
            .map_err(|err| AppError::dependency(format!("failed to subscribe: {err}")))?;

        let consumer = self.consumer.clone();
        let handlers = Arc::new(self.handlers.clone());
        let shutdown = self.shutdown.clone();
        let topics = self.topics.clone();

        self.task = Some(tokio::spawn(async move {
            info!(topics = ?topics, "event consumer started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = consumer.recv() => match result {
                        Ok(message) => {
                            match message.payload() {
                                Some(payload) => {
                                    if let Err(err) = dispatch(payload, &handlers).await {
                                        warn!(
                                            topic = message.topic(),
                                            error = %err,
                                            "event handling failed"
                                        );
                                    }
                                }
                                None => warn!(topic = message.topic(), "message without payload"),
                            }
                            if let Err(err) = consumer.commit_message(&message, CommitMode::Async) {
                                error!(error = %err, "failed to commit offset");
                            }
                        }
                        Err(err) => error!(error = %err, "kafka consumer error"),
                    }
                }
            }
            info!("event consumer stopped");
        }));

        Ok(())
    }

    /// Cancel the poll loop and wait for it to finish.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &Event) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        async fn handle(&self, _event: &Event) -> AppResult<()> {
            Err(AppError::internal("boom"))
        }
    }

    fn encoded(event: &Event) -> Vec<u8> {
        serde_json::to_vec(event).unwrap()
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handlers: HandlerMap = HashMap::new();
        handlers.insert(
            EventType::CourierAssigned,
            Arc::new(CountingHandler {
                calls: calls.clone(),
            }),
        );

        let event = Event::courier_assigned(Uuid::new_v4(), Uuid::new_v4());
        dispatch(&encoded(&event), &handlers).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_handler_is_skipped() {
        let handlers: HandlerMap = HashMap::new();
        let event = Event::location_updated(Uuid::new_v4(), 1.0, 2.0);
        assert!(dispatch(&encoded(&event), &handlers).await.is_ok());
    }

    #[tokio::test]
    async fn handler_error_propagates() {
        let mut handlers: HandlerMap = HashMap::new();
        handlers.insert(EventType::LocationUpdated, Arc::new(FailingHandler));

        let event = Event::location_updated(Uuid::new_v4(), 1.0, 2.0);
        assert!(dispatch(&encoded(&event), &handlers).await.is_err());
    }

    #[tokio::test]
    async fn invalid_json_is_an_error() {
        let handlers: HandlerMap = HashMap::new();
        assert!(dispatch(b"not json", &handlers).await.is_err());
    }
}
