//! Lifecycle events published to the partitioned log
//!
//! Every event serializes flat: `{id, type, timestamp, <payload fields>}`.
//! The `type` tag drives consumer dispatch; payload fields are specific to
//! the event family.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::courier::CourierStatus;
use super::order::{Order, OrderStatus};

/// Event type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "order.created")]
    OrderCreated,
    #[serde(rename = "order.status_changed")]
    OrderStatusChanged,
    #[serde(rename = "courier.assigned")]
    CourierAssigned,
    #[serde(rename = "courier.status_changed")]
    CourierStatusChanged,
    #[serde(rename = "location.updated")]
    LocationUpdated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCreated => "order.created",
            Self::OrderStatusChanged => "order.status_changed",
            Self::CourierAssigned => "courier.assigned",
            Self::CourierStatusChanged => "courier.status_changed",
            Self::LocationUpdated => "location.updated",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific event payload, tagged by `type` in the serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    #[serde(rename = "order.created")]
    OrderCreated {
        order_id: Uuid,
        customer_name: String,
        total_amount: f64,
        status: OrderStatus,
    },
    #[serde(rename = "order.status_changed")]
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        courier_id: Option<Uuid>,
    },
    #[serde(rename = "courier.assigned")]
    CourierAssigned { order_id: Uuid, courier_id: Uuid },
    #[serde(rename = "courier.status_changed")]
    CourierStatusChanged {
        courier_id: Uuid,
        old_status: CourierStatus,
        new_status: CourierStatus,
    },
    #[serde(rename = "location.updated")]
    LocationUpdated { courier_id: Uuid, lat: f64, lon: f64 },
}

/// A lifecycle event as it travels over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn order_created(order: &Order) -> Self {
        Self::new(EventPayload::OrderCreated {
            order_id: order.id,
            customer_name: order.customer_name.clone(),
            total_amount: order.total_amount,
            status: order.status,
        })
    }

    pub fn order_status_changed(
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
        courier_id: Option<Uuid>,
    ) -> Self {
        Self::new(EventPayload::OrderStatusChanged {
            order_id,
            old_status,
            new_status,
            courier_id,
        })
    }

    pub fn courier_assigned(order_id: Uuid, courier_id: Uuid) -> Self {
        Self::new(EventPayload::CourierAssigned {
            order_id,
            courier_id,
        })
    }

    pub fn courier_status_changed(
        courier_id: Uuid,
        old_status: CourierStatus,
        new_status: CourierStatus,
    ) -> Self {
        Self::new(EventPayload::CourierStatusChanged {
            courier_id,
            old_status,
            new_status,
        })
    }

    pub fn location_updated(courier_id: Uuid, lat: f64, lon: f64) -> Self {
        Self::new(EventPayload::LocationUpdated {
            courier_id,
            lat,
            lon,
        })
    }

    pub fn event_type(&self) -> EventType {
        match self.payload {
            EventPayload::OrderCreated { .. } => EventType::OrderCreated,
            EventPayload::OrderStatusChanged { .. } => EventType::OrderStatusChanged,
            EventPayload::CourierAssigned { .. } => EventType::CourierAssigned,
            EventPayload::CourierStatusChanged { .. } => EventType::CourierStatusChanged,
            EventPayload::LocationUpdated { .. } => EventType::LocationUpdated,
        }
    }

    /// Partition key: the aggregate the event belongs to, so per-aggregate
    /// ordering survives partitioning.
    pub fn partition_key(&self) -> String {
        match &self.payload {
            EventPayload::OrderCreated { order_id, .. }
            | EventPayload::OrderStatusChanged { order_id, .. }
            | EventPayload::CourierAssigned { order_id, .. } => order_id.to_string(),
            EventPayload::CourierStatusChanged { courier_id, .. }
            | EventPayload::LocationUpdated { courier_id, .. } => courier_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_flat_with_type_tag() {
        let order_id = Uuid::new_v4();
        let event = Event::order_status_changed(
            order_id,
            OrderStatus::Created,
            OrderStatus::Accepted,
            None,
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order.status_changed");
        assert_eq!(json["order_id"], order_id.to_string());
        assert_eq!(json["old_status"], "created");
        assert_eq!(json["new_status"], "accepted");
        assert!(json.get("courier_id").is_none());
        assert!(json.get("id").is_some());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn round_trips_through_json() {
        let event = Event::location_updated(Uuid::new_v4(), 55.7558, 37.6173);
        let raw = serde_json::to_vec(&event).unwrap();
        let decoded: Event = serde_json::from_slice(&raw).unwrap();

        assert_eq!(decoded.id, event.id);
        assert_eq!(decoded.event_type(), EventType::LocationUpdated);
        match decoded.payload {
            EventPayload::LocationUpdated { lat, lon, .. } => {
                assert_eq!(lat, 55.7558);
                assert_eq!(lon, 37.6173);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn partition_key_follows_the_aggregate() {
        let order_id = Uuid::new_v4();
        let courier_id = Uuid::new_v4();

        let assigned = Event::courier_assigned(order_id, courier_id);
        assert_eq!(assigned.partition_key(), order_id.to_string());

        let moved = Event::location_updated(courier_id, 1.0, 2.0);
        assert_eq!(moved.partition_key(), courier_id.to_string());
    }
}
