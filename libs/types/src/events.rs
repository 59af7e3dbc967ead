//! Append-only order event records
//!
//! Every order state transition produces an event carrying a full snapshot
//! of the order at that moment. Together with the trade log the event
//! stream reconstructs any order's lifecycle. Sequences are globally
//! monotonic, assigned by the coordinator.

use crate::ids::OrderId;
use crate::order::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// The kind of order state transition an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Created,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderEventKind {
    /// The event kind an order's current status maps to.
    pub fn from_status(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Open => OrderEventKind::Created,
            OrderStatus::PartiallyFilled => OrderEventKind::PartiallyFilled,
            OrderStatus::Filled => OrderEventKind::Filled,
            OrderStatus::Cancelled => OrderEventKind::Cancelled,
            OrderStatus::Rejected => OrderEventKind::Rejected,
        }
    }

    /// Static label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            OrderEventKind::Created => "created",
            OrderEventKind::PartiallyFilled => "partially_filled",
            OrderEventKind::Filled => "filled",
            OrderEventKind::Cancelled => "cancelled",
            OrderEventKind::Rejected => "rejected",
        }
    }
}

/// One entry in the append-only order event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Globally monotonic sequence number.
    pub sequence: u64,
    pub order_id: OrderId,
    pub kind: OrderEventKind,
    /// Full snapshot of the order at the time of the event.
    pub order: Order,
    pub timestamp: i64,
}

impl OrderEvent {
    pub fn new(sequence: u64, kind: OrderEventKind, order: Order, timestamp: i64) -> Self {
        Self {
            sequence,
            order_id: order.order_id,
            kind,
            order,
            timestamp,
        }
    }
}

impl Ord for OrderEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for OrderEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for OrderEvent {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ClientId, InstrumentId};
    use crate::numeric::{Price, Quantity};
    use crate::order::Side;

    fn sample_order() -> Order {
        Order::new_limit(
            OrderId::new(),
            ClientId::new(),
            InstrumentId::new("BTC/USD"),
            Side::Buy,
            Price::from_u64(70000),
            Quantity::from_str("1.0").unwrap(),
            0,
        )
    }

    #[test]
    fn test_kind_from_status() {
        assert_eq!(
            OrderEventKind::from_status(OrderStatus::Open),
            OrderEventKind::Created
        );
        assert_eq!(
            OrderEventKind::from_status(OrderStatus::PartiallyFilled),
            OrderEventKind::PartiallyFilled
        );
        assert_eq!(
            OrderEventKind::from_status(OrderStatus::Filled),
            OrderEventKind::Filled
        );
        assert_eq!(
            OrderEventKind::from_status(OrderStatus::Cancelled),
            OrderEventKind::Cancelled
        );
        assert_eq!(
            OrderEventKind::from_status(OrderStatus::Rejected),
            OrderEventKind::Rejected
        );
    }

    #[test]
    fn test_event_carries_order_snapshot() {
        let order = sample_order();
        let event = OrderEvent::new(7, OrderEventKind::Created, order.clone(), 1);

        assert_eq!(event.sequence, 7);
        assert_eq!(event.order_id, order.order_id);
        assert_eq!(event.order, order);
    }

    #[test]
    fn test_events_sort_by_sequence() {
        let order = sample_order();
        let e1 = OrderEvent::new(1, OrderEventKind::Created, order.clone(), 1);
        let e2 = OrderEvent::new(2, OrderEventKind::Filled, order.clone(), 2);
        let e3 = OrderEvent::new(3, OrderEventKind::Cancelled, order, 3);

        let mut events = vec![e3.clone(), e1.clone(), e2.clone()];
        events.sort();

        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[1].sequence, 2);
        assert_eq!(events[2].sequence, 3);
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = OrderEvent::new(42, OrderEventKind::PartiallyFilled, sample_order(), 5);
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: OrderEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deserialized);
    }
}
