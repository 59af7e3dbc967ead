//! Subscriber fan-out
//!
//! Best-effort pub/sub of JSON entity snapshots to live subscribers.
//! Channels are named `trades:<instrument>`, `orders:<instrument>`, and
//! `orderbook:<instrument>`. No replay: a subscriber only sees messages
//! published while it is attached, and slow subscribers lose messages.

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use types::ids::InstrumentId;

const CHANNEL_CAPACITY: usize = 256;

/// Channel name for an instrument's trade stream.
pub fn trades_channel(instrument: &InstrumentId) -> String {
    format!("trades:{instrument}")
}

/// Channel name for an instrument's order update stream.
pub fn orders_channel(instrument: &InstrumentId) -> String {
    format!("orders:{instrument}")
}

/// Channel name for an instrument's book update stream.
pub fn orderbook_channel(instrument: &InstrumentId) -> String {
    format!("orderbook:{instrument}")
}

/// In-process fan-out hub over per-channel broadcast queues.
#[derive(Default)]
pub struct Fanout {
    channels: DashMap<String, broadcast::Sender<String>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a payload to a channel. Best-effort: without subscribers the
    /// message is dropped silently.
    pub fn publish(&self, channel: &str, payload: String) {
        if let Some(sender) = self.channels.get(channel) {
            let delivered = sender.send(payload).unwrap_or(0);
            trace!(channel, delivered, "fanout publish");
        }
    }

    /// Subscribe to a channel, creating it on first use.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_then_publish() {
        let fanout = Fanout::new();
        let channel = trades_channel(&InstrumentId::new("BTC/USD"));
        let mut rx = fanout.subscribe(&channel);

        fanout.publish(&channel, "{\"q\":\"1.0\"}".to_string());

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg, "{\"q\":\"1.0\"}");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let fanout = Fanout::new();
        // No panic, no error: delivery is best-effort.
        fanout.publish("orders:BTC/USD", "{}".to_string());
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let fanout = Fanout::new();
        let channel = "orderbook:BTC/USD";
        let mut early = fanout.subscribe(channel);

        fanout.publish(channel, "first".to_string());
        let mut late = fanout.subscribe(channel);
        fanout.publish(channel, "second".to_string());

        assert_eq!(early.recv().await.unwrap(), "first");
        assert_eq!(early.recv().await.unwrap(), "second");
        assert_eq!(late.recv().await.unwrap(), "second");
    }

    #[test]
    fn test_channel_names() {
        let instrument = InstrumentId::new("ETH/USDC");
        assert_eq!(trades_channel(&instrument), "trades:ETH/USDC");
        assert_eq!(orders_channel(&instrument), "orders:ETH/USDC");
        assert_eq!(orderbook_channel(&instrument), "orderbook:ETH/USDC");
    }
}
