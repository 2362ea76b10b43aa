// =============================================================================
// Broadcast Hub — fan-out of stats/alert events to subscribed client sinks
// =============================================================================
//
// Many-producer (one per Watcher), many-consumer (one per WS client) fan-out.
// Each sink is a bounded mpsc channel; a send that would block (channel full)
// or that fails (receiver dropped) removes the sink from the set rather than
// blocking the publishing Watcher task (spec §4.7, §5, invariant 5).
// =============================================================================

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

/// Bound on a single client sink's outbound queue. A client slower than this
/// many pending messages is considered stalled and is dropped.
const SINK_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum BroadcastEvent {
    Stats { key: String, data: serde_json::Value },
    Alert { key: String, data: serde_json::Value },
}

/// Fan-out hub. Holds only sender halves; each WS connection owns the
/// matching receiver and drives its own write loop.
#[derive(Default)]
pub struct BroadcastHub {
    sinks: Mutex<Vec<mpsc::Sender<BroadcastEvent>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new client sink and returns the receiving half.
    pub fn subscribe(&self) -> mpsc::Receiver<BroadcastEvent> {
        let (tx, rx) = mpsc::channel(SINK_CAPACITY);
        self.sinks.lock().push(tx);
        rx
    }

    pub fn connected_clients(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn publish_stats(&self, key: impl Into<String>, data: serde_json::Value) {
        self.publish(BroadcastEvent::Stats { key: key.into(), data });
    }

    pub fn publish_alert(&self, key: impl Into<String>, data: serde_json::Value) {
        self.publish(BroadcastEvent::Alert { key: key.into(), data });
    }

    /// Sends to every registered sink, best-effort. A full or closed sink is
    /// dropped from the set; removing sink X never perturbs sink Y (each has
    /// its own channel, so one `try_send` failure can't affect another).
    fn publish(&self, event: BroadcastEvent) {
        let mut sinks = self.sinks.lock();
        sinks.retain(|tx| tx.try_send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_stats_event() {
        let hub = BroadcastHub::new();
        let mut rx = hub.subscribe();
        hub.publish_stats("bingx:WIF-USDT", serde_json::json!({"mid": 1.0}));
        let event = rx.recv().await.unwrap();
        match event {
            BroadcastEvent::Stats { key, .. } => assert_eq!(key, "bingx:WIF-USDT"),
            _ => panic!("expected Stats event"),
        }
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_next_publish_without_affecting_others() {
        let hub = BroadcastHub::new();
        let rx_a = hub.subscribe();
        let mut rx_b = hub.subscribe();
        drop(rx_a);

        hub.publish_alert("bingx:WIF-USDT", serde_json::json!({"kind": "whale_trade"}));
        assert_eq!(hub.connected_clients(), 1);

        let event = rx_b.recv().await.unwrap();
        assert!(matches!(event, BroadcastEvent::Alert { .. }));
    }

    #[tokio::test]
    async fn full_channel_is_dropped_as_a_slow_sink() {
        let hub = BroadcastHub::new();
        let _rx = hub.subscribe(); // kept alive but never drained
        for i in 0..(SINK_CAPACITY + 5) {
            hub.publish_stats("k", serde_json::json!({ "i": i }));
        }
        assert_eq!(hub.connected_clients(), 0);
    }
}
