//! Realtime fan-out hub.
//!
//! Every envelope goes to every subscriber; clients filter on `plano_id`.
//! Publishing never blocks and never fails the caller. A subscriber that falls
//! more than the channel capacity behind skips the oldest envelopes.

use crate::metrics::BroadcastMetrics;
use standbook_core::BroadcastEnvelope;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Envelopes buffered per subscriber before it starts lagging.
pub const DEFAULT_CAPACITY: usize = 256;

/// Handle to the broadcast channel. Clones share the channel.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    sender: broadcast::Sender<Arc<BroadcastEnvelope>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcaster {
    /// Channel buffering `capacity` envelopes per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fan `envelope` out to all current subscribers.
    pub fn publish(&self, envelope: BroadcastEnvelope) {
        let event = envelope.event;
        match self.sender.send(Arc::new(envelope)) {
            Ok(receivers) => {
                BroadcastMetrics::record_sent();
                tracing::debug!(%event, receivers, "Broadcast envelope");
            }
            Err(_) => {
                BroadcastMetrics::record_dropped();
                tracing::debug!(%event, "No realtime subscribers, envelope dropped");
            }
        }
    }

    /// New subscription receiving envelopes published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastEnvelope>> {
        self.sender.subscribe()
    }

    /// Number of open subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use standbook_testing::fixtures;

    #[tokio::test]
    async fn every_subscriber_receives_every_envelope() {
        let broadcaster = Broadcaster::default();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();
        let space = fixtures::space(standbook_core::PlanId::new());

        broadcaster.publish(BroadcastEnvelope::space_updated(space.clone()));

        assert_eq!(first.recv().await.unwrap().plano_id, Some(space.plan_id));
        assert_eq!(second.recv().await.unwrap().plano_id, Some(space.plan_id));
    }

    #[test]
    fn publishing_without_subscribers_is_swallowed() {
        let broadcaster = Broadcaster::new(4);
        let space = fixtures::space(standbook_core::PlanId::new());

        broadcaster.publish(BroadcastEnvelope::space_updated(space));

        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
