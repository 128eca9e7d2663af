//! EventBus (C9)
//!
//! Per-auction topics plus a global topic, fanned out with
//! `tokio::sync::broadcast`. Grounded on the teacher's
//! `PaymentGatewayRegistry` (`RwLock<HashMap<String, Arc<dyn Gateway>>>`),
//! generalized from a registry-of-singletons to a registry-of-topics.
//!
//! Delivery is best-effort and at-most-once per subscriber (§4.9): a lagging
//! subscriber simply misses events rather than blocking the publisher.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use crate::models::AuctionEvent;

pub struct EventBus {
    global: broadcast::Sender<AuctionEvent>,
    topics: RwLock<HashMap<Uuid, broadcast::Sender<AuctionEvent>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (global, _) = broadcast::channel(capacity);
        Self {
            global,
            topics: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    fn topic_sender(&self, auction_id: Uuid) -> broadcast::Sender<AuctionEvent> {
        if let Some(tx) = self.topics.read().get(&auction_id) {
            return tx.clone();
        }
        let mut topics = self.topics.write();
        topics
            .entry(auction_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish to the event's auction topic, and to the global topic when
    /// the event kind is one §4.9 marks global.
    pub fn publish(&self, event: AuctionEvent) {
        let auction_id = event.auction_id();
        trace!(%auction_id, event = ?event, "publishing event");

        let topic = self.topic_sender(auction_id);
        let _ = topic.send(event.clone());

        if event.is_global() {
            let _ = self.global.send(event);
        }
    }

    pub fn subscribe_auction(&self, auction_id: Uuid) -> broadcast::Receiver<AuctionEvent> {
        self.topic_sender(auction_id).subscribe()
    }

    pub fn subscribe_global(&self) -> broadcast::Receiver<AuctionEvent> {
        self.global.subscribe()
    }

    /// Drop topic channels with no subscribers left, so a long-running
    /// process doesn't accumulate one broadcast channel per auction forever.
    pub fn prune_idle_topics(&self) {
        self.topics.write().retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_event(auction_id: Uuid) -> AuctionEvent {
        AuctionEvent::AuctionEndingSoon {
            auction: crate::test_support::sample_auction(auction_id),
            time_remaining_secs: 30,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn auction_scoped_subscriber_receives_its_topic() {
        let bus = EventBus::new(16);
        let auction_id = Uuid::new_v4();
        let mut rx = bus.subscribe_auction(auction_id);
        bus.publish(sample_event(auction_id));
        let got = rx.recv().await.unwrap();
        assert_eq!(got.auction_id(), auction_id);
    }

    #[tokio::test]
    async fn global_subscriber_only_sees_global_events() {
        let bus = EventBus::new(16);
        let auction_id = Uuid::new_v4();
        let mut global_rx = bus.subscribe_global();

        // AuctionEndingSoon is not global (§4.9 table).
        bus.publish(sample_event(auction_id));
        assert!(global_rx.try_recv().is_err());

        bus.publish(AuctionEvent::AuctionStarted {
            auction: crate::test_support::sample_auction(auction_id),
            at: Utc::now(),
        });
        let got = global_rx.recv().await.unwrap();
        assert_eq!(got.auction_id(), auction_id);
    }

    #[tokio::test]
    async fn unrelated_auction_topic_does_not_receive() {
        let bus = EventBus::new(16);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_b = bus.subscribe_auction(b);
        bus.publish(sample_event(a));
        assert!(rx_b.try_recv().is_err());
    }
}
