//! # Promotion Events
//!
//! Real-time notifications for back-office screens and storefronts.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PromotionAdmin ──┐                                                     │
//! │                   ├──► EventPublisher::publish(event)   (never fails)   │
//! │  PricingEngine ───┘          │                                          │
//! │                              ▼                                          │
//! │              BroadcastPublisher (tokio broadcast)                       │
//! │                 │            │            │                             │
//! │                 ▼            ▼            ▼                             │
//! │            websocket     dashboard     tests                            │
//! │            bridge        refresher                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Shape
//! ```json
//! {"event": "promotion_used", "data": {"id": "...", "usageCount": 3, "remaining": 7}}
//! ```

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use talad_core::Promotion;

/// Something that happened to a promotion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum PromotionEvent {
    #[serde(rename = "promotion_created")]
    Created { promotion: Promotion },

    #[serde(rename = "promotion_updated")]
    Updated { promotion: Promotion },

    #[serde(rename = "promotion_deleted")]
    Deleted { id: String },

    #[serde(rename = "promotion_used")]
    Used {
        id: String,
        #[serde(rename = "usageCount")]
        usage_count: u32,
        remaining: Option<u32>,
    },

    #[serde(rename = "promotion_cloned")]
    Cloned {
        #[serde(rename = "sourceId")]
        source_id: String,
        promotion: Promotion,
    },

    #[serde(rename = "promotions_bulk_updated")]
    BulkToggled {
        #[serde(rename = "isActive")]
        is_active: bool,
        matched: usize,
        modified: usize,
    },
}

impl PromotionEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            PromotionEvent::Created { .. } => "promotion_created",
            PromotionEvent::Updated { .. } => "promotion_updated",
            PromotionEvent::Deleted { .. } => "promotion_deleted",
            PromotionEvent::Used { .. } => "promotion_used",
            PromotionEvent::Cloned { .. } => "promotion_cloned",
            PromotionEvent::BulkToggled { .. } => "promotions_bulk_updated",
        }
    }
}

/// Sink for promotion events. Publishing is fire-and-forget.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: PromotionEvent);
}

/// Fans events out over a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest events; publishing never blocks.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<PromotionEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        BroadcastPublisher { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PromotionEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: PromotionEvent) {
        let name = event.name();
        // Err only means nobody is listening
        match self.tx.send(event) {
            Ok(receivers) => debug!(event = name, receivers, "Promotion event published"),
            Err(_) => trace!(event = name, "No subscribers for promotion event"),
        }
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: PromotionEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let publisher = BroadcastPublisher::new(16);
        let mut rx = publisher.subscribe();

        publisher.publish(PromotionEvent::Deleted {
            id: "p1".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "promotion_deleted");
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = BroadcastPublisher::new(4);
        assert_eq!(publisher.subscriber_count(), 0);
        publisher.publish(PromotionEvent::BulkToggled {
            is_active: false,
            matched: 2,
            modified: 1,
        });
    }

    #[test]
    fn test_wire_shape() {
        let event = PromotionEvent::Used {
            id: "p1".to_string(),
            usage_count: 3,
            remaining: Some(7),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "promotion_used");
        assert_eq!(json["data"]["usageCount"], 3);
        assert_eq!(json["data"]["remaining"], 7);
    }
}
