//! Inventory event fan-out to subscribers.
//!
//! Best-effort delivery: at-least-once per local emission, no dedup across
//! replication re-delivery, no ordering guarantee across devices. Events
//! for a single device keep the order the store applied their causes.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::inventory::{DeviceId, InventoryEvent};

/// Event sender for a subscriber
pub type EventSender = mpsc::UnboundedSender<InventoryEvent>;

/// Event receiver for a subscriber
pub type EventReceiver = mpsc::UnboundedReceiver<InventoryEvent>;

/// Subscriber registration
#[derive(Debug)]
struct Subscriber {
    sender: EventSender,
    /// Restrict delivery to one device; `None` receives everything.
    device_filter: Option<DeviceId>,
}

/// Result of dispatching one event
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DispatchResult {
    /// Number of subscribers whose filter matched
    pub matched: usize,
    /// Number of deliveries that succeeded
    pub delivered: usize,
    /// Number of deliveries that failed (receiver dropped)
    pub failed: usize,
}

/// Fans inventory events out to subscriber channels.
pub struct EventDispatcher {
    subscribers: RwLock<HashMap<String, Subscriber>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to every inventory event.
    pub fn subscribe(&self, id: impl Into<String>) -> EventReceiver {
        self.subscribe_inner(id.into(), None)
    }

    /// Subscribe to events for one device only.
    pub fn subscribe_device(&self, id: impl Into<String>, device: DeviceId) -> EventReceiver {
        self.subscribe_inner(id.into(), Some(device))
    }

    fn subscribe_inner(&self, id: String, device_filter: Option<DeviceId>) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.insert(
                id,
                Subscriber {
                    sender: tx,
                    device_filter,
                },
            );
        }
        rx
    }

    /// Drop a subscription.
    pub fn unsubscribe(&self, id: &str) {
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.remove(id);
        }
    }

    /// Deliver an event to every matching subscriber (non-blocking).
    pub fn dispatch(&self, event: &InventoryEvent) -> DispatchResult {
        let mut result = DispatchResult::default();

        let subscribers = match self.subscribers.read() {
            Ok(s) => s,
            Err(_) => return result,
        };

        for subscriber in subscribers.values() {
            if let Some(filter) = &subscriber.device_filter {
                if *filter != event.device {
                    continue;
                }
            }
            result.matched += 1;
            match subscriber.sender.send(event.clone()) {
                Ok(_) => result.delivered += 1,
                Err(_) => result.failed += 1,
            }
        }

        result
    }

    /// Deliver a batch in order.
    pub fn dispatch_all(&self, events: &[InventoryEvent]) -> DispatchResult {
        let mut total = DispatchResult::default();
        for event in events {
            let result = self.dispatch(event);
            total.matched += result.matched;
            total.delivered += result.delivered;
            total.failed += result.failed;
        }
        total
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
