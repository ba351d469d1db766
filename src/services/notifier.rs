//! Trade event notifications.
//!
//! Delivery is fire-and-forget: a failed or slow notification never affects
//! the mutation that produced it.

use crate::types::{Fill, Trade};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Something that happened to a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TradeEvent {
    Created { trade: Trade },
    Settled { trade: Trade, fill: Fill },
    Deleted { trade_id: String, user_id: String },
}

impl TradeEvent {
    pub fn trade_id(&self) -> &str {
        match self {
            TradeEvent::Created { trade } | TradeEvent::Settled { trade, .. } => &trade.id,
            TradeEvent::Deleted { trade_id, .. } => trade_id,
        }
    }
}

/// Receives trade events after they are committed.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: TradeEvent);
}

/// Publishes events on an in-process broadcast channel.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<TradeEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to trade events.
    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: TradeEvent) {
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }
}

/// POSTs each event as JSON to a webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: TradeEvent) {
        let client = self.client.clone();
        let url = self.url.clone();

        // Requires a tokio runtime; outside one the event is dropped
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime for webhook delivery of {}", event.trade_id());
            return;
        };

        handle.spawn(async move {
            match client.post(&url).json(&event).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Delivered event for trade {}", event.trade_id());
                }
                Ok(response) => {
                    warn!(
                        "Webhook rejected event for trade {}: {}",
                        event.trade_id(),
                        response.status()
                    );
                }
                Err(e) => {
                    warn!("Webhook delivery failed for trade {}: {}", event.trade_id(), e);
                }
            }
        });
    }
}

/// Fans each event out to several notifiers.
#[derive(Default)]
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }
}

impl Notifier for CompositeNotifier {
    fn notify(&self, event: TradeEvent) {
        for notifier in &self.notifiers {
            notifier.notify(event.clone());
        }
    }
}
