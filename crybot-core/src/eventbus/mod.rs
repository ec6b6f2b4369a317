//! crybot-core/src/eventbus/mod.rs
//!
//! In-process fan-out of inbound chat events. Every subscriber owns a bounded
//! queue, so a slow consumer applies backpressure instead of losing events.

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, trace};

use crybot_common::models::InboundMessage;

#[derive(Debug, Clone)]
pub enum BotEvent {
    /// A message received by a transport.
    ChatMessage(InboundMessage),
}

impl BotEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            BotEvent::ChatMessage(_) => "chat_message",
        }
    }
}

/// Cloning the bus shares its subscriber list and shutdown flag.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<BotEvent>>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    pub shutdown_rx: watch::Receiver<bool>,
}

const DEFAULT_BUFFER_SIZE: usize = 1024;

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        debug!("Event bus shutdown requested");
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<BotEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        self.subscribers.lock().await.push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber, waiting for queue space.
    /// Subscribers whose receiver was dropped are forgotten.
    pub async fn publish(&self, event: BotEvent) {
        let senders = {
            let mut subs = self.subscribers.lock().await;
            subs.retain(|s| !s.is_closed());
            subs.clone()
        };
        trace!("Publishing {} to {} subscriber(s)", event.event_type(), senders.len());
        for s in senders {
            let _ = s.send(event.clone()).await;
        }
    }

    pub async fn publish_chat(&self, actor_id: &str, channel_id: &str, text: &str, is_direct: bool) {
        let message = InboundMessage::new(actor_id, channel_id, text, is_direct);
        self.publish(BotEvent::ChatMessage(message)).await;
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn test_every_subscriber_receives_chat() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe(Some(5)).await;
        let mut rx2 = bus.subscribe(Some(5)).await;

        bus.publish_chat("u1", "c1", "/help", true).await;

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.expect("subscriber should get event") {
                BotEvent::ChatMessage(msg) => {
                    assert_eq!(msg.actor_id, "u1");
                    assert_eq!(msg.text, "/help");
                    assert!(msg.is_direct);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_full_queue_waits_instead_of_dropping() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(1)).await;

        bus.publish_chat("u1", "c1", "first", false).await;

        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            let a = rx.recv().await.unwrap();
            let b = rx.recv().await.unwrap();
            (a, b)
        });

        let res = timeout(Duration::from_millis(500), bus.publish_chat("u1", "c1", "second", false)).await;
        assert!(res.is_ok(), "publish should unblock once the reader drains");

        let (a, b) = handle.await.unwrap();
        assert!(matches!(a, BotEvent::ChatMessage(ref m) if m.text == "first"));
        assert!(matches!(b, BotEvent::ChatMessage(ref m) if m.text == "second"));
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe(None).await;
        let _keep = bus.subscribe(None).await;
        drop(rx);

        bus.publish_chat("u1", "c1", "hello", false).await;
        assert_eq!(bus.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_flag_is_shared_by_clones() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let mut rx = clone.shutdown_rx.clone();

        bus.shutdown();
        rx.changed().await.unwrap();
        assert!(clone.is_shutdown());
    }
}
