// File: crybot-core/src/services/message_service.rs

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crybot_common::models::InboundMessage;
use crybot_common::traits::{FallbackHandler, ReplySink};
use crybot_common::Error;

use crate::eventbus::BotEvent;
use crate::metrics::{names, MetricsRegistry};
use crate::services::command_dispatcher::CommandDispatcher;

/// Consumes chat events, runs them through the dispatcher and sends replies.
///
/// This is the top-level error boundary: a failing handler, fallback or
/// transport is logged and counted, and the loop moves on to the next event.
pub struct MessageService {
    dispatcher: Arc<CommandDispatcher>,
    sink: Arc<dyn ReplySink>,
    fallback: Option<Arc<dyn FallbackHandler>>,
    metrics: Arc<MetricsRegistry>,
}

impl MessageService {
    pub fn new(
        dispatcher: Arc<CommandDispatcher>,
        sink: Arc<dyn ReplySink>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        debug!("MessageService::new() called");
        Self {
            dispatcher,
            sink,
            fallback: None,
            metrics,
        }
    }

    /// Free text that is not a command goes to `fallback` (e.g. an AI chat).
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackHandler>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Handles one message end to end. Errors are returned to the caller;
    /// `run` is what keeps going after them.
    pub async fn process_message(&self, message: &InboundMessage) -> Result<(), Error> {
        self.metrics.counter(names::MESSAGES_TOTAL, &[]).inc();
        let started = Instant::now();

        let outcome = self
            .dispatcher
            .dispatch(&message.text, &message.actor_id, &message.channel_id, message.is_direct)
            .await?;

        let reply = if outcome.handled {
            outcome.reply
        } else if let Some(fallback) = &self.fallback {
            fallback.handle(message).await.inspect_err(|_| {
                self.metrics.counter(names::ERRORS_TOTAL, &[("source", "fallback")]).inc();
            })?
        } else {
            None
        };

        if let Some(text) = reply {
            self.sink.send(&message.channel_id, &text).await.inspect_err(|_| {
                self.metrics.counter(names::ERRORS_TOTAL, &[("source", "transport")]).inc();
            })?;
        }

        self.metrics
            .histogram(names::RESPONSE_TIME, &[])
            .observe(started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Processes chat events until the channel closes or shutdown is signalled.
    pub async fn run(&self, mut rx: mpsc::Receiver<BotEvent>, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Message loop started");
        if *shutdown_rx.borrow() {
            return;
        }
        loop {
            tokio::select! {
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(BotEvent::ChatMessage(message)) => {
                            if let Err(e) = self.process_message(&message).await {
                                error!(
                                    "Failed to process message from {} in {}: {}",
                                    message.actor_id, message.channel_id, e
                                );
                            }
                        }
                        None => {
                            info!("Event channel closed; message loop exiting");
                            break;
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Message loop received shutdown");
                        break;
                    }
                }
            }
        }
    }
}
