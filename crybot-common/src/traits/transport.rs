use async_trait::async_trait;

use crate::error::Error;
use crate::models::InboundMessage;

/// Outbound side of the chat transport.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), Error>;
}

/// Receives text that no command claimed (e.g. free-form AI chat).
#[async_trait]
pub trait FallbackHandler: Send + Sync {
    /// Returns a reply to send, or `None` to stay silent.
    async fn handle(&self, message: &InboundMessage) -> Result<Option<String>, Error>;
}
