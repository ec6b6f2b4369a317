use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inbound chat message as handed over by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub actor_id: String,
    pub channel_id: String,
    pub text: String,
    /// True for a private conversation with the bot, false for a group chat.
    pub is_direct: bool,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(actor_id: &str, channel_id: &str, text: &str, is_direct: bool) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            is_direct,
            received_at: Utc::now(),
        }
    }
}
