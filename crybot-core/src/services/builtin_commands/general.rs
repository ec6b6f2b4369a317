// File: crybot-core/src/services/builtin_commands/general.rs

use async_trait::async_trait;
use crybot_common::models::Language;
use crybot_common::Error;

use crate::i18n::{self, MessageKey};
use crate::services::command_registry::{CommandContext, CommandHandler};

/// Greeting with the running version; wording differs between a private
/// conversation and a group chat.
pub struct StartCommand {
    pub language: Language,
}

#[async_trait]
impl CommandHandler for StartCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Option<String>, Error> {
        let key = if ctx.is_direct {
            MessageKey::StartDirect
        } else {
            MessageKey::StartChat
        };
        Ok(Some(i18n::render(
            self.language,
            key,
            &[("version", env!("CARGO_PKG_VERSION"))],
        )))
    }
}

pub struct PingCommand {
    pub language: Language,
}

#[async_trait]
impl CommandHandler for PingCommand {
    async fn handle(&self, _ctx: &CommandContext) -> Result<Option<String>, Error> {
        Ok(Some(i18n::text(self.language, MessageKey::Pong).to_string()))
    }
}
