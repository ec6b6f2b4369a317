// File: crybot-core/src/services/command_dispatcher.rs

use std::sync::Arc;
use std::time::Instant;
use serde::Serialize;
use tracing::{debug, error, info, trace};

use crybot_common::models::{Decision, DispatchOutcome, Language};
use crybot_common::traits::CapabilityCheck;
use crybot_common::Error;

use crate::i18n::{self, MessageKey};
use crate::metrics::{names, MetricsRegistry};
use crate::rate_limit::RateLimiter;
use crate::services::command_registry::{CommandContext, CommandKind, CommandRegistry, CommandSpec, Resolved};

/// One line of the help listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpEntry {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
}

/// Outcome label values for `bot_commands_total`.
mod outcome {
    pub const OK: &str = "ok";
    pub const ERROR: &str = "error";
    pub const DENIED_CONTEXT: &str = "denied_context";
    pub const DENIED_CAPABILITY: &str = "denied_capability";
    pub const RATE_LIMITED: &str = "rate_limited";
}

/// Resolves inbound text against the registry, applies the context,
/// capability and rate-limit gates in that order, and runs the handler.
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
    limiter: Arc<RateLimiter>,
    capability: Arc<dyn CapabilityCheck>,
    metrics: Arc<MetricsRegistry>,
    language: Language,
}

impl CommandDispatcher {
    pub fn new(
        registry: Arc<CommandRegistry>,
        limiter: Arc<RateLimiter>,
        capability: Arc<dyn CapabilityCheck>,
        metrics: Arc<MetricsRegistry>,
        language: Language,
    ) -> Self {
        debug!("Initializing CommandDispatcher ({} aliases)", registry.alias_count());
        Self {
            registry,
            limiter,
            capability,
            metrics,
            language,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Handles one inbound text.
    ///
    /// Text that is not a command yields `handled == false` with no side
    /// effects at all. Handler failures are returned as `Err` for the caller's
    /// error boundary.
    pub async fn dispatch(
        &self,
        text: &str,
        actor_id: &str,
        channel_id: &str,
        is_direct: bool,
    ) -> Result<DispatchOutcome, Error> {
        if text.is_empty() {
            return Ok(DispatchOutcome::unhandled());
        }
        let Some(Resolved { spec, argument }) = self.registry.resolve(text) else {
            trace!("No command matches '{}'", text);
            return Ok(DispatchOutcome::unhandled());
        };
        let command = spec.canonical_name();

        if let Some(key) = context_refusal(&spec, is_direct) {
            info!("Command '{}' refused for {} in {}: wrong context", command, actor_id, channel_id);
            self.count(command, outcome::DENIED_CONTEXT);
            return Ok(DispatchOutcome::reply(i18n::text(self.language, key)));
        }

        if spec.is_admin_only() && !self.capability.is_admin(actor_id) {
            info!("Command '{}' refused for non-admin {}", command, actor_id);
            self.count(command, outcome::DENIED_CAPABILITY);
            return Ok(DispatchOutcome::reply(i18n::text(self.language, MessageKey::AdminOnly)));
        }

        if let Decision::Denied { retry_after_secs, scope } = self.limiter.check(actor_id, channel_id) {
            info!(
                "Command '{}' from {} in {} rate limited ({} scope, retry in {}s)",
                command, actor_id, channel_id, scope, retry_after_secs
            );
            self.count(command, outcome::RATE_LIMITED);
            let seconds = retry_after_secs.to_string();
            return Ok(DispatchOutcome::reply(i18n::render(
                self.language,
                MessageKey::RateLimited,
                &[("seconds", seconds.as_str())],
            )));
        }

        let ctx = CommandContext {
            actor_id: actor_id.to_string(),
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            argument,
            is_direct,
            command: command.to_string(),
        };
        debug!("Running command '{}' for {} (argument: {:?})", command, actor_id, ctx.argument);

        let started = Instant::now();
        let result = match spec.kind() {
            CommandKind::Handler(handler) => handler.handle(&ctx).await,
            CommandKind::Help => Ok(Some(self.render_help(actor_id, is_direct))),
        };
        self.metrics
            .histogram(names::COMMAND_DURATION, &[("command", command)])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(reply) => {
                self.count(command, outcome::OK);
                Ok(DispatchOutcome::handled(reply))
            }
            Err(e) => {
                error!("Command '{}' failed for {}: {}", command, actor_id, e);
                self.count(command, outcome::ERROR);
                self.metrics.counter(names::ERRORS_TOTAL, &[("source", "handler")]).inc();
                Err(e)
            }
        }
    }

    /// Commands the actor may run in this context, in registration order.
    pub fn visible_commands(&self, actor_id: &str, is_direct: bool) -> Vec<HelpEntry> {
        let mut is_admin = None;
        self.registry
            .commands()
            .into_iter()
            .filter(|(spec, _)| context_refusal(spec, is_direct).is_none())
            .filter(|(spec, _)| {
                !spec.is_admin_only() || *is_admin.get_or_insert_with(|| self.capability.is_admin(actor_id))
            })
            .map(|(spec, aliases)| HelpEntry {
                name: spec.canonical_name().to_string(),
                aliases,
                description: spec.summary().to_string(),
            })
            .collect()
    }

    fn render_help(&self, actor_id: &str, is_direct: bool) -> String {
        let entries = self.visible_commands(actor_id, is_direct);
        if entries.is_empty() {
            return i18n::text(self.language, MessageKey::HelpEmpty).to_string();
        }

        let mut lines = vec![i18n::text(self.language, MessageKey::HelpTitle).to_string()];
        for entry in entries {
            let others: Vec<&str> = entry
                .aliases
                .iter()
                .map(String::as_str)
                .filter(|a| *a != entry.name)
                .collect();
            let mut line = format!("• {}", entry.name);
            if !others.is_empty() {
                line.push_str(&format!(" ({})", others.join(", ")));
            }
            if !entry.description.is_empty() {
                line.push_str(&format!(": {}", entry.description));
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    fn count(&self, command: &str, outcome: &str) {
        self.metrics
            .counter(names::COMMANDS_TOTAL, &[("command", command), ("outcome", outcome)])
            .inc();
    }
}

fn context_refusal(spec: &CommandSpec, is_direct: bool) -> Option<MessageKey> {
    if spec.is_dm_only() && !is_direct {
        Some(MessageKey::DmOnly)
    } else if spec.is_chat_only() && is_direct {
        Some(MessageKey::ChatOnly)
    } else {
        None
    }
}
