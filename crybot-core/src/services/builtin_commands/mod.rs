// File: crybot-core/src/services/builtin_commands/mod.rs

pub mod admin;
pub mod general;

use std::sync::Arc;
use crybot_common::models::Language;

use crate::cache::Sweepable;
use crate::metrics::MetricsRegistry;
use crate::rate_limit::RateLimiter;
use crate::services::command_registry::{CommandRegistry, CommandSpec};

pub use admin::{CacheStatsCommand, MetricsCommand, ResetLimitCommand};
pub use general::{PingCommand, StartCommand};

/// Shared state the built-in commands read from.
#[derive(Clone)]
pub struct BuiltinDeps {
    pub language: Language,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsRegistry>,
    pub caches: Vec<Arc<dyn Sweepable>>,
}

/// Registers start, help, ping and the admin commands.
pub fn register_builtin_commands(registry: &mut CommandRegistry, deps: BuiltinDeps) {
    let language = deps.language;

    registry.register(
        CommandSpec::new("start", Arc::new(StartCommand { language }))
            .aliases(["/start", "начать"])
            .description("Welcome message"),
    );
    registry.register(
        CommandSpec::help("help")
            .aliases(["/help", "помощь"])
            .description("List available commands"),
    );
    registry.register(
        CommandSpec::new("ping", Arc::new(PingCommand { language }))
            .aliases(["/ping"])
            .description("Check that the bot is alive"),
    );
    registry.register(
        CommandSpec::new(
            "cachestats",
            Arc::new(CacheStatsCommand {
                caches: deps.caches,
                language,
            }),
        )
        .aliases(["/cachestats"])
        .description("Cache statistics")
        .requires_admin(),
    );
    registry.register(
        CommandSpec::new("metrics", Arc::new(MetricsCommand { metrics: deps.metrics }))
            .aliases(["/metrics"])
            .description("Prometheus metrics dump")
            .requires_admin()
            .dm_only(),
    );
    registry.register(
        CommandSpec::new(
            "resetlimit",
            Arc::new(ResetLimitCommand {
                limiter: deps.limiter,
                language,
            }),
        )
        .aliases(["/resetlimit"])
        .description("Reset a user's rate limit: resetlimit <id>")
        .requires_admin()
        .with_argument(),
    );
}
