// File: crybot-core/src/services/builtin_commands/admin.rs
//! Operator commands. All of them are registered as admin-only.

use std::sync::Arc;
use async_trait::async_trait;
use tracing::info;

use crybot_common::models::Language;
use crybot_common::Error;

use crate::cache::Sweepable;
use crate::i18n::{self, MessageKey};
use crate::metrics::MetricsRegistry;
use crate::rate_limit::RateLimiter;
use crate::services::command_registry::{CommandContext, CommandHandler};

pub struct CacheStatsCommand {
    pub caches: Vec<Arc<dyn Sweepable>>,
    pub language: Language,
}

#[async_trait]
impl CommandHandler for CacheStatsCommand {
    async fn handle(&self, _ctx: &CommandContext) -> Result<Option<String>, Error> {
        if self.caches.is_empty() {
            return Ok(Some(i18n::text(self.language, MessageKey::NoCaches).to_string()));
        }
        let mut lines = vec![i18n::text(self.language, MessageKey::CacheStatsTitle).to_string()];
        for cache in &self.caches {
            let s = cache.stats();
            lines.push(format!(
                "• {}: {}/{} entries, hit rate {}% ({} hits / {} misses), {} evicted, {} expired",
                cache.name(),
                s.size,
                s.max_size,
                s.hit_rate,
                s.hits,
                s.misses,
                s.evictions,
                s.expirations
            ));
        }
        Ok(Some(lines.join("\n")))
    }
}

/// Replies with the Prometheus text export.
pub struct MetricsCommand {
    pub metrics: Arc<MetricsRegistry>,
}

#[async_trait]
impl CommandHandler for MetricsCommand {
    async fn handle(&self, _ctx: &CommandContext) -> Result<Option<String>, Error> {
        Ok(Some(self.metrics.export_text()))
    }
}

/// `resetlimit <actor id>`: forgets that actor's rate-limit window.
pub struct ResetLimitCommand {
    pub limiter: Arc<RateLimiter>,
    pub language: Language,
}

#[async_trait]
impl CommandHandler for ResetLimitCommand {
    async fn handle(&self, ctx: &CommandContext) -> Result<Option<String>, Error> {
        let Some(target) = ctx.argument.as_deref() else {
            return Ok(Some(i18n::text(self.language, MessageKey::ResetLimitUsage).to_string()));
        };

        let key = if self.limiter.reset_actor(target) {
            info!("Admin {} reset the rate limit of {}", ctx.actor_id, target);
            MessageKey::LimitReset
        } else {
            MessageKey::LimitNotTracked
        };
        Ok(Some(i18n::render(self.language, key, &[("actor", target)])))
    }
}
