// File: crybot-server/src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crybot_common::models::Language;
use crybot_common::traits::AdminList;
use crybot_core::cache::{Sweepable, TtlCache};
use crybot_core::eventbus::EventBus;
use crybot_core::metrics::MetricsRegistry;
use crybot_core::rate_limit::RateLimiter;
use crybot_core::services::builtin_commands::{register_builtin_commands, BuiltinDeps};
use crybot_core::services::{CommandDispatcher, CommandRegistry, MessageService};
use crybot_core::tasks::spawn_maintenance_task;
use crybot_core::CoreConfig;

mod console;
use console::{run_console_reader, ConsoleSink};

#[derive(Parser, Debug, Clone)]
#[command(name = "crybot")]
#[command(author, version, about = "CryBot - chat bot core with a console transport")]
struct Args {
    /// JSON config file; environment and flags are applied on top of it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level for crybot targets (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Reply language: "ru" or "en".
    #[arg(long)]
    language: Option<Language>,

    /// Comma-separated admin actor ids.
    #[arg(long, value_delimiter = ',')]
    admin: Vec<String>,

    /// Requests per actor per window.
    #[arg(long)]
    actor_limit: Option<u32>,

    /// Requests per channel per window.
    #[arg(long)]
    channel_limit: Option<u32>,

    /// Seconds between maintenance sweeps.
    #[arg(long)]
    maintenance_interval: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut CoreConfig) {
        if let Some(level) = &self.log_level {
            config.log_level = level.to_lowercase();
        }
        if let Some(language) = self.language {
            config.default_language = language;
        }
        let admins: Vec<String> = self
            .admin
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if !admins.is_empty() {
            config.admin_user_ids = admins;
        }
        if let Some(limit) = self.actor_limit {
            config.rate_limit.actor_limit = limit;
        }
        if let Some(limit) = self.channel_limit {
            config.rate_limit.channel_limit = limit;
        }
        if let Some(secs) = self.maintenance_interval {
            config.maintenance.interval_secs = secs;
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<CoreConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = CoreConfig::load_from_file(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            // Environment values still win over the file.
            CoreConfig::from_env_over(file)
        }
        None => CoreConfig::from_env(),
    };
    args.apply(&mut config);
    Ok(config)
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("crybot={level},crybot_core={level}")),
    };
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub).context("setting global tracing subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config.log_level)?;

    for problem in config.validate() {
        warn!("Config: {}", problem);
    }
    config.ensure_valid()?;

    info!(
        "CryBot {} starting. language={}, admins={}, actor_limit={}/{}s, channel_limit={}/{}s",
        env!("CARGO_PKG_VERSION"),
        config.default_language,
        config.admin_user_ids.len(),
        config.rate_limit.actor_limit,
        config.rate_limit.actor_window_secs,
        config.rate_limit.channel_limit,
        config.rate_limit.channel_window_secs,
    );

    if let Err(e) = run_server(config).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    // A pending stdin read would otherwise hold the runtime open on exit.
    std::process::exit(0);
}

async fn run_server(config: CoreConfig) -> anyhow::Result<()> {
    let event_bus = EventBus::new();

    let metrics = Arc::new(MetricsRegistry::with_default_metrics());
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let sessions = Arc::new(TtlCache::<String>::new("sessions", config.cache.clone()));
    let caches: Vec<Arc<dyn Sweepable>> = vec![sessions as Arc<dyn Sweepable>];

    let mut registry = CommandRegistry::new();
    register_builtin_commands(
        &mut registry,
        BuiltinDeps {
            language: config.default_language,
            limiter: limiter.clone(),
            metrics: metrics.clone(),
            caches: caches.clone(),
        },
    );
    info!("Registered {} command aliases", registry.alias_count());

    let dispatcher = Arc::new(CommandDispatcher::new(
        Arc::new(registry),
        limiter.clone(),
        Arc::new(AdminList::new(config.admin_user_ids.clone())),
        metrics.clone(),
        config.default_language,
    ));
    let message_service = Arc::new(MessageService::new(dispatcher, Arc::new(ConsoleSink), metrics.clone()));

    let rx = event_bus.subscribe(None).await;
    let message_task = {
        let service = message_service.clone();
        let shutdown_rx = event_bus.shutdown_rx.clone();
        tokio::spawn(async move { service.run(rx, shutdown_rx).await })
    };

    let maintenance_task = spawn_maintenance_task(
        caches,
        metrics.clone(),
        limiter.clone(),
        config.maintenance.clone(),
        event_bus.shutdown_rx.clone(),
    );

    let console_task = tokio::spawn(run_console_reader(event_bus.clone(), event_bus.shutdown_rx.clone()));

    let mut shutdown_rx = event_bus.shutdown_rx.clone();
    tokio::select! {
        ctrl = tokio::signal::ctrl_c() => {
            if let Err(e) = ctrl {
                error!("Failed to listen for ctrl-c: {:?}", e);
            }
            info!("Ctrl-C detected; shutting down.");
            event_bus.shutdown();
        }
        _ = shutdown_rx.changed() => {
            info!("Shutdown requested.");
        }
    }

    for (name, task) in [
        ("message loop", message_task),
        ("maintenance", maintenance_task),
    ] {
        if let Err(e) = task.await {
            error!("{} task ended abnormally: {:?}", name, e);
        }
    }
    console_task.abort();

    info!("CryBot stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "crybot",
            "--language",
            "en",
            "--admin",
            "1, 2,,3",
            "--actor-limit",
            "5",
            "--log-level",
            "DEBUG",
        ]);
        let mut config = CoreConfig::default();
        args.apply(&mut config);

        assert_eq!(config.default_language, Language::En);
        assert_eq!(config.admin_user_ids, vec!["1", "2", "3"]);
        assert_eq!(config.rate_limit.actor_limit, 5);
        assert_eq!(config.rate_limit.channel_limit, 30);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn no_flags_keep_config() {
        let args = Args::parse_from(["crybot"]);
        let mut config = CoreConfig::default();
        config.admin_user_ids = vec!["9".into()];
        args.apply(&mut config);
        assert_eq!(config.admin_user_ids, vec!["9"]);
        assert_eq!(config.default_language, Language::Ru);
    }
}
