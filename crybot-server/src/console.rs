// File: crybot-server/src/console.rs
//
// Line-based stand-in for a chat platform. Each stdin line is
// `<actor> <channel> <dm|chat> <text...>`; replies go to stdout.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crybot_common::error::Error;
use crybot_common::traits::ReplySink;
use crybot_core::eventbus::EventBus;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub actor_id: String,
    pub channel_id: String,
    pub is_direct: bool,
    pub text: String,
}

/// Splits off the first whitespace-delimited field.
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some(s.split_at(end))
}

pub fn parse_line(line: &str) -> Result<ConsoleLine, Error> {
    let fields = next_field(line).and_then(|(actor, rest)| {
        let (channel, rest) = next_field(rest)?;
        let (kind, rest) = next_field(rest)?;
        Some((actor, channel, kind, rest.trim()))
    });
    let Some((actor_id, channel_id, kind, text)) = fields else {
        return Err(Error::Parse(format!(
            "expected '<actor> <channel> <dm|chat> <text>', got '{}'",
            line.trim()
        )));
    };

    let is_direct = match kind.to_lowercase().as_str() {
        "dm" => true,
        "chat" => false,
        other => return Err(Error::Parse(format!("unknown conversation kind '{}'", other))),
    };

    Ok(ConsoleLine {
        actor_id: actor_id.to_string(),
        channel_id: channel_id.to_string(),
        is_direct,
        text: text.to_string(),
    })
}

/// Writes replies to stdout, prefixed with the channel id.
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl ReplySink for ConsoleSink {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), Error> {
        let mut out = tokio::io::stdout();
        let rendered = format!("[{}] {}\n", channel_id, text);
        out.write_all(rendered.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

/// Reads stdin until EOF or shutdown and publishes each valid line as a chat event.
/// EOF triggers a bus shutdown.
pub async fn run_console_reader(bus: EventBus, mut shutdown_rx: watch::Receiver<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Console transport ready: '<actor> <channel> <dm|chat> <text>'");

    loop {
        tokio::select! {
            next = lines.next_line() => {
                match next {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_line(&line) {
                            Ok(msg) => {
                                debug!("console <- {}@{}: {}", msg.actor_id, msg.channel_id, msg.text);
                                bus.publish_chat(&msg.actor_id, &msg.channel_id, &msg.text, msg.is_direct).await;
                            }
                            Err(e) => warn!("Ignoring console line: {}", e),
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed; shutting down");
                        bus.shutdown();
                        break;
                    }
                    Err(e) => {
                        warn!("stdin read failed: {:?}", e);
                        bus.shutdown();
                        break;
                    }
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
