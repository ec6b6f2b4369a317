// File: crybot-core/src/services/command_registry.rs

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use tracing::debug;

use crybot_common::Error;

/// What a handler sees about the invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    pub actor_id: String,
    pub channel_id: String,
    /// The raw inbound text, untrimmed.
    pub text: String,
    /// Remainder after a prefix command's alias, trimmed, original case kept.
    pub argument: Option<String>,
    pub is_direct: bool,
    /// Canonical name of the resolved command.
    pub command: String,
}

/// A registered command's behaviour. `Ok(None)` means the handler delivered
/// its own response and the caller should send nothing.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &CommandContext) -> Result<Option<String>, Error>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> CommandHandler for FnHandler<F>
where
    F: Fn(&CommandContext) -> Result<Option<String>, Error> + Send + Sync,
{
    async fn handle(&self, ctx: &CommandContext) -> Result<Option<String>, Error> {
        (self.0)(ctx)
    }
}

/// Wraps a synchronous closure as a handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(&CommandContext) -> Result<Option<String>, Error> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

#[derive(Clone)]
pub enum CommandKind {
    Handler(Arc<dyn CommandHandler>),
    /// Lists the commands visible to the caller; rendered by the dispatcher.
    Help,
}

/// One registrable command. Built with the chained setters, then handed to
/// [`CommandRegistry::register`]; never changed afterwards.
#[derive(Clone)]
pub struct CommandSpec {
    name: String,
    aliases: Vec<String>,
    description: String,
    kind: CommandKind,
    requires_admin: bool,
    dm_only: bool,
    chat_only: bool,
    takes_argument: bool,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// `text` minus a leading `prefix` (already lower-cased), compared without case.
fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let want = prefix.chars().count();
    let split = text.char_indices().nth(want).map_or(text.len(), |(i, _)| i);
    let (head, rest) = text.split_at(split);
    (head.to_lowercase() == prefix).then_some(rest)
}

impl CommandSpec {
    pub fn new(name: impl AsRef<str>, handler: Arc<dyn CommandHandler>) -> Self {
        Self::with_kind(name.as_ref(), CommandKind::Handler(handler))
    }

    /// The built-in help listing under `name`.
    pub fn help(name: impl AsRef<str>) -> Self {
        Self::with_kind(name.as_ref(), CommandKind::Help)
    }

    fn with_kind(name: &str, kind: CommandKind) -> Self {
        let name = normalize(name);
        Self {
            aliases: vec![name.clone()],
            name,
            description: String::new(),
            kind,
            requires_admin: false,
            dm_only: false,
            chat_only: false,
            takes_argument: false,
        }
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for alias in aliases {
            let alias = normalize(alias.as_ref());
            if !alias.is_empty() && !self.aliases.contains(&alias) {
                self.aliases.push(alias);
            }
        }
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn requires_admin(mut self) -> Self {
        self.requires_admin = true;
        self
    }

    pub fn dm_only(mut self) -> Self {
        self.dm_only = true;
        self
    }

    pub fn chat_only(mut self) -> Self {
        self.chat_only = true;
        self
    }

    /// Lets `<alias> <argument>` resolve to this command.
    pub fn with_argument(mut self) -> Self {
        self.takes_argument = true;
        self
    }

    pub fn canonical_name(&self) -> &str {
        &self.name
    }

    /// Every alias, canonical name first.
    pub fn alias_names(&self) -> &[String] {
        &self.aliases
    }

    pub fn summary(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn is_admin_only(&self) -> bool {
        self.requires_admin
    }

    pub fn is_dm_only(&self) -> bool {
        self.dm_only
    }

    pub fn is_chat_only(&self) -> bool {
        self.chat_only
    }

    pub fn takes_argument(&self) -> bool {
        self.takes_argument
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("requires_admin", &self.requires_admin)
            .field("dm_only", &self.dm_only)
            .field("chat_only", &self.chat_only)
            .field("takes_argument", &self.takes_argument)
            .finish()
    }
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub spec: Arc<CommandSpec>,
    pub argument: Option<String>,
}

/// Flat alias table built once at startup.
#[derive(Default)]
pub struct CommandRegistry {
    by_alias: HashMap<String, Arc<CommandSpec>>,
    /// Aliases of argument-taking commands, longest first.
    prefixes: Vec<(String, Arc<CommandSpec>)>,
    registered: Vec<Arc<CommandSpec>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `spec` under each of its aliases. An alias that already belongs to
    /// another command is taken over by this one.
    pub fn register(&mut self, spec: CommandSpec) {
        let spec = Arc::new(spec);
        for alias in spec.alias_names() {
            if let Some(previous) = self.by_alias.insert(alias.clone(), spec.clone()) {
                debug!(
                    "Alias '{}' moved from '{}' to '{}'",
                    alias,
                    previous.canonical_name(),
                    spec.canonical_name()
                );
            }
            self.prefixes.retain(|(prefix, _)| prefix != alias);
            if spec.takes_argument() {
                self.prefixes.push((alias.clone(), spec.clone()));
            }
        }
        self.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        debug!("Registered command '{}' ({} alias(es))", spec.canonical_name(), spec.alias_names().len());
        self.registered.push(spec);
    }

    /// Maps inbound text to a command. Prefix commands are tried before exact
    /// aliases, since `alias argument` never matches an alias on its own.
    pub fn resolve(&self, raw: &str) -> Option<Resolved> {
        let key = normalize(raw);
        if key.is_empty() {
            return None;
        }

        // The alias is matched case-insensitively; the argument keeps its case.
        let text = raw.trim();
        for (prefix, spec) in &self.prefixes {
            let Some(rest) = strip_prefix_ignore_case(text, prefix) else {
                continue;
            };
            if !rest.starts_with(char::is_whitespace) {
                continue;
            }
            let argument = rest.trim();
            if !argument.is_empty() {
                return Some(Resolved {
                    spec: spec.clone(),
                    argument: Some(argument.to_string()),
                });
            }
        }

        self.by_alias.get(&key).map(|spec| Resolved {
            spec: spec.clone(),
            argument: None,
        })
    }

    /// Registered commands that still own at least one alias, in
    /// registration order, each with the aliases that currently point at it.
    pub fn commands(&self) -> Vec<(Arc<CommandSpec>, Vec<String>)> {
        self.registered
            .iter()
            .filter_map(|spec| {
                let live: Vec<String> = spec
                    .alias_names()
                    .iter()
                    .filter(|alias| {
                        self.by_alias
                            .get(alias.as_str())
                            .is_some_and(|owner| Arc::ptr_eq(owner, spec))
                    })
                    .cloned()
                    .collect();
                (!live.is_empty()).then(|| (spec.clone(), live))
            })
            .collect()
    }

    pub fn alias_count(&self) -> usize {
        self.by_alias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> Arc<dyn CommandHandler> {
        handler_fn(|ctx| Ok(Some(format!("{}:{:?}", ctx.command, ctx.argument))))
    }

    #[test]
    fn aliases_are_normalized() {
        let mut reg = CommandRegistry::new();
        reg.register(CommandSpec::new(" Start ", echo()).aliases(["/START", "начать", "  "]));

        let spec = reg.resolve("  НАЧАТЬ ").unwrap().spec;
        assert_eq!(spec.canonical_name(), "start");
        assert_eq!(spec.alias_names(), ["start", "/start", "начать"]);
        assert!(reg.resolve("/start").is_some());
        assert_eq!(reg.alias_count(), 3);
    }

    #[test]
    fn unknown_and_empty_do_not_resolve() {
        let mut reg = CommandRegistry::new();
        reg.register(CommandSpec::new("ping", echo()));
        assert!(reg.resolve("").is_none());
        assert!(reg.resolve("   ").is_none());
        assert!(reg.resolve("pingpong").is_none());
    }

    #[test]
    fn last_registration_wins() {
        let mut reg = CommandRegistry::new();
        reg.register(CommandSpec::new("first", echo()).aliases(["go"]));
        reg.register(CommandSpec::new("second", echo()).aliases(["go"]));

        assert_eq!(reg.resolve("go").unwrap().spec.canonical_name(), "second");
        let listed = reg.commands();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].1, vec!["first"]);
        assert_eq!(listed[1].1, vec!["second", "go"]);
    }

    #[test]
    fn prefix_command_takes_argument() {
        let mut reg = CommandRegistry::new();
        reg.register(CommandSpec::new("restore", echo()).with_argument());

        let r = reg.resolve("Restore  3 ").unwrap();
        assert_eq!(r.spec.canonical_name(), "restore");
        assert_eq!(r.argument.as_deref(), Some("3"));

        let bare = reg.resolve("restore").unwrap();
        assert!(bare.argument.is_none());

        assert!(reg.resolve("restorex 3").is_none());
    }

    #[test]
    fn prefix_argument_keeps_its_case() {
        let mut reg = CommandRegistry::new();
        reg.register(CommandSpec::new("resetlimit", echo()).with_argument());

        let r = reg.resolve("  ResetLimit\tAlice_42 ").unwrap();
        assert_eq!(r.spec.canonical_name(), "resetlimit");
        assert_eq!(r.argument.as_deref(), Some("Alice_42"));

        let r = reg.resolve("RESETLIMIT Мария").unwrap();
        assert_eq!(r.argument.as_deref(), Some("Мария"));
    }

    #[test]
    fn longest_prefix_wins() {
        let mut reg = CommandRegistry::new();
        reg.register(CommandSpec::new("game", echo()).with_argument());
        reg.register(CommandSpec::new("game stop", echo()).with_argument());

        let r = reg.resolve("game stop 2").unwrap();
        assert_eq!(r.spec.canonical_name(), "game stop");
        assert_eq!(r.argument.as_deref(), Some("2"));

        let r = reg.resolve("game start").unwrap();
        assert_eq!(r.spec.canonical_name(), "game");
        assert_eq!(r.argument.as_deref(), Some("start"));
    }

    #[test]
    fn plain_alias_replaces_prefix() {
        let mut reg = CommandRegistry::new();
        reg.register(CommandSpec::new("find", echo()).with_argument());
        reg.register(CommandSpec::new("other", echo()).aliases(["find"]));

        assert!(reg.resolve("find x").is_none());
        assert_eq!(reg.resolve("find").unwrap().spec.canonical_name(), "other");
    }

    #[tokio::test]
    async fn closure_handler_runs() {
        let handler = echo();
        let ctx = CommandContext {
            actor_id: "u".into(),
            channel_id: "c".into(),
            text: "restore 1".into(),
            argument: Some("1".into()),
            is_direct: true,
            command: "restore".into(),
        };
        let reply = handler.handle(&ctx).await.unwrap();
        assert_eq!(reply.as_deref(), Some("restore:Some(\"1\")"));
    }
}
