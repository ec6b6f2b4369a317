// File: crybot-core/src/services/mod.rs

pub mod builtin_commands;
pub mod command_dispatcher;
pub mod command_registry;
pub mod message_service;

pub use command_dispatcher::{CommandDispatcher, HelpEntry};
pub use command_registry::{
    handler_fn, CommandContext, CommandHandler, CommandKind, CommandRegistry, CommandSpec, Resolved,
};
pub use message_service::MessageService;
