// File: crybot-common/src/models/mod.rs
pub mod cache;
pub mod dispatch;
pub mod language;
pub mod message;
pub mod rate_limit;

pub use cache::CacheStats;
pub use dispatch::DispatchOutcome;
pub use language::Language;
pub use message::InboundMessage;
pub use rate_limit::{Decision, LimitScope};
