// src/lib.rs

pub mod cache;
pub mod config;
pub mod eventbus;
pub mod i18n;
pub mod metrics;
pub mod rate_limit;
pub mod services;
pub mod tasks;
pub mod test_utils;
pub mod utils;

pub use config::CoreConfig;
pub use crybot_common::error::Error;
