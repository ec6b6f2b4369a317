// File: crybot-common/src/lib.rs
//! Types shared between the core services and the process entry point.

pub mod error;
pub mod models;
pub mod traits;

pub use error::Error;
