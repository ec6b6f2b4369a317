// File: crybot-core/src/tasks/mod.rs

pub mod maintenance;

pub use maintenance::{run_maintenance_pass, spawn_maintenance_task, MaintenanceReport};
