pub mod helpers;

pub use helpers::ManualClock;
