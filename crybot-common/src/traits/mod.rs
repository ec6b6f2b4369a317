// File: crybot-common/src/traits/mod.rs
pub mod capability;
pub mod clock;
pub mod transport;

pub use capability::{AdminList, CapabilityCheck};
pub use clock::{Clock, SystemClock};
pub use transport::{FallbackHandler, ReplySink};
