use std::fmt;
use serde::{Deserialize, Serialize};

/// Which sliding window produced a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitScope {
    Actor,
    Channel,
}

impl LimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::Actor => "actor",
            LimitScope::Channel => "channel",
        }
    }
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an admission check. A denial is a value, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allowed,
    Denied {
        /// Whole seconds until a retry can succeed, always >= 1.
        retry_after_secs: u64,
        scope: LimitScope,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Decision::Allowed => None,
            Decision::Denied { retry_after_secs, .. } => Some(*retry_after_secs),
        }
    }
}
