use serde::{Deserialize, Serialize};

/// What the dispatcher did with a piece of inbound text.
///
/// `handled == false` means the text was not a command and the caller may
/// fall through to other handling. A handled outcome with `reply == None`
/// means the handler produced its own response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub handled: bool,
    pub reply: Option<String>,
}

impl DispatchOutcome {
    pub fn unhandled() -> Self {
        Self { handled: false, reply: None }
    }

    pub fn handled(reply: Option<String>) -> Self {
        Self { handled: true, reply }
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Self { handled: true, reply: Some(text.into()) }
    }
}
