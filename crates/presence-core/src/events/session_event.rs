//! Session transitions

use crate::entities::Session;

/// One logical authentication transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An identity became authenticated
    Started(Session),
    /// The identity became absent
    Ended,
}

impl SessionEvent {
    /// Event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started(_) => "SESSION_STARTED",
            Self::Ended => "SESSION_ENDED",
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Started(session) => Some(session),
            Self::Ended => None,
        }
    }
}
