//! Coordinator states

use std::fmt;

use presence_core::{Epoch, Session};
use serde::Serialize;

/// Observable lifecycle phase
///
/// A session that ends while its publish is still in flight reports
/// `Deactivating` straight away, although the retract only starts once the
/// publish settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    Idle,
    Activating,
    Active,
    Deactivating,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Deactivating => "deactivating",
        };
        f.write_str(name)
    }
}

/// Session change that arrived while a publish was in flight
#[derive(Debug)]
pub(super) enum Pending {
    Nothing,
    End,
    /// End the current session, then start this one
    Switch(Session),
}

#[derive(Debug)]
pub(super) enum LifecycleState {
    Idle,
    Activating {
        epoch: Epoch,
        session: Session,
        pending: Pending,
    },
    Active {
        epoch: Epoch,
        session: Session,
    },
    Deactivating {
        epoch: Epoch,
        session: Session,
        /// Latest session to activate once the retract settles
        next: Option<Session>,
    },
}

impl LifecycleState {
    pub(super) fn phase(&self) -> LifecyclePhase {
        match self {
            Self::Idle => LifecyclePhase::Idle,
            Self::Activating {
                pending: Pending::Nothing,
                ..
            } => LifecyclePhase::Activating,
            Self::Activating { .. } => LifecyclePhase::Deactivating,
            Self::Active { .. } => LifecyclePhase::Active,
            Self::Deactivating { .. } => LifecyclePhase::Deactivating,
        }
    }

    pub(super) fn epoch(&self) -> Option<&Epoch> {
        match self {
            Self::Idle => None,
            Self::Activating { epoch, .. }
            | Self::Active { epoch, .. }
            | Self::Deactivating { epoch, .. } => Some(epoch),
        }
    }
}
