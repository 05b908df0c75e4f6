//! Messages delivered to the coordinator task

use presence_core::{Epoch, PresenceRecord, PresenceResult};
use tokio::sync::oneshot;

use crate::publisher::Retraction;
use crate::subscriber::OnlineSetFeed;

/// Completions of spawned store work, and commands from handles
///
/// Completions carry the epoch they were issued under.
pub(crate) enum Message {
    Published {
        epoch: Epoch,
        result: PresenceResult<PresenceRecord>,
    },
    Retracted {
        epoch: Epoch,
        result: PresenceResult<Retraction>,
    },
    Subscribed {
        epoch: Epoch,
        result: PresenceResult<OnlineSetFeed>,
    },
    RestartSubscription,
    Shutdown(oneshot::Sender<()>),
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Message {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::Retracted { .. } => "retracted",
            Self::Subscribed { .. } => "subscribed",
            Self::RestartSubscription => "restart_subscription",
            Self::Shutdown(_) => "shutdown",
        }
    }
}
