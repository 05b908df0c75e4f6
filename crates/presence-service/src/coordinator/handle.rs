//! Control handle for a running coordinator

use tokio::sync::{mpsc, oneshot, watch};

use super::message::Message;
use super::LifecyclePhase;
use crate::view::OnlineUsersView;

/// Cloneable handle to a spawned [`LifecycleCoordinator`](super::LifecycleCoordinator)
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Message>,
    phase: watch::Receiver<LifecyclePhase>,
    view: OnlineUsersView,
}

impl CoordinatorHandle {
    pub(super) fn new(
        commands: mpsc::UnboundedSender<Message>,
        phase: watch::Receiver<LifecyclePhase>,
        view: OnlineUsersView,
    ) -> Self {
        Self {
            commands,
            phase,
            view,
        }
    }

    pub fn view(&self) -> &OnlineUsersView {
        &self.view
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    /// Wait until the coordinator reaches `phase`
    ///
    /// Returns the last phase if the coordinator stops first.
    pub async fn wait_for_phase(&self, phase: LifecyclePhase) -> LifecyclePhase {
        let mut rx = self.phase.clone();
        if let Ok(current) = rx.wait_for(|current| *current == phase).await {
            return *current;
        }
        let last = *rx.borrow();
        last
    }

    /// Open a new subscription after a subscription failure
    ///
    /// Ignored unless presence is active without a live subscription. Returns
    /// `false` when the coordinator has stopped.
    pub fn restart_subscription(&self) -> bool {
        self.commands.send(Message::RestartSubscription).is_ok()
    }

    /// Retract the live session and stop the coordinator
    ///
    /// Resolves once the coordinator task has exited.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Message::Shutdown(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}
