//! Consumer-facing online users state

use presence_core::{OnlineSet, OnlineUser, PresenceError};
use serde::{Serialize, Serializer};
use tokio::sync::{broadcast, watch};

/// What a consumer renders: the online users, whether the first result is
/// still pending, and the last surfaced error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnlineUsersState {
    pub users: Vec<OnlineUser>,
    pub loading: bool,
    #[serde(rename = "error", serialize_with = "serialize_error")]
    pub last_error: Option<PresenceError>,
}

impl Default for OnlineUsersState {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            loading: true,
            last_error: None,
        }
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<PresenceError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    error.as_ref().map(ToString::to_string).serialize(serializer)
}

/// Read side handed to consumers
#[derive(Debug, Clone)]
pub struct OnlineUsersView {
    state: watch::Receiver<OnlineUsersState>,
    emissions: broadcast::Sender<OnlineSet>,
}

impl OnlineUsersView {
    pub(crate) fn channel(buffer: usize) -> (ViewWriter, Self) {
        let (state_tx, state_rx) = watch::channel(OnlineUsersState::default());
        let (emissions, _) = broadcast::channel(buffer.max(1));
        let writer = ViewWriter {
            state: state_tx,
            emissions: emissions.clone(),
        };
        (
            writer,
            Self {
                state: state_rx,
                emissions,
            },
        )
    }

    /// Latest state
    pub fn current(&self) -> OnlineUsersState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<OnlineUsersState> {
        self.state.clone()
    }

    /// Every online set in notification order
    pub fn subscribe(&self) -> broadcast::Receiver<OnlineSet> {
        self.emissions.subscribe()
    }

    /// Wait until the state satisfies `predicate`
    ///
    /// Returns the last known state if the coordinator is gone.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&OnlineUsersState) -> bool,
    ) -> OnlineUsersState {
        let mut rx = self.state.clone();
        if let Ok(state) = rx.wait_for(predicate).await {
            return state.clone();
        }
        let state = rx.borrow().clone();
        state
    }
}

/// Write side owned by the coordinator
#[derive(Debug)]
pub(crate) struct ViewWriter {
    state: watch::Sender<OnlineUsersState>,
    emissions: broadcast::Sender<OnlineSet>,
}

impl ViewWriter {
    /// A session is being set up
    pub(crate) fn activating(&self) {
        self.state.send_modify(|state| {
            state.users.clear();
            state.loading = true;
            state.last_error = None;
        });
    }

    /// No session; presence features are unavailable
    pub(crate) fn signed_out(&self) {
        self.state.send_modify(|state| {
            state.users.clear();
            state.loading = false;
            state.last_error = Some(PresenceError::AuthUnavailable);
        });
    }

    pub(crate) fn emit(&self, set: OnlineSet) {
        self.state.send_modify(|state| {
            state.users = set.users().to_vec();
            state.loading = false;
            state.last_error = None;
        });
        // No receivers is fine
        let _ = self.emissions.send(set);
    }

    /// Surface an error, keeping the last known users
    pub(crate) fn fail(&self, error: PresenceError) {
        if !error.is_surfaced() {
            return;
        }
        self.state.send_modify(|state| {
            state.loading = false;
            state.last_error = Some(error);
        });
    }
}
