//! In-process identity provider

use std::sync::Arc;

use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use presence_core::{Identity, IdentityProvider, IdentityStream};
use tracing::info;

#[derive(Default)]
struct Inner {
    current: Option<Identity>,
    listeners: Vec<mpsc::UnboundedSender<Option<Identity>>>,
}

impl Inner {
    fn notify(&mut self) {
        let current = self.current.clone();
        self.listeners
            .retain(|tx| tx.unbounded_send(current.clone()).is_ok());
    }
}

/// Identity provider driven by explicit sign-in and sign-out calls
///
/// Used by the agent, which signs in with a configured identity, and by tests.
#[derive(Clone, Default)]
pub struct LocalIdentityProvider {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for LocalIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LocalIdentityProvider")
            .field("current", &inner.current)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, identity: Identity) {
        info!(client_id = %identity.client_id, "Signed in");
        let mut inner = self.inner.lock();
        inner.current = Some(identity);
        inner.notify();
    }

    pub fn sign_out(&self) {
        let mut inner = self.inner.lock();
        if let Some(identity) = inner.current.take() {
            info!(client_id = %identity.client_id, "Signed out");
        }
        inner.notify();
    }

    pub fn current(&self) -> Option<Identity> {
        self.inner.lock().current.clone()
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.listeners.retain(|tx| !tx.is_closed());
        inner.listeners.len()
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn subscribe(&self) -> IdentityStream {
        let (tx, rx) = mpsc::unbounded();
        let mut inner = self.inner.lock();
        let _ = tx.unbounded_send(inner.current.clone());
        inner.listeners.push(tx);
        rx.boxed()
    }
}
