//! Turns raw identity notifications into session transitions

use futures::StreamExt;
use presence_core::{Identity, IdentityProvider, IdentityStream, Session, SessionEvent};
use tracing::debug;

/// What the watcher last reported
#[derive(Debug)]
enum Observed {
    /// Nothing delivered yet
    Unknown,
    Absent,
    Present(Session),
}

/// Serialized stream of [`SessionEvent`]s over an identity provider
///
/// Never yields two `Started` in a row: switching directly from one client to
/// another yields `Ended` followed by `Started`. Repeated notifications for
/// the same state are coalesced.
pub struct SessionWatcher {
    identities: Option<IdentityStream>,
    default_display_name: String,
    observed: Observed,
    /// `Started` queued behind the `Ended` of a direct switch
    pending: Option<SessionEvent>,
}

impl std::fmt::Debug for SessionWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWatcher")
            .field("subscribed", &self.identities.is_some())
            .field("observed", &self.observed)
            .finish()
    }
}

impl SessionWatcher {
    pub fn new(provider: &dyn IdentityProvider, default_display_name: impl Into<String>) -> Self {
        Self::from_stream(provider.subscribe(), default_display_name)
    }

    pub fn from_stream(identities: IdentityStream, default_display_name: impl Into<String>) -> Self {
        Self {
            identities: Some(identities),
            default_display_name: default_display_name.into(),
            observed: Observed::Unknown,
            pending: None,
        }
    }

    /// Next transition, or `None` once unsubscribed or the provider is gone
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.identities.is_none() {
            return None;
        }
        if let Some(event) = self.pending.take() {
            return Some(event);
        }

        loop {
            let identities = self.identities.as_mut()?;
            let Some(identity) = identities.next().await else {
                debug!("Identity provider closed its stream");
                self.identities = None;
                return None;
            };
            if let Some(event) = self.observe(identity) {
                debug!(event = event.name(), "Session transition");
                return Some(event);
            }
        }
    }

    /// Stop watching; takes effect immediately, dropping anything queued
    pub fn unsubscribe(&mut self) {
        self.identities = None;
        self.pending = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.identities.is_some()
    }

    fn observe(&mut self, identity: Option<Identity>) -> Option<SessionEvent> {
        let Some(identity) = identity else {
            if matches!(self.observed, Observed::Absent) {
                return None;
            }
            self.observed = Observed::Absent;
            return Some(SessionEvent::Ended);
        };

        let session = identity.into_session(&self.default_display_name);
        let was_present = match &self.observed {
            Observed::Present(current) if current.same_client(&session) => return None,
            Observed::Present(_) => true,
            Observed::Unknown | Observed::Absent => false,
        };

        self.observed = Observed::Present(session.clone());
        if was_present {
            self.pending = Some(SessionEvent::Started(session));
            Some(SessionEvent::Ended)
        } else {
            Some(SessionEvent::Started(session))
        }
    }
}
