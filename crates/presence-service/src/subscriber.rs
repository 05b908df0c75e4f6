//! Presence subscriber
//!
//! Follows the whole presence key range and turns each store snapshot into an
//! [`OnlineSet`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::{Stream, StreamExt};
use presence_core::{
    KeyPrefix, OnlineSet, PresenceError, PresenceResult, PresenceStore, SnapshotStream, StoreError,
};
use tracing::{debug, warn};

/// Opens online-set feeds over one key range
#[derive(Clone)]
pub struct PresenceSubscriber {
    store: Arc<dyn PresenceStore>,
    prefix: KeyPrefix,
}

impl std::fmt::Debug for PresenceSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceSubscriber")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl PresenceSubscriber {
    pub fn new(store: Arc<dyn PresenceStore>, prefix: KeyPrefix) -> Self {
        Self { store, prefix }
    }

    /// Open a new subscription
    pub async fn start(&self) -> PresenceResult<OnlineSetFeed> {
        let snapshots = self.store.subscribe(&self.prefix).await.map_err(|e| {
            warn!(prefix = %self.prefix, error = %e, "Failed to open presence subscription");
            PresenceError::SubscriptionFailed(e)
        })?;
        debug!(prefix = %self.prefix, "Presence subscription opened");
        Ok(OnlineSetFeed {
            snapshots: Some(snapshots),
        })
    }
}

/// One online set per store notification, in arrival order
///
/// The feed never restarts. A store error is yielded once as
/// [`PresenceError::SubscriptionFailed`] and the feed then ends; recovering
/// needs a new [`PresenceSubscriber::start`].
pub struct OnlineSetFeed {
    snapshots: Option<SnapshotStream>,
}

impl std::fmt::Debug for OnlineSetFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnlineSetFeed")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl OnlineSetFeed {
    /// Close the subscription
    ///
    /// Takes effect immediately: notifications already buffered are dropped
    /// along with the store stream.
    pub fn stop(&mut self) {
        if self.snapshots.take().is_some() {
            debug!("Presence subscription stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.snapshots.is_none()
    }
}

impl Stream for OnlineSetFeed {
    type Item = PresenceResult<OnlineSet>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(snapshots) = self.snapshots.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(snapshots.poll_next_unpin(cx)) {
            Some(Ok(snapshot)) => Poll::Ready(Some(Ok(snapshot.online_set()))),
            Some(Err(e)) => {
                self.snapshots = None;
                Poll::Ready(Some(Err(PresenceError::SubscriptionFailed(e))))
            }
            // The store never ends a live subscription on its own
            None => {
                self.snapshots = None;
                Poll::Ready(Some(Err(PresenceError::SubscriptionFailed(
                    StoreError::Closed,
                ))))
            }
        }
    }
}
