//! # presence-service
//!
//! The presence-tracking core. A [`LifecycleCoordinator`] watches the
//! identity provider through a [`SessionWatcher`], publishes the client's own
//! record with a [`PresencePublisher`], follows everyone else through a
//! [`PresenceSubscriber`], and exposes the result as an [`OnlineUsersView`].
//!
//! ```ignore
//! let identities = LocalIdentityProvider::new();
//! let store = Arc::new(MemoryPresenceStore::new().connect());
//! let handle = LifecycleCoordinator::spawn(&identities, store, CoordinatorConfig::default());
//!
//! identities.sign_in(Identity::new(ClientId::parse("alice")?, None));
//! let state = handle.view().wait_until(|s| !s.loading).await;
//! ```

pub mod coordinator;
pub mod identity;
pub mod publisher;
pub mod session;
pub mod subscriber;
pub mod view;

pub use coordinator::{CoordinatorConfig, CoordinatorHandle, LifecycleCoordinator, LifecyclePhase};
pub use identity::LocalIdentityProvider;
pub use publisher::{PresencePublisher, Retraction};
pub use session::SessionWatcher;
pub use subscriber::{OnlineSetFeed, PresenceSubscriber};
pub use view::{OnlineUsersState, OnlineUsersView};
