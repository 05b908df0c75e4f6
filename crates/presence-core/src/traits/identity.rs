//! Identity provider port

use futures::stream::BoxStream;

use crate::entities::Identity;

/// Ordered stream of identity states; `None` means signed out
pub type IdentityStream = BoxStream<'static, Option<Identity>>;

/// External source of authentication state
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to identity changes
    ///
    /// The current state is delivered first, followed by every change in
    /// order. Dropping the stream unsubscribes.
    fn subscribe(&self) -> IdentityStream;
}
