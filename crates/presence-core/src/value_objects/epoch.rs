//! Lifecycle epochs
//!
//! An epoch names one session's lifecycle inside a coordinator: the client
//! id of the session plus a generation number that only ever grows. Every
//! asynchronous operation is issued under an epoch, and its completion is
//! applied only while that epoch is still current.

use std::fmt;

use super::ClientId;

/// Tag identifying one activation of one session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Epoch {
    client_id: ClientId,
    generation: u64,
}

impl Epoch {
    /// Create an epoch tag
    pub fn new(client_id: ClientId, generation: u64) -> Self {
        Self {
            client_id,
            generation,
        }
    }

    /// Client id of the session this epoch belongs to
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Generation number
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.client_id, self.generation)
    }
}

/// Monotonic generation counter
#[derive(Debug, Default)]
pub struct EpochCounter {
    last: u64,
}

impl EpochCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next epoch for the given client
    pub fn next(&mut self, client_id: ClientId) -> Epoch {
        self.last = self.last.saturating_add(1);
        Epoch::new(client_id, self.last)
    }

    /// Last generation handed out (0 if none)
    pub fn last_generation(&self) -> u64 {
        self.last
    }
}
