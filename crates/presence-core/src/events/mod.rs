//! Session events emitted by the session watcher

mod session_event;

pub use session_event::SessionEvent;
