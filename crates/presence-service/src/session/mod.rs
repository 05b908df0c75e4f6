//! Session watching

mod watcher;

pub use watcher::SessionWatcher;
