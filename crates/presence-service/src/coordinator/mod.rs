//! Lifecycle coordinator
//!
//! A single task owns all presence state. It reacts to session transitions,
//! spawns publisher and subscriber work, and applies their completions one at
//! a time. Every completion carries the epoch it was issued under; anything
//! that does not match the current epoch is dropped.
//!
//! ```text
//!            Started                 publish ok
//!   Idle ───────────────▶ Activating ───────────▶ Active
//!    ▲                        │ publish failed       │ Ended / switch
//!    │◀───────────────────────┘                      ▼
//!    └────────────────────────────────────────── Deactivating
//!                      retract settled
//! ```

mod handle;
mod message;
mod state;

pub use handle::CoordinatorHandle;
pub use state::LifecyclePhase;

use std::sync::Arc;

use futures::StreamExt;
use presence_common::PresenceSettings;
use presence_core::{
    Epoch, EpochCounter, IdentityProvider, KeyPrefix, OnlineSet, PresenceError, PresenceRecord,
    PresenceResult, PresenceStore, Session, SessionEvent, DEFAULT_DISPLAY_NAME,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use self::message::Message;
use self::state::{LifecycleState, Pending};
use crate::publisher::{PresencePublisher, Retraction};
use crate::session::SessionWatcher;
use crate::subscriber::{OnlineSetFeed, PresenceSubscriber};
use crate::view::{OnlineUsersView, ViewWriter};

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Key range holding presence records
    pub prefix: KeyPrefix,
    /// Display name for identities without one
    pub default_display_name: String,
    /// Capacity of the online-set broadcast
    pub event_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            prefix: KeyPrefix::default(),
            default_display_name: DEFAULT_DISPLAY_NAME.to_string(),
            event_buffer: 256,
        }
    }
}

impl From<&PresenceSettings> for CoordinatorConfig {
    fn from(settings: &PresenceSettings) -> Self {
        Self {
            prefix: KeyPrefix::new(settings.key_prefix.clone()),
            default_display_name: settings.default_display_name.clone(),
            event_buffer: settings.event_buffer,
        }
    }
}

/// Sequences publisher and subscriber work against session transitions
pub struct LifecycleCoordinator {
    state: LifecycleState,
    epochs: EpochCounter,
    watcher: SessionWatcher,
    publisher: PresencePublisher,
    subscriber: PresenceSubscriber,
    feed: Option<OnlineSetFeed>,
    inbox: mpsc::UnboundedReceiver<Message>,
    outbox: mpsc::UnboundedSender<Message>,
    view: ViewWriter,
    phase: watch::Sender<LifecyclePhase>,
    exiting: bool,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
}

impl LifecycleCoordinator {
    /// Spawn a coordinator watching `identities`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        identities: &dyn IdentityProvider,
        store: Arc<dyn PresenceStore>,
        config: CoordinatorConfig,
    ) -> CoordinatorHandle {
        let watcher = SessionWatcher::new(identities, config.default_display_name.clone());
        Self::spawn_with_watcher(watcher, store, config)
    }

    pub fn spawn_with_watcher(
        watcher: SessionWatcher,
        store: Arc<dyn PresenceStore>,
        config: CoordinatorConfig,
    ) -> CoordinatorHandle {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let (view_writer, view) = OnlineUsersView::channel(config.event_buffer);
        let (phase_tx, phase_rx) = watch::channel(LifecyclePhase::Idle);

        let coordinator = Self {
            state: LifecycleState::Idle,
            epochs: EpochCounter::new(),
            watcher,
            publisher: PresencePublisher::new(Arc::clone(&store), config.prefix.clone()),
            subscriber: PresenceSubscriber::new(store, config.prefix),
            feed: None,
            inbox,
            outbox: outbox.clone(),
            view: view_writer,
            phase: phase_tx,
            exiting: false,
            shutdown_waiters: Vec::new(),
        };
        tokio::spawn(coordinator.run());

        CoordinatorHandle::new(outbox, phase_rx, view)
    }

    async fn run(mut self) {
        info!("Lifecycle coordinator started");

        loop {
            if self.exiting && matches!(self.state, LifecycleState::Idle) {
                break;
            }
            let watching = self.watcher.is_subscribed();

            tokio::select! {
                biased;
                Some(message) = self.inbox.recv() => self.handle_message(message),
                event = self.watcher.next_event(), if watching => match event {
                    Some(event) => self.handle_session_event(event),
                    None => self.begin_exit("identity stream ended"),
                },
                emission = next_emission(&mut self.feed) => self.handle_emission(emission),
            }

            self.publish_phase();
        }

        self.stop_feed();
        self.inbox.close();
        for waiter in self.shutdown_waiters.drain(..) {
            let _ = waiter.send(());
        }
        info!(
            generations = self.epochs.last_generation(),
            "Lifecycle coordinator stopped"
        );
    }

    fn handle_message(&mut self, message: Message) {
        debug!(message = message.name(), "Coordinator message");
        match message {
            Message::Published { epoch, result } => self.on_published(epoch, result),
            Message::Retracted { epoch, result } => self.on_retracted(epoch, result),
            Message::Subscribed { epoch, result } => self.on_subscribed(epoch, result),
            Message::RestartSubscription => self.restart_subscription(),
            Message::Shutdown(reply) => {
                self.shutdown_waiters.push(reply);
                if !self.exiting {
                    self.begin_exit("shutdown requested");
                }
            }
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        let state = std::mem::replace(&mut self.state, LifecycleState::Idle);

        self.state = match (state, event) {
            (LifecycleState::Idle, SessionEvent::Started(session)) => self.activate(session),
            (LifecycleState::Idle, SessionEvent::Ended) => {
                self.view.signed_out();
                LifecycleState::Idle
            }
            (
                LifecycleState::Activating {
                    epoch,
                    session,
                    pending,
                },
                SessionEvent::Started(next),
            ) => {
                let pending = match pending {
                    Pending::Nothing if session.same_client(&next) => Pending::Nothing,
                    _ => Pending::Switch(next),
                };
                LifecycleState::Activating {
                    epoch,
                    session,
                    pending,
                }
            }
            (LifecycleState::Activating { epoch, session, .. }, SessionEvent::Ended) => {
                debug!(epoch = %epoch, "Session ended during activation, retract deferred");
                LifecycleState::Activating {
                    epoch,
                    session,
                    pending: Pending::End,
                }
            }
            (LifecycleState::Active { epoch, session }, SessionEvent::Started(next)) => {
                if session.same_client(&next) {
                    LifecycleState::Active { epoch, session }
                } else {
                    self.deactivate(epoch, session, Some(next))
                }
            }
            (LifecycleState::Active { epoch, session }, SessionEvent::Ended) => {
                self.deactivate(epoch, session, None)
            }
            (LifecycleState::Deactivating { epoch, session, .. }, SessionEvent::Started(next)) => {
                LifecycleState::Deactivating {
                    epoch,
                    session,
                    next: Some(next),
                }
            }
            (LifecycleState::Deactivating { epoch, session, .. }, SessionEvent::Ended) => {
                LifecycleState::Deactivating {
                    epoch,
                    session,
                    next: None,
                }
            }
        };
    }

    fn on_published(&mut self, epoch: Epoch, result: PresenceResult<PresenceRecord>) {
        let state = std::mem::replace(&mut self.state, LifecycleState::Idle);

        self.state = match state {
            LifecycleState::Activating {
                epoch: current,
                session,
                pending,
            } if current == epoch => match result {
                Ok(_) => match pending {
                    Pending::Nothing => {
                        info!(
                            client_id = %session.client_id(),
                            generation = epoch.generation(),
                            "Presence active"
                        );
                        self.start_subscription(epoch.clone());
                        LifecycleState::Active { epoch, session }
                    }
                    Pending::End => self.deactivate(epoch, session, None),
                    Pending::Switch(next) => self.deactivate(epoch, session, Some(next)),
                },
                Err(err) => {
                    error!(
                        client_id = %session.client_id(),
                        generation = epoch.generation(),
                        error = %err,
                        "Presence activation failed"
                    );
                    match pending {
                        Pending::Switch(next) if !self.exiting => {
                            self.view.fail(err);
                            self.activate(next)
                        }
                        Pending::End | Pending::Switch(_) => {
                            self.view.signed_out();
                            self.view.fail(err);
                            LifecycleState::Idle
                        }
                        Pending::Nothing => {
                            self.view.fail(err);
                            LifecycleState::Idle
                        }
                    }
                }
            },
            other => {
                self.discard_stale(epoch, "publish");
                other
            }
        };
    }

    fn on_retracted(&mut self, epoch: Epoch, result: PresenceResult<Retraction>) {
        let state = std::mem::replace(&mut self.state, LifecycleState::Idle);

        self.state = match state {
            LifecycleState::Deactivating {
                epoch: current,
                session,
                next,
            } if current == epoch => {
                self.stop_feed();
                match &result {
                    Ok(Retraction::Retracted(_)) => {
                        info!(client_id = %session.client_id(), "Presence deactivated");
                    }
                    Ok(Retraction::AlreadyOffline) => {
                        info!(client_id = %session.client_id(), "Presence deactivated, guarantee already applied");
                    }
                    Err(err) => {
                        warn!(client_id = %session.client_id(), error = %err, "Retract failed");
                    }
                }

                match next {
                    Some(next) if !self.exiting => self.activate(next),
                    _ => {
                        self.view.signed_out();
                        if let Err(err) = result {
                            self.view.fail(err);
                        }
                        LifecycleState::Idle
                    }
                }
            }
            other => {
                self.discard_stale(epoch, "retract");
                other
            }
        };
    }

    fn on_subscribed(&mut self, epoch: Epoch, result: PresenceResult<OnlineSetFeed>) {
        let wanted = matches!(
            &self.state,
            LifecycleState::Active { epoch: current, .. } if *current == epoch
        ) && self.feed.is_none();

        if !wanted {
            if let Ok(mut feed) = result {
                feed.stop();
            }
            self.discard_stale(epoch, "subscription");
            return;
        }

        match result {
            Ok(feed) => {
                debug!(epoch = %epoch, "Online set feed attached");
                self.feed = Some(feed);
            }
            Err(err) => {
                error!(epoch = %epoch, error = %err, "Presence subscription failed to start");
                self.view.fail(err);
            }
        }
    }

    fn handle_emission(&mut self, emission: Option<PresenceResult<OnlineSet>>) {
        match emission {
            Some(Ok(set)) => {
                debug!(online = set.len(), "Online set updated");
                self.view.emit(set);
            }
            Some(Err(err)) => {
                error!(error = %err, "Presence subscription failed");
                self.feed = None;
                self.view.fail(err);
            }
            None => self.feed = None,
        }
    }

    fn restart_subscription(&mut self) {
        match &self.state {
            LifecycleState::Active { epoch, .. } if self.feed.is_none() => {
                info!(epoch = %epoch, "Restarting presence subscription");
                self.start_subscription(epoch.clone());
            }
            state => debug!(phase = %state.phase(), "Subscription restart ignored"),
        }
    }

    fn begin_exit(&mut self, reason: &'static str) {
        info!(reason, phase = %self.state.phase(), "Coordinator exiting");
        self.exiting = true;
        self.watcher.unsubscribe();
        self.handle_session_event(SessionEvent::Ended);
    }

    fn activate(&mut self, session: Session) -> LifecycleState {
        let epoch = self.epochs.next(session.client_id().clone());
        info!(
            client_id = %session.client_id(),
            generation = epoch.generation(),
            "Activating presence"
        );
        self.view.activating();

        let publisher = self.publisher.clone();
        let outbox = self.outbox.clone();
        let task_epoch = epoch.clone();
        let task_session = session.clone();
        tokio::spawn(async move {
            let result = publisher.publish(&task_session).await;
            let _ = outbox.send(Message::Published {
                epoch: task_epoch,
                result,
            });
        });

        LifecycleState::Activating {
            epoch,
            session,
            pending: Pending::Nothing,
        }
    }

    fn deactivate(&mut self, epoch: Epoch, session: Session, next: Option<Session>) -> LifecycleState {
        info!(
            client_id = %session.client_id(),
            generation = epoch.generation(),
            switching = next.is_some(),
            "Deactivating presence"
        );

        let publisher = self.publisher.clone();
        let outbox = self.outbox.clone();
        let task_epoch = epoch.clone();
        let task_session = session.clone();
        tokio::spawn(async move {
            let result = publisher.retract(&task_session).await;
            let _ = outbox.send(Message::Retracted {
                epoch: task_epoch,
                result,
            });
        });

        LifecycleState::Deactivating {
            epoch,
            session,
            next,
        }
    }

    fn start_subscription(&self, epoch: Epoch) {
        let subscriber = self.subscriber.clone();
        let outbox = self.outbox.clone();
        tokio::spawn(async move {
            let result = subscriber.start().await;
            let _ = outbox.send(Message::Subscribed { epoch, result });
        });
    }

    fn stop_feed(&mut self) {
        if let Some(mut feed) = self.feed.take() {
            feed.stop();
        }
    }

    fn discard_stale(&self, epoch: Epoch, operation: &'static str) {
        let stale = PresenceError::StaleCallback { epoch };
        debug!(
            operation,
            current = ?self.state.epoch().map(ToString::to_string),
            error = %stale,
            "Discarding completion"
        );
    }

    fn publish_phase(&self) {
        let phase = self.state.phase();
        self.phase.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                *current = phase;
                true
            }
        });
    }
}

async fn next_emission(feed: &mut Option<OnlineSetFeed>) -> Option<PresenceResult<OnlineSet>> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}
