//! Connection lifecycle state machine and the engine handle around it.
//!
//! The machine is a pure reducer: every transition is a deterministic
//! function of `(state, event)` returning the next state plus a side
//! effect for the driver to perform (attach or detach the block
//! listener). All I/O — resolving connections, confirming identity,
//! fetching block data — happens outside and is fed back in as events.
//!
//! A single driver task owns the state and the
//! [`SubscriptionController`], consuming events from an unbounded
//! channel, so only one transition executes at a time. Callers interact
//! through the [`FeeEngine`] handle: they submit events and read
//! [`EngineSnapshot`]s, never the state itself.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    connection::{
        resolver::{self, ConnectionSpec},
        Connection,
    },
    error::EngineFault,
    history::BlockHistory,
    subscription::SubscriptionController,
    types::{BlockSummary, FeeSuggestion, Network},
};

/// A connection adopted by the state machine, tagged with the id used to
/// recognize stale aggregation results.
#[derive(Clone)]
pub struct ActiveConnection {
    pub id: u64,
    pub connection: Arc<dyn Connection>,
    pub network: Network,
}

impl std::fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveConnection")
            .field("id", &self.id)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Latest aggregation result plus the bounded history behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeReport {
    pub suggestion: FeeSuggestion,
    pub latest_block: BlockSummary,
    pub history: BlockHistory,
}

/// Context retained by a [`EngineState::Faulted`] state so non-fatal
/// faults do not tear down a working connection.
#[derive(Debug, Clone)]
pub struct PriorContext {
    pub connection: ActiveConnection,
    pub subscribed: bool,
    pub data: Option<FeeReport>,
}

/// The lifecycle states. Exactly one is current at any time.
#[derive(Debug, Clone, Default)]
pub enum EngineState {
    /// No connection.
    #[default]
    Idle,
    /// Connection adopted, block feed not attached.
    Ready(ActiveConnection),
    /// Block feed attached; `data` is `None` until the first block lands.
    Subscribed { connection: ActiveConnection, data: Option<FeeReport> },
    /// A fault is being surfaced. Advisory faults keep the prior context
    /// operative so the engine can keep serving it.
    Faulted { error: EngineFault, prior: Option<PriorContext> },
}

/// Events consumed by the reducer.
pub enum EngineEvent {
    /// A resolved connection with confirmed identity, ready for adoption.
    Adopt { connection_id: u64, connection: Arc<dyn Connection>, network: Network },
    /// Connection resolution or identity confirmation failed.
    Fault(EngineFault),
    Subscribe,
    Unsubscribe,
    /// Completed aggregation for one block, tagged with the connection it
    /// was started for.
    NewData { connection_id: u64, suggestion: FeeSuggestion, summary: BlockSummary },
    Reset,
}

impl std::fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::Adopt { connection_id, network, .. } => f
                .debug_struct("Adopt")
                .field("connection_id", connection_id)
                .field("network", network)
                .finish_non_exhaustive(),
            EngineEvent::Fault(error) => f.debug_tuple("Fault").field(error).finish(),
            EngineEvent::Subscribe => f.write_str("Subscribe"),
            EngineEvent::Unsubscribe => f.write_str("Unsubscribe"),
            EngineEvent::NewData { connection_id, summary, .. } => f
                .debug_struct("NewData")
                .field("connection_id", connection_id)
                .field("block_number", &summary.block_number)
                .finish_non_exhaustive(),
            EngineEvent::Reset => f.write_str("Reset"),
        }
    }
}

/// Side effect the driver performs after a transition.
#[derive(Debug)]
enum Effect {
    None,
    Attach(ActiveConnection),
    Detach,
}

/// Caller-visible snapshot of the engine state.
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshot {
    pub subscribed: bool,
    pub network: Option<Network>,
    pub data: Option<FeeReport>,
    pub error: Option<EngineFault>,
}

/// The operative connection context of a state: the adopted connection,
/// whether its feed is attached, and any data it has produced. A faulted
/// state with a retained prior context stays operative.
fn context(state: &EngineState) -> Option<(&ActiveConnection, bool, Option<&FeeReport>)> {
    match state {
        EngineState::Idle | EngineState::Faulted { prior: None, .. } => None,
        EngineState::Ready(connection) => Some((connection, false, None)),
        EngineState::Subscribed { connection, data } => Some((connection, true, data.as_ref())),
        EngineState::Faulted { prior: Some(prior), .. } => {
            Some((&prior.connection, prior.subscribed, prior.data.as_ref()))
        }
    }
}

/// Applies one event. Pure: all I/O is deferred to the returned [`Effect`].
fn reduce(state: EngineState, event: EngineEvent) -> (EngineState, Effect) {
    match event {
        EngineEvent::Adopt { connection_id, connection, network } => {
            if let Some((current, subscribed, data)) = context(&state) {
                if current.network.chain_id == network.chain_id {
                    // Advisory fault: the candidate is dropped and the
                    // existing connection, feed, and data stay in place.
                    let prior = PriorContext {
                        connection: current.clone(),
                        subscribed,
                        data: data.cloned(),
                    };
                    return (
                        EngineState::Faulted {
                            error: EngineFault::SameNetwork { chain_id: network.chain_id },
                            prior: Some(prior),
                        },
                        Effect::None,
                    );
                }

                let effect = if subscribed { Effect::Detach } else { Effect::None };
                let adopted = ActiveConnection { id: connection_id, connection, network };
                return (EngineState::Ready(adopted), effect);
            }

            let adopted = ActiveConnection { id: connection_id, connection, network };
            (EngineState::Ready(adopted), Effect::None)
        }

        EngineEvent::Fault(error) => {
            // Hard faults clear data but keep the connection around for
            // continued operation.
            let prior = context(&state).map(|(connection, subscribed, _)| PriorContext {
                connection: connection.clone(),
                subscribed,
                data: None,
            });
            (EngineState::Faulted { error, prior }, Effect::None)
        }

        EngineEvent::Subscribe => match context(&state) {
            Some((connection, _, data)) => {
                let connection = connection.clone();
                let data = data.cloned();
                let effect = Effect::Attach(connection.clone());
                (EngineState::Subscribed { connection, data }, effect)
            }
            None => (state, Effect::None),
        },

        EngineEvent::Unsubscribe => match context(&state) {
            Some((connection, subscribed, _)) => {
                let effect = if subscribed { Effect::Detach } else { Effect::None };
                (EngineState::Ready(connection.clone()), effect)
            }
            None => (state, Effect::None),
        },

        EngineEvent::NewData { connection_id, suggestion, summary } => {
            match context(&state) {
                Some((connection, true, data)) if connection.id == connection_id => {
                    // Prior latest block rolls into history; first arrival
                    // seeds an empty history.
                    let history = data
                        .map(|d| d.history.push(d.latest_block))
                        .unwrap_or_default();
                    let report =
                        FeeReport { suggestion, latest_block: summary, history };
                    (
                        EngineState::Subscribed {
                            connection: connection.clone(),
                            data: Some(report),
                        },
                        Effect::None,
                    )
                }
                // Stale result from a replaced connection, or the feed is
                // no longer attached.
                _ => {
                    tracing::debug!(
                        connection_id = connection_id,
                        block_number = summary.block_number,
                        "dropping aggregation result"
                    );
                    (state, Effect::None)
                }
            }
        }

        EngineEvent::Reset => (EngineState::Idle, Effect::Detach),
    }
}

fn snapshot_of(state: &EngineState) -> EngineSnapshot {
    let error = match state {
        EngineState::Faulted { error, .. } => Some(error.clone()),
        _ => None,
    };
    match context(state) {
        Some((connection, subscribed, data)) => EngineSnapshot {
            subscribed,
            network: Some(connection.network.clone()),
            data: data.cloned(),
            error,
        },
        None => EngineSnapshot { error, ..EngineSnapshot::default() },
    }
}

/// Handle to a running fee engine.
///
/// All operations are fire-and-observe: they enqueue an event and return;
/// the outcome becomes visible through [`snapshot`](FeeEngine::snapshot).
pub struct FeeEngine {
    events: mpsc::UnboundedSender<EngineEvent>,
    snapshot: Arc<RwLock<EngineSnapshot>>,
    next_connection_id: AtomicU64,
    poll_interval: Duration,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl FeeEngine {
    /// Spawns the driver task and returns the handle.
    ///
    /// `poll_interval` applies to connections without a WebSocket feed.
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let snapshot = Arc::new(RwLock::new(EngineSnapshot::default()));

        let controller = SubscriptionController::new(events.clone());
        let driver = tokio::spawn(Self::drive(rx, controller, Arc::clone(&snapshot)));

        Self {
            events,
            snapshot,
            next_connection_id: AtomicU64::new(1),
            poll_interval,
            driver: Mutex::new(Some(driver)),
        }
    }

    async fn drive(
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        mut controller: SubscriptionController,
        snapshot: Arc<RwLock<EngineSnapshot>>,
    ) {
        let mut state = EngineState::default();

        while let Some(event) = events.recv().await {
            tracing::debug!(event = ?event, "applying lifecycle event");
            let (next, effect) = reduce(state, event);
            state = next;

            match effect {
                Effect::None => {}
                Effect::Attach(active) => controller.attach(active.id, active.connection),
                Effect::Detach => controller.detach(),
            }

            *snapshot.write() = snapshot_of(&state);
        }

        // Handle dropped: tear down the feed before exiting.
        controller.detach();
    }

    /// Resolves `spec`, confirms the connection's identity, and submits it
    /// for adoption. Failures surface as `error` in the snapshot.
    pub async fn connect(&self, spec: &ConnectionSpec) {
        match resolver::resolve(spec, self.poll_interval) {
            Ok(connection) => self.connect_to(connection).await,
            Err(e) => {
                tracing::warn!(error = %e, "connection spec rejected");
                self.send(EngineEvent::Fault(e.into()));
            }
        }
    }

    /// Adopts an already-built connection after confirming its identity.
    pub async fn connect_to(&self, connection: Arc<dyn Connection>) {
        match connection.network().await {
            Ok(network) => {
                let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                tracing::info!(network = %network, connection_id = connection_id, "connection identified");
                self.send(EngineEvent::Adopt { connection_id, connection, network });
            }
            Err(e) => {
                tracing::warn!(error = %e, "identity confirmation failed");
                self.send(EngineEvent::Fault(EngineFault::ConstructionFailure(e.to_string())));
            }
        }
    }

    /// Attaches the block feed to the current connection.
    pub fn subscribe(&self) {
        self.send(EngineEvent::Subscribe);
    }

    /// Detaches the block feed and clears accumulated data.
    pub fn unsubscribe(&self) {
        self.send(EngineEvent::Unsubscribe);
    }

    /// Drops the connection and returns to `Idle`.
    pub fn reset(&self) {
        self.send(EngineEvent::Reset);
    }

    /// Current state snapshot.
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshot.read().clone()
    }

    /// Stops the driver task. Further operations become no-ops.
    pub fn shutdown(&self) {
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
    }

    fn send(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!("engine driver is no longer running");
        }
    }
}

impl Drop for FeeEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
