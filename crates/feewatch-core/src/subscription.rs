//! Block subscription controller.
//!
//! Sole owner of the attach/detach discipline on connections: no other
//! component touches a connection's listener slot. At most one connection
//! has a listener at a time, and a listener on a previous connection is
//! always removed before one is attached to a different connection.
//!
//! Each block event spawns an independent aggregation task; completed
//! tasks deliver [`EngineEvent::NewData`] tagged with the connection id so
//! the state machine can drop results from a connection that has since
//! been replaced.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{aggregator, connection::Connection, engine::EngineEvent};

struct ActiveListener {
    connection_id: u64,
    connection: Arc<dyn Connection>,
}

/// Owns the single block listener across connection replacements.
pub struct SubscriptionController {
    events: mpsc::UnboundedSender<EngineEvent>,
    active: Option<ActiveListener>,
}

impl SubscriptionController {
    #[must_use]
    pub fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { events, active: None }
    }

    /// Attaches the block listener to `connection`.
    ///
    /// Idempotent per connection id. Attaching to a different connection
    /// first detaches the listener from the previous one.
    pub fn attach(&mut self, connection_id: u64, connection: Arc<dyn Connection>) {
        if self.active.as_ref().is_some_and(|a| a.connection_id == connection_id) {
            return;
        }
        self.detach();

        let events = self.events.clone();
        let task_connection = Arc::clone(&connection);
        connection.on_block(Box::new(move |block_number| {
            let events = events.clone();
            let connection = Arc::clone(&task_connection);
            tokio::spawn(async move {
                let (suggestion, summary) = aggregator::aggregate(&connection, block_number).await;
                // Send fails only when the engine has shut down.
                let _ = events.send(EngineEvent::NewData { connection_id, suggestion, summary });
            });
        }));

        tracing::debug!(connection_id = connection_id, "block listener attached");
        self.active = Some(ActiveListener { connection_id, connection });
    }

    /// Detaches the listener from the active connection, if any.
    pub fn detach(&mut self) {
        if let Some(active) = self.active.take() {
            active.connection.off_block();
            tracing::debug!(connection_id = active.connection_id, "block listener detached");
        }
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.active.is_some()
    }
}
