//! Session driver: one connection plus one engine.
//!
//! The driver is the only place the two meet. It runs on the caller's task,
//! so the engine is never touched concurrently.

use std::time::Instant;

use tokio::sync::mpsc;

use crate::client::{ConnectionState, SessionEvent, SyncClient};
use crate::config::ClientConfig;
use crate::engine::Engine;
use crate::error::SessionError;

/// A client's seat at one game.
pub struct GameSession {
    client: SyncClient,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    engine: Engine,
    state: ConnectionState,
}

impl GameSession {
    pub fn new(config: ClientConfig) -> Result<Self, SessionError> {
        let engine = Engine::new(config.player_id.clone(), config.move_interval);
        let mut client = SyncClient::new(config)?;
        let events = client.take_event_rx().ok_or(SessionError::Closed)?;
        Ok(Self {
            client,
            events,
            engine,
            state: ConnectionState::Connecting,
        })
    }

    /// Start connecting in the background.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.client.connect()
    }

    /// Wait for the next connection event and apply it to the engine.
    ///
    /// Connection state changes never touch the table: local stacks stay
    /// until a snapshot after the reconnect settles them.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.events.recv().await?;
        match &event {
            SessionEvent::StateChanged(state) => {
                self.state = *state;
            }
            SessionEvent::Received(received) => {
                self.engine.apply_event(received.clone());
            }
        }
        Some(event)
    }

    /// Hand every queued engine action to the connection. Returns how many
    /// were sent.
    pub fn flush(&mut self) -> Result<usize, SessionError> {
        let actions = self.engine.drain_outbox();
        let count = actions.len();
        for action in actions {
            self.client.send(action)?;
        }
        Ok(count)
    }

    /// Run the move ticker and flush what it produced.
    pub fn tick(&mut self, now: Instant) -> Result<usize, SessionError> {
        let moves = self.engine.tick(now);
        if moves > 0 {
            self.flush()?;
        }
        Ok(moves)
    }

    /// Flush, leave the game and close the connection.
    pub async fn close(&mut self) {
        if let Err(e) = self.flush() {
            log::debug!("Unsent actions at close: {e}");
        }
        self.client.close().await;
        self.state = ConnectionState::Closed;
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Last connection state seen by [`GameSession::next_event`].
    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    pub fn config(&self) -> &ClientConfig {
        self.client.config()
    }
}
