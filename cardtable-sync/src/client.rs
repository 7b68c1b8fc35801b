//! WebSocket connection to the game server.
//!
//! Provides:
//! - Connection lifecycle (connect, reconnect with backoff, close)
//! - Bearer-token authentication on the upgrade request
//! - Join-then-flush ordering and the periodic ping
//! - A backlog that keeps every action until it is written
//!
//! ```text
//! Connecting ──► Open ──► Closed
//!                 │  ▲
//!                 ▼  │
//!             Reconnecting ──► Closed (attempt limit)
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::protocol::{Action, Event, Inbound};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(ConnectionState),
    Received(Event),
}

/// Actions waiting for an open connection, oldest first.
///
/// Unbounded: dropping an intent would desync the table for good.
#[derive(Debug, Default)]
pub struct Backlog {
    queue: VecDeque<Action>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, action: Action) {
        self.queue.push_back(action);
    }

    /// Put back an action whose write failed, ahead of everything else.
    pub fn push_front(&mut self, action: Action) {
        self.queue.push_front(action);
    }

    pub fn pop_front(&mut self) -> Option<Action> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Debug)]
enum Command {
    Send(Action),
    Close,
}

/// How a served connection ended.
enum Exit {
    Dropped,
    GameClosed,
    Requested,
}

/// The game connection.
///
/// All socket I/O runs on one supervisor task; this handle only talks to
/// it through channels.
pub struct SyncClient {
    config: ClientConfig,

    /// Connection state
    state: Arc<RwLock<ConnectionState>>,

    /// Channel to the supervisor task
    command_tx: mpsc::UnboundedSender<Command>,

    /// Taken by the supervisor on connect
    command_rx: Option<mpsc::UnboundedReceiver<Command>>,

    /// Event receiver for the application
    event_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,

    /// Event sender (held by the supervisor)
    event_tx: mpsc::UnboundedSender<SessionEvent>,

    task: Option<JoinHandle<()>>,
}

impl SyncClient {
    /// Create a client. Fails if the token cannot be presented.
    pub fn new(config: ClientConfig) -> Result<Self, SessionError> {
        build_request(&config)?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Connecting)),
            command_tx,
            command_rx: Some(command_rx),
            event_rx: Some(event_rx),
            event_tx,
            task: None,
        })
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Spawn the supervisor task. Returns immediately; progress is
    /// reported through [`SessionEvent::StateChanged`].
    pub fn connect(&mut self) -> Result<(), SessionError> {
        let commands = self.command_rx.take().ok_or(SessionError::Closed)?;
        let supervisor = Supervisor {
            config: self.config.clone(),
            state: self.state.clone(),
            commands,
            events: self.event_tx.clone(),
            backlog: Backlog::new(),
        };
        self.task = Some(tokio::spawn(supervisor.run()));
        Ok(())
    }

    /// Queue an action. Never drops it: while the connection is down it
    /// waits in the backlog.
    pub fn send(&self, action: Action) -> Result<(), SessionError> {
        self.command_tx
            .send(Command::Send(action))
            .map_err(|_| SessionError::Closed)
    }

    /// Leave the game and close the socket.
    pub async fn close(&mut self) {
        let _ = self.command_tx.send(Command::Close);
        match self.task.take() {
            Some(task) => {
                if let Err(e) = task.await {
                    log::error!("Connection task failed: {e}");
                }
            }
            None => {
                *self.state.write().await = ConnectionState::Closed;
            }
        }
    }

    /// Get the current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Upgrade request carrying the bearer token.
fn build_request(config: &ClientConfig) -> Result<Request, SessionError> {
    if config.token.trim().is_empty() {
        return Err(SessionError::InvalidToken);
    }
    let mut request = config.url.as_str().into_client_request()?;
    let value = HeaderValue::from_str(&format!("Bearer {}", config.token))
        .map_err(|_| SessionError::InvalidToken)?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

// ───────────────────── supervisor ─────────────────────

struct Supervisor {
    config: ClientConfig,
    state: Arc<RwLock<ConnectionState>>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
    backlog: Backlog,
}

impl Supervisor {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        self.set_state(ConnectionState::Connecting).await;

        loop {
            match self.open().await {
                Ok(ws) => {
                    attempt = 0;
                    match self.serve(ws).await {
                        Exit::GameClosed | Exit::Requested => break,
                        Exit::Dropped => {
                            log::warn!("Connection to {} lost", self.config.url);
                        }
                    }
                }
                Err(e) if !e.is_retryable() => {
                    log::error!("Not reconnecting to {}: {e}", self.config.url);
                    break;
                }
                Err(e) => {
                    log::warn!("Connecting to {} failed: {e}", self.config.url);
                }
            }

            if !self.config.backoff.allows(attempt) {
                log::error!("Giving up after {attempt} reconnect attempts");
                break;
            }
            self.set_state(ConnectionState::Reconnecting).await;
            let delay = self.config.backoff.delay(attempt);
            attempt += 1;
            log::debug!("Reconnecting in {delay:?} (attempt {attempt})");
            if !self.wait(delay).await {
                break;
            }
        }

        if !self.backlog.is_empty() {
            log::warn!("Closing with {} unsent actions", self.backlog.len());
        }
        self.set_state(ConnectionState::Closed).await;
    }

    async fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write().await;
        if *state == next {
            return;
        }
        log::info!("Connection {} -> {}", *state, next);
        *state = next;
        drop(state);
        let _ = self.events.send(SessionEvent::StateChanged(next));
    }

    async fn open(&self) -> Result<WsStream, SessionError> {
        let request = build_request(&self.config)?;
        match tokio_tungstenite::connect_async(request).await {
            Ok((ws, _response)) => Ok(ws),
            Err(tungstenite::Error::Http(response))
                if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) =>
            {
                Err(SessionError::InvalidToken)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sleep out a backoff delay, still accepting actions. Returns false
    /// if the client asked to close.
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Send(action)) => self.backlog.push_back(action),
                    Some(Command::Close) | None => return false,
                },
            }
        }
    }

    async fn serve(&mut self, ws: WsStream) -> Exit {
        let (mut sink, mut stream) = ws.split();
        self.set_state(ConnectionState::Open).await;

        if let Err(e) = write(&mut sink, &Action::JoinGame).await {
            log::warn!("Join failed: {e}");
            return Exit::Dropped;
        }

        if !self.backlog.is_empty() {
            log::info!("Replaying {} queued actions", self.backlog.len());
        }
        while let Some(action) = self.backlog.pop_front() {
            if !self.deliver(&mut sink, action).await {
                return Exit::Dropped;
            }
        }

        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ping.tick().await;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(action)) => {
                        if !self.deliver(&mut sink, action).await {
                            return Exit::Dropped;
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = write(&mut sink, &Action::LeaveGame).await;
                        let _ = sink.close().await;
                        return Exit::Requested;
                    }
                },
                _ = ping.tick() => {
                    if let Err(e) = write(&mut sink, &Action::Ping).await {
                        log::warn!("Ping failed: {e}");
                        return Exit::Dropped;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if self.dispatch(text.as_str()) {
                            let _ = sink.close().await;
                            return Exit::GameClosed;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            if self.dispatch(text) {
                                let _ = sink.close().await;
                                return Exit::GameClosed;
                            }
                        }
                        Err(_) => log::warn!("Dropping non-UTF-8 binary frame ({} bytes)", data.len()),
                    },
                    Some(Ok(Message::Close(_))) | None => return Exit::Dropped,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::warn!("Read failed: {e}");
                        return Exit::Dropped;
                    }
                },
            }
        }
    }

    /// Write one queued action. On transport failure the action goes back
    /// to the head of the backlog and false is returned.
    async fn deliver(&mut self, sink: &mut WsSink, action: Action) -> bool {
        match write(sink, &action).await {
            Ok(()) => true,
            Err(SessionError::Protocol(e)) => {
                log::error!("Dropping unencodable {} action: {e}", action.tag());
                true
            }
            Err(e) => {
                log::warn!("Write of {} failed: {e}", action.tag());
                self.backlog.push_front(action);
                false
            }
        }
    }

    /// Forward one inbound frame. Returns true on `close-game`.
    fn dispatch(&self, text: &str) -> bool {
        match Inbound::decode(text) {
            Ok(Inbound::Event(event)) => {
                let closing = event == Event::CloseGame;
                log::trace!("Received {}", event.tag());
                let _ = self.events.send(SessionEvent::Received(event));
                closing
            }
            Ok(Inbound::Unknown { tag }) => {
                log::debug!("Ignoring unknown frame type {tag}");
                false
            }
            Err(e) => {
                log::warn!("Dropping undecodable frame: {e}");
                false
            }
        }
    }
}

async fn write(sink: &mut WsSink, action: &Action) -> Result<(), SessionError> {
    let text = action.encode()?;
    sink.send(Message::text(text)).await?;
    Ok(())
}
