//! Connection manager: owns the single persistent socket.
//!
//! [`ConnectionManager`] interprets the actions of the pure
//! [`ConnectionState`] machine from chat-core: it opens and closes the
//! socket through a [`Transport`], runs the reconnect timer, and feeds every
//! inbound frame to a synchronous frame handler, one frame at a time.
//!
//! ```text
//! connect() → [driver task] → Transport → Network
//!                  ↓
//!      chat-core ConnectionState (pure state machine)
//! ```
//!
//! The manager is a cheap, cloneable handle. All clones share one socket.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use parley_chat_core::{Action, ConnectionEvent, ConnectionState, Event, ReconnectPolicy};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::transport::Transport;

/// Callback run when the socket opens, and again after the presence delay.
pub type OnOpen = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Synchronous handler for one inbound text frame.
pub type FrameHandler = Arc<dyn Fn(&str) -> HandlerFlow + Send + Sync>;

/// What the read loop does after a frame was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFlow {
    /// Keep reading.
    Continue,
    /// Close the socket and stop without reconnecting.
    Stop,
}

/// Outcome of an outbound send.
///
/// Sends are never queued: with no open socket the frame is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the open socket.
    Sent,
    /// Dropped (no open socket, or the socket failed).
    Dropped,
}

impl Delivery {
    /// Whether the frame was handed to the socket.
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

/// Owner of the single persistent connection.
pub struct ConnectionManager<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    transport: T,
    url: String,
    policy: ReconnectPolicy,
    presence_delay: Duration,
    handler: FrameHandler,
    state: Mutex<ConnectionState>,
    // Bumped on every connect/disconnect; a driver or timer whose
    // generation is stale must not act.
    generation: watch::Sender<u64>,
    // Bumped on every successful open; delayed work for an older socket
    // must not run on its replacement.
    socket_epoch: AtomicU64,
    events: broadcast::Sender<ConnectionEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

enum ReadOutcome {
    Closed(String),
    Stopped,
    Cancelled,
}

impl<T: Transport + 'static> ConnectionManager<T> {
    /// Create a manager for `url`. Nothing is opened until [`connect`](Self::connect).
    pub fn new(
        transport: T,
        url: &str,
        policy: ReconnectPolicy,
        presence_delay: Duration,
        handler: FrameHandler,
    ) -> Self {
        let (generation, _) = watch::channel(0);
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                transport,
                url: url.to_string(),
                policy,
                presence_delay,
                handler,
                state: Mutex::new(ConnectionState::new()),
                generation,
                socket_epoch: AtomicU64::new(0),
                events,
                task: Mutex::new(None),
            }),
        }
    }

    /// Open the connection and keep it open until [`disconnect`](Self::disconnect).
    ///
    /// A no-op returning `false` while a socket is open or being
    /// (re)established. Must be called from within a tokio runtime.
    pub fn connect(&self, on_open: Option<OnOpen>) -> bool {
        let actions = self.inner.apply(Event::ConnectRequested);
        if !actions.contains(&Action::Connect) {
            tracing::debug!("Connect ignored, connection is {}", self.state().name());
            return false;
        }

        let generation = self.inner.bump_generation();
        let driver = tokio::spawn(drive(Arc::clone(&self.inner), generation, on_open, actions));
        if let Some(previous) = lock(&self.inner.task).replace(driver) {
            previous.abort();
        }
        true
    }

    /// Close the socket and cancel any pending reconnect.
    pub async fn disconnect(&self) {
        let actions = self.inner.apply(Event::DisconnectRequested);
        self.inner.bump_generation();

        let driver = lock(&self.inner.task).take();
        if let Some(driver) = driver {
            driver.abort();
            // Wait for the driver to be dropped so it cannot reopen the socket
            let _ = driver.await;
        }

        self.inner.teardown(actions).await;
    }

    /// Check if the socket is open.
    pub fn is_connected(&self) -> bool {
        self.inner.is_open()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.state).clone()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Send one frame if the socket is open; otherwise drop it.
    pub async fn send(&self, frame: &str) -> Delivery {
        if !self.is_connected() {
            tracing::debug!("Not connected, dropping outbound frame");
            return Delivery::Dropped;
        }
        match self.inner.transport.send(frame).await {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                tracing::warn!("Send failed, dropping outbound frame: {}", e);
                Delivery::Dropped
            }
        }
    }

    /// Get the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T: Transport> Inner<T> {
    fn apply(&self, event: Event) -> Vec<Action> {
        let mut state = lock(&self.state);
        let (next, actions) = state.clone().on_event(event, &self.policy);
        if *state != next {
            tracing::debug!("Connection {} -> {}", state.name(), next.name());
        }
        *state = next;
        actions
    }

    fn is_open(&self) -> bool {
        lock(&self.state).is_connected()
    }

    fn current_socket(&self) -> u64 {
        self.socket_epoch.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) -> u64 {
        let mut current = 0;
        self.generation.send_modify(|g| {
            *g += 1;
            current = *g;
        });
        current
    }

    fn is_live(&self, generation: u64) -> bool {
        *self.generation.borrow() == generation
    }

    /// Sleep for `delay` unless the generation changes first.
    /// Returns whether the caller is still live.
    async fn wait_or_cancel(&self, delay: Duration, generation: u64) -> bool {
        let mut changes = self.generation.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = changes.changed() => {}
        }
        self.is_live(generation)
    }

    fn emit(&self, event: ConnectionEvent) {
        match &event {
            ConnectionEvent::Opened => tracing::info!("Connected to {}", self.url),
            ConnectionEvent::Lost {
                reason,
                attempt,
                retry_in,
            } => tracing::info!(
                "Connection lost ({}), retry {} in {:?}",
                reason,
                attempt,
                retry_in
            ),
            ConnectionEvent::CircuitOpen { failures, cooldown } => tracing::warn!(
                "{} consecutive connection failures, backing off for {:?}",
                failures,
                cooldown
            ),
            ConnectionEvent::Disconnected => tracing::info!("Disconnected"),
        }
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn close_socket(&self) {
        if let Err(e) = self.transport.close().await {
            tracing::warn!("Error closing socket: {}", e);
        }
    }

    async fn teardown(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Disconnect => self.close_socket().await,
                Action::EmitEvent(event) => self.emit(event),
                _ => {}
            }
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The driver task: executes state machine actions and runs the read loop
/// while the socket is open.
async fn drive<T: Transport + 'static>(
    inner: Arc<Inner<T>>,
    generation: u64,
    on_open: Option<OnOpen>,
    initial: Vec<Action>,
) {
    let mut pending: VecDeque<Action> = initial.into();
    let mut opened_at = Instant::now();

    loop {
        while let Some(action) = pending.pop_front() {
            if !inner.is_live(generation) {
                return;
            }
            match action {
                Action::Connect => {
                    // Never two sockets at once, even a half-dead one
                    inner.close_socket().await;
                    tracing::debug!("Connecting to {}", inner.url);
                    let event = match inner.transport.connect(&inner.url).await {
                        Ok(()) => {
                            opened_at = Instant::now();
                            inner.socket_epoch.fetch_add(1, Ordering::SeqCst);
                            Event::ConnectSucceeded
                        }
                        Err(e) => {
                            tracing::warn!("Connection attempt failed: {}", e);
                            Event::ConnectFailed {
                                error: e.to_string(),
                            }
                        }
                    };
                    pending.extend(inner.apply(event));
                }
                Action::RunOnOpen => {
                    if let Some(on_open) = &on_open {
                        on_open().await;
                    }
                }
                Action::SchedulePresence => {
                    if let Some(on_open) = on_open.clone() {
                        schedule_presence(Arc::clone(&inner), generation, on_open);
                    }
                }
                Action::StartReconnectTimer { delay } => {
                    if !inner.wait_or_cancel(delay, generation).await {
                        return;
                    }
                    pending.extend(inner.apply(Event::ReconnectTimer));
                }
                Action::EmitEvent(event) => inner.emit(event),
                Action::Disconnect => inner.close_socket().await,
                Action::CancelReconnect => {}
            }
        }

        if !inner.is_open() {
            return;
        }

        match read_frames(&inner, generation).await {
            ReadOutcome::Closed(reason) => {
                let uptime = opened_at.elapsed();
                pending.extend(inner.apply(Event::Closed { reason, uptime }));
            }
            ReadOutcome::Stopped => {
                let actions = inner.apply(Event::DisconnectRequested);
                inner.bump_generation();
                inner.teardown(actions).await;
                return;
            }
            ReadOutcome::Cancelled => return,
        }
    }
}

async fn read_frames<T: Transport>(inner: &Inner<T>, generation: u64) -> ReadOutcome {
    loop {
        match inner.transport.recv().await {
            Ok(frame) => {
                if !inner.is_live(generation) {
                    return ReadOutcome::Cancelled;
                }
                if (inner.handler)(&frame) == HandlerFlow::Stop {
                    return ReadOutcome::Stopped;
                }
            }
            Err(e) => {
                tracing::warn!("Socket closed: {}", e);
                return ReadOutcome::Closed(e.to_string());
            }
        }
    }
}

fn schedule_presence<T: Transport + 'static>(
    inner: Arc<Inner<T>>,
    generation: u64,
    on_open: OnOpen,
) {
    let socket = inner.current_socket();
    tokio::spawn(async move {
        if !inner.wait_or_cancel(inner.presence_delay, generation).await {
            return;
        }
        if inner.is_open() && inner.current_socket() == socket {
            on_open().await;
        }
    });
}
