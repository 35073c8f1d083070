//! The push stream connection and its reconnect policy.
//!
//! [`Lifecycle`] holds the connection state machine without any I/O so its
//! timing rules can be tested directly. [`Transport`] drives it with a real
//! `eventsource-client` stream and hands every decoded frame to the
//! [`Dispatcher`].

use crate::dispatcher::Dispatcher;
use eventsource_client::{self as es, Client};
use events::{Id, Incoming};
use futures_util::stream::StreamExt;
use log::*;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Consecutive failures tolerated before the transport gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const BASE_RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// The server's handshake frame has arrived.
    Connected,
    /// Waiting `delay` before reconnect attempt number `attempt`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Out of attempts; only a new `connect()` leaves this state.
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Delay before reconnect attempt `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    BASE_RECONNECT_DELAY
        .saturating_mul(1u32 << exponent)
        .min(MAX_RECONNECT_DELAY)
}

/// What the driver should do after a stream failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    RetryAfter(Duration),
    GiveUp,
}

/// The connection state machine with its attempt counter.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ConnectionState,
    attempts: u32,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
        }
    }
}

impl Lifecycle {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// An explicit connect starts over with a fresh attempt budget.
    pub fn connect(&mut self) -> ConnectionState {
        self.attempts = 0;
        self.state = ConnectionState::Connecting;
        self.state
    }

    pub fn handshake(&mut self) -> ConnectionState {
        self.attempts = 0;
        self.state = ConnectionState::Connected;
        self.state
    }

    pub fn failure(&mut self) -> NextStep {
        if self.attempts < MAX_RECONNECT_ATTEMPTS {
            self.attempts += 1;
            let delay = backoff_delay(self.attempts);
            self.state = ConnectionState::Reconnecting {
                attempt: self.attempts,
                delay,
            };
            NextStep::RetryAfter(delay)
        } else {
            self.state = ConnectionState::Failed;
            NextStep::GiveUp
        }
    }

    /// The reconnect delay elapsed and the next attempt is starting.
    pub fn retry(&mut self) -> ConnectionState {
        self.state = ConnectionState::Connecting;
        self.state
    }

    pub fn disconnect(&mut self) -> ConnectionState {
        self.state = ConnectionState::Disconnected;
        self.state
    }
}

/// One push stream for one user.
pub struct Transport {
    base_url: String,
    dispatcher: Dispatcher,
    state_tx: watch::Sender<ConnectionState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    pub fn new(base_url: impl Into<String>, dispatcher: Dispatcher) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            base_url: base_url.into(),
            dispatcher,
            state_tx,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Opens the stream for `user_id`, superseding any stream or pending
    /// reconnect from an earlier call.
    pub fn connect(&self, user_id: Id) {
        let url = format!("{}/api/sse/{user_id}", self.base_url.trim_end_matches('/'));
        let dispatcher = self.dispatcher.clone();
        let state_tx = self.state_tx.clone();

        let handle = tokio::spawn(run(url, dispatcher, state_tx));
        if let Some(previous) = self.swap_task(Some(handle)) {
            previous.abort();
        }
    }

    pub fn disconnect(&self) {
        if let Some(previous) = self.swap_task(None) {
            previous.abort();
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    fn swap_task(&self, next: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
        let mut task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *task, next)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(task) = self.swap_task(None) {
            task.abort();
        }
    }
}

async fn run(url: String, dispatcher: Dispatcher, state_tx: watch::Sender<ConnectionState>) {
    let mut lifecycle = Lifecycle::default();
    state_tx.send_replace(lifecycle.connect());

    loop {
        match stream_once(&url, &dispatcher, &state_tx, &mut lifecycle).await {
            Ok(()) => warn!("Push stream {url} ended"),
            Err(e) => warn!("Push stream {url} failed: {e}"),
        }

        match lifecycle.failure() {
            NextStep::RetryAfter(delay) => {
                info!(
                    "Reconnecting in {}ms (attempt {}/{MAX_RECONNECT_ATTEMPTS})",
                    delay.as_millis(),
                    lifecycle.attempts()
                );
                state_tx.send_replace(lifecycle.state());
                tokio::time::sleep(delay).await;
                state_tx.send_replace(lifecycle.retry());
            }
            NextStep::GiveUp => {
                error!("Giving up on push stream {url} after {MAX_RECONNECT_ATTEMPTS} attempts");
                state_tx.send_replace(lifecycle.state());
                return;
            }
        }
    }
}

/// Reads one stream until it errors or ends. The stream is dropped, and so
/// torn down, before this returns.
async fn stream_once(
    url: &str,
    dispatcher: &Dispatcher,
    state_tx: &watch::Sender<ConnectionState>,
    lifecycle: &mut Lifecycle,
) -> anyhow::Result<()> {
    let client = es::ClientBuilder::for_url(url)?
        .reconnect(es::ReconnectOptions::reconnect(false).build())
        .build();
    let mut stream = client.stream();

    while let Some(item) = stream.next().await {
        match item {
            Ok(es::SSE::Event(event)) => match Incoming::decode(&event.data) {
                Ok(Incoming::Handshake) => {
                    debug!("Push stream {url} connected");
                    state_tx.send_replace(lifecycle.handshake());
                }
                Ok(incoming) => {
                    dispatcher.dispatch(&incoming);
                }
                Err(e) => warn!("Dropping {} frame: {e}", event.event_type),
            },
            // Keep-alive comments
            Ok(_) => {}
            Err(e) => return Err(anyhow::anyhow!("{e:?}")),
        }
    }
    Ok(())
}
