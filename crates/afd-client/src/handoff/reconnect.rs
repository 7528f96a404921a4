//! Handoff connection with automatic reconnection.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use afd_core::AfdError;
use afd_core::handoff::HandoffDescriptor;
use afd_core::registry::{CommandContext, CommandRegistry};
use async_trait::async_trait;
use rand::Rng;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{HandoffCallbacks, HandoffConnection, HandoffRegistry, HandoffState, connect_handoff};

/// Default number of reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base backoff.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

/// Default backoff cap.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Upper bound of the random jitter added to each delay, in milliseconds.
pub const MAX_JITTER_MS: u64 = 100;

/// Reconnection settings for a [`ReconnectingHandoff`].
///
/// `max_attempts` and `backoff` fall back to the descriptor's reconnect
/// policy, then to the defaults.
#[derive(Clone, Default)]
pub struct ReconnectOptions {
    /// Attempts before giving up.
    pub max_attempts: Option<u32>,
    /// Base backoff, doubled on every attempt.
    pub backoff: Option<Duration>,
    /// Cap on the delay. Defaults to 30 seconds.
    pub max_backoff: Option<Duration>,
    /// Session id passed to the reconnect command. Defaults to the
    /// descriptor's session id.
    pub session_id: Option<String>,
    reconnect_command: Option<(Arc<dyn CommandRegistry>, String)>,
    on_reconnecting: Option<Arc<dyn Fn(u32) + Send + Sync>>,
    on_reconnected: Option<Arc<dyn Fn() + Send + Sync>>,
    on_reconnect_failed: Option<Arc<dyn Fn(u32) + Send + Sync>>,
}

impl ReconnectOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the base backoff.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Set the backoff cap.
    #[must_use]
    pub const fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    /// Set the session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Before each reconnect, run `command` on `registry` to obtain a fresh
    /// descriptor. The command receives `{"sessionId": ...}` when a session
    /// id is known.
    #[must_use]
    pub fn with_reconnect_command(
        mut self,
        registry: Arc<dyn CommandRegistry>,
        command: impl Into<String>,
    ) -> Self {
        self.reconnect_command = Some((registry, command.into()));
        self
    }

    /// Called with the attempt number before each reconnect.
    #[must_use]
    pub fn on_reconnecting(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_reconnecting = Some(Arc::new(f));
        self
    }

    /// Called after a successful reconnect.
    #[must_use]
    pub fn on_reconnected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reconnected = Some(Arc::new(f));
        self
    }

    /// Called with the number of attempts made once reconnection gives up.
    #[must_use]
    pub fn on_reconnect_failed(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_reconnect_failed = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for ReconnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectOptions")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("max_backoff", &self.max_backoff)
            .field("session_id", &self.session_id)
            .field(
                "reconnect_command",
                &self.reconnect_command.as_ref().map(|(_, name)| name),
            )
            .finish_non_exhaustive()
    }
}

/// A handoff connection that reconnects after unexpected disconnects.
///
/// Delays grow as `backoff * 2^(attempt - 1)` plus up to 100 ms of jitter,
/// capped at `max_backoff`. A successful reconnect resets the attempt
/// counter. Once attempts are exhausted the state becomes
/// [`HandoffState::Failed`]. [`close`](HandoffConnection::close) stops any
/// further reconnection.
#[derive(Clone)]
pub struct ReconnectingHandoff {
    shared: Arc<Shared>,
}

struct Shared {
    registry: Arc<HandoffRegistry>,
    options: ReconnectOptions,
    callbacks: HandoffCallbacks,
    descriptor: Mutex<HandoffDescriptor>,
    connection: Mutex<Option<Arc<dyn HandoffConnection>>>,
    state: Mutex<HandoffState>,
    attempts: AtomicU32,
    /// Bumped before every connect; callbacks of older connections are ignored.
    generation: AtomicU64,
    closed: AtomicBool,
    reconnecting: AtomicBool,
}

impl ReconnectingHandoff {
    /// Connect with the handler registered for the descriptor's protocol.
    ///
    /// `callbacks` receive the events of every underlying connection.
    ///
    /// # Errors
    ///
    /// Returns the error of the initial connection; no reconnection is
    /// attempted for it.
    pub async fn connect(
        registry: Arc<HandoffRegistry>,
        descriptor: HandoffDescriptor,
        callbacks: HandoffCallbacks,
        options: ReconnectOptions,
    ) -> Result<Self, AfdError> {
        let shared = Arc::new(Shared {
            registry,
            options,
            callbacks,
            descriptor: Mutex::new(descriptor.clone()),
            connection: Mutex::new(None),
            state: Mutex::new(HandoffState::Connecting),
            attempts: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
        });

        let wired = Shared::wired_callbacks(&shared, shared.next_generation());
        match connect_handoff(&shared.registry, &descriptor, wired).await {
            Ok(connection) => {
                shared.set_connection(Some(connection));
                shared.set_state(HandoffState::Connected);
                Ok(Self { shared })
            }
            Err(e) => {
                shared.set_state(HandoffState::Disconnected);
                Err(e)
            }
        }
    }

    /// Completed reconnect attempts since the last successful connection.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::Acquire)
    }

    /// The descriptor of the current (or last) connection.
    #[must_use]
    pub fn descriptor(&self) -> HandoffDescriptor {
        self.shared
            .descriptor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HandoffConnection for ReconnectingHandoff {
    async fn send(&self, message: Value) -> Result<(), AfdError> {
        let state = self.shared.state();
        if state != HandoffState::Connected {
            return Err(AfdError::HandoffNotConnected {
                state: state.to_string(),
            });
        }
        match self.shared.connection() {
            Some(connection) => connection.send(message).await,
            None => Err(AfdError::HandoffNotConnected {
                state: state.to_string(),
            }),
        }
    }

    async fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.set_state(HandoffState::Disconnected);
        let connection = self
            .shared
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(connection) = connection {
            connection.close().await;
        }
        debug!("Handoff closed");
    }

    fn state(&self) -> HandoffState {
        self.shared.state()
    }
}

impl fmt::Debug for ReconnectingHandoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectingHandoff")
            .field("state", &self.shared.state())
            .field("attempts", &self.attempts())
            .field("options", &self.shared.options)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn state(&self) -> HandoffState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: HandoffState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn connection(&self) -> Option<Arc<dyn HandoffConnection>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_connection(&self, connection: Option<Arc<dyn HandoffConnection>>) {
        *self.connection.lock().unwrap_or_else(PoisonError::into_inner) = connection;
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// The caller's callbacks, with disconnects of connection `generation`
    /// also driving reconnection.
    fn wired_callbacks(this: &Arc<Self>, generation: u64) -> HandoffCallbacks {
        let user = this.callbacks.clone();
        let weak: Weak<Self> = Arc::downgrade(this);
        let forward = this.callbacks.clone();

        HandoffCallbacks::new()
            .on_connect({
                let user = user.clone();
                move || user.connected()
            })
            .on_message({
                let user = user.clone();
                move |message| user.message(message)
            })
            .on_error(move |error| user.error(error))
            .on_disconnect(move |reason| {
                let Some(shared) = weak.upgrade() else {
                    forward.disconnected(reason);
                    return;
                };
                if !shared.is_current(generation) {
                    debug!(generation, "Ignoring disconnect of a replaced handoff connection");
                    return;
                }
                forward.disconnected(reason);
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move { Self::handle_disconnect(&shared, generation).await });
                    }
                    Err(_) => warn!("Handoff disconnected outside a runtime; cannot reconnect"),
                }
            })
    }

    async fn handle_disconnect(this: &Arc<Self>, generation: u64) {
        if this.closed.load(Ordering::Acquire) || !this.is_current(generation) {
            return;
        }
        if this.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }
        this.set_connection(None);
        Self::reconnect_loop(this).await;
        this.reconnecting.store(false, Ordering::Release);
    }

    fn limits(&self) -> (bool, u32, Duration, Duration) {
        let descriptor = self.descriptor.lock().unwrap_or_else(PoisonError::into_inner);
        let policy = descriptor.reconnect_policy();
        let allowed = policy.is_none_or(|p| p.allowed);
        let max_attempts = self
            .options
            .max_attempts
            .or_else(|| policy.and_then(|p| p.max_attempts))
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let backoff = self
            .options
            .backoff
            .or_else(|| policy.and_then(|p| p.backoff_ms).map(Duration::from_millis))
            .unwrap_or(DEFAULT_BACKOFF);
        let max_backoff = self.options.max_backoff.unwrap_or(DEFAULT_MAX_BACKOFF);
        (allowed, max_attempts, backoff, max_backoff)
    }

    async fn reconnect_loop(this: &Arc<Self>) {
        loop {
            if this.closed.load(Ordering::Acquire) {
                return;
            }
            let (allowed, max_attempts, backoff, max_backoff) = this.limits();
            if !allowed {
                info!("Handoff disconnected; reconnection not allowed");
                this.set_state(HandoffState::Disconnected);
                return;
            }

            let made = this.attempts.load(Ordering::Acquire);
            if made >= max_attempts {
                warn!(attempts = made, "Handoff reconnection attempts exhausted");
                this.set_state(HandoffState::Failed);
                if let Some(f) = &this.options.on_reconnect_failed {
                    f(made);
                }
                return;
            }

            let attempt = made + 1;
            this.attempts.store(attempt, Ordering::Release);
            this.set_state(HandoffState::Reconnecting);
            if let Some(f) = &this.options.on_reconnecting {
                f(attempt);
            }

            let delay = backoff_delay(backoff, max_backoff, attempt, jitter());
            info!(attempt, max_attempts, delay_ms = delay.as_millis() as u64, "Reconnecting handoff");
            tokio::time::sleep(delay).await;

            if this.closed.load(Ordering::Acquire) {
                return;
            }

            let descriptor = this.next_descriptor().await;
            let wired = Self::wired_callbacks(this, this.next_generation());
            match connect_handoff(&this.registry, &descriptor, wired).await {
                Ok(connection) => {
                    if this.closed.load(Ordering::Acquire) {
                        connection.close().await;
                        return;
                    }
                    *this.descriptor.lock().unwrap_or_else(PoisonError::into_inner) = descriptor;
                    this.set_connection(Some(connection));
                    this.attempts.store(0, Ordering::Release);
                    this.set_state(HandoffState::Connected);
                    info!(attempt, "Handoff reconnected");
                    if let Some(f) = &this.options.on_reconnected {
                        f();
                    }
                    return;
                }
                Err(e) => warn!(attempt, error = %e, "Handoff reconnect failed"),
            }
        }
    }

    /// A fresh descriptor from the reconnect command, or the last one.
    async fn next_descriptor(&self) -> HandoffDescriptor {
        let last = self
            .descriptor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some((registry, command)) = &self.options.reconnect_command else {
            return last;
        };

        let session_id = self
            .options
            .session_id
            .clone()
            .or_else(|| last.session_id().map(str::to_string));
        let input = session_id.map_or_else(|| json!({}), |id| json!({ "sessionId": id }));

        let result = registry.execute(command, input, CommandContext::new()).await;
        match result.data().filter(|_| result.is_success()).and_then(HandoffDescriptor::from_value) {
            Some(fresh) => {
                debug!(%command, endpoint = %fresh.endpoint, "Reconnect command returned a descriptor");
                fresh
            }
            None => {
                debug!(%command, "Reconnect command gave no descriptor; reusing the last one");
                last
            }
        }
    }
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS))
}

/// `min(backoff * 2^(attempt - 1) + jitter, max_backoff)`.
fn backoff_delay(backoff: Duration, max_backoff: Duration, attempt: u32, jitter: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    backoff
        .saturating_mul(factor)
        .saturating_add(jitter)
        .min(max_backoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backoff_delay() {
        let base = Duration::from_millis(1000);
        let cap = Duration::from_secs(30);
        assert_eq!(backoff_delay(base, cap, 1, Duration::ZERO), Duration::from_millis(1000));
        assert_eq!(
            backoff_delay(base, cap, 3, Duration::from_millis(40)),
            Duration::from_millis(4040)
        );
        assert_eq!(backoff_delay(base, cap, 10, Duration::ZERO), cap);
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            assert!(jitter() <= Duration::from_millis(MAX_JITTER_MS));
        }
    }

    #[test]
    fn test_options_builder() {
        let options = ReconnectOptions::new()
            .with_max_attempts(2)
            .with_backoff(Duration::from_millis(10))
            .with_session_id("s-1");
        assert_eq!(options.max_attempts, Some(2));
        assert_eq!(options.backoff, Some(Duration::from_millis(10)));
        assert_eq!(options.session_id.as_deref(), Some("s-1"));
        assert!(options.reconnect_command.is_none());
    }
}
