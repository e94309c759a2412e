//! PIN lock session guard
//!
//! The guard owns the PIN, the lock flag, the last-activity instant and the
//! inactivity timeout. PIN and timeout are mirrored to a [`KeyValueStore`];
//! everything else lives in memory only, so a restarted process always comes
//! back unlocked.
//!
//! State is kept behind a `std::sync::RwLock` that is never held across an
//! `.await`. Persistence is awaited first and memory is updated only after
//! the write succeeded, so a storage failure leaves both sides unchanged.

use std::num::NonZeroU64;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::config::GuardConfig;
use crate::error::Result;
use crate::navigation::Navigator;
use crate::pin::{validate_pin, PinHash};
use crate::storage::{KeyValueStore, INACTIVITY_TIMEOUT_KEY, PIN_KEY};

/// Lock state of the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// No PIN configured; the guard can never lock
    NoPinConfigured,
    /// PIN configured and the session is open
    Unlocked,
    /// PIN entry required
    Locked,
}

/// Snapshot of the flags that gate activity tracking and polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardStatus {
    /// Startup hydration completed
    pub hydrated: bool,
    /// A PIN is configured
    pub pin_set: bool,
    /// The session is locked
    pub locked: bool,
}

impl GuardStatus {
    /// Lock state implied by these flags
    pub fn state(&self) -> GuardState {
        match (self.pin_set, self.locked) {
            (false, _) => GuardState::NoPinConfigured,
            (true, false) => GuardState::Unlocked,
            (true, true) => GuardState::Locked,
        }
    }

    /// Whether user activity should be tracked
    pub fn tracks_activity(&self, authenticated: bool) -> bool {
        authenticated && self.pin_set && self.hydrated
    }

    /// Whether the inactivity poll should run
    pub fn polls(&self, authenticated: bool) -> bool {
        self.tracks_activity(authenticated) && !self.locked
    }
}

struct GuardInner {
    pin: Option<PinHash>,
    is_locked: bool,
    last_activity: Instant,
    inactivity_timeout_ms: u64,
    hydrated: bool,
}

impl GuardInner {
    fn status(&self) -> GuardStatus {
        GuardStatus {
            hydrated: self.hydrated,
            pin_set: self.pin.is_some(),
            locked: self.is_locked,
        }
    }
}

/// PIN lock and inactivity guard
pub struct SessionGuard {
    store: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    config: GuardConfig,
    inner: RwLock<GuardInner>,
    status_tx: watch::Sender<GuardStatus>,
}

impl SessionGuard {
    /// Create an unhydrated guard using tokio's clock
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        config: GuardConfig,
    ) -> Self {
        Self::with_clock(store, navigator, Arc::new(TokioClock), config)
    }

    /// Create an unhydrated guard with an explicit clock
    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        config: GuardConfig,
    ) -> Self {
        let inner = GuardInner {
            pin: None,
            is_locked: false,
            last_activity: clock.now(),
            inactivity_timeout_ms: config.default_inactivity_timeout(),
            hydrated: false,
        };
        let (status_tx, _) = watch::channel(inner.status());

        Self {
            store,
            navigator,
            clock,
            config,
            inner: RwLock::new(inner),
            status_tx,
        }
    }

    /// Load the PIN and timeout from storage
    ///
    /// A stored PIN leaves the guard unlocked. A stored plaintext PIN is
    /// accepted and rewritten as a hash.
    pub async fn hydrate(&self) -> Result<()> {
        let stored_pin = self.store.get_item(PIN_KEY).await?;
        let stored_timeout = self.store.get_item(INACTIVITY_TIMEOUT_KEY).await?;

        let pin = match stored_pin.as_deref() {
            None | Some("") => None,
            Some(value) => Some(self.restore_pin(value).await?),
        };

        let inactivity_timeout_ms = match stored_timeout.as_deref() {
            None => self.config.default_inactivity_timeout(),
            Some(value) => parse_timeout(value).unwrap_or_else(|| {
                warn!("Ignoring malformed stored inactivity timeout {:?}", value);
                self.config.default_inactivity_timeout()
            }),
        };

        let status = {
            let mut inner = self.write();
            inner.pin = pin;
            inner.is_locked = false;
            inner.inactivity_timeout_ms = inactivity_timeout_ms;
            inner.last_activity = self.clock.now();
            inner.hydrated = true;
            inner.status()
        };
        self.publish(status);

        info!(
            "Session guard hydrated (pin set: {}, timeout: {} ms)",
            status.pin_set, inactivity_timeout_ms
        );
        Ok(())
    }

    async fn restore_pin(&self, stored: &str) -> Result<PinHash> {
        if let Some(hash) = PinHash::parse(stored) {
            return Ok(hash);
        }

        warn!("Stored PIN is not hashed, migrating");
        let hash = PinHash::create(stored, &self.config.hashing)?;
        if let Err(e) = self.store.set_item(PIN_KEY, hash.as_str()).await {
            warn!("Failed to rewrite legacy PIN: {}", e);
        }
        Ok(hash)
    }

    /// Configure a new PIN and leave the session unlocked
    pub async fn setup_pin(&self, pin: &str) -> Result<()> {
        validate_pin(pin)?;

        let hash = PinHash::create(pin, &self.config.hashing)?;
        self.store.set_item(PIN_KEY, hash.as_str()).await?;

        let status = {
            let mut inner = self.write();
            inner.pin = Some(hash);
            inner.is_locked = false;
            inner.last_activity = self.clock.now();
            inner.status()
        };
        self.publish(status);

        info!("PIN configured");
        Ok(())
    }

    /// Check a candidate against the configured PIN
    ///
    /// Always `false` when no PIN is configured.
    pub fn verify_pin(&self, candidate: &str) -> bool {
        let hash = self.read().pin.clone();
        match hash {
            Some(hash) => hash.verify(candidate),
            None => false,
        }
    }

    /// Lock the session and navigate to the lock screen
    ///
    /// No-op without a PIN. Navigation only happens on the transition into
    /// the locked state.
    pub fn lock_app(&self) {
        self.lock();
    }

    fn lock(&self) -> bool {
        let status = {
            let mut inner = self.write();
            if inner.pin.is_none() {
                debug!("Lock requested without a PIN, ignoring");
                return false;
            }
            if inner.is_locked {
                return false;
            }
            inner.is_locked = true;
            inner.status()
        };
        self.publish(status);

        info!("Session locked");
        self.navigator.navigate(&self.config.lock_route);
        true
    }

    /// Unlock with a candidate PIN
    ///
    /// On a match the session is unlocked and the activity timer restarts.
    /// A mismatch changes nothing.
    pub fn unlock_app(&self, candidate: &str) -> bool {
        if !self.verify_pin(candidate) {
            debug!("Unlock rejected");
            return false;
        }

        let status = {
            let mut inner = self.write();
            inner.is_locked = false;
            inner.last_activity = self.clock.now();
            inner.status()
        };
        self.publish(status);

        info!("Session unlocked");
        true
    }

    /// Remove the PIN and force the session unlocked
    ///
    /// Performs no authorization; callers gate this themselves.
    pub async fn clear_pin(&self) -> Result<()> {
        self.store.remove_item(PIN_KEY).await?;

        let status = {
            let mut inner = self.write();
            inner.pin = None;
            inner.is_locked = false;
            inner.status()
        };
        self.publish(status);

        info!("PIN cleared");
        Ok(())
    }

    /// Persist a new inactivity timeout
    ///
    /// Takes effect on the next inactivity check.
    pub async fn set_inactivity_timeout(&self, timeout_ms: NonZeroU64) -> Result<()> {
        let timeout_ms = timeout_ms.get();
        self.store
            .set_item(INACTIVITY_TIMEOUT_KEY, &timeout_ms.to_string())
            .await?;

        self.write().inactivity_timeout_ms = timeout_ms;

        info!("Inactivity timeout set to {} ms", timeout_ms);
        Ok(())
    }

    /// Record user activity
    pub fn record_activity(&self) {
        self.write().last_activity = self.clock.now();
    }

    /// Lock if the session has been idle longer than the timeout
    ///
    /// Returns `true` when this call locked the session.
    pub fn check_inactivity(&self) -> bool {
        let expired = {
            let inner = self.read();
            if !inner.hydrated || inner.pin.is_none() || inner.is_locked {
                return false;
            }
            self.idle_since(inner.last_activity) > Duration::from_millis(inner.inactivity_timeout_ms)
        };

        if expired {
            debug!("Inactivity timeout elapsed");
            self.lock()
        } else {
            false
        }
    }

    /// Whether a PIN is configured
    pub fn is_pin_set(&self) -> bool {
        self.read().pin.is_some()
    }

    /// Whether the session is locked
    pub fn is_locked(&self) -> bool {
        self.read().is_locked
    }

    /// Whether startup hydration completed
    pub fn is_hydrated(&self) -> bool {
        self.read().hydrated
    }

    /// Current lock state
    pub fn state(&self) -> GuardState {
        self.status().state()
    }

    /// Current gating flags
    pub fn status(&self) -> GuardStatus {
        self.read().status()
    }

    /// Inactivity timeout in milliseconds
    pub fn inactivity_timeout(&self) -> u64 {
        self.read().inactivity_timeout_ms
    }

    /// Instant of the last recorded activity
    pub fn last_activity(&self) -> Instant {
        self.read().last_activity
    }

    /// Time since the last recorded activity
    pub fn idle_time(&self) -> Duration {
        self.idle_since(self.last_activity())
    }

    /// Idle time left before the next check would lock, if locking is possible
    pub fn time_until_lock(&self) -> Option<Duration> {
        let inner = self.read();
        if inner.pin.is_none() || inner.is_locked {
            return None;
        }
        let timeout = Duration::from_millis(inner.inactivity_timeout_ms);
        Some(timeout.saturating_sub(self.idle_since(inner.last_activity)))
    }

    /// Guard configuration
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Watch the gating flags; a new value is published on every change
    pub fn subscribe_status(&self) -> watch::Receiver<GuardStatus> {
        self.status_tx.subscribe()
    }

    fn idle_since(&self, last_activity: Instant) -> Duration {
        self.clock.now().saturating_duration_since(last_activity)
    }

    fn publish(&self, status: GuardStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    fn read(&self) -> RwLockReadGuard<'_, GuardInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, GuardInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Parse a persisted timeout; only positive decimal integers are accepted
fn parse_timeout(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|ms| *ms > 0)
}
