//! Supervisor that drives activity tracking and the inactivity poll
//!
//! The runtime watches two inputs: the host's authentication signal and the
//! guard's status channel. On every change it re-evaluates the gates and
//! starts or aborts two tasks:
//!
//! - the activity task, subscribed to the [`ActivitySource`] while the user
//!   is authenticated, a PIN is set and hydration has completed
//! - the poll task, ticking every `poll_interval` while additionally the
//!   session is unlocked
//!
//! Dropping the runtime, or dropping the authentication sender, tears both
//! down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::activity::{ActivitySource, InputEvent};
use crate::guard::SessionGuard;

/// Handle to a spawned task that is aborted when dropped
struct TaskSlot(Option<JoinHandle<()>>);

impl TaskSlot {
    fn empty() -> Self {
        Self(None)
    }

    fn is_running(&self) -> bool {
        self.0.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Start the task if `wanted` and not running; abort it if not `wanted`
    fn reconcile(&mut self, wanted: bool, spawn: impl FnOnce() -> JoinHandle<()>) {
        match (wanted, self.is_running()) {
            (true, false) => {
                self.cancel();
                self.0 = Some(spawn());
            }
            (false, true) => self.cancel(),
            _ => {}
        }
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Running supervisor for a [`SessionGuard`]
pub struct GuardRuntime {
    control: JoinHandle<()>,
}

impl GuardRuntime {
    /// Spawn the supervisor on the current tokio runtime
    pub fn spawn(
        guard: Arc<SessionGuard>,
        activity: Arc<dyn ActivitySource>,
        authenticated: watch::Receiver<bool>,
    ) -> Self {
        let control = tokio::spawn(supervise(guard, activity, authenticated));
        Self { control }
    }

    /// Whether the supervisor is still running
    pub fn is_running(&self) -> bool {
        !self.control.is_finished()
    }

    /// Stop the supervisor and both of its tasks
    pub fn shutdown(self) {
        self.control.abort();
    }
}

impl Drop for GuardRuntime {
    fn drop(&mut self) {
        self.control.abort();
    }
}

async fn supervise(
    guard: Arc<SessionGuard>,
    activity: Arc<dyn ActivitySource>,
    mut authenticated: watch::Receiver<bool>,
) {
    let mut status_rx = guard.subscribe_status();
    let mut activity_task = TaskSlot::empty();
    let mut poll_task = TaskSlot::empty();

    loop {
        let is_authenticated = *authenticated.borrow_and_update();
        let status = *status_rx.borrow_and_update();

        let track = status.tracks_activity(is_authenticated);
        let poll = status.polls(is_authenticated);
        debug!(
            "Guard gates: authenticated={} status={:?} track={} poll={}",
            is_authenticated, status, track, poll
        );

        activity_task.reconcile(track, || {
            tokio::spawn(track_activity(guard.clone(), activity.subscribe()))
        });
        poll_task.reconcile(poll, || {
            tokio::spawn(poll_inactivity(guard.clone(), guard.config().poll_interval()))
        });

        tokio::select! {
            changed = authenticated.changed() => {
                if changed.is_err() {
                    info!("Authentication source closed, stopping session guard");
                    break;
                }
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

async fn track_activity(guard: Arc<SessionGuard>, mut events: broadcast::Receiver<InputEvent>) {
    loop {
        match events.recv().await {
            Ok(event) if event.is_activity() => guard.record_activity(),
            Ok(_) => {}
            // Missed events were still input
            Err(broadcast::error::RecvError::Lagged(_)) => guard.record_activity(),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn poll_inactivity(guard: Arc<SessionGuard>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        guard.check_inactivity();
    }
}
