//! Ownership of the mounted guard
//!
//! A [`GuardProvider`] owns the guard and its runtime for as long as the host
//! keeps it. Other parts of the host receive [`GuardHandle`]s, which only
//! resolve while the provider is mounted. Resolving a handle outside that
//! window is a programming error and fails with
//! [`GuardError::OutsideProvider`].

use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tracing::info;

use crate::activity::ActivitySource;
use crate::error::{GuardError, Result};
use crate::guard::SessionGuard;
use crate::runtime::GuardRuntime;

struct Mounted {
    guard: Arc<SessionGuard>,
}

/// Mounted session guard with its supervisor
pub struct GuardProvider {
    mounted: Arc<Mounted>,
    runtime: GuardRuntime,
}

impl GuardProvider {
    /// Start supervising `guard` and hydrate it from storage
    ///
    /// Tracking and polling stay off until hydration completes. If hydration
    /// fails the supervisor is stopped and the error is returned.
    pub async fn mount(
        guard: Arc<SessionGuard>,
        activity: Arc<dyn ActivitySource>,
        authenticated: watch::Receiver<bool>,
    ) -> Result<Self> {
        let runtime = GuardRuntime::spawn(guard.clone(), activity, authenticated);
        guard.hydrate().await?;

        info!("Session guard mounted");
        Ok(Self {
            mounted: Arc::new(Mounted { guard }),
            runtime,
        })
    }

    /// The mounted guard
    pub fn guard(&self) -> &Arc<SessionGuard> {
        &self.mounted.guard
    }

    /// A handle that resolves while this provider is mounted
    pub fn handle(&self) -> GuardHandle {
        GuardHandle {
            mounted: Arc::downgrade(&self.mounted),
        }
    }

    /// Whether the supervisor is still running
    pub fn is_supervising(&self) -> bool {
        self.runtime.is_running()
    }

    /// Stop supervision and invalidate every handle
    pub fn unmount(self) {
        info!("Session guard unmounted");
    }
}

/// Weak accessor for a mounted guard
///
/// `GuardHandle::default()` is never mounted.
#[derive(Clone, Default)]
pub struct GuardHandle {
    mounted: Weak<Mounted>,
}

impl GuardHandle {
    /// Resolve the guard, failing if its provider is gone
    pub fn get(&self) -> Result<Arc<SessionGuard>> {
        self.mounted
            .upgrade()
            .map(|mounted| mounted.guard.clone())
            .ok_or(GuardError::OutsideProvider)
    }

    /// Whether the provider is still mounted
    pub fn is_mounted(&self) -> bool {
        self.mounted.strong_count() > 0
    }
}
