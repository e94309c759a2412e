//! Pinlock Core - PIN lock and inactivity session guard
//!
//! This crate provides:
//! - A PIN-protected session guard that locks after a period of inactivity
//! - Durable key-value persistence adapters (file, memory, layered fallback)
//! - Injectable clock, activity source and navigation seams
//! - A tokio supervisor that tracks activity and polls for inactivity
//! - An explicit provider that owns the mounted guard and hands out weak handles
//!
//! # Security Model
//!
//! - The PIN is hashed using Argon2id before it is held or persisted
//! - The guard never starts locked; a cold start with a stored PIN is unlocked
//! - Brute-force backoff is left to the caller (see [`lockout`])

pub mod activity;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod lockout;
pub mod navigation;
pub mod pin;
pub mod provider;
pub mod runtime;
pub mod storage;

pub use activity::{ActivityBus, ActivitySource, InputEvent, TRACKED_EVENTS};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{GuardConfig, HashingConfig};
pub use error::{ConfigError, GuardError, Result, StorageError};
pub use guard::{GuardState, GuardStatus, SessionGuard};
pub use lockout::{LockoutPolicy, UnlockAttempts};
pub use navigation::{NavigationHistory, Navigator};
pub use pin::{PinHash, MIN_PIN_LENGTH};
pub use provider::{GuardHandle, GuardProvider};
pub use runtime::GuardRuntime;
pub use storage::{FileStore, KeyValueStore, LayeredStore, MemoryStore};

/// Route the guard navigates to when it locks
pub const LOCK_SCREEN_ROUTE: &str = "/lock";

/// Default inactivity timeout in milliseconds (5 minutes)
pub const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// Default cadence of the inactivity poll in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
