//! Property-based tests for the session guard using proptest
//!
//! These tests verify invariants that should hold for all valid inputs.

use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

use pinlock_core::{
    Clock, GuardConfig, GuardError, GuardState, ManualClock, MemoryStore, NavigationHistory,
    SessionGuard,
};
use proptest::prelude::*;

// ============================================
// Helpers
// ============================================

struct Fixture {
    guard: SessionGuard,
    clock: Arc<ManualClock>,
    navigator: Arc<NavigationHistory>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new());
    let navigator = Arc::new(NavigationHistory::new());
    let guard = SessionGuard::with_clock(
        Arc::new(MemoryStore::new()),
        navigator.clone(),
        clock.clone(),
        GuardConfig::testing(),
    );
    Fixture {
        guard,
        clock,
        navigator,
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn arb_short_pin() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<char>(), 0..4).prop_map(|chars| chars.into_iter().collect())
}

fn arb_pin() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<char>(), 4..16).prop_map(|chars| chars.into_iter().collect())
}

// ============================================
// PIN setup and verification
// ============================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn short_pins_are_rejected(pin in arb_short_pin()) {
        let f = fixture();
        let result = block_on(async {
            f.guard.hydrate().await.unwrap();
            f.guard.setup_pin(&pin).await
        });
        prop_assert!(matches!(result, Err(GuardError::PinTooShort(4))));
        prop_assert!(!f.guard.is_pin_set());
    }

    #[test]
    fn long_enough_pins_are_accepted(pin in arb_pin()) {
        let f = fixture();
        block_on(async {
            f.guard.hydrate().await.unwrap();
            f.guard.setup_pin(&pin).await
        }).unwrap();
        prop_assert_eq!(f.guard.state(), GuardState::Unlocked);
    }

    #[test]
    fn verify_matches_equality(pin in arb_pin(), candidate in "[0-9]{0,8}") {
        let f = fixture();
        block_on(f.guard.setup_pin(&pin)).unwrap();

        prop_assert!(f.guard.verify_pin(&pin));
        prop_assert_eq!(f.guard.verify_pin(&candidate), candidate == pin);
    }

    #[test]
    fn verify_without_pin_is_false(candidate in ".*") {
        let f = fixture();
        prop_assert!(!f.guard.verify_pin(&candidate));
    }

    #[test]
    fn lock_without_pin_never_locks(locks in 1usize..5) {
        let f = fixture();
        for _ in 0..locks {
            f.guard.lock_app();
        }
        prop_assert!(!f.guard.is_locked());
        prop_assert!(f.navigator.routes().is_empty());
    }

    #[test]
    fn wrong_pin_never_unlocks(candidate in "[a-z]{4,8}") {
        let f = fixture();
        block_on(f.guard.setup_pin("7412")).unwrap();
        f.guard.lock_app();

        prop_assert!(!f.guard.unlock_app(&candidate));
        prop_assert!(f.guard.is_locked());
        prop_assert!(f.guard.verify_pin("7412"));
    }
}

// ============================================
// Inactivity timing
// ============================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn activity_resets_the_timer(
        timeout_ms in 1u64..600_000,
        before_activity_ms in 0u64..600_000,
        epsilon_ms in 1u64..5_000,
    ) {
        let f = fixture();
        block_on(async {
            f.guard.hydrate().await.unwrap();
            f.guard.setup_pin("7412").await.unwrap();
            f.guard
                .set_inactivity_timeout(NonZeroU64::new(timeout_ms).unwrap())
                .await
                .unwrap();
        });

        f.clock.advance(Duration::from_millis(before_activity_ms));
        f.guard.record_activity();

        let epsilon = epsilon_ms.min(timeout_ms);
        f.clock.advance(Duration::from_millis(timeout_ms - epsilon));
        prop_assert!(!f.guard.check_inactivity());
        prop_assert!(!f.guard.is_locked());

        f.clock.advance(Duration::from_millis(2 * epsilon));
        prop_assert!(f.guard.check_inactivity());
        prop_assert!(f.guard.is_locked());
        prop_assert_eq!(f.navigator.visits("/lock"), 1);
    }

    #[test]
    fn unlock_resets_last_activity(idle_ms in 0u64..1_000_000) {
        let f = fixture();
        block_on(f.guard.setup_pin("7412")).unwrap();
        f.guard.lock_app();

        f.clock.advance(Duration::from_millis(idle_ms));
        prop_assert!(f.guard.unlock_app("7412"));
        prop_assert_eq!(f.guard.last_activity(), f.clock.now());
        prop_assert_eq!(f.guard.idle_time(), Duration::ZERO);
    }
}
