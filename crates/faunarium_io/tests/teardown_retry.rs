//! Teardown protocol behavior against misbehaving registries.

use async_trait::async_trait;
use faunarium_io::{
    retire_handle_with_delay, HandleId, HandleRegistry, InMemoryRegistry, RegistryError, Result,
    TeardownMode, TeardownOutcome, FORCED_ATTEMPTS, GRACEFUL_ATTEMPTS,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Fails deregistration a configurable number of times, then succeeds.
/// Records every attempt's mode.
struct FlakyRegistry {
    failures_before_success: u32,
    attempts: AtomicU32,
    modes: Mutex<Vec<TeardownMode>>,
}

impl FlakyRegistry {
    fn failing(failures_before_success: u32) -> Self {
        Self {
            failures_before_success,
            attempts: AtomicU32::new(0),
            modes: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HandleRegistry for FlakyRegistry {
    async fn register(&self, _handle: HandleId) -> Result<()> {
        Ok(())
    }

    async fn deregister(&self, handle: HandleId, mode: TeardownMode) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.modes.lock().unwrap().push(mode);
        if attempt < self.failures_before_success {
            Err(RegistryError::Unavailable(handle.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Always reports the handle as already gone.
struct GoneRegistry {
    attempts: AtomicU32,
}

#[async_trait]
impl HandleRegistry for GoneRegistry {
    async fn register(&self, _handle: HandleId) -> Result<()> {
        Ok(())
    }

    async fn deregister(&self, handle: HandleId, _mode: TeardownMode) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(RegistryError::AlreadyDeregistered(handle.to_string()))
    }
}

#[tokio::test]
async fn first_attempt_success_releases() {
    let registry = InMemoryRegistry::new();
    let handle = HandleId::new();
    registry.register(handle).await.unwrap();

    let outcome = retire_handle_with_delay(&registry, handle, Duration::ZERO).await;
    assert_eq!(outcome, TeardownOutcome::Released);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn already_gone_short_circuits_after_one_attempt() {
    let registry = GoneRegistry {
        attempts: AtomicU32::new(0),
    };
    let outcome = retire_handle_with_delay(&registry, HandleId::new(), Duration::ZERO).await;
    assert_eq!(outcome, TeardownOutcome::AlreadyReleased);
    assert_eq!(registry.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_failures_retry_gracefully() {
    let registry = FlakyRegistry::failing(2);
    let outcome = retire_handle_with_delay(&registry, HandleId::new(), Duration::ZERO).await;

    assert_eq!(outcome, TeardownOutcome::Released);
    assert_eq!(registry.attempts(), 3);
    // All within the graceful budget: never escalated.
    let modes = registry.modes.lock().unwrap();
    assert!(modes.iter().all(|m| *m == TeardownMode::Graceful));
}

#[tokio::test]
async fn escalates_to_forced_after_graceful_budget() {
    let registry = FlakyRegistry::failing(GRACEFUL_ATTEMPTS + 1);
    let outcome = retire_handle_with_delay(&registry, HandleId::new(), Duration::ZERO).await;

    assert_eq!(outcome, TeardownOutcome::Released);
    assert_eq!(registry.attempts(), GRACEFUL_ATTEMPTS + 2);
    let modes = registry.modes.lock().unwrap();
    assert_eq!(
        modes
            .iter()
            .filter(|m| **m == TeardownMode::Graceful)
            .count(),
        GRACEFUL_ATTEMPTS as usize
    );
    assert_eq!(
        modes.iter().filter(|m| **m == TeardownMode::Forced).count(),
        2
    );
}

#[tokio::test]
async fn abandons_after_exactly_eight_attempts() {
    let registry = FlakyRegistry::failing(u32::MAX);
    let outcome = retire_handle_with_delay(&registry, HandleId::new(), Duration::ZERO).await;

    assert_eq!(outcome, TeardownOutcome::Abandoned);
    assert_eq!(registry.attempts(), GRACEFUL_ATTEMPTS + FORCED_ATTEMPTS);
    let modes = registry.modes.lock().unwrap();
    assert_eq!(
        modes.as_slice(),
        &[
            TeardownMode::Graceful,
            TeardownMode::Graceful,
            TeardownMode::Graceful,
            TeardownMode::Graceful,
            TeardownMode::Forced,
            TeardownMode::Forced,
            TeardownMode::Forced,
            TeardownMode::Forced,
        ]
    );
}
