//! Network-handle registry and the bounded-retry teardown protocol.
//!
//! A registry tracks handles some external service knows about. Teardown
//! must terminate no matter how the service misbehaves: a fixed number of
//! graceful attempts, the same number of forced attempts, then the handle
//! is abandoned with a warning. Abandonment is an outcome, not an error.

use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// How hard a deregistration may try: `Forced` may abort an in-flight
/// call on the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeardownMode {
    Graceful,
    Forced,
}

/// Identity of one registered network handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(Uuid);

impl HandleId {
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// External registry of network handles.
#[async_trait]
pub trait HandleRegistry: Send + Sync {
    async fn register(&self, handle: HandleId) -> Result<()>;

    async fn deregister(&self, handle: HandleId, mode: TeardownMode) -> Result<()>;
}

/// Terminal result of [`retire_handle`]; never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// A deregister attempt succeeded.
    Released,
    /// The registry reported the handle already gone.
    AlreadyReleased,
    /// Every attempt failed; the handle is left behind.
    Abandoned,
}

/// Graceful attempts before escalating, and forced attempts before
/// abandoning. 8 attempts total.
pub const GRACEFUL_ATTEMPTS: u32 = 4;
pub const FORCED_ATTEMPTS: u32 = 4;
/// Pause between consecutive attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Retires `handle` with the standard attempt budget and delay.
pub async fn retire_handle(
    registry: &dyn HandleRegistry,
    handle: HandleId,
) -> TeardownOutcome {
    retire_handle_with_delay(registry, handle, RETRY_DELAY).await
}

/// Retires `handle`, sleeping `delay` between attempts. Graceful
/// attempts first, forced attempts second; `AlreadyDeregistered` from
/// either counts as success. Always returns within the attempt budget.
pub async fn retire_handle_with_delay(
    registry: &dyn HandleRegistry,
    handle: HandleId,
    delay: Duration,
) -> TeardownOutcome {
    let total = GRACEFUL_ATTEMPTS + FORCED_ATTEMPTS;
    let mut last_error = None;

    for attempt in 0..total {
        let mode = if attempt < GRACEFUL_ATTEMPTS {
            TeardownMode::Graceful
        } else {
            TeardownMode::Forced
        };

        match registry.deregister(handle, mode).await {
            Ok(()) => return TeardownOutcome::Released,
            Err(RegistryError::AlreadyDeregistered(_)) => {
                return TeardownOutcome::AlreadyReleased;
            }
            Err(e) => {
                tracing::debug!(%handle, attempt, ?mode, error = %e, "deregister attempt failed");
                last_error = Some(e);
            }
        }

        if attempt < total - 1 {
            tokio::time::sleep(delay).await;
        }
    }

    tracing::warn!(
        %handle,
        attempts = total,
        error = ?last_error,
        "handle deregistration failed; abandoning handle"
    );
    TeardownOutcome::Abandoned
}

/// Process-local registry for drivers and tests.
#[derive(Default)]
pub struct InMemoryRegistry {
    handles: Mutex<HashSet<HandleId>>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, handle: HandleId) -> bool {
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HandleRegistry for InMemoryRegistry {
    async fn register(&self, handle: HandleId) -> Result<()> {
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle);
        Ok(())
    }

    async fn deregister(&self, handle: HandleId, _mode: TeardownMode) -> Result<()> {
        let removed = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle);
        if removed {
            Ok(())
        } else {
            Err(RegistryError::AlreadyDeregistered(handle.to_string()))
        }
    }
}
