//! Clock synchronization coordinator
//!
//! Owns the lifecycle of the network clock service: init, clock creation,
//! the bounded wait for grandmaster sync, and the final release. The
//! coordinator exposes the single [`ClockHandle`] shared by every
//! pipeline.
//!
//! A sync timeout is deliberately non-fatal: a grandmaster may appear
//! after startup, and outbound streams should not be denied entirely
//! while only mildly desynchronized. Sync gain/loss afterwards is
//! reported to the operator but never halts streaming.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::clock::service::{ClockHandle, ClockService};
use crate::error::ClockError;

/// Coordinator lifecycle states
///
/// Every path to `Closed` passes through `ShuttingDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    Initializing,
    Ready,
    SyncPending,
    Synced,
    /// Sync wait timed out; running on best-effort local time
    UnsyncedRunning,
    ShuttingDown,
    Closed,
}

/// Result of the bounded wait for grandmaster sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    /// Non-fatal: streaming proceeds on best-effort local time
    TimedOut,
}

/// Owns the clock service lifecycle and the shared clock handle
pub struct ClockCoordinator {
    service: Arc<dyn ClockService>,
    domain: u8,
    state: Mutex<CoordinatorState>,
    clock: Mutex<Option<ClockHandle>>,
}

impl ClockCoordinator {
    pub fn new(service: Arc<dyn ClockService>, domain: u8) -> Self {
        Self {
            service,
            domain,
            state: Mutex::new(CoordinatorState::Uninitialized),
            clock: Mutex::new(None),
        }
    }

    /// One-time initialization of the synchronization subsystem
    pub fn initialize(&self) -> Result<(), ClockError> {
        {
            let mut state = self.state.lock();
            if *state != CoordinatorState::Uninitialized {
                return Err(ClockError::Init(format!(
                    "coordinator already in state {:?}",
                    *state
                )));
            }
            *state = CoordinatorState::Initializing;
        }

        info!("Initializing network clock subsystem (domain {})", self.domain);
        match self.service.init(self.domain, None) {
            Ok(()) => {
                *self.state.lock() = CoordinatorState::Ready;
                Ok(())
            }
            Err(e) => {
                // Failed init leaves nothing to release, but the shutdown
                // path must still run once, so fall back to Uninitialized.
                *self.state.lock() = CoordinatorState::Uninitialized;
                Err(e)
            }
        }
    }

    /// Create the shared clock and wait up to `timeout` for grandmaster
    /// sync. Returns the handle along with whether sync was achieved.
    pub fn acquire_clock(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<(ClockHandle, SyncOutcome), ClockError> {
        {
            let mut state = self.state.lock();
            if *state != CoordinatorState::Ready {
                return Err(ClockError::Create {
                    domain: self.domain,
                    reason: format!("coordinator not ready, state {:?}", *state),
                });
            }
            *state = CoordinatorState::SyncPending;
        }

        let clock = match self.service.create_clock(name, self.domain) {
            Ok(clock) => clock,
            Err(e) => {
                *self.state.lock() = CoordinatorState::Ready;
                return Err(e);
            }
        };

        // Operator-visible status only; sync loss never stops streaming
        clock.subscribe_sync_changes(Box::new(|synced| {
            if synced {
                info!("Network clock synchronized with grandmaster");
            } else {
                warn!("Network clock lost synchronization");
            }
        }));

        info!("Waiting up to {:?} for clock to synchronize with grandmaster", timeout);
        let outcome = if clock.wait_for_sync(timeout) {
            info!("Clock synchronized");
            *self.state.lock() = CoordinatorState::Synced;
            SyncOutcome::Synced
        } else {
            warn!(
                "Clock sync timeout after {:?}, continuing on best-effort local time \
                 (ensure a grandmaster is running on the network)",
                timeout
            );
            *self.state.lock() = CoordinatorState::UnsyncedRunning;
            SyncOutcome::TimedOut
        };

        *self.clock.lock() = Some(clock.clone());
        Ok((clock, outcome))
    }

    /// Current lifecycle state
    pub fn state(&self) -> CoordinatorState {
        *self.state.lock()
    }

    /// Release the synchronization subsystem.
    ///
    /// Idempotent and safe to call even if `initialize` never completed.
    pub fn shutdown(&self) {
        let was_initialized = {
            let mut state = self.state.lock();
            match *state {
                CoordinatorState::ShuttingDown | CoordinatorState::Closed => return,
                CoordinatorState::Uninitialized | CoordinatorState::Initializing => {
                    *state = CoordinatorState::ShuttingDown;
                    false
                }
                _ => {
                    *state = CoordinatorState::ShuttingDown;
                    true
                }
            }
        };

        self.clock.lock().take();
        if was_initialized {
            debug!("Releasing network clock subsystem");
            self.service.deinit();
        }

        *self.state.lock() = CoordinatorState::Closed;
    }
}
