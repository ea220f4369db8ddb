//! Scripted clock service for coordinator and orchestrator tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::service::{ClockHandle, ClockService, ClockTime, NetworkClock, SyncChangeCallback};
use crate::error::ClockError;

pub(crate) struct MockClockService {
    pub synced: bool,
    pub fail_init: bool,
    pub fail_create: bool,
    pub init_calls: AtomicUsize,
    pub deinit_calls: AtomicUsize,
}

impl MockClockService {
    pub fn synced() -> Self {
        Self::new(true, false, false)
    }

    pub fn unsynced() -> Self {
        Self::new(false, false, false)
    }

    pub fn failing_init() -> Self {
        Self::new(false, true, false)
    }

    pub fn failing_create() -> Self {
        Self::new(false, false, true)
    }

    fn new(synced: bool, fail_init: bool, fail_create: bool) -> Self {
        Self {
            synced,
            fail_init,
            fail_create,
            init_calls: AtomicUsize::new(0),
            deinit_calls: AtomicUsize::new(0),
        }
    }
}

impl ClockService for MockClockService {
    fn init(&self, _domain: u8, _interface_filter: Option<&[String]>) -> Result<(), ClockError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(ClockError::Init("mock init failure".into()));
        }
        Ok(())
    }

    fn create_clock(&self, _name: &str, domain: u8) -> Result<ClockHandle, ClockError> {
        if self.fail_create {
            return Err(ClockError::Create {
                domain,
                reason: "mock create failure".into(),
            });
        }
        Ok(ClockHandle::new(Arc::new(MockClock {
            synced: self.synced,
            anchor: Instant::now(),
        })))
    }

    fn deinit(&self) {
        self.deinit_calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockClock {
    synced: bool,
    anchor: Instant,
}

impl NetworkClock for MockClock {
    fn now(&self) -> ClockTime {
        self.anchor.elapsed().as_nanos() as u64
    }

    fn is_synced(&self) -> bool {
        self.synced
    }

    fn wait_for_sync(&self, _timeout: Duration) -> bool {
        self.synced
    }

    fn subscribe_sync_changes(&self, _callback: SyncChangeCallback) {}
}
