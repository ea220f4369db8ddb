//! Clock service boundary
//!
//! A [`ClockService`] is the process-wide synchronization subsystem: it is
//! initialized once for a clock domain, hands out clocks, and is released
//! once at shutdown. A [`ClockHandle`] is the shared, read-only reference
//! to one such clock that every pipeline stamps its packets against.
//!
//! The crate ships [`SystemClockService`], a best-effort local-time
//! implementation for hosts without a PTP daemon binding. It never reports
//! synced, so startup takes the documented timeout-and-continue path. A
//! production PTP binding plugs in behind the same traits.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::error::ClockError;

/// Clock reading in nanoseconds
pub type ClockTime = u64;

/// Callback invoked when synchronization with the grandmaster is gained
/// (`true`) or lost (`false`)
pub type SyncChangeCallback = Box<dyn Fn(bool) + Send + Sync>;

/// One network clock as seen by this host
pub trait NetworkClock: Send + Sync {
    /// Current clock reading in nanoseconds
    fn now(&self) -> ClockTime;

    /// Whether the clock currently tracks a grandmaster
    fn is_synced(&self) -> bool;

    /// Block until the clock syncs or `timeout` elapses; returns whether
    /// sync was achieved
    fn wait_for_sync(&self, timeout: Duration) -> bool;

    /// Register a callback for sync gain/loss notifications
    fn subscribe_sync_changes(&self, callback: SyncChangeCallback);
}

/// Shared handle to a synchronized clock
///
/// Cloning shares the same underlying clock; the handle is read-only
/// after creation and safe to use from any thread.
#[derive(Clone)]
pub struct ClockHandle {
    inner: Arc<dyn NetworkClock>,
}

impl ClockHandle {
    pub fn new(inner: Arc<dyn NetworkClock>) -> Self {
        Self { inner }
    }

    /// Current clock reading in nanoseconds
    pub fn now(&self) -> ClockTime {
        self.inner.now()
    }

    /// Whether the clock currently tracks a grandmaster
    pub fn is_synced(&self) -> bool {
        self.inner.is_synced()
    }

    /// Block until the clock syncs or `timeout` elapses
    pub fn wait_for_sync(&self, timeout: Duration) -> bool {
        self.inner.wait_for_sync(timeout)
    }

    /// Register a callback for sync gain/loss notifications
    pub fn subscribe_sync_changes(&self, callback: SyncChangeCallback) {
        self.inner.subscribe_sync_changes(callback)
    }
}

impl std::fmt::Debug for ClockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockHandle")
            .field("now", &self.now())
            .field("synced", &self.is_synced())
            .finish()
    }
}

/// The synchronization subsystem boundary
pub trait ClockService: Send + Sync {
    /// One-time process-wide initialization for a clock domain.
    /// `interface_filter` restricts which network interfaces participate;
    /// `None` means all.
    fn init(&self, domain: u8, interface_filter: Option<&[String]>) -> Result<(), ClockError>;

    /// Produce a clock for the given domain
    fn create_clock(&self, name: &str, domain: u8) -> Result<ClockHandle, ClockError>;

    /// Release the subsystem; idempotent
    fn deinit(&self);
}

/// Best-effort local-time clock service
///
/// Reads a monotonic clock anchored to the wall clock at creation, so
/// timestamps are strictly increasing and roughly wall-aligned. It never
/// reports synced: `wait_for_sync` returns `false` immediately rather
/// than burning the whole timeout on a sync that cannot happen.
pub struct SystemClockService;

impl SystemClockService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClockService {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockService for SystemClockService {
    fn init(&self, _domain: u8, _interface_filter: Option<&[String]>) -> Result<(), ClockError> {
        Ok(())
    }

    fn create_clock(&self, _name: &str, _domain: u8) -> Result<ClockHandle, ClockError> {
        let wall_anchor = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ClockError::Create {
                domain: 0,
                reason: format!("system clock before Unix epoch: {e}"),
            })?;
        Ok(ClockHandle::new(Arc::new(SystemClock {
            anchor: Instant::now(),
            wall_anchor_ns: wall_anchor.as_nanos() as u64,
            callbacks: Mutex::new(Vec::new()),
        })))
    }

    fn deinit(&self) {}
}

struct SystemClock {
    anchor: Instant,
    wall_anchor_ns: u64,
    // Held so subscribers registered before a real binding is wired in
    // are not silently dropped
    callbacks: Mutex<Vec<SyncChangeCallback>>,
}

impl NetworkClock for SystemClock {
    fn now(&self) -> ClockTime {
        self.wall_anchor_ns + self.anchor.elapsed().as_nanos() as u64
    }

    fn is_synced(&self) -> bool {
        false
    }

    fn wait_for_sync(&self, _timeout: Duration) -> bool {
        false
    }

    fn subscribe_sync_changes(&self, callback: SyncChangeCallback) {
        self.callbacks.lock().push(callback);
    }
}
