//! Network clock subsystem
//!
//! The precision clock protocol itself is an external collaborator; this
//! module defines the service boundary ([`ClockService`], [`ClockHandle`])
//! and owns its lifecycle through [`ClockCoordinator`].

pub mod coordinator;
pub mod service;

#[cfg(test)]
pub(crate) mod mock;

pub use coordinator::{ClockCoordinator, CoordinatorState, SyncOutcome};
pub use service::{ClockHandle, ClockService, ClockTime, SystemClockService};
