//! Stream orchestrator
//!
//! Sequences the whole system: clock initialization, channel
//! partitioning, per-stream pipeline build and start, then a single
//! dispatch loop over pipeline events and termination signals. Owns the
//! one shutdown path, guarded so it executes at most once no matter
//! which trigger fires first: an OS signal, a pipeline error, or a
//! pipeline end-of-stream.
//!
//! Partial-stream operation is never acceptable: receivers expect all
//! advertised streams to be live, so any single build or start failure
//! cascades into stopping everything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::clock::coordinator::{ClockCoordinator, SyncOutcome};
use crate::clock::service::ClockService;
use crate::config::SenderConfig;
use crate::constants::{EVENT_CHANNEL_CAPACITY, SYNC_TIMEOUT};
use crate::error::{Error, Result};
use crate::pipeline::engine::{PipelineEngine, PipelineEvent};
use crate::pipeline::supervisor::StreamSupervisor;
use crate::streams::partition;

/// Why the orchestrator stopped; maps to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Signal- or end-of-stream-triggered shutdown (exit 0)
    Completed,
    /// A pipeline failed at runtime (exit non-zero)
    Failed,
}

/// Top-level control loop and single owner of the shutdown cascade
pub struct Orchestrator {
    config: SenderConfig,
    coordinator: ClockCoordinator,
    engine: Arc<dyn PipelineEngine>,
    supervisors: Mutex<Vec<StreamSupervisor>>,
    stopping: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        config: SenderConfig,
        clock_service: Arc<dyn ClockService>,
        engine: Arc<dyn PipelineEngine>,
    ) -> Self {
        let coordinator = ClockCoordinator::new(clock_service, config.ptp_domain);
        Self {
            config,
            coordinator,
            engine,
            supervisors: Mutex::new(Vec::new()),
            stopping: AtomicBool::new(false),
        }
    }

    /// Run the system until a termination trigger fires.
    ///
    /// Startup failures cascade into a full shutdown and return `Err`.
    /// Otherwise returns how the run ended; the shutdown sequence has
    /// already completed by the time this returns.
    pub async fn run(&self) -> Result<ExitReason> {
        match self.startup() {
            Ok(()) => {}
            Err(e) => {
                self.shutdown();
                return Err(e);
            }
        }

        let reason = self.dispatch_events().await;
        self.shutdown();
        Ok(reason)
    }

    /// Strict startup order: clock init, clock acquire + sync wait,
    /// partition, then build and start each stream in ascending index
    /// order.
    fn startup(&self) -> Result<()> {
        self.coordinator.initialize()?;

        let (clock, outcome) = self.coordinator.acquire_clock("PTPClock", SYNC_TIMEOUT)?;
        if outcome == SyncOutcome::TimedOut {
            // Non-fatal by design: a grandmaster may appear after startup
            debug!("Proceeding without grandmaster sync");
        }

        let descriptors = partition(
            self.config.channel_count,
            self.config.channels_per_receiver,
            self.config.base_multicast_address,
            self.config.rtp_destination_port,
        )?;

        info!("Configured {} stream(s):", descriptors.len());
        for d in &descriptors {
            info!(
                "  Stream {}: {} channels (from {}) @ {}:{}",
                d.index, d.channel_count, d.start_channel, d.multicast_address, d.port
            );
        }

        for descriptor in &descriptors {
            let mut supervisor = StreamSupervisor::build(
                self.engine.as_ref(),
                descriptor,
                &clock,
                &self.config.jack_client_name,
                self.config.sampling_rate,
            )?;
            let started = supervisor.start();
            // Track the instance before inspecting the result so the
            // shutdown cascade covers it either way
            self.supervisors.lock().push(supervisor);
            if let Err(e) = started {
                error!("Failed to start stream {}: {e}", descriptor.index);
                return Err(Error::Pipeline(e));
            }
            info!("Started stream {}", descriptor.index);
        }

        info!(
            "All streams started; source endpoints: {}_stream0 .. {}_stream{}",
            self.config.jack_client_name,
            self.config.jack_client_name,
            descriptors.len() - 1
        );
        Ok(())
    }

    /// Single dispatch loop: merged pipeline events plus termination
    /// signals, handled to completion one at a time
    async fn dispatch_events(&self) -> ExitReason {
        let (merged_tx, mut merged_rx) =
            tokio::sync::mpsc::channel::<(usize, PipelineEvent)>(EVENT_CHANNEL_CAPACITY);

        {
            let mut supervisors = self.supervisors.lock();
            for supervisor in supervisors.iter_mut() {
                let Some(mut events) = supervisor.take_events() else {
                    continue;
                };
                let tx = merged_tx.clone();
                let index = supervisor.index();
                tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if tx.send((index, event)).await.is_err() {
                            break;
                        }
                    }
                });
            }
        }
        drop(merged_tx);

        // Signal listeners are registered once; re-arming them on every
        // iteration could miss a signal delivered between registrations
        let interrupt = interrupt_signal();
        tokio::pin!(interrupt);
        let terminate = terminate_signal();
        tokio::pin!(terminate);

        loop {
            tokio::select! {
                _ = &mut interrupt => {
                    info!("Interrupt received, stopping streams");
                    return ExitReason::Completed;
                }
                _ = &mut terminate => {
                    info!("Termination signal received, stopping streams");
                    return ExitReason::Completed;
                }
                event = merged_rx.recv() => match event {
                    Some((index, PipelineEvent::Error { message, diagnostic })) => {
                        error!("Error in stream {index}: {message}");
                        if let Some(diagnostic) = diagnostic {
                            debug!("Stream {index} diagnostic: {diagnostic}");
                        }
                        return ExitReason::Failed;
                    }
                    Some((index, PipelineEvent::EndOfStream)) => {
                        info!("End-of-stream in stream {index}");
                        return ExitReason::Completed;
                    }
                    Some((index, PipelineEvent::Warning { message, diagnostic })) => {
                        warn!("Warning in stream {index}: {message}");
                        if let Some(diagnostic) = diagnostic {
                            debug!("Stream {index} diagnostic: {diagnostic}");
                        }
                    }
                    Some((index, PipelineEvent::StateChanged { from, to })) => {
                        debug!("Stream {index} state changed: {from:?} -> {to:?}");
                    }
                    None => {
                        // Every pipeline's event channel closed without a
                        // terminal event
                        warn!("All pipeline event streams closed unexpectedly");
                        return ExitReason::Failed;
                    }
                }
            }
        }
    }

    /// The single shutdown path. Executes at most once regardless of
    /// how many triggers invoke it, concurrently or otherwise.
    ///
    /// Stops every live pipeline in index order (individual stop
    /// problems are logged inside the pipeline, never raised), then
    /// releases the clock subsystem.
    pub fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Stopping streams...");
        {
            let mut supervisors = self.supervisors.lock();
            for supervisor in supervisors.iter_mut() {
                debug!("Stopping stream {}", supervisor.index());
                supervisor.stop();
            }
        }

        self.coordinator.shutdown();
        info!("All streams stopped");
    }
}

/// Resolves when the OS delivers an interrupt (Ctrl-C) signal.
/// Registration failure degrades signal handling rather than acting as
/// a shutdown trigger.
async fn interrupt_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for interrupt signal: {e}");
        std::future::pending::<()>().await;
    }
}

/// Resolves when the OS delivers a termination (SIGTERM) signal
async fn terminate_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to register termination signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    std::future::pending::<()>().await
}
