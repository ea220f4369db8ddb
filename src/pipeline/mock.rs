//! Scripted pipeline engine for supervisor and orchestrator tests
//!
//! Records every lifecycle call so tests can assert ordering and
//! at-most-once semantics, and exposes each instance's event sender so
//! tests can inject runtime events.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::clock::service::{ClockHandle, ClockTime};
use crate::error::PipelineError;
use crate::pipeline::engine::{
    PipelineEngine, PipelineEvent, PipelineHandle, PipelineSpec, PipelineState,
};

pub(crate) struct MockEngine {
    fail_build_at: Option<usize>,
    fail_start_at: Option<usize>,
    /// Lifecycle calls in order, e.g. "build 0", "set_clock 0", "start 0"
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Specs passed to build, in order
    pub specs: Arc<Mutex<Vec<PipelineSpec>>>,
    /// Raw stop() invocations per stream index
    pub stop_counts: Arc<Mutex<HashMap<usize, usize>>>,
    /// Event senders per stream index, for injecting runtime events
    pub event_txs: Arc<Mutex<HashMap<usize, mpsc::Sender<PipelineEvent>>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            fail_build_at: None,
            fail_start_at: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            specs: Arc::new(Mutex::new(Vec::new())),
            stop_counts: Arc::new(Mutex::new(HashMap::new())),
            event_txs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn fail_build_at(mut self, index: usize) -> Self {
        self.fail_build_at = Some(index);
        self
    }

    pub fn fail_start_at(mut self, index: usize) -> Self {
        self.fail_start_at = Some(index);
        self
    }
}

impl PipelineEngine for MockEngine {
    fn build(&self, spec: &PipelineSpec) -> Result<Box<dyn PipelineHandle>, PipelineError> {
        self.calls.lock().push(format!("build {}", spec.index));
        self.specs.lock().push(spec.clone());

        if self.fail_build_at == Some(spec.index) {
            return Err(PipelineError::Build {
                index: spec.index,
                reason: "mock build failure".into(),
            });
        }

        let (tx, rx) = mpsc::channel(8);
        self.event_txs.lock().insert(spec.index, tx);

        Ok(Box::new(MockHandle {
            index: spec.index,
            fail_start: self.fail_start_at == Some(spec.index),
            state: PipelineState::Built,
            calls: self.calls.clone(),
            stop_counts: self.stop_counts.clone(),
            events_rx: Some(rx),
        }))
    }
}

struct MockHandle {
    index: usize,
    fail_start: bool,
    state: PipelineState,
    calls: Arc<Mutex<Vec<String>>>,
    stop_counts: Arc<Mutex<HashMap<usize, usize>>>,
    events_rx: Option<mpsc::Receiver<PipelineEvent>>,
}

impl PipelineHandle for MockHandle {
    fn set_clock(&mut self, _clock: ClockHandle) {
        self.calls.lock().push(format!("set_clock {}", self.index));
    }

    fn set_start_epoch(&mut self, _epoch: ClockTime) {
        self.calls.lock().push(format!("set_epoch {}", self.index));
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        self.calls.lock().push(format!("start {}", self.index));
        if self.fail_start {
            return Err(PipelineError::Start {
                index: self.index,
                reason: "mock start failure".into(),
            });
        }
        self.state = PipelineState::Running;
        Ok(())
    }

    fn stop(&mut self) {
        *self.stop_counts.lock().entry(self.index).or_insert(0) += 1;
        self.state = PipelineState::Stopped;
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<PipelineEvent>> {
        self.events_rx.take()
    }

    fn state(&self) -> PipelineState {
        self.state
    }
}
