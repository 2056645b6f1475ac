//! The step execution contract.
//!
//! A [`Step`] is the capability interface every step kind implements:
//! `init` / `process_row` / `dispose`. The engine hands each running copy a
//! [`StepIo`], the only surface through which a step touches its queues,
//! counters and the pipeline-wide stop signal.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use rowmill_types::{Row, StepError, Value};

use crate::queue::{QueueError, RowQueue};

/// Identity of one running step copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMeta {
    pub name: String,
    pub copy: usize,
}

impl std::fmt::Display for StepMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.name, self.copy)
    }
}

/// Lifecycle state of a step instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StepState {
    Created = 0,
    Running = 1,
    /// Cancellation requested; observed cooperatively between iterations.
    Stopping = 2,
    Done = 3,
    Error = 4,
}

impl StepState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Stopping,
            4 => Self::Error,
            _ => Self::Done,
        }
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Done => "done",
            Self::Error => "error",
        })
    }
}

/// Shared, atomically readable view of one step copy: state and counters.
///
/// Counters are written only by the owning step thread; the orchestrator
/// reads them for monitoring and final aggregation. The state is also
/// written by the orchestrator on cancellation (Running -> Stopping).
#[derive(Debug)]
pub struct StepHandle {
    pub meta: StepMeta,
    state: AtomicU8,
    lines_read: AtomicU64,
    lines_written: AtomicU64,
    lines_rejected: AtomicU64,
    errors: AtomicU64,
}

impl StepHandle {
    #[must_use]
    pub fn new(meta: StepMeta) -> Self {
        Self {
            meta,
            state: AtomicU8::new(StepState::Created as u8),
            lines_read: AtomicU64::new(0),
            lines_written: AtomicU64::new(0),
            lines_rejected: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> StepState {
        StepState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: StepState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Request Stopping, but only from Running (a finished step stays
    /// Done/Error).
    pub(crate) fn request_stop(&self) {
        let _ = self.state.compare_exchange(
            StepState::Running as u8,
            StepState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written.load(Ordering::Relaxed)
    }

    /// Rows diverted to the error output.
    pub fn lines_rejected(&self) -> u64 {
        self.lines_rejected.load(Ordering::Relaxed)
    }

    /// Fatal error count; any nonzero value fails the pipeline.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub(crate) fn add_errors(&self, n: u64) {
        self.errors.fetch_add(n, Ordering::Relaxed);
    }
}

/// Pipeline-wide cooperative stop signal.
///
/// One atomic flag written by the orchestrator (or any step via
/// `stop_all`), read by every step thread between iterations. Raising it
/// also releases every registered queue so threads blocked in `put`/`get`
/// wake up instead of deadlocking teardown.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    queues: Mutex<Vec<Arc<RowQueue>>>,
    handles: Mutex<Vec<Arc<StepHandle>>>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn register_queue(&self, queue: Arc<RowQueue>) {
        self.queues.lock().expect("signal lock poisoned").push(queue);
    }

    pub(crate) fn register_handle(&self, handle: Arc<StepHandle>) {
        self.handles.lock().expect("signal lock poisoned").push(handle);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Raise the stop flag and release every queue. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        for handle in self.handles.lock().expect("signal lock poisoned").iter() {
            handle.request_stop();
        }
        for queue in self.queues.lock().expect("signal lock poisoned").iter() {
            queue.release();
        }
    }
}

/// Observer notified on every row a step reads or writes.
///
/// Listeners are monitoring/test hooks; they must not alter dataflow.
pub trait RowListener: Send + Sync {
    fn row_read(&self, _step: &StepMeta, _row: &Row) {}
    fn row_written(&self, _step: &StepMeta, _row: &Row) {}
    fn error_row_written(&self, _step: &StepMeta, _row: &Row) {}
}

/// The queues feeding one downstream step: one queue per copy of that
/// step, written round-robin.
pub(crate) struct OutputTarget {
    pub(crate) step_name: String,
    pub(crate) queues: Vec<Arc<RowQueue>>,
    next: usize,
}

impl OutputTarget {
    pub(crate) fn new(step_name: String, queues: Vec<Arc<RowQueue>>) -> Self {
        Self { step_name, queues, next: 0 }
    }

    fn put(&mut self, row: Row) -> Result<(), QueueError> {
        let idx = self.next % self.queues.len();
        self.next = self.next.wrapping_add(1);
        self.queues[idx].put(row)
    }

    fn mark_done(&self) {
        for queue in &self.queues {
            queue.mark_done();
        }
    }
}

/// Per-copy I/O surface handed to a running step.
///
/// Input reading round-robins across the step's input queues; an exhausted
/// queue drops out of the rotation and `get_row` returns `None` only when
/// every input has delivered end-of-stream. No ordering across distinct
/// input queues is guaranteed. Output writing replicates each row to every
/// distinct downstream step and round-robins across the copies of each.
pub struct StepIo {
    meta: StepMeta,
    inputs: Vec<Arc<RowQueue>>,
    next_input: usize,
    outputs: Vec<OutputTarget>,
    error_output: Option<OutputTarget>,
    signal: Arc<StopSignal>,
    handle: Arc<StepHandle>,
    listeners: Vec<Arc<dyn RowListener>>,
    /// Fail the step once this many rows were diverted (None = unlimited).
    max_rejected: Option<u64>,
}

impl StepIo {
    pub(crate) fn new(
        meta: StepMeta,
        inputs: Vec<Arc<RowQueue>>,
        outputs: Vec<OutputTarget>,
        error_output: Option<OutputTarget>,
        signal: Arc<StopSignal>,
        handle: Arc<StepHandle>,
        listeners: Vec<Arc<dyn RowListener>>,
        max_rejected: Option<u64>,
    ) -> Self {
        Self {
            meta,
            inputs,
            next_input: 0,
            outputs,
            error_output,
            signal,
            handle,
            listeners,
            max_rejected,
        }
    }

    pub fn meta(&self) -> &StepMeta {
        &self.meta
    }

    /// Whether this step has an error output wired (error handling enabled).
    pub fn error_handling_enabled(&self) -> bool {
        self.error_output.is_some()
    }

    /// Whether pipeline-wide cancellation has been requested.
    pub fn stop_requested(&self) -> bool {
        self.signal.is_stopped()
    }

    /// Request pipeline-wide cancellation.
    pub fn stop_all(&self) {
        tracing::warn!(step = %self.meta, "step requested pipeline stop");
        self.signal.stop();
    }

    /// Add `n` to this step's fatal error counter.
    pub fn set_errors(&self, n: u64) {
        self.handle.add_errors(n);
    }

    pub fn lines_read(&self) -> u64 {
        self.handle.lines_read()
    }

    pub fn lines_written(&self) -> u64 {
        self.handle.lines_written()
    }

    /// Fetch one row from the step's inputs.
    ///
    /// `None` means every input queue has delivered end-of-stream, or
    /// cancellation was requested. A step with no inputs (a source) always
    /// gets `None`.
    pub fn get_row(&mut self) -> Option<Row> {
        loop {
            if self.inputs.is_empty() || self.stop_requested() {
                return None;
            }
            let idx = self.next_input % self.inputs.len();
            match self.inputs[idx].get() {
                Some(row) => {
                    self.next_input = idx + 1;
                    self.handle.lines_read.fetch_add(1, Ordering::Relaxed);
                    for listener in &self.listeners {
                        listener.row_read(&self.meta, &row);
                    }
                    return Some(row);
                }
                None => {
                    // Exhausted: drop out of the rotation.
                    self.inputs.remove(idx);
                    self.next_input = idx;
                }
            }
        }
    }

    /// Write one row to every downstream step (one copy per distinct
    /// target, round-robin across the copies of each target).
    pub fn put_row(&mut self, row: Row) -> Result<(), StepError> {
        if self.outputs.is_empty() {
            return Ok(());
        }
        for listener in &self.listeners {
            listener.row_written(&self.meta, &row);
        }
        let last = self.outputs.len() - 1;
        for i in 0..last {
            self.outputs[i].put(row.clone()).map_err(map_queue_error)?;
        }
        self.outputs[last].put(row).map_err(map_queue_error)?;
        self.handle.lines_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Write one row to the named downstream step only.
    pub fn put_row_to(&mut self, target_step: &str, row: Row) -> Result<(), StepError> {
        let target = self
            .outputs
            .iter_mut()
            .find(|t| t.step_name == target_step)
            .ok_or_else(|| {
                StepError::config(
                    "UNKNOWN_TARGET",
                    format!("no hop to step '{target_step}'"),
                )
            })?;
        for listener in &self.listeners {
            listener.row_written(&self.meta, &row);
        }
        target.put(row).map_err(map_queue_error)?;
        self.handle.lines_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Divert an offending row to the error output, annotated with the
    /// error description, the fields involved and the error code.
    ///
    /// Only valid when error handling is enabled for this step.
    pub fn put_error(&mut self, row: Row, error: &StepError) -> Result<(), StepError> {
        let target = self.error_output.as_mut().ok_or_else(|| {
            StepError::internal(
                "NO_ERROR_OUTPUT",
                format!("step '{}' has no error output", self.meta),
            )
        })?;

        let mut error_row = row;
        error_row.push(Value::string("error_description", error.message.clone()));
        error_row.push(Value::string("error_fields", error.fields.join(",")));
        error_row.push(Value::string("error_code", error.code.clone()));

        for listener in &self.listeners {
            listener.error_row_written(&self.meta, &error_row);
        }
        target.put(error_row).map_err(map_queue_error)?;
        let rejected = self.handle.lines_rejected.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(max) = self.max_rejected {
            if rejected > max {
                return Err(StepError::data(
                    "MAX_ERRORS_EXCEEDED",
                    format!("step '{}' exceeded {} diverted rows", self.meta, max),
                )
                .with_scope(rowmill_types::ErrorScope::Step));
            }
        }
        Ok(())
    }

    /// Mark every output queue (error output included) done. Called by the
    /// engine when the step's loop exits, success or failure.
    pub(crate) fn mark_outputs_done(&self) {
        for target in &self.outputs {
            target.mark_done();
        }
        if let Some(target) = &self.error_output {
            target.mark_done();
        }
    }

    /// Debug-level feedback on queue fill levels, for monitoring only.
    pub(crate) fn log_queue_feedback(&self) {
        for target in &self.outputs {
            for queue in &target.queues {
                tracing::debug!(
                    step = %self.meta,
                    target = target.step_name,
                    size = queue.len(),
                    capacity = queue.capacity(),
                    "output queue feedback"
                );
            }
        }
    }
}

fn map_queue_error(err: QueueError) -> StepError {
    let code = match &err {
        QueueError::DoneProducer { .. } => "PUT_AFTER_DONE",
        QueueError::LayoutMismatch { .. } => "LAYOUT_MISMATCH",
        QueueError::Released { .. } => "QUEUE_RELEASED",
    };
    StepError::queue(code, err.to_string())
}

/// The capability contract every step kind implements.
///
/// Lifecycle: `init` once (failure aborts the whole run before RUNNING),
/// then `process_row` repeatedly until it returns `Ok(false)` (no more
/// work) or an error, then `dispose` unconditionally.
pub trait Step: Send {
    /// One-time setup from configuration.
    fn init(&mut self) -> Result<(), StepError> {
        Ok(())
    }

    /// One iteration: read input, transform, write output. `Ok(false)`
    /// signals the step is done.
    fn process_row(&mut self, io: &mut StepIo) -> Result<bool, StepError>;

    /// Guaranteed teardown, success or failure.
    fn dispose(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_state_roundtrip() {
        for state in [
            StepState::Created,
            StepState::Running,
            StepState::Stopping,
            StepState::Done,
            StepState::Error,
        ] {
            assert_eq!(StepState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn handle_counters_start_at_zero() {
        let handle = StepHandle::new(StepMeta { name: "a".into(), copy: 0 });
        assert_eq!(handle.state(), StepState::Created);
        assert_eq!(handle.lines_read(), 0);
        assert_eq!(handle.lines_written(), 0);
        assert_eq!(handle.errors(), 0);
    }

    #[test]
    fn request_stop_only_hits_running_steps() {
        let handle = StepHandle::new(StepMeta { name: "a".into(), copy: 0 });
        handle.request_stop();
        assert_eq!(handle.state(), StepState::Created);

        handle.set_state(StepState::Running);
        handle.request_stop();
        assert_eq!(handle.state(), StepState::Stopping);

        handle.set_state(StepState::Done);
        handle.request_stop();
        assert_eq!(handle.state(), StepState::Done);
    }

    #[test]
    fn stop_signal_releases_registered_queues() {
        let signal = StopSignal::new();
        let queue = Arc::new(RowQueue::new(1, "a", 0, "b", 0));
        signal.register_queue(queue.clone());

        assert!(!signal.is_stopped());
        signal.stop();
        assert!(signal.is_stopped());
        // Released queue yields end-of-stream instead of blocking.
        assert_eq!(queue.get(), None);
        // Idempotent.
        signal.stop();
    }
}
