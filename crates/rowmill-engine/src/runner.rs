//! Pipeline orchestration: queue wiring, thread-per-copy execution,
//! cancellation and final aggregation.
//!
//! Every (step, copy) runs on its own OS thread. All queues are allocated
//! and wired before any thread starts, so a fast producer can at worst
//! fill a bounded queue and block; it can never observe a missing
//! consumer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use rowmill_types::StepError;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::graph;
use crate::queue::RowQueue;
use crate::registry::StepRegistry;
use crate::step::{
    OutputTarget, RowListener, Step, StepHandle, StepIo, StepMeta, StepState, StopSignal,
};

/// Final snapshot of one step copy.
#[derive(Debug, Clone)]
pub struct StepMetrics {
    pub name: String,
    pub copy: usize,
    pub state: StepState,
    pub lines_read: u64,
    pub lines_written: u64,
    pub lines_rejected: u64,
    pub errors: u64,
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct PipelineResult {
    pub pipeline: String,
    pub steps: Vec<StepMetrics>,
    pub duration_secs: f64,
    /// First fatal step error observed, if any.
    pub first_error: Option<StepError>,
}

impl PipelineResult {
    /// Sum of fatal error counters across all step copies.
    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.steps.iter().map(|s| s.errors).sum()
    }

    /// A run succeeds iff no step copy recorded a fatal error. Rows
    /// diverted to error outputs do not fail the run.
    #[must_use]
    pub fn success(&self) -> bool {
        self.total_errors() == 0
    }

    /// Metrics for one named step copy.
    #[must_use]
    pub fn step(&self, name: &str, copy: usize) -> Option<&StepMetrics> {
        self.steps.iter().find(|s| s.name == name && s.copy == copy)
    }
}

/// A validated, executable pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    registry: StepRegistry,
    listeners: Vec<Arc<dyn RowListener>>,
}

impl Pipeline {
    /// Validate the definition against the registry and build a pipeline.
    ///
    /// # Errors
    ///
    /// Returns a validation error on structural defects or unknown step
    /// kinds.
    pub fn new(config: PipelineConfig, registry: StepRegistry) -> Result<Self, PipelineError> {
        graph::validate(&config)?;
        for step in &config.steps {
            if !registry.contains(&step.kind) {
                return Err(PipelineError::Validation(format!(
                    "step '{}' has unknown kind '{}'",
                    step.name, step.kind
                )));
            }
        }
        Ok(Self {
            config,
            registry,
            listeners: Vec::new(),
        })
    }

    /// Attach a row listener; every step copy notifies it.
    pub fn add_row_listener(&mut self, listener: Arc<dyn RowListener>) {
        self.listeners.push(listener);
    }

    /// Instantiate every step once without running anything. Surfaces
    /// per-step configuration errors a structural check cannot see.
    ///
    /// # Errors
    ///
    /// Returns the first step factory error.
    pub fn check(&self) -> Result<(), PipelineError> {
        for step in &self.config.steps {
            self.registry.create(&step.kind, &step.config)?;
        }
        Ok(())
    }

    /// Run the pipeline to completion with a fresh stop signal.
    ///
    /// # Errors
    ///
    /// Returns an error on instantiation or thread infrastructure
    /// failures. Step failures during the run do not error here; they are
    /// reported through [`PipelineResult`].
    pub fn execute(&self) -> Result<PipelineResult, PipelineError> {
        self.execute_with(StopSignal::new())
    }

    /// Run the pipeline with a caller-supplied stop signal, so an
    /// external party (signal handler, timeout) can cancel the run.
    pub fn execute_with(&self, signal: Arc<StopSignal>) -> Result<PipelineResult, PipelineError> {
        let started = Instant::now();
        tracing::info!(
            pipeline = self.config.pipeline,
            steps = self.config.steps.len(),
            hops = self.config.hops.len(),
            "starting pipeline"
        );

        // Instantiate all copies up front so a bad config aborts the run
        // before anything executes.
        let mut instances: Vec<(usize, usize, Box<dyn Step>)> = Vec::new();
        for (idx, step) in self.config.steps.iter().enumerate() {
            for copy in 0..step.copies {
                let instance = self.registry.create(&step.kind, &step.config).map_err(|e| {
                    tracing::error!(step = step.name, kind = step.kind, error = %e, "step instantiation failed");
                    PipelineError::Step(e)
                })?;
                instances.push((idx, copy, instance));
            }
        }

        let wiring = self.wire_queues(&signal);

        // Handles are registered before any thread starts so a stop
        // request always reaches every copy.
        let mut handles: Vec<Arc<StepHandle>> = Vec::new();
        let mut threads = Vec::new();
        let mut ios: Vec<(usize, usize, Box<dyn Step>, StepIo, Arc<StepHandle>)> = Vec::new();
        for (idx, copy, instance) in instances {
            let step = &self.config.steps[idx];
            let meta = StepMeta {
                name: step.name.clone(),
                copy,
            };
            let handle = Arc::new(StepHandle::new(meta.clone()));
            signal.register_handle(handle.clone());
            handles.push(handle.clone());

            let io = StepIo::new(
                meta,
                wiring.inputs.get(&(idx, copy)).cloned().unwrap_or_default(),
                wiring.outputs.get(&(idx, copy)).map_or_else(Vec::new, |targets| {
                    targets
                        .iter()
                        .map(|(name, queues)| OutputTarget::new(name.clone(), queues.clone()))
                        .collect()
                }),
                wiring
                    .error_outputs
                    .get(&(idx, copy))
                    .map(|(name, queues)| OutputTarget::new(name.clone(), queues.clone())),
                signal.clone(),
                handle.clone(),
                self.listeners.clone(),
                self.config.resources.max_errors,
            );
            ios.push((idx, copy, instance, io, handle));
        }

        for (idx, copy, instance, io, handle) in ios {
            let step = &self.config.steps[idx];
            let thread_name = format!("{}.{copy}", step.name);
            let thread_signal = signal.clone();
            let spawned = std::thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || run_step(instance, io, handle, thread_signal))
                .with_context(|| format!("failed to spawn step thread '{thread_name}'"));
            match spawned {
                Ok(thread) => threads.push(thread),
                Err(e) => {
                    // Unwind whatever already started before reporting.
                    signal.stop();
                    for thread in threads {
                        let _ = thread.join();
                    }
                    return Err(e.into());
                }
            }
        }

        let mut first_error: Option<StepError> = None;
        let mut panicked = false;
        for thread in threads {
            match thread.join() {
                Ok(Some(err)) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
                Ok(None) => {}
                Err(_) => {
                    // Keep joining; the remaining threads still own queues.
                    signal.stop();
                    panicked = true;
                }
            }
        }
        if panicked {
            return Err(PipelineError::Infrastructure(anyhow::anyhow!(
                "step thread panicked"
            )));
        }

        let steps: Vec<StepMetrics> = handles
            .iter()
            .map(|h| StepMetrics {
                name: h.meta.name.clone(),
                copy: h.meta.copy,
                state: h.state(),
                lines_read: h.lines_read(),
                lines_written: h.lines_written(),
                lines_rejected: h.lines_rejected(),
                errors: h.errors(),
            })
            .collect();

        let result = PipelineResult {
            pipeline: self.config.pipeline.clone(),
            steps,
            duration_secs: started.elapsed().as_secs_f64(),
            first_error,
        };

        for metrics in &result.steps {
            tracing::info!(
                step = metrics.name,
                copy = metrics.copy,
                state = %metrics.state,
                lines_read = metrics.lines_read,
                lines_written = metrics.lines_written,
                lines_rejected = metrics.lines_rejected,
                errors = metrics.errors,
                "step finished"
            );
        }
        tracing::info!(
            pipeline = result.pipeline,
            success = result.success(),
            errors = result.total_errors(),
            duration_secs = result.duration_secs,
            "pipeline finished"
        );

        Ok(result)
    }

    fn wire_queues(&self, signal: &Arc<StopSignal>) -> Wiring {
        let index_of: HashMap<&str, usize> = self
            .config
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        let mut wiring = Wiring::default();
        let capacity = self.config.resources.queue_capacity;

        for hop in &self.config.hops {
            if !hop.enabled {
                continue;
            }
            let from_idx = index_of[hop.from.as_str()];
            let to_idx = index_of[hop.to.as_str()];
            let from_copies = self.config.steps[from_idx].copies;
            let to_copies = self.config.steps[to_idx].copies;

            // Equal copy counts pair 1:1; unequal counts get the full
            // cross product so no copy starves.
            let mut per_from: Vec<Vec<Arc<RowQueue>>> = vec![Vec::new(); from_copies];
            let pairs: Vec<(usize, usize)> = if from_copies == to_copies {
                (0..from_copies).map(|c| (c, c)).collect()
            } else {
                (0..from_copies)
                    .flat_map(|f| (0..to_copies).map(move |t| (f, t)))
                    .collect()
            };
            for (fc, tc) in pairs {
                let queue = Arc::new(RowQueue::new(capacity, &hop.from, fc, &hop.to, tc));
                signal.register_queue(queue.clone());
                per_from[fc].push(queue.clone());
                wiring.inputs.entry((to_idx, tc)).or_default().push(queue);
            }

            for (fc, queues) in per_from.into_iter().enumerate() {
                if hop.error {
                    wiring
                        .error_outputs
                        .insert((from_idx, fc), (hop.to.clone(), queues));
                } else {
                    wiring
                        .outputs
                        .entry((from_idx, fc))
                        .or_default()
                        .push((hop.to.clone(), queues));
                }
            }
        }
        wiring
    }
}

#[derive(Default)]
struct Wiring {
    inputs: HashMap<(usize, usize), Vec<Arc<RowQueue>>>,
    outputs: HashMap<(usize, usize), Vec<(String, Vec<Arc<RowQueue>>)>>,
    error_outputs: HashMap<(usize, usize), (String, Vec<Arc<RowQueue>>)>,
}

/// Body of one step thread. Returns the fatal error, if any; all state
/// and counter updates go through the shared handle.
fn run_step(
    mut step: Box<dyn Step>,
    mut io: StepIo,
    handle: Arc<StepHandle>,
    signal: Arc<StopSignal>,
) -> Option<StepError> {
    let meta = io.meta().clone();

    if let Err(err) = step.init() {
        tracing::error!(step = %meta, error = %err, "step initialization failed");
        handle.add_errors(1);
        handle.set_state(StepState::Error);
        signal.stop();
        io.mark_outputs_done();
        step.dispose();
        return Some(err);
    }
    handle.set_state(StepState::Running);
    tracing::debug!(step = %meta, "step running");

    let mut fatal: Option<StepError> = None;
    loop {
        if io.stop_requested() {
            break;
        }
        match step.process_row(&mut io) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                // A released queue during cancellation is teardown, not a
                // failure.
                if signal.is_stopped() && err.code == "QUEUE_RELEASED" {
                    break;
                }
                tracing::error!(step = %meta, error = %err, "step failed");
                handle.add_errors(1);
                signal.stop();
                fatal = Some(err);
                break;
            }
        }
    }

    io.log_queue_feedback();
    step.dispose();
    io.mark_outputs_done();
    handle.set_state(if fatal.is_some() {
        StepState::Error
    } else {
        StepState::Done
    });
    fatal
}
