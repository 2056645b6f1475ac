//! Row pipeline engine: bounded queues, thread-per-copy steps and the
//! orchestrator that wires and runs them.
//!
//! A pipeline is a directed graph of named steps connected by hops. Each
//! step copy runs on its own thread, pulling rows from bounded queues and
//! pushing downstream; a full queue blocks the producer, which is the only
//! flow control in the engine. See [`runner::Pipeline`] for the entry
//! point.

pub mod config;
pub mod error;
pub mod graph;
pub mod queue;
pub mod registry;
pub mod runner;
pub mod step;
pub mod steps;

pub use config::{parse_pipeline, parse_pipeline_str, PipelineConfig};
pub use error::PipelineError;
pub use queue::{QueueError, RowQueue};
pub use registry::{StepFactory, StepRegistry};
pub use runner::{Pipeline, PipelineResult, StepMetrics};
pub use step::{RowListener, Step, StepHandle, StepIo, StepMeta, StepState, StopSignal};
