//! Pipeline configuration: YAML types and parsing.

pub mod parser;
pub mod types;

pub use parser::{parse_pipeline, parse_pipeline_str};
pub use types::{HopConfig, PipelineConfig, Resources, StepConfig};
