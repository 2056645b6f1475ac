//! Structural validation of a pipeline definition.
//!
//! Checks run before any step is instantiated. Cycles are deliberately
//! allowed (feedback topologies exist); only defects that make a run
//! meaningless or ambiguous are rejected here.

use std::collections::{HashMap, HashSet};

use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Validate the pipeline definition.
///
/// # Errors
///
/// Returns [`PipelineError::Validation`] on the first structural defect:
/// no steps, duplicate step names, zero copies, a hop endpoint that names
/// no step, a self-hop, a duplicate hop, or more than one error hop
/// leaving the same step.
pub fn validate(config: &PipelineConfig) -> Result<(), PipelineError> {
    if config.steps.is_empty() {
        return Err(PipelineError::Validation(
            "pipeline defines no steps".into(),
        ));
    }
    if config.resources.queue_capacity == 0 {
        return Err(PipelineError::Validation(
            "queue_capacity must be at least 1".into(),
        ));
    }

    let mut names = HashSet::new();
    for step in &config.steps {
        if step.name.is_empty() {
            return Err(PipelineError::Validation("step with empty name".into()));
        }
        if !names.insert(step.name.as_str()) {
            return Err(PipelineError::Validation(format!(
                "duplicate step name '{}'",
                step.name
            )));
        }
        if step.copies == 0 {
            return Err(PipelineError::Validation(format!(
                "step '{}' has zero copies",
                step.name
            )));
        }
    }

    let mut seen_hops = HashSet::new();
    let mut error_hops: HashMap<&str, usize> = HashMap::new();
    for hop in &config.hops {
        for endpoint in [&hop.from, &hop.to] {
            if !names.contains(endpoint.as_str()) {
                return Err(PipelineError::Validation(format!(
                    "hop endpoint '{endpoint}' names no step"
                )));
            }
        }
        if hop.from == hop.to {
            return Err(PipelineError::Validation(format!(
                "step '{}' hops to itself",
                hop.from
            )));
        }
        if !hop.enabled {
            continue;
        }
        if !seen_hops.insert((hop.from.as_str(), hop.to.as_str())) {
            return Err(PipelineError::Validation(format!(
                "duplicate hop '{}' -> '{}'",
                hop.from, hop.to
            )));
        }
        if hop.error {
            let count = error_hops.entry(hop.from.as_str()).or_insert(0);
            *count += 1;
            if *count > 1 {
                return Err(PipelineError::Validation(format!(
                    "step '{}' has more than one error hop",
                    hop.from
                )));
            }
        }
    }

    Ok(())
}
