use std::path::Path;

use anyhow::{Context, Result};

use rowmill_engine::{parse_pipeline, Pipeline, StepRegistry};

/// Execute the `check` command: parse, validate and instantiate every
/// step without running anything.
pub fn execute(pipeline_path: &Path) -> Result<()> {
    let config = parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    let name = config.pipeline.clone();
    let steps = config.steps.len();
    let hops = config.hops.len();

    let pipeline = Pipeline::new(config, StepRegistry::with_builtins())?;
    pipeline.check()?;

    tracing::info!(pipeline = name, steps, hops, "pipeline is valid");
    println!("Pipeline '{name}' is valid ({steps} steps, {hops} hops).");
    Ok(())
}
