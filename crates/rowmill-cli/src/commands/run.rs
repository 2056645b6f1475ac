use std::path::Path;

use anyhow::{Context, Result};

use rowmill_engine::{parse_pipeline, Pipeline, StepRegistry};

/// Execute the `run` command: parse, validate and run a pipeline.
pub fn execute(pipeline_path: &Path) -> Result<()> {
    let config = parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    tracing::info!(
        pipeline = config.pipeline,
        steps = config.steps.len(),
        hops = config.hops.len(),
        "pipeline validated"
    );

    let pipeline = Pipeline::new(config, StepRegistry::with_builtins())?;
    let result = pipeline.execute()?;

    println!("Pipeline '{}' finished in {:.2}s.", result.pipeline, result.duration_secs);
    println!(
        "  {:<24} {:>10} {:>10} {:>10} {:>8}  state",
        "step", "read", "written", "rejected", "errors"
    );
    for step in &result.steps {
        println!(
            "  {:<24} {:>10} {:>10} {:>10} {:>8}  {}",
            format!("{}.{}", step.name, step.copy),
            step.lines_read,
            step.lines_written,
            step.lines_rejected,
            step.errors,
            step.state,
        );
    }

    if !result.success() {
        match result.first_error {
            Some(err) => anyhow::bail!("pipeline failed: {err}"),
            None => anyhow::bail!("pipeline failed with {} error(s)", result.total_errors()),
        }
    }
    Ok(())
}
