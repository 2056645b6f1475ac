//! Pipeline-level error model.

use rowmill_types::StepError;

/// Categorized pipeline error.
///
/// `Step` wraps a typed [`StepError`] surfaced by a step instance.
/// `Validation` covers graph/config problems found before anything runs.
/// `Infrastructure` wraps opaque host-side failures (thread spawn, config
/// file I/O) that have no step attached.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid pipeline: {0}")]
    Validation(String),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl PipelineError {
    /// The typed step error, if this is a `Step` variant.
    pub fn as_step_error(&self) -> Option<&StepError> {
        match self {
            Self::Step(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_is_extractable() {
        let err = PipelineError::from(StepError::config("X", "y"));
        assert!(err.as_step_error().is_some());
        assert!(err.to_string().contains("X"));
    }

    #[test]
    fn infrastructure_has_no_step_error() {
        let err = PipelineError::from(anyhow::anyhow!("thread spawn failed"));
        assert!(err.as_step_error().is_none());
    }
}
