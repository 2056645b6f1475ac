//! Pass-through step; doubles as a counting sink when it has no outputs.

use rowmill_types::StepError;

use crate::step::{Step, StepIo};

/// Forwards every row unchanged. With no output hops it is a sink whose
/// `lines_read` counter is the row count.
#[derive(Debug, Default)]
pub struct Dummy;

impl Dummy {
    pub fn from_json(_config: &serde_json::Value) -> Result<Box<dyn Step>, StepError> {
        Ok(Box::new(Self))
    }
}

impl Step for Dummy {
    fn process_row(&mut self, io: &mut StepIo) -> Result<bool, StepError> {
        let Some(row) = io.get_row() else {
            return Ok(false);
        };
        io.put_row(row)?;
        Ok(true)
    }
}
