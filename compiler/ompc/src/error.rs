//! Pipeline errors.

use omp_convert::ConversionFailure;
use omp_ir::VerifyError;
use omp_lower::LowerError;

/// The first failure of any pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("lowering failed: {0}")]
    Lower(#[from] LowerError),
    #[error("malformed IR: {0}")]
    Verify(#[from] VerifyError),
    #[error("conversion failed: {0}")]
    Convert(#[from] ConversionFailure),
}

impl CompileError {
    /// Whether the unit used a feature that has no lowering yet, as
    /// opposed to a defect in the input or the engine.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, CompileError::Lower(err) if err.is_unsupported())
    }
}
