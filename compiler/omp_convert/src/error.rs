//! Conversion errors.

use omp_ir::{IrType, OpId, OpKind};

/// Why an operation could not be legalized.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    /// An operand carries a type the pattern refuses to pass through.
    #[error("operand {index} has illegal type {ty}")]
    IllegalOperand { index: usize, ty: IrType },
    /// The type converter has no rule for a type the operation needs.
    #[error("no target type for {0}")]
    UnconvertibleType(IrType),
    /// The operation is illegal and no pattern matches its kind.
    #[error("no conversion pattern")]
    NoPattern,
    /// Illegal operations remained after the iteration cap.
    #[error("still illegal after {iterations} iterations")]
    NoFixedPoint { iterations: usize },
}

/// The pass failed; the module is left partially converted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("failed to convert {op} ({op_kind}): {reason}")]
pub struct ConversionFailure {
    pub op: OpId,
    pub op_kind: &'static str,
    pub reason: FailureReason,
}

impl ConversionFailure {
    pub fn new(op: OpId, kind: OpKind, reason: FailureReason) -> Self {
        Self {
            op,
            op_kind: kind.name(),
            reason,
        }
    }
}

pub type ConversionResult<T> = Result<T, ConversionFailure>;
