//! Lowering errors and warnings.
//!
//! Errors abort the current construct; the engine rolls back any IR the
//! construct had already produced. Warnings are collected as
//! [`Diagnostic`]s on the [`LoweringContext`](crate::LoweringContext) and
//! never stop lowering.

use omp_ir::Span;

/// Failure while lowering one construct.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    /// The construct or clause is recognized but has no lowering yet.
    #[error("not yet implemented: {what} on {construct} at {span}")]
    UnsupportedConstruct {
        construct: &'static str,
        what: String,
        span: Span,
    },
    /// Lowering found input that violates an internal invariant.
    #[error("internal invariant violated: {message} at {span}")]
    InvariantViolation { message: String, span: Span },
}

impl LowerError {
    pub fn unsupported(construct: &'static str, what: impl Into<String>, span: Span) -> Self {
        LowerError::UnsupportedConstruct {
            construct,
            what: what.into(),
            span,
        }
    }

    pub fn invariant(message: impl Into<String>, span: Span) -> Self {
        LowerError::InvariantViolation {
            message: message.into(),
            span,
        }
    }

    #[inline]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, LowerError::UnsupportedConstruct { .. })
    }

    pub fn span(&self) -> Span {
        match self {
            LowerError::UnsupportedConstruct { span, .. }
            | LowerError::InvariantViolation { span, .. } => *span,
        }
    }
}

pub type LowerResult<T> = Result<T, LowerError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Note,
}

/// Non-fatal problem reported during lowering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }
}
