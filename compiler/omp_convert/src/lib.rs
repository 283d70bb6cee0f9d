//! Dialect conversion for lowered parallel-construct IR.
//!
//! Rewrites a module produced by `omp_lower` so that every value, block
//! argument, and host type attribute uses the target type family
//! (`Int`, `Float`, `Ptr`, `Struct`).
//!
//! # Architecture
//!
//! - [`TypeConverter`]: the type-conversion service; [`TargetTypeConverter`]
//!   is the standard implementation
//! - [`ConversionPattern`]: one rule per operation family, collected in a
//!   [`PatternSet`]
//! - [`Rewriter`]: replaces operations, moving their regions and
//!   redirecting uses
//! - [`apply_patterns`]: the fixed-point driver; [`convert_module`] runs it
//!   with the standard patterns
//!
//! # Design
//!
//! Operations are never edited in place. An illegal operation is replaced
//! by a new one of the same kind whose result and block-argument types are
//! converted; its regions are relocated, not recreated. A failure to
//! legalize any operation fails the whole pass with a
//! [`ConversionFailure`] naming it.

mod driver;
mod error;
mod options;
mod patterns;
mod rewriter;
mod types;

pub use driver::{apply_patterns, convert_module, ConversionStats};
pub use error::{ConversionFailure, ConversionResult, FailureReason};
pub use options::ConversionOptions;
pub use patterns::{
    AlwaysLegalPattern, ConversionPattern, HostPattern, OperandPattern, PatternSet,
    ReductionPattern, RegionOpPattern, VarOperandPattern,
};
pub use rewriter::{Operands, Rewriter};
pub use types::{TargetTypeConverter, TypeConverter};
