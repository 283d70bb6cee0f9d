//! Fixed-point conversion driver.
//!
//! # Algorithm
//!
//! 1. **Sweep**: walk every live operation in pre-order. Each illegal
//!    operation is handed to the first pattern that matches its kind.
//! 2. **Iterate**: repeat until a sweep rewrites nothing (fixed point) or
//!    the iteration cap is reached.
//!
//! Pre-order matters: an operation's operands are defined before it, so
//! by the time it is visited their producers have been rewritten and the
//! uses redirected. A well-formed module converges in one sweep plus the
//! confirming one.

use omp_ir::{IrModule, OpId};

use crate::error::{ConversionFailure, ConversionResult, FailureReason};
use crate::options::ConversionOptions;
use crate::patterns::PatternSet;
use crate::rewriter::Rewriter;
use crate::types::{TargetTypeConverter, TypeConverter};

/// Outcome of a successful pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Sweeps performed, including the final one that changed nothing.
    pub iterations: usize,
    /// Operations replaced.
    pub rewrites: usize,
}

/// Convert `module` with the standard patterns and a [`TargetTypeConverter`]
/// configured from `options`.
pub fn convert_module(
    module: &mut IrModule,
    options: &ConversionOptions,
) -> ConversionResult<ConversionStats> {
    let converter = TargetTypeConverter::new(options.index_bitwidth);
    apply_patterns(module, &converter, &PatternSet::standard(), options)
}

/// Drive `patterns` over `module` until no operation is illegal.
///
/// On failure the module is left partially converted.
pub fn apply_patterns(
    module: &mut IrModule,
    converter: &dyn TypeConverter,
    patterns: &PatternSet,
    options: &ConversionOptions,
) -> ConversionResult<ConversionStats> {
    let _span = tracing::debug_span!("convert_module", patterns = patterns.len()).entered();
    let mut rw = Rewriter::new(module, converter);

    for iteration in 1..=options.max_iterations {
        let before = rw.rewrites();
        sweep(&mut rw, patterns)?;
        let rewritten = rw.rewrites() - before;
        tracing::debug!(iteration, rewritten, "conversion sweep");
        if rewritten == 0 && first_illegal(&rw, patterns).is_none() {
            return Ok(ConversionStats {
                iterations: iteration,
                rewrites: rw.rewrites(),
            });
        }
    }

    match first_illegal(&rw, patterns) {
        None => Ok(ConversionStats {
            iterations: options.max_iterations,
            rewrites: rw.rewrites(),
        }),
        Some(op) => Err(rw.fail(
            op,
            FailureReason::NoFixedPoint {
                iterations: options.max_iterations,
            },
        )),
    }
}

fn sweep(rw: &mut Rewriter<'_>, patterns: &PatternSet) -> ConversionResult<()> {
    for op in rw.module().walk() {
        // Replaced earlier in this sweep.
        if rw.module().op(op).parent.is_none() {
            continue;
        }
        let kind = rw.module().op(op).kind;
        if let Some(pattern) = patterns.find(kind) {
            if !pattern.is_legal(rw, op) {
                tracing::trace!(%op, kind = kind.name(), pattern = pattern.name(), "rewriting");
                pattern.rewrite(rw, op)?;
            }
        } else if !rw.signature_legal(op) {
            return Err(no_pattern(rw, op));
        }
    }
    Ok(())
}

fn first_illegal(rw: &Rewriter<'_>, patterns: &PatternSet) -> Option<OpId> {
    rw.module().walk().into_iter().find(|&op| {
        match patterns.find(rw.module().op(op).kind) {
            Some(pattern) => !pattern.is_legal(rw, op),
            None => !rw.signature_legal(op),
        }
    })
}

fn no_pattern(rw: &Rewriter<'_>, op: OpId) -> ConversionFailure {
    rw.fail(op, FailureReason::NoPattern)
}
