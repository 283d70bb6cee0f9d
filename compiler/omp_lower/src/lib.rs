//! Lowering of parallel-programming constructs into region-structured IR.
//!
//! This crate provides:
//!
//! - **Directive model** ([`Directive`], [`Clause`], [`Evaluation`]): the
//!   front end's description of one construct: kind, ordered clause lists,
//!   and nested body.
//!
//! - **Classification** ([`ClauseBuckets`], [`clause_support`]): a
//!   construct × clause capability table checked before any IR exists.
//!
//! - **Construct lowering** ([`lower_construct`]): one handler per
//!   construct variant, emitting `omp.*` operations at the builder's
//!   insertion point: data sharing, reductions, loops and schedules,
//!   atomics, threadprivate storage.
//!
//! # Design
//!
//! Lowering is a single depth-first pass. The [`LoweringContext`] owns the
//! builder, the symbol bindings, and the module-wide registries (reduction
//! declarations, named critical sections). Expression and statement code
//! generation stays with the front end behind [`HostLowering`]; symbol
//! metadata stays behind [`SymbolTable`].
//!
//! A construct either lowers completely or not at all: a failing construct
//! is rolled back to the module state it started from.
//!
//! # Crate Dependencies
//!
//! `omp_lower` depends only on `omp_ir`. Conversion to the target dialect
//! lives in `omp_convert`.

mod atomic;
mod bindings;
mod block;
mod capability;
mod classify;
mod construct;
mod context;
mod data_sharing;
mod directive;
mod error;
mod host;
mod loops;
mod options;
mod reduction;
mod region;
mod sections;
mod symbol;
mod threadprivate;

#[cfg(test)]
mod test_helpers;

pub use atomic::resolve_memory_order;
pub use bindings::SymbolBindings;
pub use capability::{clause_support, ConstructClass, Support};
pub use classify::{ClauseBuckets, ClauseGroup};
pub use construct::map_bits;
pub use context::LoweringContext;
pub use data_sharing::{direct_uses, SharingClass, SharingPlan};
pub use directive::{
    AllocateClause, AtomicConstruct, AtomicForm, BlockKind, Clause, ClauseKind, ClauseNode,
    ConstructKind, CountedLoop, DefaultKind, DeviceModifier, Directive, EvalId, EvalKind,
    Evaluation, ExprRef, IntrinsicOperator, LinearClause, LoopBounds, LoopKind, MapClause,
    MapType, ReductionOperator, ScheduleClause, StandaloneKind, StmtRef,
};
pub use error::{Diagnostic, LowerError, LowerResult, Severity};
pub use host::{HostLowering, LowerEnv};
pub use loops::{induction_type, resolve_schedule, InductionType, ScheduleResolution};
pub use options::{LowerOptions, NarrowingPolicy};
pub use reduction::{ElementClass, ReductionDecl, ReductionKey, ReductionKind, ReductionRegistry};
pub use symbol::{SymbolArena, SymbolFlags, SymbolId, SymbolInfo, SymbolKind, SymbolTable};

use context::Lowerer;

/// Lower one top-level construct at the context's insertion point.
///
/// On error every operation, block, registry entry, and diagnostic the
/// construct produced is discarded, and the insertion point is where it
/// was before the call.
pub fn lower_construct<H, S>(
    cx: &mut LoweringContext,
    host: &mut H,
    symbols: &S,
    dir: &Directive,
) -> LowerResult<()>
where
    H: HostLowering + ?Sized,
    S: SymbolTable + ?Sized,
{
    let snapshot = cx.snapshot();
    let result = Lowerer::new(cx, host, symbols).lower_construct(dir);
    if let Err(err) = &result {
        tracing::debug!(%err, "construct rolled back");
        cx.restore(snapshot);
    }
    result
}

/// Lower every construct of a translation unit in order, stopping at the
/// first failure.
pub fn lower_translation_unit<H, S>(
    cx: &mut LoweringContext,
    host: &mut H,
    symbols: &S,
    directives: &[Directive],
) -> LowerResult<()>
where
    H: HostLowering + ?Sized,
    S: SymbolTable + ?Sized,
{
    let _span =
        tracing::debug_span!("lower_translation_unit", constructs = directives.len()).entered();
    for dir in directives {
        lower_construct(cx, host, symbols, dir)?;
    }
    Ok(())
}
