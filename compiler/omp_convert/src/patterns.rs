//! Conversion patterns.
//!
//! Each pattern claims a set of operation kinds, decides whether one of
//! its operations is already legal, and rewrites it when it is not. The
//! standard set covers every kind the lowering engine emits:
//!
//! - **region**: parallel, master, critical, single, sections, section,
//!   ordered region, task, taskgroup, wsloop, simdloop, atomic update,
//!   reduction declare
//! - **var operand**: atomic read/write, flush, threadprivate
//! - **reduction**: reduction
//! - **operand**: target data/enter/exit, yield
//! - **always legal**: terminator, barrier, taskwait, taskyield, critical
//!   declare
//! - **host**: every host operation

use omp_ir::{Dialect, IrType, OpId, OpKind};

use crate::error::{ConversionResult, FailureReason};
use crate::rewriter::Rewriter;

/// One rewrite rule of the conversion pass.
pub trait ConversionPattern {
    fn name(&self) -> &'static str;

    /// Whether this pattern is responsible for operations of `kind`.
    fn matches(&self, kind: OpKind) -> bool;

    fn is_legal(&self, rw: &Rewriter<'_>, op: OpId) -> bool;

    /// Replace `op` with a legal equivalent.
    fn rewrite(&self, rw: &mut Rewriter<'_>, op: OpId) -> ConversionResult<()>;
}

/// Ordered pattern list; the first pattern matching a kind owns it.
#[derive(Default)]
pub struct PatternSet {
    patterns: Vec<Box<dyn ConversionPattern>>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The patterns for every operation the lowering engine produces.
    pub fn standard() -> Self {
        Self::new()
            .with(RegionOpPattern)
            .with(VarOperandPattern)
            .with(ReductionPattern)
            .with(OperandPattern)
            .with(AlwaysLegalPattern)
            .with(HostPattern)
    }

    #[must_use]
    pub fn with(mut self, pattern: impl ConversionPattern + 'static) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    pub fn find(&self, kind: OpKind) -> Option<&dyn ConversionPattern> {
        self.patterns
            .iter()
            .find(|pattern| pattern.matches(kind))
            .map(Box::as_ref)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

// ── Region operations ───────────────────────────────────────────────

const REGION_OPS: &[OpKind] = &[
    OpKind::Parallel,
    OpKind::Master,
    OpKind::Critical,
    OpKind::Single,
    OpKind::Sections,
    OpKind::Section,
    OpKind::Ordered,
    OpKind::Task,
    OpKind::Taskgroup,
    OpKind::WsLoop,
    OpKind::SimdLoop,
    OpKind::AtomicUpdate,
    OpKind::ReductionDeclare,
];

/// Re-emits a region operation with converted block arguments; the
/// regions move to the replacement unchanged.
pub struct RegionOpPattern;

impl ConversionPattern for RegionOpPattern {
    fn name(&self) -> &'static str {
        "region"
    }

    fn matches(&self, kind: OpKind) -> bool {
        REGION_OPS.contains(&kind)
    }

    fn is_legal(&self, rw: &Rewriter<'_>, op: OpId) -> bool {
        rw.signature_legal(op)
    }

    fn rewrite(&self, rw: &mut Rewriter<'_>, op: OpId) -> ConversionResult<()> {
        let operands = rw.legal_operands(op)?;
        let attrs = rw.module().op(op).attrs.clone();
        rw.replace_op(op, operands, attrs)?;
        Ok(())
    }
}

// ── Variable-operand operations ─────────────────────────────────────

const VAR_OPERAND_OPS: &[OpKind] = &[
    OpKind::AtomicRead,
    OpKind::AtomicWrite,
    OpKind::Flush,
    OpKind::Threadprivate,
];

/// First operand whose source type is a memory reference descriptor.
fn memref_operand(rw: &Rewriter<'_>, op: OpId) -> Option<(usize, IrType)> {
    rw.module()
        .op(op)
        .operands
        .iter()
        .enumerate()
        .find_map(|(index, &value)| {
            let ty = rw.source_type(value);
            matches!(ty, IrType::MemRef(_)).then(|| (index, ty.clone()))
        })
}

/// Region-free operations over variable addresses. Attributes are kept
/// verbatim; a memory-reference operand is refused.
fn rewrite_var_operands(rw: &mut Rewriter<'_>, op: OpId) -> ConversionResult<()> {
    if let Some((index, ty)) = memref_operand(rw, op) {
        return Err(rw.fail(op, FailureReason::IllegalOperand { index, ty }));
    }
    let operands = rw.legal_operands(op)?;
    let attrs = rw.module().op(op).attrs.clone();
    rw.replace_op(op, operands, attrs)?;
    Ok(())
}

pub struct VarOperandPattern;

impl ConversionPattern for VarOperandPattern {
    fn name(&self) -> &'static str {
        "var operand"
    }

    fn matches(&self, kind: OpKind) -> bool {
        VAR_OPERAND_OPS.contains(&kind)
    }

    fn is_legal(&self, rw: &Rewriter<'_>, op: OpId) -> bool {
        rw.operands_legal(op) && rw.results_legal(op) && memref_operand(rw, op).is_none()
    }

    fn rewrite(&self, rw: &mut Rewriter<'_>, op: OpId) -> ConversionResult<()> {
        rewrite_var_operands(rw, op)
    }
}

/// `omp.reduction`; a memory-reference accumulator is refused.
pub struct ReductionPattern;

impl ConversionPattern for ReductionPattern {
    fn name(&self) -> &'static str {
        "reduction"
    }

    fn matches(&self, kind: OpKind) -> bool {
        kind == OpKind::Reduction
    }

    fn is_legal(&self, rw: &Rewriter<'_>, op: OpId) -> bool {
        rw.operands_legal(op) && memref_operand(rw, op).is_none()
    }

    fn rewrite(&self, rw: &mut Rewriter<'_>, op: OpId) -> ConversionResult<()> {
        rewrite_var_operands(rw, op)
    }
}

// ── Operand replacement ─────────────────────────────────────────────

const OPERAND_OPS: &[OpKind] = &[
    OpKind::TargetData,
    OpKind::TargetEnterData,
    OpKind::TargetExitData,
    OpKind::Yield,
];

/// Replaces every operand with its converted counterpart.
pub struct OperandPattern;

impl ConversionPattern for OperandPattern {
    fn name(&self) -> &'static str {
        "operand"
    }

    fn matches(&self, kind: OpKind) -> bool {
        OPERAND_OPS.contains(&kind)
    }

    fn is_legal(&self, rw: &Rewriter<'_>, op: OpId) -> bool {
        rw.operands_legal(op)
    }

    fn rewrite(&self, rw: &mut Rewriter<'_>, op: OpId) -> ConversionResult<()> {
        let operands = rw.legal_operands(op)?;
        let attrs = rw.module().op(op).attrs.clone();
        rw.replace_op(op, operands, attrs)?;
        Ok(())
    }
}

const ALWAYS_LEGAL_OPS: &[OpKind] = &[
    OpKind::Terminator,
    OpKind::Barrier,
    OpKind::Taskwait,
    OpKind::Taskyield,
    OpKind::CriticalDeclare,
];

pub struct AlwaysLegalPattern;

impl ConversionPattern for AlwaysLegalPattern {
    fn name(&self) -> &'static str {
        "always legal"
    }

    fn matches(&self, kind: OpKind) -> bool {
        ALWAYS_LEGAL_OPS.contains(&kind)
    }

    fn is_legal(&self, _rw: &Rewriter<'_>, _op: OpId) -> bool {
        true
    }

    fn rewrite(&self, _rw: &mut Rewriter<'_>, _op: OpId) -> ConversionResult<()> {
        Ok(())
    }
}

// ── Host operations ─────────────────────────────────────────────────

/// Generic type rewriting for host operations: results, block arguments,
/// and type attributes are converted.
pub struct HostPattern;

impl ConversionPattern for HostPattern {
    fn name(&self) -> &'static str {
        "host"
    }

    fn matches(&self, kind: OpKind) -> bool {
        kind.dialect() == Dialect::Host
    }

    fn is_legal(&self, rw: &Rewriter<'_>, op: OpId) -> bool {
        rw.signature_legal(op) && rw.type_attrs_legal(op)
    }

    fn rewrite(&self, rw: &mut Rewriter<'_>, op: OpId) -> ConversionResult<()> {
        let operands = rw.legal_operands(op)?;
        let attrs = rw.convert_attrs(op, &rw.module().op(op).attrs)?;
        rw.replace_op(op, operands, attrs)?;
        Ok(())
    }
}
