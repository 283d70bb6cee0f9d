//! Insertion-point builder over an [`IrModule`].
//!
//! Follows the "position, then emit" pattern: the builder keeps an
//! [`InsertPoint`] and every created operation is linked there. Sequential
//! creations at the same insertion point appear in creation order.
//!
//! Nested constructs save and restore the insertion point with
//! [`IrBuilder::guard`]; the returned [`InsertionGuard`] puts the saved
//! point back when dropped, so early returns cannot leak a stale position.

use std::ops::{Deref, DerefMut};

use smallvec::SmallVec;

use crate::attr::{names, Attribute, CmpPredicate};
use crate::id::{BlockId, OpId, RegionId, ValueId};
use crate::module::{IrModule, OpState};
use crate::op::OpKind;
use crate::span::Span;
use crate::types::IrType;

/// Position at which the next operation is inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertPoint {
    pub block: BlockId,
    /// Insert before this operation; `None` appends to the block.
    pub before: Option<OpId>,
}

impl InsertPoint {
    #[inline]
    pub fn end(block: BlockId) -> Self {
        Self {
            block,
            before: None,
        }
    }

    #[inline]
    pub fn before(block: BlockId, op: OpId) -> Self {
        Self {
            block,
            before: Some(op),
        }
    }
}

/// Builder owning the module under construction.
pub struct IrBuilder {
    module: IrModule,
    ip: InsertPoint,
    span: Span,
}

impl Default for IrBuilder {
    fn default() -> Self {
        Self::new(IrModule::new())
    }
}

impl IrBuilder {
    /// Create a builder positioned at the end of the module body.
    pub fn new(module: IrModule) -> Self {
        let ip = InsertPoint::end(module.body());
        Self {
            module,
            ip,
            span: Span::DUMMY,
        }
    }

    #[inline]
    pub fn module(&self) -> &IrModule {
        &self.module
    }

    #[inline]
    pub fn module_mut(&mut self) -> &mut IrModule {
        &mut self.module
    }

    pub fn into_module(self) -> IrModule {
        self.module
    }

    // ── Positioning ─────────────────────────────────────────────────

    #[inline]
    pub fn insertion_point(&self) -> InsertPoint {
        self.ip
    }

    #[inline]
    pub fn set_insertion_point(&mut self, ip: InsertPoint) {
        self.ip = ip;
    }

    #[inline]
    pub fn current_block(&self) -> BlockId {
        self.ip.block
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.ip = InsertPoint::end(block);
    }

    pub fn position_at_start(&mut self, block: BlockId) {
        self.ip = InsertPoint {
            block,
            before: self.module.block(block).ops.first().copied(),
        };
    }

    /// Position before `op`. A detached `op` leaves the position unchanged.
    pub fn position_before(&mut self, op: OpId) {
        if let Some(block) = self.module.op(op).parent {
            self.ip = InsertPoint::before(block, op);
        }
    }

    /// Position immediately after `op`.
    pub fn position_after(&mut self, op: OpId) {
        if let Some(block) = self.module.op(op).parent {
            let ops = &self.module.block(block).ops;
            let next = ops
                .iter()
                .position(|&o| o == op)
                .and_then(|pos| ops.get(pos + 1).copied());
            self.ip = InsertPoint { block, before: next };
        }
    }

    /// Save the insertion point; it is restored when the guard drops.
    pub fn guard(&mut self) -> InsertionGuard<'_> {
        let saved = self.ip;
        InsertionGuard {
            builder: self,
            saved,
        }
    }

    /// Source location stamped on newly created operations.
    #[inline]
    pub fn location(&self) -> Span {
        self.span
    }

    #[inline]
    pub fn set_location(&mut self, span: Span) {
        self.span = span;
    }

    // ── Blocks ──────────────────────────────────────────────────────

    /// Append a block to `region` without moving the insertion point.
    pub fn append_block(&mut self, region: RegionId, arg_types: &[IrType]) -> BlockId {
        self.module.append_block(region, arg_types)
    }

    /// Append a block to `region` and position at its end.
    pub fn create_block(&mut self, region: RegionId, arg_types: &[IrType]) -> BlockId {
        let block = self.module.append_block(region, arg_types);
        self.position_at_end(block);
        block
    }

    /// Whether the block ends in a terminator.
    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.module
            .block(block)
            .last_op()
            .is_some_and(|op| self.module.op(op).kind.is_terminator())
    }

    // ── Operations ──────────────────────────────────────────────────

    /// Start building an operation of `kind` at the insertion point.
    pub fn build(&mut self, kind: OpKind) -> OpBuilder<'_> {
        let span = self.span;
        OpBuilder {
            builder: self,
            state: OpState::new(kind, span),
        }
    }

    /// Link an already-created operation at the insertion point.
    pub fn insert(&mut self, op: OpId) {
        self.module.insert_op(self.ip.block, self.ip.before, op);
    }

    /// First result of `op`.
    ///
    /// # Panics
    /// Panics if `op` has no results; callers only use it on
    /// value-producing operations they just built.
    pub fn result(&self, op: OpId) -> ValueId {
        self.module.op(op).results[0]
    }

    #[inline]
    pub fn value_type(&self, value: ValueId) -> &IrType {
        self.module.value_type(value)
    }

    // ── Host operation helpers ──────────────────────────────────────

    pub fn const_int(&mut self, ty: IrType, value: i64) -> ValueId {
        let op = self
            .build(OpKind::Constant)
            .attr(names::VALUE, Attribute::Int(value))
            .result(ty)
            .finish();
        self.result(op)
    }

    pub fn const_float(&mut self, ty: IrType, value: f64) -> ValueId {
        let op = self
            .build(OpKind::Constant)
            .attr(names::VALUE, Attribute::float(value))
            .result(ty)
            .finish();
        self.result(op)
    }

    /// Convert `value` to `ty`; returns `value` itself when types match.
    pub fn convert(&mut self, ty: &IrType, value: ValueId) -> ValueId {
        if self.value_type(value) == ty {
            return value;
        }
        let op = self
            .build(OpKind::Convert)
            .operand(value)
            .result(ty.clone())
            .finish();
        self.result(op)
    }

    /// Stack storage for one `ty`; returns a reference to it.
    pub fn alloca(&mut self, ty: IrType, uniq_name: Option<&str>) -> ValueId {
        let mut b = self
            .build(OpKind::Alloca)
            .attr(names::IN_TYPE, Attribute::Type(ty.clone()));
        if let Some(name) = uniq_name {
            b = b.attr(names::UNIQ_NAME, Attribute::Str(name.to_owned()));
        }
        let op = b.result(IrType::reference(ty)).finish();
        self.result(op)
    }

    /// Load through `addr`. The result type is the referenced element.
    pub fn load(&mut self, addr: ValueId) -> ValueId {
        let ty = self
            .value_type(addr)
            .element_type()
            .cloned()
            .unwrap_or_else(|| self.value_type(addr).clone());
        let op = self.build(OpKind::Load).operand(addr).result(ty).finish();
        self.result(op)
    }

    pub fn store(&mut self, value: ValueId, addr: ValueId) -> OpId {
        self.build(OpKind::Store).operands([value, addr]).finish()
    }

    pub fn cmpi(&mut self, predicate: CmpPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        let op = self
            .build(OpKind::CmpI)
            .attr(names::PREDICATE, Attribute::Predicate(predicate))
            .operands([lhs, rhs])
            .result(IrType::I1)
            .finish();
        self.result(op)
    }

    /// Binary arithmetic whose result has the type of `lhs`.
    pub fn binary(&mut self, kind: OpKind, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = self.value_type(lhs).clone();
        let op = self.build(kind).operands([lhs, rhs]).result(ty).finish();
        self.result(op)
    }

    /// Build a terminator of `kind` carrying `operands`.
    pub fn terminate(&mut self, kind: OpKind, operands: &[ValueId]) -> OpId {
        debug_assert!(kind.is_terminator(), "{} is not a terminator", kind.name());
        self.build(kind).operands(operands.iter().copied()).finish()
    }
}

// ── Insertion guard ─────────────────────────────────────────────────

/// Restores the saved insertion point on drop.
pub struct InsertionGuard<'b> {
    builder: &'b mut IrBuilder,
    saved: InsertPoint,
}

impl InsertionGuard<'_> {
    /// The insertion point that will be restored.
    #[inline]
    pub fn saved(&self) -> InsertPoint {
        self.saved
    }
}

impl Deref for InsertionGuard<'_> {
    type Target = IrBuilder;

    fn deref(&self) -> &IrBuilder {
        self.builder
    }
}

impl DerefMut for InsertionGuard<'_> {
    fn deref_mut(&mut self) -> &mut IrBuilder {
        self.builder
    }
}

impl Drop for InsertionGuard<'_> {
    fn drop(&mut self) {
        self.builder.ip = self.saved;
    }
}

// ── Operation builder ───────────────────────────────────────────────

/// Fluent construction of a single operation.
///
/// Nothing touches the module until [`finish`](OpBuilder::finish), which
/// creates the operation and links it at the builder's insertion point.
#[must_use = "an operation is only created by calling finish()"]
pub struct OpBuilder<'b> {
    builder: &'b mut IrBuilder,
    state: OpState,
}

impl OpBuilder<'_> {
    pub fn attr(mut self, name: &'static str, value: Attribute) -> Self {
        self.state.attrs.set(name, value);
        self
    }

    /// Set `name` to a unit attribute when `present`.
    pub fn flag(self, name: &'static str, present: bool) -> Self {
        if present {
            self.attr(name, Attribute::Unit)
        } else {
            self
        }
    }

    pub fn operand(mut self, value: ValueId) -> Self {
        self.state.operands.push(value);
        self
    }

    pub fn operands(mut self, values: impl IntoIterator<Item = ValueId>) -> Self {
        self.state.operands.extend(values);
        self
    }

    /// Append variadic operand groups and record their sizes.
    pub fn operand_groups(mut self, groups: &[&[ValueId]]) -> Self {
        let mut sizes: SmallVec<[u32; 8]> = SmallVec::new();
        for group in groups {
            sizes.push(crate::id::next_index(group.len()));
            self.state.operands.extend_from_slice(group);
        }
        self.state
            .attrs
            .set(names::OPERAND_SEGMENTS, Attribute::Segments(sizes));
        self
    }

    pub fn result(mut self, ty: IrType) -> Self {
        self.state.result_types.push(ty);
        self
    }

    pub fn regions(mut self, count: usize) -> Self {
        self.state.num_regions = count;
        self
    }

    pub fn successor(mut self, block: BlockId) -> Self {
        self.state.successors.push(block);
        self
    }

    pub fn span(mut self, span: Span) -> Self {
        self.state.span = span;
        self
    }

    /// Create the operation and link it at the insertion point.
    pub fn finish(self) -> OpId {
        let op = self.builder.module.create_op(self.state);
        self.builder.insert(op);
        op
    }

    /// Create the operation without linking it anywhere.
    pub fn finish_detached(self) -> OpId {
        self.builder.module.create_op(self.state)
    }
}
