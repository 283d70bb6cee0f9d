//! Atomic constructs.
//!
//! Every atomic operation carries a `memory_order` and a `hint` attribute,
//! both `none` when no clause sets them. The memory order is taken from the
//! clauses before the atomic-kind keyword, then overridden by the clauses
//! after it.

use omp_ir::{names, Attribute, IrType, MemoryOrder, OpKind, Span, SyncHint, ValueId};

use crate::context::Lowerer;
use crate::directive::{AtomicConstruct, AtomicForm, Clause, ClauseNode, Directive};
use crate::error::{LowerError, LowerResult};
use crate::host::HostLowering;
use crate::symbol::SymbolTable;

/// Memory order written across the two clause lists; the later list wins.
pub fn resolve_memory_order(left: &[ClauseNode], right: &[ClauseNode]) -> MemoryOrder {
    left.iter()
        .chain(right)
        .filter_map(|node| match node.clause {
            Clause::MemoryOrder(order) => Some(order),
            _ => None,
        })
        .next_back()
        .unwrap_or_default()
}

impl<H: HostLowering + ?Sized, S: SymbolTable + ?Sized> Lowerer<'_, H, S> {
    pub(crate) fn lower_atomic(
        &mut self,
        atomic: &AtomicConstruct,
        dir: &Directive,
    ) -> LowerResult<()> {
        let span = dir.span;
        let order = resolve_memory_order(&dir.clauses, &dir.end_clauses);
        let hint_clause = dir
            .all_clauses()
            .find(|node| matches!(node.clause, Clause::Hint(_)))
            .map(|node| &node.clause);
        let hint = self.sync_hint(hint_clause, span)?;

        match atomic.form {
            AtomicForm::Read => self.lower_atomic_read(atomic, order, hint, span),
            AtomicForm::Write => self.lower_atomic_write(atomic, order, hint, span),
            AtomicForm::Update | AtomicForm::Bare => {
                self.lower_atomic_update(atomic, order, hint, span)
            }
            AtomicForm::Capture => {
                Err(LowerError::unsupported("atomic capture", "construct", span))
            }
        }
    }

    fn element_type(&self, addr: ValueId, span: Span) -> LowerResult<IrType> {
        self.cx
            .builder
            .value_type(addr)
            .element_type()
            .cloned()
            .ok_or_else(|| LowerError::invariant("atomic operand is not an address", span))
    }

    fn lower_atomic_read(
        &mut self,
        atomic: &AtomicConstruct,
        order: MemoryOrder,
        hint: SyncHint,
        span: Span,
    ) -> LowerResult<()> {
        let to = self.address(atomic.target)?;
        let from = self.address(atomic.value)?;
        let elem = self.element_type(from, span)?;
        self.cx
            .builder
            .build(OpKind::AtomicRead)
            .operands([from, to])
            .attr(names::ELEMENT_TYPE, Attribute::Type(elem))
            .attr(names::MEMORY_ORDER, Attribute::MemoryOrder(order))
            .attr(names::HINT, Attribute::SyncHint(hint))
            .finish();
        Ok(())
    }

    fn lower_atomic_write(
        &mut self,
        atomic: &AtomicConstruct,
        order: MemoryOrder,
        hint: SyncHint,
        span: Span,
    ) -> LowerResult<()> {
        let addr = self.address(atomic.target)?;
        let elem = self.element_type(addr, span)?;
        let value = self.value(atomic.value)?;
        let value = self.cx.builder.convert(&elem, value);
        self.cx
            .builder
            .build(OpKind::AtomicWrite)
            .operands([addr, value])
            .attr(names::MEMORY_ORDER, Attribute::MemoryOrder(order))
            .attr(names::HINT, Attribute::SyncHint(hint))
            .finish();
        Ok(())
    }

    /// One region taking the prior value; the target symbol stands for it
    /// while the right-hand side is lowered, and the new value is yielded.
    fn lower_atomic_update(
        &mut self,
        atomic: &AtomicConstruct,
        order: MemoryOrder,
        hint: SyncHint,
        span: Span,
    ) -> LowerResult<()> {
        let target = atomic
            .target_symbol
            .ok_or_else(|| LowerError::invariant("atomic update without a target symbol", span))?;
        let addr = self.address(atomic.target)?;
        let elem = self.element_type(addr, span)?;
        let op = self
            .cx
            .builder
            .build(OpKind::AtomicUpdate)
            .operand(addr)
            .attr(names::MEMORY_ORDER, Attribute::MemoryOrder(order))
            .attr(names::HINT, Attribute::SyncHint(hint))
            .regions(1)
            .finish();

        let region = self.cx.builder.module().op(op).regions[0];
        let block = self.cx.builder.create_block(region, std::slice::from_ref(&elem));
        let prior = self.cx.builder.module().block(block).args[0];
        self.cx.bindings.bind(target, prior);
        let updated = self.value(atomic.value)?;
        let updated = self.cx.builder.convert(&elem, updated);
        self.cx.builder.terminate(OpKind::Yield, &[updated]);
        Ok(())
    }
}
