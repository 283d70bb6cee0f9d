//! Threadprivate storage.
//!
//! A threadprivate variable is bound, at module scope, to the result of an
//! `omp.threadprivate` operation over its global storage. Entering a
//! parallel region re-issues that operation once per symbol so the region
//! sees the executing thread's copy.
//!
//! Common blocks are handled as a unit: the block gets one handle and every
//! member address is the block handle plus the member's byte offset.

use omp_ir::{names, Attribute, IrBuilder, IrType, OpKind, Span, ValueId};
use rustc_hash::FxHashSet;

use crate::bindings::SymbolBindings;
use crate::classify::ClauseBuckets;
use crate::context::{Lowerer, LoweringContext};
use crate::directive::{Clause, ClauseKind, Evaluation};
use crate::error::{LowerError, LowerResult};
use crate::host::HostLowering;
use crate::symbol::{SymbolFlags, SymbolId, SymbolInfo, SymbolKind, SymbolTable};

/// One validated `copyin` object.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CopyinObject {
    pub symbol: SymbolId,
    pub host: SymbolId,
}

/// Every threadprivate symbol referenced anywhere under `evals`, including
/// nested constructs.
fn threadprivate_uses<S: SymbolTable + ?Sized>(
    evals: &[Evaluation],
    symbols: &S,
    out: &mut Vec<SymbolId>,
) {
    for eval in evals {
        for &sym in &eval.uses {
            if symbols
                .get(sym)
                .is_some_and(|info| info.has(SymbolFlags::THREADPRIVATE))
            {
                out.push(sym);
            }
        }
        threadprivate_uses(eval.children(), symbols, out);
    }
}

/// Address of a common-block member, `offset` bytes into `handle`. The
/// member must fit inside the `block` it is declared in.
fn member_address(
    builder: &mut IrBuilder,
    handle: ValueId,
    block: &SymbolInfo,
    member: &SymbolInfo,
    span: Span,
) -> LowerResult<ValueId> {
    let end = member.offset.checked_add(member.size);
    if end.is_none_or(|end| end > block.size) {
        return Err(LowerError::invariant(
            format!("{} lies outside common block {}", member.name, block.name),
            span,
        ));
    }
    let offset = i64::try_from(member.offset).map_err(|_| {
        LowerError::invariant(format!("offset of {} out of range", member.name), span)
    })?;
    let bytes = builder.convert(&IrType::reference(IrType::seq(IrType::I8)), handle);
    let index = builder.const_int(IrType::Index, offset);
    let coord = builder
        .build(OpKind::CoordinateOf)
        .operands([bytes, index])
        .result(IrType::reference(IrType::I8))
        .finish();
    let coord = builder.result(coord);
    Ok(builder.convert(&IrType::reference(member.ty.clone()), coord))
}

/// Whether `value` is the result of an `omp.threadprivate`.
fn is_handle(builder: &IrBuilder, value: ValueId) -> bool {
    builder
        .module()
        .defining_op(value)
        .is_some_and(|op| builder.module().op(op).kind == OpKind::Threadprivate)
}

/// Re-issue the threadprivate operation behind `handle`.
fn reissue(
    builder: &mut IrBuilder,
    handle: ValueId,
    name: &str,
    span: Span,
) -> LowerResult<ValueId> {
    let not_bound =
        || LowerError::invariant(format!("{name} is not bound to threadprivate storage"), span);
    let op = builder.module().defining_op(handle).ok_or_else(not_bound)?;
    let op = builder.module().op(op);
    if op.kind != OpKind::Threadprivate {
        return Err(not_bound());
    }
    let storage = op.operands[0];
    let ty = builder.value_type(handle).clone();
    let tp = builder
        .build(OpKind::Threadprivate)
        .operand(storage)
        .result(ty)
        .finish();
    Ok(builder.result(tp))
}

fn threadprivate_op(builder: &mut IrBuilder, storage: ValueId) -> ValueId {
    let ty = builder.value_type(storage).clone();
    let op = builder
        .build(OpKind::Threadprivate)
        .operand(storage)
        .result(ty)
        .finish();
    builder.result(op)
}

impl<H: HostLowering + ?Sized, S: SymbolTable + ?Sized> Lowerer<'_, H, S> {
    /// Check `copyin` objects before any IR is emitted.
    pub(crate) fn copyin_objects(
        &self,
        buckets: &ClauseBuckets<'_>,
    ) -> LowerResult<Vec<CopyinObject>> {
        let construct = buckets.construct().name();
        let mut out = Vec::new();
        for node in buckets.iter(ClauseKind::Copyin) {
            let Clause::Copyin(objects) = &node.clause else {
                continue;
            };
            for &symbol in objects {
                let info = self.symbol(symbol, node.span)?;
                if info.kind == SymbolKind::CommonBlock {
                    return Err(LowerError::unsupported(
                        construct,
                        format!("copyin of common block {}", info.name),
                        node.span,
                    ));
                }
                if info.has(SymbolFlags::ALLOCATABLE | SymbolFlags::POINTER) {
                    return Err(LowerError::unsupported(
                        construct,
                        format!("copyin of allocatable or pointer {}", info.name),
                        node.span,
                    ));
                }
                let host = info
                    .host
                    .filter(|_| info.has(SymbolFlags::HOST_ASSOCIATED))
                    .ok_or_else(|| {
                        LowerError::invariant(
                            format!("copyin object {} is not host-associated", info.name),
                            node.span,
                        )
                    })?;
                out.push(CopyinObject { symbol, host });
            }
        }
        Ok(out)
    }

    /// Bind every threadprivate symbol used under `body`, plus the `copyin`
    /// objects, to this thread's copy.
    pub(crate) fn threadprivatize(
        &mut self,
        body: &[Evaluation],
        copyin: &[CopyinObject],
        span: Span,
    ) -> LowerResult<()> {
        let mut used = Vec::new();
        threadprivate_uses(body, self.symbols, &mut used);
        used.extend(copyin.iter().map(|c| c.symbol));

        let mut seen = FxHashSet::default();
        for sym in used {
            if !seen.insert(self.symbols.ultimate(sym)) {
                continue;
            }
            let info = self.symbol(sym, span)?;
            match self.symbols.common_block_of(sym) {
                Some(block) if info.kind == SymbolKind::Variable => {
                    let handle = self.block_handle(block, span)?;
                    let block_info = self.symbol(block, span)?;
                    let addr =
                        member_address(&mut self.cx.builder, handle, block_info, info, span)?;
                    self.cx.bindings.bind(sym, addr);
                }
                _ if info.kind == SymbolKind::CommonBlock => {
                    self.block_handle(sym, span)?;
                }
                _ => {
                    if self.cx.bindings.is_bound_here(sym) {
                        continue;
                    }
                    let outer = self.symbol_address(sym, span)?;
                    let handle = reissue(&mut self.cx.builder, outer, &info.name, span)?;
                    self.cx.bindings.bind(sym, handle);
                }
            }
            tracing::trace!(symbol = %info.name, "threadprivatized");
        }
        Ok(())
    }

    /// This construct's handle for common block `block`, created once.
    fn block_handle(&mut self, block: SymbolId, span: Span) -> LowerResult<ValueId> {
        let outer = self.symbol_address(block, span)?;
        if self.cx.bindings.is_bound_here(block) {
            return Ok(outer);
        }
        let name = &self.symbol(block, span)?.name;
        let handle = reissue(&mut self.cx.builder, outer, name, span)?;
        self.cx.bindings.bind(block, handle);
        Ok(handle)
    }

    /// Copy the originating thread's values into this thread's copies,
    /// then synchronize once.
    pub(crate) fn copyin(&mut self, objects: &[CopyinObject], span: Span) -> LowerResult<()> {
        if objects.is_empty() {
            return Ok(());
        }
        for object in objects {
            let source = self.symbol_address(object.host, span)?;
            let dest = self.symbol_address(object.symbol, span)?;
            let value = self.cx.builder.load(source);
            self.cx.builder.store(value, dest);
        }
        self.cx.builder.build(OpKind::Barrier).finish();
        Ok(())
    }
}

// ── Declarations ────────────────────────────────────────────────────

impl LoweringContext {
    /// Lower a `threadprivate` declaration of `symbol` at the insertion
    /// point, outside any construct.
    pub fn declare_threadprivate<S: SymbolTable + ?Sized>(
        &mut self,
        symbols: &S,
        symbol: SymbolId,
        span: Span,
    ) -> LowerResult<()> {
        let info = symbols
            .get(symbol)
            .ok_or_else(|| {
                LowerError::invariant(format!("missing symbol {}", symbol.raw()), span)
            })?;
        self.builder.set_location(span);

        if let Some(block) = symbols.common_block_of(symbol) {
            let block_info = symbols
                .get(block)
                .ok_or_else(|| {
                    LowerError::invariant(format!("missing symbol {}", block.raw()), span)
                })?;
            let storage = bound(&self.bindings, block, &block_info.name, span)?;
            let handle = if is_handle(&self.builder, storage) {
                storage
            } else {
                let handle = threadprivate_op(&mut self.builder, storage);
                self.bindings.bind(block, handle);
                handle
            };
            let addr = member_address(&mut self.builder, handle, block_info, info, span)?;
            self.bindings.bind(symbol, addr);
            return Ok(());
        }

        let storage = if info.has(SymbolFlags::GLOBAL) {
            let storage = bound(&self.bindings, symbol, &info.name, span)?;
            if is_handle(&self.builder, storage) {
                return Ok(());
            }
            storage
        } else {
            self.internal_global(info)
        };
        let handle = threadprivate_op(&mut self.builder, storage);
        self.bindings.bind(symbol, handle);
        tracing::debug!(symbol = %info.name, "declared threadprivate");
        Ok(())
    }

    /// Give a local variable internal-linkage global storage and return
    /// its address.
    fn internal_global(&mut self, info: &SymbolInfo) -> ValueId {
        let ty = info.ty.clone();
        if self
            .builder
            .module()
            .lookup_symbol(OpKind::Global, &info.name)
            .is_none()
        {
            let mut b = self.builder.guard();
            let body = b.module().body();
            b.position_at_end(body);
            let global = b
                .build(OpKind::Global)
                .attr(names::SYM_NAME, Attribute::SymbolRef(info.name.clone()))
                .attr(names::TYPE, Attribute::Type(ty.clone()))
                .attr(names::LINKAGE, Attribute::Str("internal".to_owned()))
                .regions(1)
                .finish();
            let region = b.module().op(global).regions[0];
            b.create_block(region, &[]);
            let init_kind = if info.has(SymbolFlags::ALLOCATABLE | SymbolFlags::POINTER) {
                OpKind::ZeroBits
            } else {
                OpKind::Undef
            };
            let init = b.build(init_kind).result(ty.clone()).finish();
            let init = b.result(init);
            b.terminate(OpKind::HasValue, &[init]);
        }
        let addr = self
            .builder
            .build(OpKind::AddrOf)
            .attr(names::SYM_NAME, Attribute::SymbolRef(info.name.clone()))
            .result(IrType::reference(ty))
            .finish();
        self.builder.result(addr)
    }
}

fn bound(
    bindings: &SymbolBindings,
    symbol: SymbolId,
    name: &str,
    span: Span,
) -> LowerResult<ValueId> {
    bindings
        .lookup(symbol)
        .ok_or_else(|| LowerError::invariant(format!("missing binding for symbol {name}"), span))
}
