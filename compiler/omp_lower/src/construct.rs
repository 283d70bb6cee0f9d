//! Construct dispatch and the small constructs.
//!
//! [`Lowerer::lower_construct`] is the single entry for every directive,
//! top-level or nested. It classifies the clauses, then runs the handler
//! for the construct variant inside a fresh binding scope, so the caller's
//! insertion point and bindings come back on every exit path.
//!
//! Standalone constructs, `critical`, and the operand helpers shared by the
//! block, loop, and sections handlers live here.

use omp_ir::{names, Attribute, IrType, MapBits, OpKind, Span, SyncHint, ValueId};

use crate::capability::ConstructClass;
use crate::classify::ClauseBuckets;
use crate::context::Lowerer;
use crate::directive::{
    Clause, ClauseKind, ConstructKind, DefaultKind, Directive, ExprRef, MapClause, MapType,
    StandaloneKind,
};
use crate::error::{LowerError, LowerResult};
use crate::host::HostLowering;
use crate::symbol::{SymbolId, SymbolTable};

/// Map operands and their `map_types` bits, one entry per object.
#[derive(Debug, Default)]
pub(crate) struct MapOperands {
    pub addrs: Vec<ValueId>,
    pub bits: Vec<Attribute>,
}

/// Allocate operands: one address and one allocator per object.
#[derive(Debug, Default)]
pub(crate) struct AllocateOperands {
    pub vars: Vec<ValueId>,
    pub allocators: Vec<ValueId>,
}

impl<H: HostLowering + ?Sized, S: SymbolTable + ?Sized> Lowerer<'_, H, S> {
    /// Lower one directive at the insertion point.
    pub(crate) fn lower_construct(&mut self, dir: &Directive) -> LowerResult<()> {
        let class = ConstructClass::of(&dir.kind);
        let _span = tracing::debug_span!("lower_construct", construct = class.name()).entered();
        self.cx.builder.set_location(dir.span);

        let buckets = ClauseBuckets::classify(class, dir.all_clauses(), dir.span)?;
        self.scoped(|this| match &dir.kind {
            ConstructKind::Standalone(kind) => this.lower_standalone(kind, &buckets, dir.span),
            ConstructKind::Block(kind) => this.lower_block(*kind, &buckets, dir),
            ConstructKind::Loop(kind) => this.lower_loop(*kind, &buckets, dir),
            ConstructKind::Sections { parallel } => this.lower_sections(*parallel, &buckets, dir),
            ConstructKind::Section => Err(LowerError::invariant(
                "section outside of a sections construct",
                dir.span,
            )),
            ConstructKind::Critical { name } => this.lower_critical(name.as_deref(), &buckets, dir),
            ConstructKind::Atomic(atomic) => this.lower_atomic(atomic, dir),
        })
    }

    // ── Standalone ──────────────────────────────────────────────────

    fn lower_standalone(
        &mut self,
        kind: &StandaloneKind,
        buckets: &ClauseBuckets<'_>,
        span: Span,
    ) -> LowerResult<()> {
        match kind {
            StandaloneKind::Barrier => {
                self.cx.builder.build(OpKind::Barrier).finish();
            }
            StandaloneKind::Taskwait => {
                self.cx.builder.build(OpKind::Taskwait).finish();
            }
            StandaloneKind::Taskyield => {
                self.cx.builder.build(OpKind::Taskyield).finish();
            }
            StandaloneKind::Flush { objects } => {
                let addrs = self.object_addresses(objects, span)?;
                self.cx.builder.build(OpKind::Flush).operands(addrs).finish();
            }
            StandaloneKind::TargetEnterData => {
                self.lower_target_data_transfer(OpKind::TargetEnterData, buckets, span)?;
            }
            StandaloneKind::TargetExitData => {
                self.lower_target_data_transfer(OpKind::TargetExitData, buckets, span)?;
            }
            StandaloneKind::TargetUpdate
            | StandaloneKind::Ordered
            | StandaloneKind::Cancel
            | StandaloneKind::CancellationPoint => {
                return Err(LowerError::unsupported(
                    buckets.construct().name(),
                    "construct",
                    span,
                ));
            }
        }
        Ok(())
    }

    fn lower_target_data_transfer(
        &mut self,
        kind: OpKind,
        buckets: &ClauseBuckets<'_>,
        span: Span,
    ) -> LowerResult<()> {
        let if_expr = self.if_condition(buckets)?;
        let device = self.optional_value(buckets, ClauseKind::Device)?;
        let maps = self.map_operands(buckets, span)?;
        self.cx
            .builder
            .build(kind)
            .operand_groups(&[&if_expr, &device, &maps.addrs])
            .attr(names::MAP_TYPES, Attribute::Array(maps.bits))
            .flag(names::NOWAIT, buckets.has(ClauseKind::Nowait))
            .finish();
        Ok(())
    }

    // ── Critical ────────────────────────────────────────────────────

    fn lower_critical(
        &mut self,
        name: Option<&str>,
        buckets: &ClauseBuckets<'_>,
        dir: &Directive,
    ) -> LowerResult<()> {
        let op = if let Some(name) = name {
            self.declare_critical(name, buckets, dir.span)?;
            self.cx
                .builder
                .build(OpKind::Critical)
                .attr(names::NAME, Attribute::SymbolRef(name.to_owned()))
                .regions(1)
                .finish()
        } else {
            if buckets.has(ClauseKind::Hint) {
                tracing::debug!("hint on unnamed critical ignored");
            }
            self.cx.builder.build(OpKind::Critical).regions(1).finish()
        };
        self.lower_plain_body(op, dir)
    }

    /// One module-level declaration per critical name; the first
    /// occurrence decides the hint.
    fn declare_critical(
        &mut self,
        name: &str,
        buckets: &ClauseBuckets<'_>,
        span: Span,
    ) -> LowerResult<()> {
        if self.cx.criticals.contains_key(name) {
            return Ok(());
        }
        let hint_clause = buckets.first(ClauseKind::Hint).map(|node| &node.clause);
        let hint = self.sync_hint(hint_clause, span)?;

        let mut b = self.cx.builder.guard();
        let body = b.module().body();
        b.position_at_start(body);
        let decl = b
            .build(OpKind::CriticalDeclare)
            .attr(names::SYM_NAME, Attribute::SymbolRef(name.to_owned()))
            .attr(names::HINT, Attribute::SyncHint(hint))
            .span(span)
            .finish();
        drop(b);

        tracing::debug!(name, "declared critical section");
        self.cx.criticals.insert(name.to_owned(), decl);
        Ok(())
    }

    /// Fold a `hint` clause into synchronization hint bits.
    pub(crate) fn sync_hint(&self, clause: Option<&Clause>, span: Span) -> LowerResult<SyncHint> {
        let Some(Clause::Hint(expr)) = clause else {
            return Ok(SyncHint::empty());
        };
        let value = self.fold(*expr, "hint", span)?;
        let bits = u64::try_from(value)
            .map_err(|_| LowerError::invariant(format!("negative hint {value}"), span))?;
        Ok(SyncHint::from_bits_truncate(bits))
    }

    // ── Operand helpers ─────────────────────────────────────────────

    /// Addresses of `objects` in the current scope.
    pub(crate) fn object_addresses(
        &mut self,
        objects: &[SymbolId],
        span: Span,
    ) -> LowerResult<Vec<ValueId>> {
        objects
            .iter()
            .map(|&sym| self.symbol_address(sym, span))
            .collect()
    }

    /// The `if` clause as an `i1`, or nothing.
    pub(crate) fn if_condition(
        &mut self,
        buckets: &ClauseBuckets<'_>,
    ) -> LowerResult<Vec<ValueId>> {
        self.condition(buckets, ClauseKind::If)
    }

    /// A logical clause expression converted to `i1`.
    pub(crate) fn condition(
        &mut self,
        buckets: &ClauseBuckets<'_>,
        kind: ClauseKind,
    ) -> LowerResult<Vec<ValueId>> {
        let Some(expr) = buckets
            .first(kind)
            .and_then(|node| clause_expr(&node.clause))
        else {
            return Ok(Vec::new());
        };
        let value = self.value(expr)?;
        Ok(vec![self.cx.builder.convert(&IrType::I1, value)])
    }

    /// A numeric clause expression as lowered by the host, or nothing.
    pub(crate) fn optional_value(
        &mut self,
        buckets: &ClauseBuckets<'_>,
        kind: ClauseKind,
    ) -> LowerResult<Vec<ValueId>> {
        match buckets.first(kind).and_then(|node| clause_expr(&node.clause)) {
            Some(expr) => Ok(vec![self.value(expr)?]),
            None => Ok(Vec::new()),
        }
    }

    /// Every `map` clause object with its map-type bits.
    pub(crate) fn map_operands(
        &mut self,
        buckets: &ClauseBuckets<'_>,
        span: Span,
    ) -> LowerResult<MapOperands> {
        let mut maps = MapOperands::default();
        for node in buckets.iter(ClauseKind::Map) {
            let Clause::Map(clause) = &node.clause else {
                continue;
            };
            let bits = map_bits(clause);
            for &sym in &clause.objects {
                maps.addrs.push(self.symbol_address(sym, span)?);
                maps.bits.push(Attribute::MapBits(bits));
            }
        }
        Ok(maps)
    }

    /// Every `allocate` clause object with its allocator.
    pub(crate) fn allocate_operands(
        &mut self,
        buckets: &ClauseBuckets<'_>,
        span: Span,
    ) -> LowerResult<AllocateOperands> {
        let mut out = AllocateOperands::default();
        for node in buckets.iter(ClauseKind::Allocate) {
            let Clause::Allocate(clause) = &node.clause else {
                continue;
            };
            for &sym in &clause.objects {
                let allocator = if let Some(expr) = clause.allocator {
                    self.value(expr)?
                } else {
                    let handle = self.cx.options.default_allocator;
                    self.cx.builder.const_int(IrType::I32, handle)
                };
                out.vars.push(self.symbol_address(sym, span)?);
                out.allocators.push(allocator);
            }
        }
        Ok(out)
    }
}

/// The expression payload of a single-expression clause.
fn clause_expr(clause: &Clause) -> Option<ExprRef> {
    match clause {
        Clause::If(e)
        | Clause::NumThreads(e)
        | Clause::Final(e)
        | Clause::Priority(e)
        | Clause::Simdlen(e)
        | Clause::Safelen(e)
        | Clause::Hint(e)
        | Clause::Collapse(e)
        | Clause::Device { device: e, .. } => Some(*e),
        Clause::Ordered(e) => *e,
        _ => None,
    }
}

/// Map-type bits of one `map` clause.
pub fn map_bits(clause: &MapClause) -> MapBits {
    let mut bits = match clause.map_type.unwrap_or(MapType::Tofrom) {
        MapType::To => MapBits::TO,
        MapType::From => MapBits::FROM,
        MapType::Tofrom => MapBits::TO | MapBits::FROM,
        MapType::Alloc | MapType::Release => MapBits::empty(),
        MapType::Delete => MapBits::DELETE,
    };
    if clause.always {
        bits |= MapBits::ALWAYS;
    }
    bits
}

/// The `default` clause kind, if any.
pub(crate) fn default_kind(buckets: &ClauseBuckets<'_>) -> Option<DefaultKind> {
    buckets.iter(ClauseKind::Default).find_map(|node| match node.clause {
        Clause::Default(kind) => Some(kind),
        _ => None,
    })
}

#[cfg(test)]
mod tests;
