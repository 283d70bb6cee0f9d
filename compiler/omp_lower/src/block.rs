//! Block-scoped constructs.
//!
//! `parallel`, `master`, `single`, `ordered`, `task`, `taskgroup`, and
//! `target data` each become one operation with one region. The handlers
//! share a shape: lower clause operands at the construct's insertion point,
//! build the operation, then open its region and emit the prologue, the
//! body, and the epilogue inside it.
//!
//! # Parallel prologue
//!
//! In order: threadprivate handles, `copyin` copies and their barrier,
//! privatization, reduction accumulators. The reduction contributions form
//! the epilogue.

use omp_ir::{names, Attribute, OpBuilder, OpId, OpKind, ValueId};

use crate::classify::ClauseBuckets;
use crate::construct::default_kind;
use crate::context::Lowerer;
use crate::data_sharing::SharingPlan;
use crate::directive::{BlockKind, Clause, ClauseKind, Directive};
use crate::error::{LowerError, LowerResult};
use crate::host::HostLowering;
use crate::reduction::reductions_attr;
use crate::symbol::SymbolTable;

impl<H: HostLowering + ?Sized, S: SymbolTable + ?Sized> Lowerer<'_, H, S> {
    pub(crate) fn lower_block(
        &mut self,
        kind: BlockKind,
        buckets: &ClauseBuckets<'_>,
        dir: &Directive,
    ) -> LowerResult<()> {
        match kind {
            BlockKind::Parallel => self.lower_parallel(buckets, dir),
            BlockKind::Master => {
                let op = self.cx.builder.build(OpKind::Master).regions(1).finish();
                self.lower_plain_body(op, dir)
            }
            BlockKind::Single => self.lower_single(buckets, dir),
            BlockKind::Ordered => {
                let op = self.cx.builder.build(OpKind::Ordered).regions(1).finish();
                self.lower_plain_body(op, dir)
            }
            BlockKind::Task => self.lower_task(buckets, dir),
            BlockKind::Taskgroup => {
                let alloc = self.allocate_operands(buckets, dir.span)?;
                let op = self
                    .cx
                    .builder
                    .build(OpKind::Taskgroup)
                    .operand_groups(&[&alloc.vars, &alloc.allocators])
                    .regions(1)
                    .finish();
                self.lower_plain_body(op, dir)
            }
            BlockKind::TargetData => {
                let if_expr = self.if_condition(buckets)?;
                let device = self.optional_value(buckets, ClauseKind::Device)?;
                let maps = self.map_operands(buckets, dir.span)?;
                let op = self
                    .cx
                    .builder
                    .build(OpKind::TargetData)
                    .operand_groups(&[&if_expr, &device, &maps.addrs])
                    .attr(names::MAP_TYPES, Attribute::Array(maps.bits))
                    .regions(1)
                    .finish();
                self.lower_plain_body(op, dir)
            }
            BlockKind::Target | BlockKind::Workshare => Err(LowerError::unsupported(
                buckets.construct().name(),
                "construct",
                dir.span,
            )),
        }
    }

    // ── parallel ────────────────────────────────────────────────────

    fn lower_parallel(&mut self, buckets: &ClauseBuckets<'_>, dir: &Directive) -> LowerResult<()> {
        let span = dir.span;
        let copyin = self.copyin_objects(buckets)?;
        let (if_expr, num_threads) = self.parallel_params(buckets)?;
        let alloc = self.allocate_operands(buckets, span)?;
        let reductions = self.reduction_targets(buckets, span)?;
        let reduction_vars: Vec<_> = reductions.iter().map(|t| t.original).collect();

        let op = self
            .parallel_op(buckets)
            .operand_groups(&[
                &if_expr,
                &num_threads,
                &alloc.vars,
                &alloc.allocators,
                &reduction_vars,
            ])
            .attr(names::REDUCTIONS, reductions_attr(&reductions))
            .finish();

        let body = self.open_body(op, 0, &[], &dir.body, dir.unstructured)?;
        self.threadprivatize(&dir.body, &copyin, span)?;
        self.copyin(&copyin, span)?;
        let plan = self.sharing_plan(buckets, dir);
        self.privatize(&plan, span)?;
        let accumulators = self.open_accumulators(&reductions, span)?;
        self.lower_evaluations(&dir.body)?;
        self.contribute(&accumulators);
        self.close_body(&body);
        Ok(())
    }

    /// Wrap an inner worksharing construct in the outer half of a combined
    /// `parallel` construct.
    ///
    /// The outer operation takes only `if`, `num_threads`, `proc_bind`,
    /// threadprivate handles, and `copyin`. `inner` runs with the builder
    /// inside the outer region and does all privatization.
    pub(crate) fn lower_combined_parallel(
        &mut self,
        buckets: &ClauseBuckets<'_>,
        dir: &Directive,
        inner: impl FnOnce(&mut Self) -> LowerResult<()>,
    ) -> LowerResult<()> {
        let span = dir.span;
        let copyin = self.copyin_objects(buckets)?;
        let (if_expr, num_threads) = self.parallel_params(buckets)?;
        let op = self
            .parallel_op(buckets)
            .operand_groups(&[&if_expr, &num_threads, &[], &[], &[]])
            .finish();

        let body = self.open_body(op, 0, &[], &[], false)?;
        self.threadprivatize(&dir.body, &copyin, span)?;
        self.copyin(&copyin, span)?;
        inner(self)?;
        self.close_body(&body);
        Ok(())
    }

    fn parallel_params(
        &mut self,
        buckets: &ClauseBuckets<'_>,
    ) -> LowerResult<(Vec<ValueId>, Vec<ValueId>)> {
        let if_expr = self.if_condition(buckets)?;
        let num_threads = self.optional_value(buckets, ClauseKind::NumThreads)?;
        Ok((if_expr, num_threads))
    }

    fn parallel_op(&mut self, buckets: &ClauseBuckets<'_>) -> OpBuilder<'_> {
        let mut b = self.cx.builder.build(OpKind::Parallel).regions(1);
        if let Some(Clause::ProcBind(kind)) =
            buckets.first(ClauseKind::ProcBind).map(|n| &n.clause)
        {
            b = b.attr(names::PROC_BIND, Attribute::ProcBind(*kind));
        }
        b
    }

    // ── single / task ───────────────────────────────────────────────

    fn lower_single(&mut self, buckets: &ClauseBuckets<'_>, dir: &Directive) -> LowerResult<()> {
        let alloc = self.allocate_operands(buckets, dir.span)?;
        let op = self
            .cx
            .builder
            .build(OpKind::Single)
            .operand_groups(&[&alloc.vars, &alloc.allocators])
            .flag(names::NOWAIT, buckets.has(ClauseKind::Nowait))
            .regions(1)
            .finish();
        self.lower_privatized_body(op, buckets, dir)
    }

    fn lower_task(&mut self, buckets: &ClauseBuckets<'_>, dir: &Directive) -> LowerResult<()> {
        let if_expr = self.if_condition(buckets)?;
        let final_expr = self.condition(buckets, ClauseKind::Final)?;
        let priority = self.optional_value(buckets, ClauseKind::Priority)?;
        let alloc = self.allocate_operands(buckets, dir.span)?;
        let op = self
            .cx
            .builder
            .build(OpKind::Task)
            .operand_groups(&[&if_expr, &final_expr, &priority, &alloc.vars, &alloc.allocators])
            .flag(names::UNTIED, buckets.has(ClauseKind::Untied))
            .flag(names::MERGEABLE, buckets.has(ClauseKind::Mergeable))
            .regions(1)
            .finish();
        self.lower_privatized_body(op, buckets, dir)
    }

    /// Privatize, then lower the body, in the single region of `op`.
    fn lower_privatized_body(
        &mut self,
        op: OpId,
        buckets: &ClauseBuckets<'_>,
        dir: &Directive,
    ) -> LowerResult<()> {
        let body = self.open_body(op, 0, &[], &dir.body, dir.unstructured)?;
        let plan = self.sharing_plan(buckets, dir);
        self.privatize(&plan, dir.span)?;
        self.lower_evaluations(&dir.body)?;
        self.close_body(&body);
        Ok(())
    }

    /// Explicit data-sharing clauses plus the `default` clause applied to
    /// the body.
    pub(crate) fn sharing_plan(&self, buckets: &ClauseBuckets<'_>, dir: &Directive) -> SharingPlan {
        let mut plan = SharingPlan::from_clauses(buckets);
        if let Some(default) = default_kind(buckets) {
            plan.apply_default(default, &dir.body, self.symbols);
        }
        plan.apply_symbol_flags(self.symbols);
        plan
    }
}
