//! Loop constructs.
//!
//! # Collapsing
//!
//! `collapse(N)` folds the first N perfectly nested counted loops into one
//! loop operation carrying N (lower, upper, step) triples, outermost first.
//! The entry block receives one induction-variable argument per level,
//! all of a single induction type; each is stored into a temporary bound to
//! the loop variable.
//!
//! # Schedule
//!
//! The two schedule modifier slots are examined independently of source
//! order: `simd` in either slot sets the simd modifier and the other slot
//! supplies monotonicity; otherwise the first slot present does.

use omp_ir::{names, Attribute, IrType, OpKind, ScheduleKind, ScheduleModifier, Span, ValueId};

use crate::classify::ClauseBuckets;
use crate::context::Lowerer;
use crate::data_sharing::Privatized;
use crate::directive::{
    Clause, ClauseKind, CountedLoop, Directive, EvalKind, Evaluation, ExprRef, LinearClause,
    LoopBounds, LoopKind, ScheduleClause,
};
use crate::error::{Diagnostic, LowerError, LowerResult};
use crate::host::HostLowering;
use crate::options::NarrowingPolicy;
use crate::reduction::reductions_attr;
use crate::symbol::{SymbolId, SymbolTable};

// ── Schedule ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleResolution {
    pub kind: ScheduleKind,
    pub chunk: Option<ExprRef>,
    pub simd: bool,
    pub monotonicity: Option<ScheduleModifier>,
}

/// Resolve a schedule clause's kind, chunk, and modifiers.
pub fn resolve_schedule(clause: &ScheduleClause) -> ScheduleResolution {
    let [first, second] = clause.modifiers;
    let is_simd = |m: Option<ScheduleModifier>| m == Some(ScheduleModifier::Simd);
    let (simd, monotonicity) = if is_simd(first) || is_simd(second) {
        let other = if is_simd(first) { second } else { first };
        (true, other.filter(|m| *m != ScheduleModifier::Simd))
    } else {
        (false, first.or(second))
    };
    ScheduleResolution {
        kind: clause.kind,
        chunk: clause.chunk,
        simd,
        monotonicity,
    }
}

// ── Induction type ──────────────────────────────────────────────────

/// Outcome of choosing the collapsed induction type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InductionType {
    pub ty: IrType,
    /// Set when a loop variable was wider than 64 bits.
    pub narrowed_from: Option<u32>,
}

/// The smallest of `i32`/`i64` that holds every loop variable.
pub fn induction_type(var_bits: impl IntoIterator<Item = u32>) -> InductionType {
    let widest = var_bits.into_iter().max().unwrap_or(32);
    match widest {
        0..=32 => InductionType {
            ty: IrType::I32,
            narrowed_from: None,
        },
        33..=64 => InductionType {
            ty: IrType::I64,
            narrowed_from: None,
        },
        wider => InductionType {
            ty: IrType::I64,
            narrowed_from: Some(wider),
        },
    }
}

// ── Loop nest ───────────────────────────────────────────────────────

/// One collapsed level.
#[derive(Clone, Copy, Debug)]
struct Level<'d> {
    var: SymbolId,
    bounds: &'d LoopBounds,
}

/// The first `depth` nested counted loops of `body`, and the innermost
/// loop's body.
fn collect_loop_nest(
    body: &[Evaluation],
    depth: usize,
    span: Span,
) -> LowerResult<(Vec<Level<'_>>, &[Evaluation])> {
    let mut levels = Vec::with_capacity(depth);
    let mut current = body;
    for level in 0..depth {
        let counted: &CountedLoop = current
            .iter()
            .find_map(|eval| match &eval.kind {
                EvalKind::Loop(l) => Some(l),
                _ => None,
            })
            .ok_or_else(|| {
                LowerError::invariant(
                    format!("expected {depth} nested loops, found {level}"),
                    span,
                )
            })?;
        let bounds = counted
            .bounds
            .as_ref()
            .ok_or_else(|| LowerError::invariant("loop without counted bounds", span))?;
        levels.push(Level {
            var: counted.var,
            bounds,
        });
        current = &counted.body;
    }
    Ok((levels, current))
}

/// Lowered bounds of a collapsed nest.
#[derive(Debug, Default)]
struct NestBounds {
    lower: Vec<ValueId>,
    upper: Vec<ValueId>,
    step: Vec<ValueId>,
}

impl<H: HostLowering + ?Sized, S: SymbolTable + ?Sized> Lowerer<'_, H, S> {
    pub(crate) fn lower_loop(
        &mut self,
        kind: LoopKind,
        buckets: &ClauseBuckets<'_>,
        dir: &Directive,
    ) -> LowerResult<()> {
        match kind {
            LoopKind::Do => self.lower_wsloop(buckets, dir),
            LoopKind::Simd => self.lower_simdloop(buckets, dir),
            LoopKind::ParallelDo => {
                self.lower_combined_parallel(buckets, dir, |this| this.lower_wsloop(buckets, dir))
            }
            LoopKind::DoSimd
            | LoopKind::ParallelDoSimd
            | LoopKind::Distribute
            | LoopKind::Taskloop => Err(LowerError::unsupported(
                buckets.construct().name(),
                "construct",
                dir.span,
            )),
        }
    }

    fn collapse_depth(&self, buckets: &ClauseBuckets<'_>, span: Span) -> LowerResult<usize> {
        let Some(node) = buckets.first(ClauseKind::Collapse) else {
            return Ok(1);
        };
        let Clause::Collapse(expr) = &node.clause else {
            return Ok(1);
        };
        let n = self.fold(*expr, "collapse", node.span)?;
        usize::try_from(n)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                LowerError::invariant(format!("collapse count {n} is not positive"), span)
            })
    }

    /// Choose the induction type for `levels`, applying the narrowing
    /// policy.
    fn nest_induction_type(&mut self, levels: &[Level<'_>], span: Span) -> LowerResult<IrType> {
        let mut bits = Vec::with_capacity(levels.len());
        for level in levels {
            let info = self.symbol(level.var, span)?;
            bits.push(info.ty.bit_width().unwrap_or(32));
        }
        let chosen = induction_type(bits);
        if let Some(wide) = chosen.narrowed_from {
            let message = format!("loop variable of {wide} bits narrowed to 64 bits");
            match self.cx.options.narrowing {
                NarrowingPolicy::Warn => self.warn(Diagnostic::warning(message, span)),
                NarrowingPolicy::Error => {
                    return Err(LowerError::unsupported(
                        "loop",
                        format!("loop variable of {wide} bits"),
                        span,
                    ))
                }
            }
        }
        Ok(chosen.ty)
    }

    fn lower_nest_bounds(
        &mut self,
        levels: &[Level<'_>],
        iv_ty: &IrType,
    ) -> LowerResult<NestBounds> {
        let mut out = NestBounds::default();
        for level in levels {
            let lower = self.value(level.bounds.lower)?;
            out.lower.push(self.cx.builder.convert(iv_ty, lower));
            let upper = self.value(level.bounds.upper)?;
            out.upper.push(self.cx.builder.convert(iv_ty, upper));
            let step = match level.bounds.step {
                Some(step) => {
                    let step = self.value(step)?;
                    self.cx.builder.convert(iv_ty, step)
                }
                None => self.cx.builder.const_int(iv_ty.clone(), 1),
            };
            out.step.push(step);
        }
        Ok(out)
    }

    /// Store each block argument into a temporary bound to its loop
    /// variable. A privatized loop variable reuses its clone.
    fn bind_induction_vars(
        &mut self,
        levels: &[Level<'_>],
        args: &[ValueId],
        span: Span,
    ) -> LowerResult<()> {
        for (level, &arg) in levels.iter().zip(args) {
            let info = self.symbol(level.var, span)?;
            let temp = if self.cx.bindings.is_bound_here(level.var) {
                self.symbol_address(level.var, span)?
            } else {
                let op = self
                    .cx
                    .builder
                    .build(OpKind::Alloca)
                    .attr(names::IN_TYPE, Attribute::Type(info.ty.clone()))
                    .attr(names::UNIQ_NAME, Attribute::Str(info.name.clone()))
                    .attr(names::ADAPT_VALUE_BY_REF, Attribute::Unit)
                    .result(IrType::reference(info.ty.clone()))
                    .finish();
                let temp = self.cx.builder.result(op);
                self.cx.bindings.bind(level.var, temp);
                temp
            };
            let value = self.cx.builder.convert(&info.ty, arg);
            self.cx.builder.store(value, temp);
        }
        Ok(())
    }

    // ── Worksharing loop ────────────────────────────────────────────

    fn lower_wsloop(&mut self, buckets: &ClauseBuckets<'_>, dir: &Directive) -> LowerResult<()> {
        let span = dir.span;
        let depth = self.collapse_depth(buckets, span)?;
        if depth > 1 && buckets.has(ClauseKind::Lastprivate) {
            return Err(LowerError::unsupported(
                buckets.construct().name(),
                "collapse with lastprivate",
                span,
            ));
        }
        let (levels, inner) = collect_loop_nest(&dir.body, depth, span)?;
        let iv_ty = self.nest_induction_type(&levels, span)?;
        let bounds = self.lower_nest_bounds(&levels, &iv_ty)?;
        #[expect(clippy::cast_possible_wrap, reason = "collapse depth is a small count")]
        let collapse = levels.len() as i64;

        let (linear_vars, linear_steps) = self.linear_operands(buckets, span)?;
        let reductions = self.reduction_targets(buckets, span)?;
        let reduction_vars: Vec<_> = reductions.iter().map(|t| t.original).collect();
        let schedule = buckets.first(ClauseKind::Schedule).and_then(|node| match &node.clause {
            Clause::Schedule(s) => Some(resolve_schedule(s)),
            _ => None,
        });
        let chunk = match schedule.and_then(|s| s.chunk) {
            Some(expr) => vec![self.value(expr)?],
            None => Vec::new(),
        };
        let ordered_clause = buckets
            .first(ClauseKind::Ordered)
            .map(|node| (&node.clause, node.span));
        let ordered = match ordered_clause {
            Some((Clause::Ordered(Some(expr)), at)) => Some(self.fold(*expr, "ordered", at)?),
            Some(_) => Some(0),
            None => None,
        };

        let plan = self.sharing_plan(buckets, dir);
        let privatized = self.privatize(&plan, span)?;
        let mut b = self
            .cx
            .builder
            .build(OpKind::WsLoop)
            .operand_groups(&[
                &bounds.lower,
                &bounds.upper,
                &bounds.step,
                &linear_vars,
                &linear_steps,
                &reduction_vars,
                &chunk,
            ])
            .attr(names::COLLAPSE, Attribute::Int(collapse))
            .attr(names::REDUCTIONS, reductions_attr(&reductions))
            .flag(names::NOWAIT, buckets.has(ClauseKind::Nowait))
            .flag(names::INCLUSIVE, true)
            .regions(1);
        if let Some(schedule) = schedule {
            b = b.attr(names::SCHEDULE, Attribute::ScheduleKind(schedule.kind));
            if let Some(m) = schedule.monotonicity {
                b = b.attr(names::SCHEDULE_MODIFIER, Attribute::ScheduleModifier(m));
            }
            b = b.flag(names::SIMD_MODIFIER, schedule.simd);
        }
        if let Some(ordered) = ordered {
            b = b.attr(names::ORDERED, Attribute::Int(ordered));
        }
        let op = b.finish();

        let arg_types = vec![iv_ty; levels.len()];
        let body = self.open_body(op, 0, &arg_types, inner, dir.unstructured)?;
        let args = self.cx.builder.module().block(body.entry).args.to_vec();
        self.bind_induction_vars(&levels, &args, span)?;
        let accumulators = self.open_accumulators(&reductions, span)?;
        self.lower_evaluations(inner)?;
        self.contribute(&accumulators);
        self.loop_epilogue(&privatized, &args, &bounds);
        self.close_body(&body);
        Ok(())
    }

    fn loop_epilogue(&mut self, privatized: &Privatized, args: &[ValueId], bounds: &NestBounds) {
        if let (Some(&iv), Some(&ub)) = (args.first(), bounds.upper.first()) {
            self.lastprivate_loop_epilogue(privatized, iv, ub);
        }
    }

    /// Linear variables and their steps, one step per variable.
    fn linear_operands(
        &mut self,
        buckets: &ClauseBuckets<'_>,
        span: Span,
    ) -> LowerResult<(Vec<ValueId>, Vec<ValueId>)> {
        let mut vars = Vec::new();
        let mut steps = Vec::new();
        for node in buckets.iter(ClauseKind::Linear) {
            let Clause::Linear(LinearClause { objects, step }) = &node.clause else {
                continue;
            };
            for &sym in objects {
                vars.push(self.symbol_address(sym, span)?);
                let step = match step {
                    Some(expr) => self.value(*expr)?,
                    None => self.cx.builder.const_int(IrType::I32, 1),
                };
                steps.push(step);
            }
        }
        Ok((vars, steps))
    }

    // ── SIMD loop ───────────────────────────────────────────────────

    /// A `simdlen`/`safelen` value folded to a constant.
    fn folded_param(
        &self,
        buckets: &ClauseBuckets<'_>,
        kind: ClauseKind,
    ) -> LowerResult<Option<i64>> {
        match buckets.first(kind).map(|node| (&node.clause, node.span)) {
            Some((Clause::Simdlen(expr) | Clause::Safelen(expr), at)) => {
                Ok(Some(self.fold(*expr, kind.name(), at)?))
            }
            _ => Ok(None),
        }
    }

    fn lower_simdloop(&mut self, buckets: &ClauseBuckets<'_>, dir: &Directive) -> LowerResult<()> {
        let span = dir.span;
        let depth = self.collapse_depth(buckets, span)?;
        let (levels, inner) = collect_loop_nest(&dir.body, depth, span)?;
        let iv_ty = self.nest_induction_type(&levels, span)?;
        let bounds = self.lower_nest_bounds(&levels, &iv_ty)?;
        let if_expr = self.if_condition(buckets)?;
        let simdlen = self.folded_param(buckets, ClauseKind::Simdlen)?;
        let safelen = self.folded_param(buckets, ClauseKind::Safelen)?;

        let plan = self.sharing_plan(buckets, dir);
        self.privatize(&plan, span)?;
        let mut b = self
            .cx
            .builder
            .build(OpKind::SimdLoop)
            .operand_groups(&[&bounds.lower, &bounds.upper, &bounds.step, &if_expr])
            .flag(names::INCLUSIVE, true)
            .regions(1);
        if let Some(simdlen) = simdlen {
            b = b.attr(names::SIMDLEN, Attribute::Int(simdlen));
        }
        if let Some(safelen) = safelen {
            b = b.attr(names::SAFELEN, Attribute::Int(safelen));
        }
        let op = b.finish();

        let arg_types = vec![iv_ty; levels.len()];
        let body = self.open_body(op, 0, &arg_types, inner, dir.unstructured)?;
        let args = self.cx.builder.module().block(body.entry).args.to_vec();
        self.bind_induction_vars(&levels, &args, span)?;
        self.lower_evaluations(inner)?;
        self.close_body(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
