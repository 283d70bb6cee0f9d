//! Data-sharing resolution and privatization.
//!
//! # Algorithm
//!
//! 1. [`SharingPlan::from_clauses`] collects the explicit `private`,
//!    `firstprivate`, and `lastprivate` symbols in clause order.
//! 2. [`SharingPlan::apply_default`] adds the symbols referenced directly
//!    in the body when `default(private|firstprivate)` is present, and
//!    [`SharingPlan::apply_symbol_flags`] folds in the symbol flags.
//! 3. [`Lowerer::privatize`] emits one storage clone per symbol, then one
//!    copy-in per firstprivate symbol, then at most one barrier. Loops
//!    call it before building their operation, so this prologue sits
//!    outside the iterated body.
//! 4. Lastprivate copy-back is emitted by the construct: one guarded block
//!    for worksharing loops ([`Lowerer::lastprivate_loop_epilogue`]), a plain
//!    copy at the end of the last section for `sections`.

use omp_ir::{CmpPredicate, OpKind, Span, ValueId};
use rustc_hash::FxHashSet;

use crate::classify::{ClauseBuckets, ClauseGroup};
use crate::context::Lowerer;
use crate::directive::{Clause, DefaultKind, EvalKind, Evaluation};
use crate::error::{LowerError, LowerResult};
use crate::host::HostLowering;
use crate::symbol::{SymbolFlags, SymbolId, SymbolKind, SymbolTable};

// ── Sharing classes ─────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SharingClass {
    Private,
    Firstprivate,
    Lastprivate,
    FirstLastprivate,
}

impl SharingClass {
    fn merge(self, other: SharingClass) -> SharingClass {
        match (self.copies_in() || other.copies_in(), self.copies_out() || other.copies_out()) {
            (true, true) => SharingClass::FirstLastprivate,
            (true, false) => SharingClass::Firstprivate,
            (false, true) => SharingClass::Lastprivate,
            (false, false) => SharingClass::Private,
        }
    }

    #[inline]
    pub fn copies_in(self) -> bool {
        matches!(self, SharingClass::Firstprivate | SharingClass::FirstLastprivate)
    }

    #[inline]
    pub fn copies_out(self) -> bool {
        matches!(self, SharingClass::Lastprivate | SharingClass::FirstLastprivate)
    }
}

/// Per-symbol sharing classes of one construct, in first-mention order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SharingPlan {
    entries: Vec<(SymbolId, SharingClass)>,
    /// Symbols named by any data-sharing or reduction clause.
    explicit: FxHashSet<SymbolId>,
    linear: bool,
}

impl SharingPlan {
    pub fn from_clauses(buckets: &ClauseBuckets<'_>) -> Self {
        let mut plan = SharingPlan::default();
        for node in buckets
            .group(ClauseGroup::DataSharing)
            .iter()
            .chain(buckets.group(ClauseGroup::Reduction))
        {
            match &node.clause {
                Clause::Private(objects) => plan.add_all(objects, SharingClass::Private),
                Clause::Firstprivate(objects) => plan.add_all(objects, SharingClass::Firstprivate),
                Clause::Lastprivate(objects) => plan.add_all(objects, SharingClass::Lastprivate),
                Clause::Shared(objects)
                | Clause::Copyin(objects)
                | Clause::Reduction { objects, .. } => {
                    plan.explicit.extend(objects.iter().copied());
                }
                _ => {}
            }
        }
        plan.linear = buckets.has(crate::directive::ClauseKind::Linear);
        plan
    }

    fn add_all(&mut self, objects: &[SymbolId], class: SharingClass) {
        for &sym in objects {
            self.add(sym, class);
        }
    }

    fn add(&mut self, sym: SymbolId, class: SharingClass) {
        self.explicit.insert(sym);
        if let Some(entry) = self.entries.iter_mut().find(|(s, _)| *s == sym) {
            entry.1 = entry.1.merge(class);
        } else {
            self.entries.push((sym, class));
        }
    }

    /// Classify body symbols under `default(private|firstprivate)`.
    ///
    /// Only symbols referenced directly in `body` qualify: references that
    /// occur solely inside nested constructs are left to those constructs.
    /// Explicitly listed, predetermined, threadprivate, and common-block
    /// symbols are skipped.
    pub fn apply_default<S: SymbolTable + ?Sized>(
        &mut self,
        default: DefaultKind,
        body: &[Evaluation],
        symbols: &S,
    ) {
        let class = match default {
            DefaultKind::Private => SharingClass::Private,
            DefaultKind::Firstprivate => SharingClass::Firstprivate,
            DefaultKind::Shared | DefaultKind::None => return,
        };
        for sym in direct_uses(body) {
            if self.explicit.contains(&sym) {
                continue;
            }
            let Some(info) = symbols.get(sym) else {
                continue;
            };
            if info.kind == SymbolKind::CommonBlock
                || info.has(SymbolFlags::PREDETERMINED | SymbolFlags::THREADPRIVATE)
            {
                continue;
            }
            self.add(sym, class);
        }
    }

    /// Fold in the front end's per-symbol decisions: predetermined symbols
    /// are privatized by the construct that owns them, and the
    /// first/last-private flags add copy-in and copy-out.
    pub fn apply_symbol_flags<S: SymbolTable + ?Sized>(&mut self, symbols: &S) {
        self.entries.retain_mut(|(sym, class)| {
            let Some(info) = symbols.get(*sym) else {
                return true;
            };
            if info.has(SymbolFlags::PREDETERMINED) {
                return false;
            }
            if info.has(SymbolFlags::FIRST_PRIVATE) {
                *class = class.merge(SharingClass::Firstprivate);
            }
            if info.has(SymbolFlags::LAST_PRIVATE) {
                *class = class.merge(SharingClass::Lastprivate);
            }
            true
        });
    }

    pub fn entries(&self) -> &[(SymbolId, SharingClass)] {
        &self.entries
    }

    pub fn class_of(&self, sym: SymbolId) -> Option<SharingClass> {
        self.entries
            .iter()
            .find_map(|&(s, class)| (s == sym).then_some(class))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_lastprivate(&self) -> bool {
        self.entries.iter().any(|(_, class)| class.copies_out())
    }

    /// One barrier separates copy-in from the body when a symbol is both
    /// firstprivate and lastprivate, or when `linear` is present.
    pub fn needs_barrier(&self) -> bool {
        self.linear
            || self
                .entries
                .iter()
                .any(|(_, class)| *class == SharingClass::FirstLastprivate)
    }
}

/// Symbols referenced directly in `evals`, not descending into nested
/// constructs. Order of first reference, no duplicates.
pub fn direct_uses(evals: &[Evaluation]) -> Vec<SymbolId> {
    fn walk(evals: &[Evaluation], seen: &mut FxHashSet<SymbolId>, out: &mut Vec<SymbolId>) {
        for eval in evals {
            if matches!(eval.kind, EvalKind::Directive(_)) {
                continue;
            }
            for &sym in &eval.uses {
                if seen.insert(sym) {
                    out.push(sym);
                }
            }
            walk(eval.children(), seen, out);
        }
    }
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    walk(evals, &mut seen, &mut out);
    out
}

// ── Privatization ───────────────────────────────────────────────────

/// Clones created for one construct.
#[derive(Clone, Debug, Default)]
pub(crate) struct Privatized {
    /// (clone, original) pairs to publish after the last iteration/section.
    pub copy_out: Vec<(ValueId, ValueId)>,
}

impl<H: HostLowering + ?Sized, S: SymbolTable + ?Sized> Lowerer<'_, H, S> {
    /// Emit clones, firstprivate copies, and the barrier for `plan` at the
    /// insertion point, rebinding each symbol to its clone.
    pub(crate) fn privatize(&mut self, plan: &SharingPlan, span: Span) -> LowerResult<Privatized> {
        let mut copy_in = Vec::new();
        let mut privatized = Privatized::default();

        for &(sym, class) in plan.entries() {
            let info = self.symbol(sym, span)?;
            if self.cx.bindings.is_bound_here(sym) {
                return Err(LowerError::invariant(
                    format!(
                        "privatization of {} found an existing binding in this construct",
                        info.name
                    ),
                    span,
                ));
            }
            let original = if class.copies_in() || class.copies_out() {
                Some(self.symbol_address(sym, span)?)
            } else {
                None
            };
            let clone = self.cx.builder.alloca(info.ty.clone(), Some(&info.name));
            self.cx.bindings.bind(sym, clone);
            tracing::trace!(symbol = %info.name, ?class, "privatized");

            if let Some(original) = original {
                if class.copies_in() {
                    copy_in.push((clone, original));
                }
                if class.copies_out() {
                    privatized.copy_out.push((clone, original));
                }
            }
        }

        for (clone, original) in copy_in {
            let value = self.cx.builder.load(original);
            self.cx.builder.store(value, clone);
        }
        if plan.needs_barrier() {
            self.cx.builder.build(OpKind::Barrier).finish();
        }
        Ok(privatized)
    }

    /// Publish every lastprivate clone back to its original storage.
    pub(crate) fn copy_out(&mut self, privatized: &Privatized) {
        for &(clone, original) in &privatized.copy_out {
            let value = self.cx.builder.load(clone);
            self.cx.builder.store(value, original);
        }
    }

    /// One `iv == ub` comparison and one conditional block holding every
    /// lastprivate copy-back of the loop.
    pub(crate) fn lastprivate_loop_epilogue(
        &mut self,
        privatized: &Privatized,
        iv: ValueId,
        ub: ValueId,
    ) {
        if privatized.copy_out.is_empty() {
            return;
        }
        let iv_ty = self.cx.builder.value_type(iv).clone();
        let ub = self.cx.builder.convert(&iv_ty, ub);
        let is_last = self.cx.builder.cmpi(CmpPredicate::Eq, iv, ub);
        let if_op = self
            .cx
            .builder
            .build(OpKind::If)
            .operand(is_last)
            .regions(1)
            .finish();
        let region = self.cx.builder.module().op(if_op).regions[0];

        let saved = self.cx.builder.insertion_point();
        self.cx.builder.create_block(region, &[]);
        let term = self.cx.builder.terminate(OpKind::IfYield, &[]);
        self.cx.builder.position_before(term);
        self.copy_out(privatized);
        self.cx.builder.set_insertion_point(saved);
    }
}

#[cfg(test)]
mod tests;
