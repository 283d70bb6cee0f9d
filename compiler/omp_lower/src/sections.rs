//! `sections` and `section`.
//!
//! The sections operation's region holds the privatization prologue and
//! one `omp.section` operation per `section` directive. Lastprivate clones
//! are published at the end of the lexically last section.

use omp_ir::{names, OpKind};

use crate::capability::ConstructClass;
use crate::classify::ClauseBuckets;
use crate::construct::default_kind;
use crate::context::Lowerer;
use crate::data_sharing::{Privatized, SharingPlan};
use crate::directive::{ClauseKind, ConstructKind, Directive, EvalKind, Evaluation};
use crate::error::LowerResult;
use crate::host::HostLowering;
use crate::symbol::SymbolTable;

/// The `section` directive behind `eval`, if it is one.
fn as_section(eval: &Evaluation) -> Option<&Directive> {
    match &eval.kind {
        EvalKind::Directive(dir) if dir.kind == ConstructKind::Section => Some(dir),
        _ => None,
    }
}

impl<H: HostLowering + ?Sized, S: SymbolTable + ?Sized> Lowerer<'_, H, S> {
    pub(crate) fn lower_sections(
        &mut self,
        parallel: bool,
        buckets: &ClauseBuckets<'_>,
        dir: &Directive,
    ) -> LowerResult<()> {
        if parallel {
            self.lower_combined_parallel(buckets, dir, |this| this.lower_sections_op(buckets, dir))
        } else {
            self.lower_sections_op(buckets, dir)
        }
    }

    fn lower_sections_op(
        &mut self,
        buckets: &ClauseBuckets<'_>,
        dir: &Directive,
    ) -> LowerResult<()> {
        let span = dir.span;
        let alloc = self.allocate_operands(buckets, span)?;
        let op = self
            .cx
            .builder
            .build(OpKind::Sections)
            .operand_groups(&[&[], &alloc.vars, &alloc.allocators])
            .flag(names::NOWAIT, buckets.has(ClauseKind::Nowait))
            .regions(1)
            .finish();

        let body = self.open_body(op, 0, &[], &[], false)?;
        let plan = self.sections_plan(buckets, dir);
        let privatized = self.privatize(&plan, span)?;

        let last = dir.body.iter().rposition(|eval| as_section(eval).is_some());
        for (index, eval) in dir.body.iter().enumerate() {
            match as_section(eval) {
                Some(section) => {
                    let copy_out = (Some(index) == last).then_some(&privatized);
                    self.lower_section(section, copy_out)?;
                }
                None => self.lower_evaluation(eval)?,
            }
        }
        self.close_body(&body);
        Ok(())
    }

    /// Like [`sharing_plan`](Self::sharing_plan), with `default` applied
    /// to the bodies of the individual sections.
    fn sections_plan(&self, buckets: &ClauseBuckets<'_>, dir: &Directive) -> SharingPlan {
        let mut plan = SharingPlan::from_clauses(buckets);
        if let Some(default) = default_kind(buckets) {
            for eval in &dir.body {
                match as_section(eval) {
                    Some(section) => plan.apply_default(default, &section.body, self.symbols),
                    None => plan.apply_default(default, std::slice::from_ref(eval), self.symbols),
                }
            }
        }
        plan.apply_symbol_flags(self.symbols);
        plan
    }

    fn lower_section(
        &mut self,
        section: &Directive,
        copy_out: Option<&Privatized>,
    ) -> LowerResult<()> {
        let _span = tracing::debug_span!("lower_construct", construct = "section").entered();
        ClauseBuckets::classify(ConstructClass::Section, section.all_clauses(), section.span)?;
        self.cx.builder.set_location(section.span);
        self.scoped(|this| {
            let op = this.cx.builder.build(OpKind::Section).regions(1).finish();
            let body = this.open_body(op, 0, &[], &section.body, section.unstructured)?;
            this.lower_evaluations(&section.body)?;
            if let Some(privatized) = copy_out {
                this.copy_out(privatized);
            }
            this.close_body(&body);
            Ok(())
        })
    }
}
