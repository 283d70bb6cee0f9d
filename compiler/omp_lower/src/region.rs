//! Construct bodies.
//!
//! Every region-carrying construct follows the same shape: create the entry
//! block (with induction-variable arguments for loops), emit the prologue,
//! lower the nested evaluations, emit the epilogue, and make sure every
//! block of the region ends in the construct's terminator.
//!
//! Structured bodies get their terminator up front and are lowered in
//! front of it. Unstructured bodies first get one placeholder block per
//! evaluation that starts a block, so forward branches resolve; whichever
//! blocks are still open after lowering are closed at the end.

use omp_ir::{BlockId, IrType, OpId, OpKind, RegionId};

use crate::context::Lowerer;
use crate::directive::{Directive, EvalKind, Evaluation};
use crate::error::{LowerError, LowerResult};
use crate::host::HostLowering;
use crate::symbol::SymbolTable;

/// An open construct body.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Body {
    pub region: RegionId,
    pub entry: BlockId,
    pub terminator: OpKind,
    pub unstructured: bool,
}

/// Loop operations yield; everything else ends in a plain terminator.
pub(crate) fn terminator_for(kind: OpKind) -> OpKind {
    match kind {
        OpKind::WsLoop | OpKind::SimdLoop => OpKind::Yield,
        _ => OpKind::Terminator,
    }
}

impl<H: HostLowering + ?Sized, S: SymbolTable + ?Sized> Lowerer<'_, H, S> {
    /// Create the entry block of region `index` of `op` and position the
    /// builder for the prologue. `evals` is the body that will be lowered
    /// into the region.
    pub(crate) fn open_body(
        &mut self,
        op: OpId,
        index: usize,
        arg_types: &[IrType],
        evals: &[Evaluation],
        unstructured: bool,
    ) -> LowerResult<Body> {
        let kind = self.cx.builder.module().op(op).kind;
        let region = *self
            .cx
            .builder
            .module()
            .op(op)
            .regions
            .get(index)
            .ok_or_else(|| {
                LowerError::invariant(
                    format!("{} has no region {index}", kind.name()),
                    self.cx.builder.location(),
                )
            })?;
        let entry = self.cx.builder.create_block(region, arg_types);
        let terminator = terminator_for(kind);

        if unstructured {
            self.create_placeholder_blocks(region, evals);
            self.cx.builder.position_at_end(entry);
        } else {
            let term = self.cx.builder.terminate(terminator, &[]);
            self.cx.builder.position_before(term);
        }
        Ok(Body {
            region,
            entry,
            terminator,
            unstructured,
        })
    }

    /// Lower `dir`'s body into the single region of `op`, with no prologue.
    pub(crate) fn lower_plain_body(&mut self, op: OpId, dir: &Directive) -> LowerResult<()> {
        let body = self.open_body(op, 0, &[], &dir.body, dir.unstructured)?;
        self.lower_evaluations(&dir.body)?;
        self.close_body(&body);
        Ok(())
    }

    /// Close every block of an unstructured body that is still open.
    pub(crate) fn close_body(&mut self, body: &Body) {
        if !body.unstructured {
            return;
        }
        let blocks = self.cx.builder.module().region(body.region).blocks.clone();
        for block in blocks {
            if !self.cx.builder.is_terminated(block) {
                self.cx.builder.position_at_end(block);
                self.cx.builder.terminate(body.terminator, &[]);
            }
        }
    }

    /// One block per block-starting evaluation, nested constructs excluded.
    fn create_placeholder_blocks(&mut self, region: RegionId, evals: &[Evaluation]) {
        for eval in evals {
            if eval.starts_block && !self.cx.eval_blocks.contains_key(&eval.id) {
                let block = self.cx.builder.append_block(region, &[]);
                self.cx.eval_blocks.insert(eval.id, block);
            }
            if !matches!(eval.kind, EvalKind::Directive(_)) {
                self.create_placeholder_blocks(region, eval.children());
            }
        }
    }

    // ── Evaluations ─────────────────────────────────────────────────

    pub(crate) fn lower_evaluations(&mut self, evals: &[Evaluation]) -> LowerResult<()> {
        for eval in evals {
            self.lower_evaluation(eval)?;
        }
        Ok(())
    }

    pub(crate) fn lower_evaluation(&mut self, eval: &Evaluation) -> LowerResult<()> {
        if eval.starts_block {
            self.enter_placeholder(eval);
        }
        self.cx.builder.set_location(eval.span);
        match &eval.kind {
            EvalKind::Statement(stmt) => self.host.lower_statement(*stmt, &mut self.cx.env()),
            EvalKind::Loop(l) => self.lower_host_nested(l.header, &l.body),
            EvalKind::Nested { header, body } => self.lower_host_nested(*header, body),
            EvalKind::Directive(dir) => self.lower_construct(dir),
        }
    }

    /// Fall through from the current block into the evaluation's block.
    fn enter_placeholder(&mut self, eval: &Evaluation) {
        let Some(&block) = self.cx.eval_blocks.get(&eval.id) else {
            return;
        };
        let current = self.cx.builder.current_block();
        if current != block && !self.cx.builder.is_terminated(current) {
            self.cx
                .builder
                .build(OpKind::Branch)
                .successor(block)
                .finish();
        }
        self.cx.builder.position_at_end(block);
    }

    fn lower_host_nested(
        &mut self,
        header: crate::directive::StmtRef,
        body: &[Evaluation],
    ) -> LowerResult<()> {
        self.host.enter_nested(header, &mut self.cx.env())?;
        self.lower_evaluations(body)?;
        self.host.exit_nested(header, &mut self.cx.env())
    }
}
