use omp_ir::{verify_module, OpId};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::directive::{ConstructKind, EvalId, StmtRef};
use crate::error::Severity;
use crate::options::LowerOptions;
use crate::test_helpers::{directive, Fixture};

fn schedule(first: Option<ScheduleModifier>, second: Option<ScheduleModifier>) -> ScheduleClause {
    ScheduleClause {
        kind: ScheduleKind::Dynamic,
        modifiers: [first, second],
        chunk: None,
    }
}

/// `do` over a perfect nest of `depth` loops with `clauses`.
fn nest(f: &mut Fixture, depth: usize, kind: LoopKind, clauses: Vec<Clause>) -> Directive {
    let vars: Vec<_> = (0..depth)
        .map(|n| f.var(&format!("i{n}"), IrType::I32))
        .collect();
    let mut body = vec![f.host.stmt(&vars)];
    for (n, &var) in vars.iter().enumerate().rev() {
        let upper = 10 * (i64::try_from(n).unwrap() + 1);
        body = vec![f.host.counted(var, 1, upper, body)];
    }
    directive(ConstructKind::Loop(kind), clauses, body)
}

fn attr(f: &Fixture, op: OpId, name: &str) -> Option<Attribute> {
    f.module().op(op).attrs.get(name).cloned()
}

// ── Schedule ────────────────────────────────────────────────────────

#[test]
fn schedule_modifier_order_is_irrelevant() {
    let simd_first = resolve_schedule(&schedule(
        Some(ScheduleModifier::Simd),
        Some(ScheduleModifier::Monotonic),
    ));
    let simd_second = resolve_schedule(&schedule(
        Some(ScheduleModifier::Monotonic),
        Some(ScheduleModifier::Simd),
    ));
    assert_eq!(simd_first, simd_second);
    assert!(simd_first.simd);
    assert_eq!(simd_first.monotonicity, Some(ScheduleModifier::Monotonic));
}

#[test]
fn schedule_without_simd() {
    let only_second = resolve_schedule(&schedule(None, Some(ScheduleModifier::Nonmonotonic)));
    assert!(!only_second.simd);
    assert_eq!(only_second.monotonicity, Some(ScheduleModifier::Nonmonotonic));

    let bare = resolve_schedule(&schedule(None, None));
    assert_eq!(bare.kind, ScheduleKind::Dynamic);
    assert!(!bare.simd);
    assert_eq!(bare.monotonicity, None);

    let simd_only = resolve_schedule(&schedule(Some(ScheduleModifier::Simd), None));
    assert!(simd_only.simd);
    assert_eq!(simd_only.monotonicity, None);
}

// ── Induction type ──────────────────────────────────────────────────

#[test]
fn induction_type_widths() {
    assert_eq!(induction_type([8, 32]).ty, IrType::I32);
    assert_eq!(induction_type([32, 64]).ty, IrType::I64);
    assert_eq!(induction_type(std::iter::empty()).ty, IrType::I32);
    assert_eq!(
        induction_type([32, 128]),
        InductionType {
            ty: IrType::I64,
            narrowed_from: Some(128),
        }
    );
}

#[test]
fn wide_loop_variable_warns() {
    let mut f = Fixture::new();
    let i = f.var("i", IrType::Int(128));
    let stmt = f.host.stmt(&[i]);
    let body = vec![f.host.counted(i, 1, 8, vec![stmt])];
    f.lower(&directive(ConstructKind::Loop(LoopKind::Do), Vec::new(), body))
        .unwrap();

    let diagnostics = f.cx.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    let ws = f.single(OpKind::WsLoop);
    let entry = f.module().entry_block(ws, 0).unwrap();
    let arg = f.module().block(entry).args[0];
    assert_eq!(f.module().value_type(arg), &IrType::I64);
}

#[test]
fn wide_loop_variable_can_be_refused() {
    let options = LowerOptions::default().with_narrowing(NarrowingPolicy::Error);
    let mut f = Fixture::with_options(options);
    let i = f.var("i", IrType::Int(128));
    let body = vec![f.host.counted(i, 1, 8, Vec::new())];
    let err = f
        .lower(&directive(ConstructKind::Loop(LoopKind::Do), Vec::new(), body))
        .unwrap_err();
    assert!(err.is_unsupported());
    assert!(f.cx.diagnostics().is_empty());
}

// ── Worksharing loop ────────────────────────────────────────────────

#[test]
fn simple_do() {
    let mut f = Fixture::new();
    let dir = nest(&mut f, 1, LoopKind::Do, vec![Clause::Nowait]);
    f.lower(&dir).unwrap();

    let ws = f.single(OpKind::WsLoop);
    assert_eq!(attr(&f, ws, names::COLLAPSE), Some(Attribute::Int(1)));
    assert_eq!(attr(&f, ws, names::INCLUSIVE), Some(Attribute::Unit));
    assert_eq!(attr(&f, ws, names::NOWAIT), Some(Attribute::Unit));
    assert_eq!(attr(&f, ws, names::REDUCTIONS), Some(Attribute::Array(Vec::new())));
    assert_eq!(attr(&f, ws, names::SCHEDULE), None);
    assert_eq!(
        f.entry_kinds(ws),
        vec![
            OpKind::Alloca,
            OpKind::Store,
            OpKind::Generic("host.stmt"),
            OpKind::Yield,
        ]
    );

    let module = f.module();
    let entry = module.entry_block(ws, 0).unwrap();
    let temp = module.block(entry).ops[0];
    assert!(module.op(temp).attrs.contains(names::ADAPT_VALUE_BY_REF));
    // The step defaults to a constant one.
    let step = module.op(ws).operand_group(2)[0];
    let def = module.defining_op(step).unwrap();
    assert_eq!(module.op(def).attrs.get(names::VALUE), Some(&Attribute::Int(1)));
    assert_eq!(verify_module(module), Ok(()));
}

#[test]
fn privatized_loop_variable_reuses_clone() {
    let mut f = Fixture::new();
    let i = f.var("i", IrType::I32);
    let stmt = f.host.stmt(&[i]);
    let body = vec![f.host.counted(i, 1, 8, vec![stmt])];
    f.lower(&directive(
        ConstructKind::Loop(LoopKind::Do),
        vec![Clause::Private(vec![i])],
        body,
    ))
    .unwrap();

    let ws = f.single(OpKind::WsLoop);
    assert_eq!(
        f.entry_kinds(ws),
        vec![OpKind::Store, OpKind::Generic("host.stmt"), OpKind::Yield]
    );
    let module = f.module();
    let clone = module.op(ws).parent.and_then(|block| {
        let ops = &module.block(block).ops;
        let at = ops.iter().position(|&o| o == ws)?;
        ops[..at].last().copied()
    });
    let clone = clone.unwrap();
    assert_eq!(module.op(clone).kind, OpKind::Alloca);
    assert!(!module.op(clone).attrs.contains(names::ADAPT_VALUE_BY_REF));
    let entry = module.entry_block(ws, 0).unwrap();
    let store = module.op(module.block(entry).ops[0]);
    assert_eq!(store.operands[1], module.op(clone).results[0]);
}

#[test]
fn schedule_and_ordered_attributes() {
    let mut f = Fixture::new();
    let chunk = f.host.int(4);
    let depth = f.host.int(1);
    let dir = nest(
        &mut f,
        1,
        LoopKind::Do,
        vec![
            Clause::Schedule(ScheduleClause {
                kind: ScheduleKind::Guided,
                modifiers: [Some(ScheduleModifier::Monotonic), Some(ScheduleModifier::Simd)],
                chunk: Some(chunk),
            }),
            Clause::Ordered(Some(depth)),
        ],
    );
    f.lower(&dir).unwrap();

    let ws = f.single(OpKind::WsLoop);
    assert_eq!(
        attr(&f, ws, names::SCHEDULE),
        Some(Attribute::ScheduleKind(ScheduleKind::Guided))
    );
    assert_eq!(
        attr(&f, ws, names::SCHEDULE_MODIFIER),
        Some(Attribute::ScheduleModifier(ScheduleModifier::Monotonic))
    );
    assert_eq!(attr(&f, ws, names::SIMD_MODIFIER), Some(Attribute::Unit));
    assert_eq!(attr(&f, ws, names::ORDERED), Some(Attribute::Int(1)));
    assert_eq!(f.module().op(ws).operand_group(6).len(), 1);
}

#[test]
fn runtime_chunk_is_an_operand() {
    let mut f = Fixture::new();
    let chunk = f.host.opaque(IrType::I32);
    let dir = nest(
        &mut f,
        1,
        LoopKind::Do,
        vec![Clause::Schedule(ScheduleClause {
            kind: ScheduleKind::Dynamic,
            modifiers: [None, None],
            chunk: Some(chunk),
        })],
    );
    f.lower(&dir).unwrap();

    let ws = f.single(OpKind::WsLoop);
    let module = f.module();
    let chunk = module.op(ws).operand_group(6);
    assert_eq!(chunk.len(), 1);
    let def = module.defining_op(chunk[0]).unwrap();
    assert_eq!(module.op(def).kind, OpKind::Generic("host.opaque"));
}

#[test]
fn bare_ordered_is_zero() {
    let mut f = Fixture::new();
    let dir = nest(&mut f, 1, LoopKind::Do, vec![Clause::Ordered(None)]);
    f.lower(&dir).unwrap();
    let ws = f.single(OpKind::WsLoop);
    assert_eq!(attr(&f, ws, names::ORDERED), Some(Attribute::Int(0)));
}

#[test]
fn reduction_accumulates_privately() {
    let mut f = Fixture::new();
    let s = f.var("s", IrType::I32);
    let dir = nest(
        &mut f,
        1,
        LoopKind::Do,
        vec![Clause::Reduction {
            op: crate::directive::ReductionOperator::Intrinsic(
                crate::directive::IntrinsicOperator::Add,
            ),
            objects: vec![s],
        }],
    );
    f.lower(&dir).unwrap();

    let ws = f.single(OpKind::WsLoop);
    assert_eq!(
        attr(&f, ws, names::REDUCTIONS),
        Some(Attribute::Array(vec![Attribute::SymbolRef(
            "add_reduction_i_32".to_owned()
        )]))
    );
    let original = f.cx.bindings().lookup(s).unwrap();
    assert_eq!(f.module().op(ws).operand_group(5), &[original]);
    assert_eq!(
        f.entry_kinds(ws),
        vec![
            OpKind::Alloca,
            OpKind::Store,
            OpKind::Alloca,
            OpKind::Constant,
            OpKind::Store,
            OpKind::Generic("host.stmt"),
            OpKind::Load,
            OpKind::Reduction,
            OpKind::Yield,
        ]
    );
    let contribution = f.module().op(f.single(OpKind::Reduction));
    assert_eq!(contribution.operands[1], original);
    assert_eq!(f.count(OpKind::ReductionDeclare), 1);
    assert_eq!(verify_module(f.module()), Ok(()));
}

#[test]
fn linear_without_step_uses_one() {
    let mut f = Fixture::new();
    let x = f.var("x", IrType::I32);
    let dir = nest(
        &mut f,
        1,
        LoopKind::Do,
        vec![Clause::Linear(LinearClause {
            objects: vec![x],
            step: None,
        })],
    );
    f.lower(&dir).unwrap();

    let module = f.module();
    let ws = module.op(f.single(OpKind::WsLoop));
    assert_eq!(ws.operand_group(3), &[f.cx.bindings().lookup(x).unwrap()]);
    let step = ws.operand_group(4)[0];
    let def = module.defining_op(step).unwrap();
    assert_eq!(module.op(def).attrs.get(names::VALUE), Some(&Attribute::Int(1)));
    assert_eq!(f.count(OpKind::Barrier), 1);
}

#[test]
fn collapse_with_lastprivate_is_unsupported() {
    let mut f = Fixture::new();
    let x = f.var("x", IrType::I32);
    let two = f.host.int(2);
    let dir = nest(
        &mut f,
        2,
        LoopKind::Do,
        vec![Clause::Collapse(two), Clause::Lastprivate(vec![x])],
    );
    assert!(f.lower(&dir).unwrap_err().is_unsupported());
    assert_eq!(f.count(OpKind::WsLoop), 0);
}

#[test]
fn collapse_deeper_than_nest() {
    let mut f = Fixture::new();
    let three = f.host.int(3);
    let dir = nest(&mut f, 2, LoopKind::Do, vec![Clause::Collapse(three)]);
    let err = f.lower(&dir).unwrap_err();
    assert!(matches!(err, LowerError::InvariantViolation { .. }));
}

#[test]
fn collapse_must_be_positive() {
    let mut f = Fixture::new();
    let zero = f.host.int(0);
    let dir = nest(&mut f, 1, LoopKind::Do, vec![Clause::Collapse(zero)]);
    let err = f.lower(&dir).unwrap_err();
    assert!(matches!(err, LowerError::InvariantViolation { .. }));
}

#[test]
fn loop_without_bounds_is_rejected() {
    let mut f = Fixture::new();
    let i = f.var("i", IrType::I32);
    let unbounded = Evaluation::new(
        EvalId::new(99),
        EvalKind::Loop(CountedLoop {
            header: StmtRef::new(99),
            var: i,
            bounds: None,
            body: Vec::new(),
        }),
    );
    let err = f
        .lower(&directive(ConstructKind::Loop(LoopKind::Do), Vec::new(), vec![unbounded]))
        .unwrap_err();
    assert!(matches!(err, LowerError::InvariantViolation { .. }));
}

#[test]
fn combined_constructs_without_lowering() {
    for kind in [
        LoopKind::DoSimd,
        LoopKind::ParallelDoSimd,
        LoopKind::Distribute,
        LoopKind::Taskloop,
    ] {
        let mut f = Fixture::new();
        let dir = nest(&mut f, 1, kind, Vec::new());
        assert!(f.lower(&dir).unwrap_err().is_unsupported());
    }
}

proptest! {
    #[test]
    fn collapse_produces_one_triple_per_level(depth in 1usize..5) {
        let mut f = Fixture::new();
        let count = i64::try_from(depth).unwrap();
        let n = f.host.int(count);
        let dir = nest(&mut f, depth, LoopKind::Do, vec![Clause::Collapse(n)]);
        f.lower(&dir).unwrap();

        let ws = f.single(OpKind::WsLoop);
        let module = f.module();
        let op = module.op(ws);
        prop_assert_eq!(op.operand_group(0).len(), depth);
        prop_assert_eq!(op.operand_group(1).len(), depth);
        prop_assert_eq!(op.operand_group(2).len(), depth);
        let collapse = Attribute::Int(count);
        prop_assert_eq!(op.attrs.get(names::COLLAPSE), Some(&collapse));
        let entry = module.entry_block(ws, 0).unwrap();
        prop_assert_eq!(module.block(entry).args.len(), depth);
        // Upper bounds keep nest order, outermost first.
        for (level, &ub) in op.operand_group(1).iter().enumerate() {
            let def = module.defining_op(ub).unwrap();
            let expected = Attribute::Int(10 * (i64::try_from(level).unwrap() + 1));
            prop_assert_eq!(module.op(def).attrs.get(names::VALUE), Some(&expected));
        }
        prop_assert_eq!(verify_module(module), Ok(()));
    }
}

// ── SIMD and combined loops ─────────────────────────────────────────

#[test]
fn simd_loop_parameters() {
    let mut f = Fixture::new();
    let simdlen = f.host.int(8);
    let safelen = f.host.int(16);
    let cond = f.host.typed_int(IrType::Logical(4), 1);
    let dir = nest(
        &mut f,
        1,
        LoopKind::Simd,
        vec![
            Clause::Simdlen(simdlen),
            Clause::Safelen(safelen),
            Clause::If(cond),
        ],
    );
    f.lower(&dir).unwrap();

    let simd = f.single(OpKind::SimdLoop);
    assert_eq!(attr(&f, simd, names::SIMDLEN), Some(Attribute::Int(8)));
    assert_eq!(attr(&f, simd, names::SAFELEN), Some(Attribute::Int(16)));
    let module = f.module();
    let if_operand = module.op(simd).operand_group(3);
    assert_eq!(if_operand.len(), 1);
    assert_eq!(module.value_type(if_operand[0]), &IrType::I1);
    assert_eq!(f.entry_kinds(simd).last(), Some(&OpKind::Yield));
    assert_eq!(verify_module(module), Ok(()));
}

#[test]
fn simdlen_must_be_constant() {
    let mut f = Fixture::new();
    let simdlen = f.host.opaque(IrType::I32);
    let dir = nest(&mut f, 1, LoopKind::Simd, vec![Clause::Simdlen(simdlen)]);
    let err = f.lower(&dir).unwrap_err();
    assert!(matches!(err, LowerError::InvariantViolation { .. }), "{err}");
    assert_eq!(f.count(OpKind::SimdLoop), 0);
}

#[test]
fn parallel_do_splits_clauses() {
    let mut f = Fixture::new();
    let x = f.var("x", IrType::I32);
    let threads = f.host.int(4);
    let dir = nest(
        &mut f,
        1,
        LoopKind::ParallelDo,
        vec![Clause::NumThreads(threads), Clause::Private(vec![x])],
    );
    f.lower(&dir).unwrap();

    let par = f.single(OpKind::Parallel);
    let ws = f.single(OpKind::WsLoop);
    let module = f.module();
    assert_eq!(module.op(par).operand_group(1).len(), 1);
    assert_eq!(module.parent_op(module.op(ws).parent.unwrap()), Some(par));
    // The clone of x sits in the parallel region, ahead of the loop.
    let par_kinds = f.entry_kinds(par);
    let clone_at = par_kinds.iter().position(|k| *k == OpKind::Alloca);
    let loop_at = par_kinds.iter().position(|k| *k == OpKind::WsLoop);
    assert!(clone_at.is_some() && clone_at < loop_at, "{par_kinds:?}");
    // Only the induction temporary is allocated per iteration.
    let temps = f
        .entry_kinds(ws)
        .into_iter()
        .filter(|k| *k == OpKind::Alloca)
        .count();
    assert_eq!(temps, 1);
    assert_eq!(verify_module(module), Ok(()));
}
