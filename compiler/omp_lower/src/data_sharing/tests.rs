use omp_ir::{names, verify_module, IrType, OpKind};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::capability::ConstructClass;
use crate::directive::{BlockKind, ConstructKind, Directive, LoopKind};
use crate::symbol::{SymbolArena, SymbolInfo};
use crate::test_helpers::{directive, Fixture, TestHost};

fn plan_for(class: ConstructClass, dir: &Directive) -> SharingPlan {
    let buckets =
        ClauseBuckets::classify(class, dir.all_clauses(), dir.span).unwrap();
    SharingPlan::from_clauses(&buckets)
}

// ── Plans ───────────────────────────────────────────────────────────

#[test]
fn classes_merge_across_clauses() {
    let (a, b, c) = (SymbolId::new(0), SymbolId::new(1), SymbolId::new(2));
    let dir = directive(
        ConstructKind::Loop(LoopKind::Do),
        vec![
            Clause::Private(vec![a]),
            Clause::Firstprivate(vec![b, a]),
            Clause::Lastprivate(vec![b, c]),
        ],
        Vec::new(),
    );
    let plan = plan_for(ConstructClass::Do, &dir);

    assert_eq!(
        plan.entries(),
        &[
            (a, SharingClass::Firstprivate),
            (b, SharingClass::FirstLastprivate),
            (c, SharingClass::Lastprivate),
        ]
    );
    assert!(plan.has_lastprivate());
    assert!(plan.needs_barrier());
}

#[test]
fn barrier_only_for_first_and_last() {
    let (a, b) = (SymbolId::new(0), SymbolId::new(1));
    let dir = directive(
        ConstructKind::Loop(LoopKind::Do),
        vec![Clause::Firstprivate(vec![a]), Clause::Lastprivate(vec![b])],
        Vec::new(),
    );
    let plan = plan_for(ConstructClass::Do, &dir);
    assert!(!plan.needs_barrier());
    assert_eq!(plan.class_of(a), Some(SharingClass::Firstprivate));
    assert_eq!(plan.class_of(SymbolId::new(7)), None);
}

#[test]
fn linear_forces_barrier() {
    let (i, x) = (SymbolId::new(0), SymbolId::new(1));
    let dir = directive(
        ConstructKind::Loop(LoopKind::Do),
        vec![Clause::Linear(crate::directive::LinearClause {
            objects: vec![x],
            step: None,
        })],
        Vec::new(),
    );
    let plan = plan_for(ConstructClass::Do, &dir);
    assert!(plan.is_empty());
    assert!(plan.needs_barrier());
    assert_eq!(plan.class_of(i), None);
}

#[test]
fn default_private_covers_direct_uses_only() {
    let mut symbols = SymbolArena::new();
    let mut host = TestHost::default();
    let x = symbols.push(SymbolInfo::variable("x", IrType::I32));
    let y = symbols.push(SymbolInfo::variable("y", IrType::I32));
    let shared = symbols.push(SymbolInfo::variable("s", IrType::I32));
    let iv = symbols.push(
        SymbolInfo::variable("i", IrType::I32).with_flags(SymbolFlags::PREDETERMINED),
    );
    let tp = symbols.push(
        SymbolInfo::variable("t", IrType::I32).with_flags(SymbolFlags::THREADPRIVATE),
    );
    let blk = symbols.push(SymbolInfo::common_block("blk", 8));

    let inner = directive(
        ConstructKind::Block(BlockKind::Master),
        Vec::new(),
        vec![host.stmt(&[y])],
    );
    let body = vec![
        host.stmt(&[x, shared, iv, tp, blk]),
        host.directive(inner),
        host.stmt(&[x]),
    ];
    let dir = directive(
        ConstructKind::Block(BlockKind::Parallel),
        vec![Clause::Shared(vec![shared])],
        body,
    );

    let mut plan = plan_for(ConstructClass::Parallel, &dir);
    plan.apply_default(DefaultKind::Private, &dir.body, &symbols);
    assert_eq!(plan.entries(), &[(x, SharingClass::Private)]);

    let mut firstprivate = plan_for(ConstructClass::Parallel, &dir);
    firstprivate.apply_default(DefaultKind::Firstprivate, &dir.body, &symbols);
    assert_eq!(firstprivate.entries(), &[(x, SharingClass::Firstprivate)]);

    let mut shared_default = plan_for(ConstructClass::Parallel, &dir);
    shared_default.apply_default(DefaultKind::Shared, &dir.body, &symbols);
    assert!(shared_default.is_empty());
}

#[test]
fn symbol_flags_refine_the_plan() {
    let mut symbols = SymbolArena::new();
    let iv = symbols.push(
        SymbolInfo::variable("i", IrType::I32).with_flags(SymbolFlags::PREDETERMINED),
    );
    let a = symbols.push(
        SymbolInfo::variable("a", IrType::I32).with_flags(SymbolFlags::FIRST_PRIVATE),
    );
    let b = symbols.push(
        SymbolInfo::variable("b", IrType::I32).with_flags(SymbolFlags::LAST_PRIVATE),
    );
    let dir = directive(
        ConstructKind::Loop(LoopKind::Do),
        vec![Clause::Private(vec![iv, a]), Clause::Firstprivate(vec![b])],
        Vec::new(),
    );

    let mut plan = plan_for(ConstructClass::Do, &dir);
    assert!(!plan.needs_barrier());
    plan.apply_symbol_flags(&symbols);
    assert_eq!(
        plan.entries(),
        &[
            (a, SharingClass::Firstprivate),
            (b, SharingClass::FirstLastprivate),
        ]
    );
    assert!(plan.needs_barrier());
}

#[test]
fn direct_uses_in_first_reference_order() {
    let mut host = TestHost::default();
    let (a, b, c, d, e) = (
        SymbolId::new(0),
        SymbolId::new(1),
        SymbolId::new(2),
        SymbolId::new(3),
        SymbolId::new(4),
    );
    let nested_dir = directive(
        ConstructKind::Block(BlockKind::Master),
        Vec::new(),
        vec![host.stmt(&[d])],
    );
    let loop_body = vec![host.stmt(&[b, a])];
    let nested_body = vec![host.stmt(&[e, a])];
    let evals = vec![
        host.stmt(&[b]),
        host.counted(c, 1, 4, loop_body),
        host.directive(nested_dir),
        host.nested(nested_body),
        host.stmt(&[a, b]),
    ];
    assert_eq!(direct_uses(&evals), vec![b, c, a, e]);
}

// ── Lowering ────────────────────────────────────────────────────────

#[test]
fn private_clone_has_no_copy() {
    let mut f = Fixture::new();
    let x = f.var("x", IrType::I32);
    let body = vec![f.host.stmt(&[x])];
    let dir = directive(
        ConstructKind::Block(BlockKind::Parallel),
        vec![Clause::Private(vec![x])],
        body,
    );
    f.lower(&dir).unwrap();

    let par = f.single(OpKind::Parallel);
    assert_eq!(
        f.entry_kinds(par),
        vec![OpKind::Alloca, OpKind::Generic("host.stmt"), OpKind::Terminator]
    );
    assert_eq!(verify_module(f.module()), Ok(()));
}

#[test]
fn firstprivate_copies_after_all_clones() {
    let mut f = Fixture::new();
    let x = f.var("x", IrType::I32);
    let y = f.var("y", IrType::Float(64));
    let dir = directive(
        ConstructKind::Block(BlockKind::Parallel),
        vec![Clause::Firstprivate(vec![x, y])],
        Vec::new(),
    );
    f.lower(&dir).unwrap();

    let par = f.single(OpKind::Parallel);
    assert_eq!(
        f.entry_kinds(par),
        vec![
            OpKind::Alloca,
            OpKind::Alloca,
            OpKind::Load,
            OpKind::Store,
            OpKind::Load,
            OpKind::Store,
            OpKind::Terminator,
        ]
    );
    assert_eq!(f.count(OpKind::Barrier), 0);
}

#[test]
fn clone_is_scoped_to_the_construct() {
    let mut f = Fixture::new();
    let x = f.var("x", IrType::I32);
    let original = f.cx.bindings().lookup(x);
    let dir = directive(
        ConstructKind::Block(BlockKind::Parallel),
        vec![Clause::Private(vec![x])],
        Vec::new(),
    );
    f.lower(&dir).unwrap();
    assert_eq!(f.cx.bindings().lookup(x), original);
}

#[test]
fn default_firstprivate_lowers_copy_in() {
    let mut f = Fixture::new();
    let x = f.var("x", IrType::I32);
    let body = vec![f.host.stmt(&[x])];
    let dir = directive(
        ConstructKind::Block(BlockKind::Task),
        vec![Clause::Default(DefaultKind::Firstprivate)],
        body,
    );
    f.lower(&dir).unwrap();

    let task = f.single(OpKind::Task);
    assert_eq!(
        f.entry_kinds(task),
        vec![
            OpKind::Alloca,
            OpKind::Load,
            OpKind::Store,
            OpKind::Generic("host.stmt"),
            OpKind::Terminator,
        ]
    );
}

#[test]
fn predetermined_loop_variable_is_not_cloned() {
    let mut f = Fixture::new();
    let i = f.declare(
        SymbolInfo::variable("i", IrType::I32).with_flags(SymbolFlags::PREDETERMINED),
    );
    let stmt = f.host.stmt(&[i]);
    let nest = f.host.counted(i, 1, 8, vec![stmt]);
    let dir = directive(
        ConstructKind::Loop(LoopKind::Do),
        vec![Clause::Private(vec![i])],
        vec![nest],
    );
    f.lower(&dir).unwrap();

    let wsloop = f.single(OpKind::WsLoop);
    let module = f.module();
    let entry = module.entry_block(wsloop, 0).unwrap();
    let temp = module.block(entry).ops[0];
    assert_eq!(module.op(temp).kind, OpKind::Alloca);
    assert!(module.op(temp).attrs.contains(names::ADAPT_VALUE_BY_REF));
    // The declared storage plus the induction temporary.
    assert_eq!(f.count(OpKind::Alloca), 2);
}

fn first_and_last_loop(k: usize) -> Fixture {
    let mut f = Fixture::new();
    let i = f.var("i", IrType::I32);
    let vars: Vec<_> = (0..k).map(|n| f.var(&format!("v{n}"), IrType::I32)).collect();
    let stmt = f.host.stmt(&vars);
    let nest = f.host.counted(i, 1, 100, vec![stmt]);
    let dir = directive(
        ConstructKind::Loop(LoopKind::Do),
        vec![
            Clause::Firstprivate(vars.clone()),
            Clause::Lastprivate(vars),
        ],
        vec![nest],
    );
    f.lower(&dir).unwrap();
    f
}

#[test]
fn lastprivate_copy_back_is_guarded_once() {
    let f = first_and_last_loop(3);
    let guard = f.single(OpKind::If);
    let module = f.module();

    let compare = module.op(guard).operands[0];
    let cmp = module.defining_op(compare).unwrap();
    assert_eq!(module.op(cmp).kind, OpKind::CmpI);

    let stores_in_guard: Vec<_> = f
        .entry_kinds(guard)
        .into_iter()
        .filter(|k| *k == OpKind::Store)
        .collect();
    assert_eq!(stores_in_guard.len(), 3);
    assert_eq!(verify_module(module), Ok(()));
}

#[test]
fn loop_prologue_runs_once_before_the_loop() {
    let f = first_and_last_loop(2);
    let module = f.module();
    let barrier = f.single(OpKind::Barrier);
    let wsloop = f.single(OpKind::WsLoop);

    let block = module.op(barrier).parent.unwrap();
    assert_eq!(module.parent_op(block), None);
    assert_eq!(module.op(wsloop).parent, Some(block));
    let position = |op| module.block(block).ops.iter().position(|&o| o == op);
    assert!(position(barrier) < position(wsloop));

    let kinds = f.entry_kinds(wsloop);
    assert!(!kinds.contains(&OpKind::Barrier), "{kinds:?}");
    assert!(!kinds.contains(&OpKind::Load), "{kinds:?}");
    assert_eq!(kinds.iter().filter(|k| **k == OpKind::Alloca).count(), 1);

    let guard = f.single(OpKind::If);
    let guard_block = module.op(guard).parent.unwrap();
    assert_eq!(module.parent_op(guard_block), Some(wsloop));
    assert_eq!(verify_module(module), Ok(()));
}

proptest! {
    #[test]
    fn one_barrier_one_compare_one_guard(k in 1usize..6) {
        let f = first_and_last_loop(k);
        prop_assert_eq!(f.count(OpKind::Barrier), 1);
        prop_assert_eq!(f.count(OpKind::CmpI), 1);
        prop_assert_eq!(f.count(OpKind::If), 1);
    }
}
