use omp_ir::{verify_module, IrType, OpKind};
use pretty_assertions::assert_eq;

use super::*;
use crate::directive::{AllocateClause, BlockKind, Evaluation};
use crate::options::LowerOptions;
use crate::test_helpers::{directive, Fixture};

fn standalone(kind: StandaloneKind, clauses: Vec<Clause>) -> Directive {
    directive(ConstructKind::Standalone(kind), clauses, Vec::new())
}

fn critical(name: Option<&str>, clauses: Vec<Clause>, body: Vec<Evaluation>) -> Directive {
    directive(
        ConstructKind::Critical {
            name: name.map(str::to_owned),
        },
        clauses,
        body,
    )
}

// ── Standalone ──────────────────────────────────────────────────────

#[test]
fn simple_standalone_constructs() {
    let mut f = Fixture::new();
    f.lower(&standalone(StandaloneKind::Barrier, Vec::new()))
        .unwrap();
    f.lower(&standalone(StandaloneKind::Taskwait, Vec::new()))
        .unwrap();
    f.lower(&standalone(StandaloneKind::Taskyield, Vec::new()))
        .unwrap();

    let body = f.module().body();
    let kinds: Vec<_> = f
        .module()
        .block(body)
        .ops
        .iter()
        .map(|&op| f.module().op(op).kind)
        .collect();
    assert_eq!(kinds, vec![OpKind::Barrier, OpKind::Taskwait, OpKind::Taskyield]);
}

#[test]
fn flush_takes_object_addresses() {
    let mut f = Fixture::new();
    let x = f.var("x", IrType::I32);
    let y = f.var("y", IrType::I64);
    f.lower(&standalone(StandaloneKind::Flush { objects: vec![x, y] }, Vec::new()))
        .unwrap();

    let flush = f.single(OpKind::Flush);
    let expected: Vec<_> = [x, y]
        .iter()
        .map(|&s| f.cx.bindings().lookup(s).unwrap())
        .collect();
    assert_eq!(f.module().op(flush).operands.to_vec(), expected);
}

#[test]
fn flush_without_objects() {
    let mut f = Fixture::new();
    f.lower(&standalone(StandaloneKind::Flush { objects: Vec::new() }, Vec::new()))
        .unwrap();
    assert!(f.module().op(f.single(OpKind::Flush)).operands.is_empty());
}

#[test]
fn target_enter_data_maps() {
    let mut f = Fixture::new();
    let x = f.var("x", IrType::I32);
    let y = f.var("y", IrType::I32);
    let dev = f.host.int(0);
    let dir = standalone(
        StandaloneKind::TargetEnterData,
        vec![
            Clause::Device {
                modifier: crate::directive::DeviceModifier::DeviceNum,
                device: dev,
            },
            Clause::Map(MapClause {
                map_type: Some(MapType::To),
                always: true,
                objects: vec![x],
            }),
            Clause::Map(MapClause {
                map_type: None,
                always: false,
                objects: vec![y],
            }),
            Clause::Nowait,
        ],
    );
    f.lower(&dir).unwrap();

    let op = f.module().op(f.single(OpKind::TargetEnterData));
    assert!(op.operand_group(0).is_empty());
    assert_eq!(op.operand_group(1).len(), 1);
    assert_eq!(op.operand_group(2).len(), 2);
    assert_eq!(
        op.attrs.get(names::MAP_TYPES),
        Some(&Attribute::Array(vec![
            Attribute::MapBits(MapBits::TO | MapBits::ALWAYS),
            Attribute::MapBits(MapBits::TO | MapBits::FROM),
        ]))
    );
    assert!(op.attrs.contains(names::NOWAIT));
}

#[test]
fn device_ancestor_is_unsupported() {
    let mut f = Fixture::new();
    let dev = f.host.int(1);
    let dir = standalone(
        StandaloneKind::TargetExitData,
        vec![Clause::Device {
            modifier: crate::directive::DeviceModifier::Ancestor,
            device: dev,
        }],
    );
    assert!(f.lower(&dir).unwrap_err().is_unsupported());
    assert_eq!(f.count(OpKind::TargetExitData), 0);
}

#[test]
fn map_bits_per_type() {
    let clause = |map_type, always| MapClause {
        map_type,
        always,
        objects: Vec::new(),
    };
    assert_eq!(map_bits(&clause(None, false)), MapBits::TO | MapBits::FROM);
    assert_eq!(map_bits(&clause(Some(MapType::From), false)), MapBits::FROM);
    assert_eq!(map_bits(&clause(Some(MapType::Alloc), false)), MapBits::empty());
    assert_eq!(map_bits(&clause(Some(MapType::Release), true)), MapBits::ALWAYS);
    assert_eq!(map_bits(&clause(Some(MapType::Delete), false)), MapBits::DELETE);
}

#[test]
fn unimplemented_standalone_is_unsupported() {
    let mut f = Fixture::new();
    for kind in [
        StandaloneKind::TargetUpdate,
        StandaloneKind::Ordered,
        StandaloneKind::Cancel,
        StandaloneKind::CancellationPoint,
    ] {
        let err = f.lower(&standalone(kind, Vec::new())).unwrap_err();
        assert!(err.is_unsupported());
    }
    assert!(f.module().walk().is_empty());
}

#[test]
fn section_alone_is_an_invariant_violation() {
    let mut f = Fixture::new();
    let err = f
        .lower(&directive(ConstructKind::Section, Vec::new(), Vec::new()))
        .unwrap_err();
    assert!(matches!(err, LowerError::InvariantViolation { .. }));
}

// ── Critical ────────────────────────────────────────────────────────

#[test]
fn named_critical_declared_once() {
    let mut f = Fixture::new();
    let contended = f.host.int(2);
    let uncontended = f.host.int(1);
    let first = critical(Some("lock"), vec![Clause::Hint(contended)], Vec::new());
    let second = critical(Some("lock"), vec![Clause::Hint(uncontended)], Vec::new());
    f.lower(&first).unwrap();
    f.lower(&second).unwrap();

    assert_eq!(f.count(OpKind::Critical), 2);
    let decl = f.single(OpKind::CriticalDeclare);
    let body = f.module().body();
    assert_eq!(f.module().block(body).ops[0], decl);
    assert_eq!(
        f.module().op(decl).attrs.get(names::HINT),
        Some(&Attribute::SyncHint(SyncHint::CONTENDED))
    );
    for op in f.ops(OpKind::Critical) {
        assert_eq!(
            f.module().op(op).attrs.get(names::NAME),
            Some(&Attribute::SymbolRef("lock".to_owned()))
        );
    }
    assert_eq!(verify_module(f.module()), Ok(()));
}

#[test]
fn distinct_names_get_distinct_declarations() {
    let mut f = Fixture::new();
    f.lower(&critical(Some("a"), Vec::new(), Vec::new()))
        .unwrap();
    f.lower(&critical(Some("b"), Vec::new(), Vec::new()))
        .unwrap();
    assert_eq!(f.count(OpKind::CriticalDeclare), 2);
    assert!(f.module().lookup_symbol(OpKind::CriticalDeclare, "a").is_some());
    assert!(f.module().lookup_symbol(OpKind::CriticalDeclare, "b").is_some());
}

#[test]
fn unnamed_critical_ignores_hint() {
    let mut f = Fixture::new();
    let hint = f.host.int(4);
    let stmt = f.host.stmt(&[]);
    f.lower(&critical(None, vec![Clause::Hint(hint)], vec![stmt]))
        .unwrap();

    assert_eq!(f.count(OpKind::CriticalDeclare), 0);
    let op = f.single(OpKind::Critical);
    assert!(f.module().op(op).attrs.is_empty());
    assert_eq!(
        f.entry_kinds(op),
        vec![OpKind::Generic("host.stmt"), OpKind::Terminator]
    );
}

#[test]
fn negative_hint_is_rejected() {
    let mut f = Fixture::new();
    let hint = f.host.int(-1);
    let err = f
        .lower(&critical(Some("neg"), vec![Clause::Hint(hint)], Vec::new()))
        .unwrap_err();
    assert!(matches!(err, LowerError::InvariantViolation { .. }));
    assert_eq!(f.count(OpKind::CriticalDeclare), 0);
}

// ── Operands ────────────────────────────────────────────────────────

#[test]
fn allocate_without_allocator_uses_default_handle() {
    let mut f = Fixture::with_options(LowerOptions::default().with_default_allocator(5));
    let x = f.var("x", IrType::I32);
    let dir = directive(
        ConstructKind::Block(BlockKind::Taskgroup),
        vec![Clause::Allocate(AllocateClause {
            allocator: None,
            objects: vec![x],
        })],
        Vec::new(),
    );
    f.lower(&dir).unwrap();

    let module = f.module();
    let op = module.op(f.single(OpKind::Taskgroup));
    assert_eq!(op.operand_group(0), &[f.cx.bindings().lookup(x).unwrap()]);
    let allocator = op.operand_group(1)[0];
    let def = module.defining_op(allocator).unwrap();
    assert_eq!(module.op(def).kind, OpKind::Constant);
    assert_eq!(module.op(def).attrs.get(names::VALUE), Some(&Attribute::Int(5)));
    assert_eq!(module.value_type(allocator), &IrType::I32);
}

// ── Rollback ────────────────────────────────────────────────────────

#[test]
fn failing_construct_leaves_no_trace() {
    let mut f = Fixture::new();
    let x = f.var("x", IrType::I32);
    let y = f.var("y", IrType::I32);
    f.lower(&standalone(StandaloneKind::Barrier, Vec::new()))
        .unwrap();
    let before = f.module().walk();

    let bad = directive(ConstructKind::Block(BlockKind::Workshare), Vec::new(), Vec::new());
    let nested = f.host.directive(bad);
    let stmt = f.host.stmt(&[x]);
    let dir = directive(
        ConstructKind::Block(BlockKind::Parallel),
        vec![
            Clause::Private(vec![x]),
            Clause::Reduction {
                op: crate::directive::ReductionOperator::Intrinsic(
                    crate::directive::IntrinsicOperator::Add,
                ),
                objects: vec![y],
            },
        ],
        vec![stmt, nested],
    );
    let critical_dir = critical(Some("named"), Vec::new(), vec![f.host.directive(dir)]);

    let err = f.lower(&critical_dir).unwrap_err();
    assert!(err.is_unsupported());
    assert_eq!(f.module().walk(), before);
    assert!(f.cx.reductions().is_empty());

    // The critical name is free again.
    f.lower(&critical(Some("named"), Vec::new(), Vec::new()))
        .unwrap();
    assert_eq!(f.count(OpKind::CriticalDeclare), 1);
    assert_eq!(verify_module(f.module()), Ok(()));
}
