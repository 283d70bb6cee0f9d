//! Construct × clause capability table.
//!
//! Every (construct class, clause kind) pair maps to a [`Support`] level.
//! The classifier consults the table once per clause before any IR is
//! emitted, so an unimplemented clause always fails the same way and never
//! leaves partial output behind.

use crate::directive::{
    AtomicForm, BlockKind, ClauseKind, ConstructKind, LoopKind, StandaloneKind,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstructClass {
    Barrier,
    Taskwait,
    Taskyield,
    Flush,
    TargetData,
    TargetEnterData,
    TargetExitData,
    TargetUpdate,
    OrderedStandalone,
    Cancel,
    CancellationPoint,
    Parallel,
    Master,
    Single,
    OrderedBlock,
    Task,
    Taskgroup,
    Target,
    Workshare,
    Do,
    Simd,
    ParallelDo,
    DoSimd,
    ParallelDoSimd,
    Distribute,
    Taskloop,
    Sections,
    ParallelSections,
    Section,
    Critical,
    AtomicRead,
    AtomicWrite,
    AtomicUpdate,
    AtomicCapture,
}

impl ConstructClass {
    pub fn of(kind: &ConstructKind) -> Self {
        match kind {
            ConstructKind::Standalone(s) => match s {
                StandaloneKind::Barrier => ConstructClass::Barrier,
                StandaloneKind::Taskwait => ConstructClass::Taskwait,
                StandaloneKind::Taskyield => ConstructClass::Taskyield,
                StandaloneKind::Flush { .. } => ConstructClass::Flush,
                StandaloneKind::TargetEnterData => ConstructClass::TargetEnterData,
                StandaloneKind::TargetExitData => ConstructClass::TargetExitData,
                StandaloneKind::TargetUpdate => ConstructClass::TargetUpdate,
                StandaloneKind::Ordered => ConstructClass::OrderedStandalone,
                StandaloneKind::Cancel => ConstructClass::Cancel,
                StandaloneKind::CancellationPoint => ConstructClass::CancellationPoint,
            },
            ConstructKind::Block(b) => match b {
                BlockKind::Parallel => ConstructClass::Parallel,
                BlockKind::Master => ConstructClass::Master,
                BlockKind::Single => ConstructClass::Single,
                BlockKind::Ordered => ConstructClass::OrderedBlock,
                BlockKind::Task => ConstructClass::Task,
                BlockKind::Taskgroup => ConstructClass::Taskgroup,
                BlockKind::TargetData => ConstructClass::TargetData,
                BlockKind::Target => ConstructClass::Target,
                BlockKind::Workshare => ConstructClass::Workshare,
            },
            ConstructKind::Loop(l) => match l {
                LoopKind::Do => ConstructClass::Do,
                LoopKind::Simd => ConstructClass::Simd,
                LoopKind::ParallelDo => ConstructClass::ParallelDo,
                LoopKind::DoSimd => ConstructClass::DoSimd,
                LoopKind::ParallelDoSimd => ConstructClass::ParallelDoSimd,
                LoopKind::Distribute => ConstructClass::Distribute,
                LoopKind::Taskloop => ConstructClass::Taskloop,
            },
            ConstructKind::Sections { parallel: false } => ConstructClass::Sections,
            ConstructKind::Sections { parallel: true } => ConstructClass::ParallelSections,
            ConstructKind::Section => ConstructClass::Section,
            ConstructKind::Critical { .. } => ConstructClass::Critical,
            ConstructKind::Atomic(a) => match a.form {
                AtomicForm::Read => ConstructClass::AtomicRead,
                AtomicForm::Write => ConstructClass::AtomicWrite,
                AtomicForm::Update | AtomicForm::Bare => ConstructClass::AtomicUpdate,
                AtomicForm::Capture => ConstructClass::AtomicCapture,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ConstructClass::Barrier => "barrier",
            ConstructClass::Taskwait => "taskwait",
            ConstructClass::Taskyield => "taskyield",
            ConstructClass::Flush => "flush",
            ConstructClass::TargetData => "target data",
            ConstructClass::TargetEnterData => "target enter data",
            ConstructClass::TargetExitData => "target exit data",
            ConstructClass::TargetUpdate => "target update",
            ConstructClass::OrderedStandalone => "ordered (standalone)",
            ConstructClass::Cancel => "cancel",
            ConstructClass::CancellationPoint => "cancellation point",
            ConstructClass::Parallel => "parallel",
            ConstructClass::Master => "master",
            ConstructClass::Single => "single",
            ConstructClass::OrderedBlock => "ordered",
            ConstructClass::Task => "task",
            ConstructClass::Taskgroup => "taskgroup",
            ConstructClass::Target => "target",
            ConstructClass::Workshare => "workshare",
            ConstructClass::Do => "do",
            ConstructClass::Simd => "simd",
            ConstructClass::ParallelDo => "parallel do",
            ConstructClass::DoSimd => "do simd",
            ConstructClass::ParallelDoSimd => "parallel do simd",
            ConstructClass::Distribute => "distribute",
            ConstructClass::Taskloop => "taskloop",
            ConstructClass::Sections => "sections",
            ConstructClass::ParallelSections => "parallel sections",
            ConstructClass::Section => "section",
            ConstructClass::Critical => "critical",
            ConstructClass::AtomicRead => "atomic read",
            ConstructClass::AtomicWrite => "atomic write",
            ConstructClass::AtomicUpdate => "atomic update",
            ConstructClass::AtomicCapture => "atomic capture",
        }
    }

    /// Whether the construct itself has a lowering.
    pub fn is_implemented(self) -> bool {
        !matches!(
            self,
            ConstructClass::TargetUpdate
                | ConstructClass::OrderedStandalone
                | ConstructClass::Cancel
                | ConstructClass::CancellationPoint
                | ConstructClass::Target
                | ConstructClass::Workshare
                | ConstructClass::DoSimd
                | ConstructClass::ParallelDoSimd
                | ConstructClass::Distribute
                | ConstructClass::Taskloop
                | ConstructClass::AtomicCapture
        )
    }

    /// Whether the construct is a loop construct.
    pub fn is_loop(self) -> bool {
        matches!(
            self,
            ConstructClass::Do | ConstructClass::Simd | ConstructClass::ParallelDo
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Support {
    /// The clause contributes IR.
    Lowered,
    /// The clause is accepted and has no effect on the emitted IR.
    Ignored,
    Unsupported,
}

/// Clauses a `parallel` consumes, alone or as the outer half of a
/// combined construct.
const PARALLEL_CLAUSES: &[ClauseKind] = &[
    ClauseKind::If,
    ClauseKind::NumThreads,
    ClauseKind::ProcBind,
    ClauseKind::Allocate,
    ClauseKind::Private,
    ClauseKind::Firstprivate,
    ClauseKind::Shared,
    ClauseKind::Default,
    ClauseKind::Copyin,
    ClauseKind::Reduction,
];

const DO_CLAUSES: &[ClauseKind] = &[
    ClauseKind::Private,
    ClauseKind::Firstprivate,
    ClauseKind::Lastprivate,
    ClauseKind::Shared,
    ClauseKind::Default,
    ClauseKind::Reduction,
    ClauseKind::Schedule,
    ClauseKind::Collapse,
    ClauseKind::Ordered,
    ClauseKind::Linear,
    ClauseKind::Nowait,
];

const SIMD_CLAUSES: &[ClauseKind] = &[
    ClauseKind::Private,
    ClauseKind::Collapse,
    ClauseKind::If,
    ClauseKind::Simdlen,
    ClauseKind::Safelen,
];

const SECTIONS_CLAUSES: &[ClauseKind] = &[
    ClauseKind::Private,
    ClauseKind::Firstprivate,
    ClauseKind::Lastprivate,
    ClauseKind::Shared,
    ClauseKind::Default,
    ClauseKind::Allocate,
    ClauseKind::Nowait,
];

const SINGLE_CLAUSES: &[ClauseKind] = &[
    ClauseKind::Allocate,
    ClauseKind::Private,
    ClauseKind::Firstprivate,
    ClauseKind::Nowait,
];

const TASK_CLAUSES: &[ClauseKind] = &[
    ClauseKind::If,
    ClauseKind::Final,
    ClauseKind::Untied,
    ClauseKind::Mergeable,
    ClauseKind::Priority,
    ClauseKind::Allocate,
    ClauseKind::Private,
    ClauseKind::Firstprivate,
    ClauseKind::Shared,
    ClauseKind::Default,
];

const TARGET_DATA_CLAUSES: &[ClauseKind] = &[ClauseKind::If, ClauseKind::Device, ClauseKind::Map];

const TARGET_ENTER_EXIT_CLAUSES: &[ClauseKind] = &[
    ClauseKind::If,
    ClauseKind::Device,
    ClauseKind::Map,
    ClauseKind::Nowait,
];

const ATOMIC_CLAUSES: &[ClauseKind] = &[ClauseKind::Hint, ClauseKind::MemoryOrder];

/// Support level of `clause` on `construct`.
pub fn clause_support(construct: ConstructClass, clause: ClauseKind) -> Support {
    let lowered: &[ClauseKind] = match construct {
        ConstructClass::Parallel => PARALLEL_CLAUSES,
        ConstructClass::Do => DO_CLAUSES,
        ConstructClass::Simd => SIMD_CLAUSES,
        ConstructClass::ParallelDo => {
            if (PARALLEL_CLAUSES.contains(&clause) && clause != ClauseKind::Allocate)
                || DO_CLAUSES.contains(&clause)
            {
                return Support::Lowered;
            }
            &[]
        }
        ConstructClass::Sections => SECTIONS_CLAUSES,
        ConstructClass::ParallelSections => {
            if (PARALLEL_CLAUSES.contains(&clause) && clause != ClauseKind::Reduction)
                || SECTIONS_CLAUSES.contains(&clause)
            {
                return Support::Lowered;
            }
            &[]
        }
        ConstructClass::Single => SINGLE_CLAUSES,
        ConstructClass::Task => TASK_CLAUSES,
        ConstructClass::Taskgroup => &[ClauseKind::Allocate],
        ConstructClass::Critical => &[ClauseKind::Hint],
        ConstructClass::OrderedBlock => {
            if clause == ClauseKind::Threads {
                return Support::Ignored;
            }
            &[]
        }
        ConstructClass::TargetData => TARGET_DATA_CLAUSES,
        ConstructClass::TargetEnterData | ConstructClass::TargetExitData => {
            TARGET_ENTER_EXIT_CLAUSES
        }
        ConstructClass::AtomicRead | ConstructClass::AtomicWrite | ConstructClass::AtomicUpdate => {
            ATOMIC_CLAUSES
        }
        _ => &[],
    };
    if lowered.contains(&clause) {
        Support::Lowered
    } else {
        Support::Unsupported
    }
}
