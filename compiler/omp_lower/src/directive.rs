//! Directive input model.
//!
//! A front end hands the engine one [`Directive`] per construct: a kind, the
//! ordered clause lists written on the begin and end directives, and the
//! nested body as a list of [`Evaluation`]s. Expressions and statements are
//! opaque references ([`ExprRef`], [`StmtRef`]) that only the host knows how
//! to lower.
//!
//! For atomic constructs the two clause lists are the clauses written
//! before and after the atomic-kind keyword.

use omp_ir::{MemoryOrder, ProcBind, ScheduleKind, ScheduleModifier, Span};
use smallvec::SmallVec;

use crate::symbol::SymbolId;

// ── Opaque host references ──────────────────────────────────────────

macro_rules! host_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

host_ref!(
    /// Resolved expression owned by the host.
    ExprRef
);
host_ref!(
    /// Executable statement owned by the host.
    StmtRef
);
host_ref!(
    /// Identity of one evaluation in the body tree.
    EvalId
);

// ── Clauses ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultKind {
    Private,
    Firstprivate,
    Shared,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntrinsicOperator {
    Add,
    Subtract,
    Multiply,
    And,
    Or,
    Eqv,
    Neqv,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReductionOperator {
    Intrinsic(IntrinsicOperator),
    /// Reduction through a named procedure (`max`, `min`, `iand`, ...).
    Procedure(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleClause {
    pub kind: ScheduleKind,
    /// The two modifier slots in source order.
    pub modifiers: [Option<ScheduleModifier>; 2],
    pub chunk: Option<ExprRef>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapType {
    To,
    From,
    Tofrom,
    Alloc,
    Release,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapClause {
    /// `None` means the implicit `tofrom`.
    pub map_type: Option<MapType>,
    pub always: bool,
    pub objects: Vec<SymbolId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceModifier {
    DeviceNum,
    Ancestor,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocateClause {
    pub allocator: Option<ExprRef>,
    pub objects: Vec<SymbolId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearClause {
    pub objects: Vec<SymbolId>,
    pub step: Option<ExprRef>,
}

/// One clause with its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Clause {
    Private(Vec<SymbolId>),
    Firstprivate(Vec<SymbolId>),
    Lastprivate(Vec<SymbolId>),
    Shared(Vec<SymbolId>),
    Default(DefaultKind),
    Copyin(Vec<SymbolId>),
    Copyprivate(Vec<SymbolId>),
    Reduction {
        op: ReductionOperator,
        objects: Vec<SymbolId>,
    },
    InReduction(Vec<SymbolId>),
    TaskReduction(Vec<SymbolId>),
    Schedule(ScheduleClause),
    Collapse(ExprRef),
    /// `ordered` with an optional loop count.
    Ordered(Option<ExprRef>),
    Linear(LinearClause),
    Order,
    Nowait,
    Hint(ExprRef),
    MemoryOrder(MemoryOrder),
    Depend,
    If(ExprRef),
    NumThreads(ExprRef),
    Final(ExprRef),
    Priority(ExprRef),
    Device {
        modifier: DeviceModifier,
        device: ExprRef,
    },
    Simdlen(ExprRef),
    Safelen(ExprRef),
    ProcBind(ProcBind),
    Map(MapClause),
    UseDevicePtr(Vec<SymbolId>),
    UseDeviceAddr(Vec<SymbolId>),
    Allocate(AllocateClause),
    Untied,
    Mergeable,
    Threads,
    Simd,
    Aligned(Vec<SymbolId>),
    Nontemporal(Vec<SymbolId>),
}

/// Payload-free clause tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Private,
    Firstprivate,
    Lastprivate,
    Shared,
    Default,
    Copyin,
    Copyprivate,
    Reduction,
    InReduction,
    TaskReduction,
    Schedule,
    Collapse,
    Ordered,
    Linear,
    Order,
    Nowait,
    Hint,
    MemoryOrder,
    Depend,
    If,
    NumThreads,
    Final,
    Priority,
    Device,
    Simdlen,
    Safelen,
    ProcBind,
    Map,
    UseDevicePtr,
    UseDeviceAddr,
    Allocate,
    Untied,
    Mergeable,
    Threads,
    Simd,
    Aligned,
    Nontemporal,
}

impl ClauseKind {
    pub fn name(self) -> &'static str {
        match self {
            ClauseKind::Private => "private",
            ClauseKind::Firstprivate => "firstprivate",
            ClauseKind::Lastprivate => "lastprivate",
            ClauseKind::Shared => "shared",
            ClauseKind::Default => "default",
            ClauseKind::Copyin => "copyin",
            ClauseKind::Copyprivate => "copyprivate",
            ClauseKind::Reduction => "reduction",
            ClauseKind::InReduction => "in_reduction",
            ClauseKind::TaskReduction => "task_reduction",
            ClauseKind::Schedule => "schedule",
            ClauseKind::Collapse => "collapse",
            ClauseKind::Ordered => "ordered",
            ClauseKind::Linear => "linear",
            ClauseKind::Order => "order",
            ClauseKind::Nowait => "nowait",
            ClauseKind::Hint => "hint",
            ClauseKind::MemoryOrder => "memory-order",
            ClauseKind::Depend => "depend",
            ClauseKind::If => "if",
            ClauseKind::NumThreads => "num_threads",
            ClauseKind::Final => "final",
            ClauseKind::Priority => "priority",
            ClauseKind::Device => "device",
            ClauseKind::Simdlen => "simdlen",
            ClauseKind::Safelen => "safelen",
            ClauseKind::ProcBind => "proc_bind",
            ClauseKind::Map => "map",
            ClauseKind::UseDevicePtr => "use_device_ptr",
            ClauseKind::UseDeviceAddr => "use_device_addr",
            ClauseKind::Allocate => "allocate",
            ClauseKind::Untied => "untied",
            ClauseKind::Mergeable => "mergeable",
            ClauseKind::Threads => "threads",
            ClauseKind::Simd => "simd",
            ClauseKind::Aligned => "aligned",
            ClauseKind::Nontemporal => "nontemporal",
        }
    }
}

impl Clause {
    pub fn kind(&self) -> ClauseKind {
        match self {
            Clause::Private(_) => ClauseKind::Private,
            Clause::Firstprivate(_) => ClauseKind::Firstprivate,
            Clause::Lastprivate(_) => ClauseKind::Lastprivate,
            Clause::Shared(_) => ClauseKind::Shared,
            Clause::Default(_) => ClauseKind::Default,
            Clause::Copyin(_) => ClauseKind::Copyin,
            Clause::Copyprivate(_) => ClauseKind::Copyprivate,
            Clause::Reduction { .. } => ClauseKind::Reduction,
            Clause::InReduction(_) => ClauseKind::InReduction,
            Clause::TaskReduction(_) => ClauseKind::TaskReduction,
            Clause::Schedule(_) => ClauseKind::Schedule,
            Clause::Collapse(_) => ClauseKind::Collapse,
            Clause::Ordered(_) => ClauseKind::Ordered,
            Clause::Linear(_) => ClauseKind::Linear,
            Clause::Order => ClauseKind::Order,
            Clause::Nowait => ClauseKind::Nowait,
            Clause::Hint(_) => ClauseKind::Hint,
            Clause::MemoryOrder(_) => ClauseKind::MemoryOrder,
            Clause::Depend => ClauseKind::Depend,
            Clause::If(_) => ClauseKind::If,
            Clause::NumThreads(_) => ClauseKind::NumThreads,
            Clause::Final(_) => ClauseKind::Final,
            Clause::Priority(_) => ClauseKind::Priority,
            Clause::Device { .. } => ClauseKind::Device,
            Clause::Simdlen(_) => ClauseKind::Simdlen,
            Clause::Safelen(_) => ClauseKind::Safelen,
            Clause::ProcBind(_) => ClauseKind::ProcBind,
            Clause::Map(_) => ClauseKind::Map,
            Clause::UseDevicePtr(_) => ClauseKind::UseDevicePtr,
            Clause::UseDeviceAddr(_) => ClauseKind::UseDeviceAddr,
            Clause::Allocate(_) => ClauseKind::Allocate,
            Clause::Untied => ClauseKind::Untied,
            Clause::Mergeable => ClauseKind::Mergeable,
            Clause::Threads => ClauseKind::Threads,
            Clause::Simd => ClauseKind::Simd,
            Clause::Aligned(_) => ClauseKind::Aligned,
            Clause::Nontemporal(_) => ClauseKind::Nontemporal,
        }
    }
}

/// A clause with its source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClauseNode {
    pub clause: Clause,
    pub span: Span,
}

impl ClauseNode {
    #[inline]
    pub fn kind(&self) -> ClauseKind {
        self.clause.kind()
    }
}

// ── Construct kinds ─────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StandaloneKind {
    Barrier,
    Taskwait,
    Taskyield,
    Flush { objects: Vec<SymbolId> },
    TargetEnterData,
    TargetExitData,
    TargetUpdate,
    Ordered,
    Cancel,
    CancellationPoint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Parallel,
    Master,
    Single,
    Ordered,
    Task,
    Taskgroup,
    TargetData,
    Target,
    Workshare,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopKind {
    Do,
    Simd,
    ParallelDo,
    DoSimd,
    ParallelDoSimd,
    Distribute,
    Taskloop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomicForm {
    Read,
    Write,
    Update,
    Capture,
    /// No atomic-kind keyword; behaves as `update`.
    Bare,
}

/// `target = value` as written under an atomic construct.
///
/// For `read` the target is the destination and the value is the
/// variable being read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtomicConstruct {
    pub form: AtomicForm,
    pub target: ExprRef,
    /// Symbol designated by `target`, bound to the prior value while an
    /// update's right-hand side is evaluated.
    pub target_symbol: Option<SymbolId>,
    pub value: ExprRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstructKind {
    Standalone(StandaloneKind),
    Block(BlockKind),
    Loop(LoopKind),
    Sections { parallel: bool },
    Section,
    Critical { name: Option<String> },
    Atomic(AtomicConstruct),
}

// ── Body ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopBounds {
    pub lower: ExprRef,
    pub upper: ExprRef,
    pub step: Option<ExprRef>,
}

/// A counted `do` loop in the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountedLoop {
    pub header: StmtRef,
    pub var: SymbolId,
    /// `None` for loops without counted bounds (`do while`, bare `do`).
    pub bounds: Option<LoopBounds>,
    pub body: Vec<Evaluation>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalKind {
    Statement(StmtRef),
    Loop(CountedLoop),
    /// Host construct with a nested body (`if`, `block`, `select`, ...).
    Nested {
        header: StmtRef,
        body: Vec<Evaluation>,
    },
    Directive(Box<Directive>),
}

/// One node of a construct body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub id: EvalId,
    pub kind: EvalKind,
    /// Symbols this evaluation references directly, excluding those only
    /// referenced inside its nested evaluations.
    pub uses: SmallVec<[SymbolId; 4]>,
    /// Whether the evaluation begins a new block in unstructured code.
    pub starts_block: bool,
    pub span: Span,
}

impl Evaluation {
    pub fn new(id: EvalId, kind: EvalKind) -> Self {
        Self {
            id,
            kind,
            uses: SmallVec::new(),
            starts_block: false,
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn with_uses(mut self, uses: impl IntoIterator<Item = SymbolId>) -> Self {
        self.uses.extend(uses);
        self
    }

    #[must_use]
    pub fn starting_block(mut self) -> Self {
        self.starts_block = true;
        self
    }

    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Nested evaluations, if any.
    pub fn children(&self) -> &[Evaluation] {
        match &self.kind {
            EvalKind::Loop(l) => &l.body,
            EvalKind::Nested { body, .. } => body,
            EvalKind::Directive(d) => &d.body,
            EvalKind::Statement(_) => &[],
        }
    }
}

// ── Directive ───────────────────────────────────────────────────────

/// One construct as delivered by the front end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    pub kind: ConstructKind,
    pub clauses: Vec<ClauseNode>,
    pub end_clauses: Vec<ClauseNode>,
    pub body: Vec<Evaluation>,
    pub span: Span,
    /// The body contains branches that leave structured control flow.
    pub unstructured: bool,
}

impl Directive {
    pub fn new(kind: ConstructKind, span: Span) -> Self {
        Self {
            kind,
            clauses: Vec::new(),
            end_clauses: Vec::new(),
            body: Vec::new(),
            span,
            unstructured: false,
        }
    }

    #[must_use]
    pub fn clause(mut self, clause: Clause) -> Self {
        let span = self.span;
        self.clauses.push(ClauseNode { clause, span });
        self
    }

    #[must_use]
    pub fn end_clause(mut self, clause: Clause) -> Self {
        let span = self.span;
        self.end_clauses.push(ClauseNode { clause, span });
        self
    }

    #[must_use]
    pub fn body(mut self, body: Vec<Evaluation>) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn unstructured(mut self) -> Self {
        self.unstructured = true;
        self
    }

    /// Begin and end clauses in order.
    pub fn all_clauses(&self) -> impl Iterator<Item = &ClauseNode> {
        self.clauses.iter().chain(self.end_clauses.iter())
    }
}
