//! Operations, blocks, regions, and values.
//!
//! # Architecture
//!
//! - **[`Operation`]**: kind, attributes, operands, results, nested regions
//! - **[`Region`]**: ordered list of blocks owned by one operation
//! - **[`Block`]**: typed arguments plus an ordered list of operations,
//!   ending in a terminator once complete
//! - **[`Value`]**: SSA value defined by an operation result or a block
//!   argument
//!
//! The parallel dialect (`omp.*`) and the host operations (`host.*`) share
//! one [`OpKind`] enum; [`OpKind::dialect`] tells them apart.

use smallvec::SmallVec;

use crate::attr::AttrMap;
use crate::id::{BlockId, OpId, RegionId, ValueId};
use crate::span::Span;
use crate::types::IrType;

// ── Operation kinds ─────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dialect {
    Omp,
    Host,
}

/// Every operation the lowering engine or a host may create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    // Parallel dialect: region operations
    Parallel,
    Master,
    Single,
    Critical,
    Ordered,
    Task,
    Taskgroup,
    Sections,
    Section,
    WsLoop,
    SimdLoop,
    AtomicUpdate,
    ReductionDeclare,
    TargetData,
    // Parallel dialect: plain operations
    CriticalDeclare,
    Barrier,
    Taskwait,
    Taskyield,
    Flush,
    Threadprivate,
    TargetEnterData,
    TargetExitData,
    AtomicRead,
    AtomicWrite,
    Reduction,
    Yield,
    Terminator,

    // Host operations
    Alloca,
    Load,
    Store,
    Constant,
    Convert,
    CmpI,
    AddI,
    AddF,
    MulI,
    MulF,
    AndI,
    CoordinateOf,
    AddrOf,
    Global,
    Undef,
    ZeroBits,
    HasValue,
    If,
    IfYield,
    Branch,
    CondBranch,
    /// Host-specific operation the engine treats opaquely.
    Generic(&'static str),
}

impl OpKind {
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Parallel => "omp.parallel",
            OpKind::Master => "omp.master",
            OpKind::Single => "omp.single",
            OpKind::Critical => "omp.critical",
            OpKind::Ordered => "omp.ordered_region",
            OpKind::Task => "omp.task",
            OpKind::Taskgroup => "omp.taskgroup",
            OpKind::Sections => "omp.sections",
            OpKind::Section => "omp.section",
            OpKind::WsLoop => "omp.wsloop",
            OpKind::SimdLoop => "omp.simdloop",
            OpKind::AtomicUpdate => "omp.atomic.update",
            OpKind::ReductionDeclare => "omp.reduction.declare",
            OpKind::TargetData => "omp.target_data",
            OpKind::CriticalDeclare => "omp.critical.declare",
            OpKind::Barrier => "omp.barrier",
            OpKind::Taskwait => "omp.taskwait",
            OpKind::Taskyield => "omp.taskyield",
            OpKind::Flush => "omp.flush",
            OpKind::Threadprivate => "omp.threadprivate",
            OpKind::TargetEnterData => "omp.target_enter_data",
            OpKind::TargetExitData => "omp.target_exit_data",
            OpKind::AtomicRead => "omp.atomic.read",
            OpKind::AtomicWrite => "omp.atomic.write",
            OpKind::Reduction => "omp.reduction",
            OpKind::Yield => "omp.yield",
            OpKind::Terminator => "omp.terminator",
            OpKind::Alloca => "host.alloca",
            OpKind::Load => "host.load",
            OpKind::Store => "host.store",
            OpKind::Constant => "host.constant",
            OpKind::Convert => "host.convert",
            OpKind::CmpI => "host.cmpi",
            OpKind::AddI => "host.addi",
            OpKind::AddF => "host.addf",
            OpKind::MulI => "host.muli",
            OpKind::MulF => "host.mulf",
            OpKind::AndI => "host.andi",
            OpKind::CoordinateOf => "host.coordinate_of",
            OpKind::AddrOf => "host.address_of",
            OpKind::Global => "host.global",
            OpKind::Undef => "host.undefined",
            OpKind::ZeroBits => "host.zero_bits",
            OpKind::HasValue => "host.has_value",
            OpKind::If => "host.if",
            OpKind::IfYield => "host.if_yield",
            OpKind::Branch => "host.br",
            OpKind::CondBranch => "host.cond_br",
            OpKind::Generic(name) => name,
        }
    }

    pub fn dialect(self) -> Dialect {
        match self {
            OpKind::Parallel
            | OpKind::Master
            | OpKind::Single
            | OpKind::Critical
            | OpKind::Ordered
            | OpKind::Task
            | OpKind::Taskgroup
            | OpKind::Sections
            | OpKind::Section
            | OpKind::WsLoop
            | OpKind::SimdLoop
            | OpKind::AtomicUpdate
            | OpKind::ReductionDeclare
            | OpKind::TargetData
            | OpKind::CriticalDeclare
            | OpKind::Barrier
            | OpKind::Taskwait
            | OpKind::Taskyield
            | OpKind::Flush
            | OpKind::Threadprivate
            | OpKind::TargetEnterData
            | OpKind::TargetExitData
            | OpKind::AtomicRead
            | OpKind::AtomicWrite
            | OpKind::Reduction
            | OpKind::Yield
            | OpKind::Terminator => Dialect::Omp,
            _ => Dialect::Host,
        }
    }

    /// Whether this operation must end its block.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            OpKind::Yield
                | OpKind::Terminator
                | OpKind::HasValue
                | OpKind::IfYield
                | OpKind::Branch
                | OpKind::CondBranch
        )
    }
}

// ── Structure ───────────────────────────────────────────────────────

/// A single operation.
#[derive(Clone, Debug)]
pub struct Operation {
    pub kind: OpKind,
    pub attrs: AttrMap,
    pub operands: SmallVec<[ValueId; 4]>,
    pub results: SmallVec<[ValueId; 1]>,
    pub regions: SmallVec<[RegionId; 1]>,
    /// Branch targets of host control-flow terminators.
    pub successors: SmallVec<[BlockId; 2]>,
    pub span: Span,
    /// Containing block, `None` while detached.
    pub parent: Option<BlockId>,
}

impl Operation {
    /// First result, for single-result operations.
    #[inline]
    pub fn result(&self) -> Option<ValueId> {
        self.results.first().copied()
    }

    /// Operands of the variadic group `index` according to the
    /// operand-segment attribute. Falls back to all operands for
    /// operations without segments when `index` is zero.
    pub fn operand_group(&self, index: usize) -> &[ValueId] {
        let segments = self
            .attrs
            .get(crate::attr::names::OPERAND_SEGMENTS)
            .and_then(crate::Attribute::as_segments);
        match segments {
            Some(sizes) => {
                let start: u32 = sizes.iter().take(index).sum();
                let len = sizes.get(index).copied().unwrap_or(0);
                let start = start as usize;
                self.operands
                    .get(start..start + len as usize)
                    .unwrap_or_default()
            }
            None if index == 0 => &self.operands,
            None => &[],
        }
    }
}

/// A basic block inside a region.
#[derive(Clone, Debug)]
pub struct Block {
    pub args: SmallVec<[ValueId; 4]>,
    pub ops: Vec<OpId>,
    pub parent: RegionId,
}

impl Block {
    /// Last operation of the block, if any.
    #[inline]
    pub fn last_op(&self) -> Option<OpId> {
        self.ops.last().copied()
    }
}

/// An ordered list of blocks owned by an operation.
#[derive(Clone, Debug)]
pub struct Region {
    pub blocks: Vec<BlockId>,
    /// Owning operation, `None` for the module body.
    pub parent: Option<OpId>,
}

impl Region {
    #[inline]
    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }
}

/// Where a value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueDef {
    OpResult { op: OpId, index: u32 },
    BlockArg { block: BlockId, index: u32 },
}

/// An SSA value with its type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value {
    pub ty: IrType,
    pub def: ValueDef,
}
