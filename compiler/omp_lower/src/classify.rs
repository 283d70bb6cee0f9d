//! Clause classification.
//!
//! One linear pass over a construct's clauses: each clause is checked
//! against the capability table and dropped into one of the semantic
//! buckets. Handlers then query the buckets instead of re-scanning the
//! raw lists.

use omp_ir::Span;
use smallvec::SmallVec;

use crate::capability::{clause_support, ConstructClass, Support};
use crate::directive::{Clause, ClauseKind, ClauseNode, DeviceModifier};
use crate::error::{LowerError, LowerResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClauseGroup {
    DataSharing,
    Reduction,
    Scheduling,
    Synchronization,
    Parameter,
    Mapping,
    Allocation,
    Modifier,
}

impl ClauseGroup {
    const COUNT: usize = 8;

    fn slot(self) -> usize {
        self as usize
    }
}

impl ClauseKind {
    pub fn group(self) -> ClauseGroup {
        match self {
            ClauseKind::Private
            | ClauseKind::Firstprivate
            | ClauseKind::Lastprivate
            | ClauseKind::Shared
            | ClauseKind::Default
            | ClauseKind::Copyin
            | ClauseKind::Copyprivate => ClauseGroup::DataSharing,
            ClauseKind::Reduction | ClauseKind::InReduction | ClauseKind::TaskReduction => {
                ClauseGroup::Reduction
            }
            ClauseKind::Schedule
            | ClauseKind::Collapse
            | ClauseKind::Ordered
            | ClauseKind::Linear
            | ClauseKind::Order => ClauseGroup::Scheduling,
            ClauseKind::Nowait
            | ClauseKind::Hint
            | ClauseKind::MemoryOrder
            | ClauseKind::Depend => ClauseGroup::Synchronization,
            ClauseKind::If
            | ClauseKind::NumThreads
            | ClauseKind::Final
            | ClauseKind::Priority
            | ClauseKind::Device
            | ClauseKind::Simdlen
            | ClauseKind::Safelen
            | ClauseKind::ProcBind => ClauseGroup::Parameter,
            ClauseKind::Map | ClauseKind::UseDevicePtr | ClauseKind::UseDeviceAddr => {
                ClauseGroup::Mapping
            }
            ClauseKind::Allocate => ClauseGroup::Allocation,
            ClauseKind::Untied
            | ClauseKind::Mergeable
            | ClauseKind::Threads
            | ClauseKind::Simd
            | ClauseKind::Aligned
            | ClauseKind::Nontemporal => ClauseGroup::Modifier,
        }
    }
}

/// A construct's clauses sorted into disjoint buckets.
#[derive(Debug)]
pub struct ClauseBuckets<'d> {
    construct: ConstructClass,
    groups: [SmallVec<[&'d ClauseNode; 4]>; ClauseGroup::COUNT],
}

impl<'d> ClauseBuckets<'d> {
    /// Classify `clauses` for `construct`, failing on the first clause or
    /// clause combination without a lowering.
    pub fn classify(
        construct: ConstructClass,
        clauses: impl IntoIterator<Item = &'d ClauseNode>,
        span: Span,
    ) -> LowerResult<Self> {
        if !construct.is_implemented() {
            return Err(LowerError::unsupported(construct.name(), "construct", span));
        }
        let mut buckets = ClauseBuckets {
            construct,
            groups: Default::default(),
        };
        for node in clauses {
            let kind = node.kind();
            match clause_support(construct, kind) {
                Support::Lowered => buckets.groups[kind.group().slot()].push(node),
                Support::Ignored => {
                    tracing::debug!(
                        clause = kind.name(),
                        construct = construct.name(),
                        "clause ignored"
                    );
                }
                Support::Unsupported => {
                    return Err(LowerError::unsupported(
                        construct.name(),
                        format!("{} clause", kind.name()),
                        node.span,
                    ));
                }
            }
            if let Clause::Device {
                modifier: DeviceModifier::Ancestor,
                ..
            } = node.clause
            {
                return Err(LowerError::unsupported(
                    construct.name(),
                    "device clause with ancestor modifier",
                    node.span,
                ));
            }
        }
        Ok(buckets)
    }

    #[inline]
    pub fn construct(&self) -> ConstructClass {
        self.construct
    }

    pub fn group(&self, group: ClauseGroup) -> &[&'d ClauseNode] {
        &self.groups[group.slot()]
    }

    /// Clauses of one kind, in source order.
    pub fn iter(&self, kind: ClauseKind) -> impl Iterator<Item = &'d ClauseNode> + '_ {
        self.groups[kind.group().slot()]
            .iter()
            .copied()
            .filter(move |node| node.kind() == kind)
    }

    pub fn first(&self, kind: ClauseKind) -> Option<&'d ClauseNode> {
        self.iter(kind).next()
    }

    #[inline]
    pub fn has(&self, kind: ClauseKind) -> bool {
        self.first(kind).is_some()
    }
}
