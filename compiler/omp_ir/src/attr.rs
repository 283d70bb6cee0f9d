//! Operation attributes.
//!
//! Attributes are compile-time constants attached to an operation by name.
//! The enums in this module are shared with the lowering engine so that a
//! clause value and the attribute it becomes are the same Rust type.

use std::fmt;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::types::IrType;

// ── Attribute names ─────────────────────────────────────────────────

/// Attribute keys used by the parallel dialect and the host operations.
pub mod names {
    pub const OPERAND_SEGMENTS: &str = "operand_segment_sizes";
    pub const SYM_NAME: &str = "sym_name";
    pub const NAME: &str = "name";
    pub const VALUE: &str = "value";
    pub const TYPE: &str = "type";
    pub const IN_TYPE: &str = "in_type";
    pub const PREDICATE: &str = "predicate";
    pub const UNIQ_NAME: &str = "uniq_name";
    pub const PROC_BIND: &str = "proc_bind_val";
    pub const NOWAIT: &str = "nowait";
    pub const UNTIED: &str = "untied";
    pub const MERGEABLE: &str = "mergeable";
    pub const SIMD: &str = "simd";
    pub const THREADS: &str = "threads";
    pub const HINT: &str = "hint";
    pub const MEMORY_ORDER: &str = "memory_order";
    pub const ELEMENT_TYPE: &str = "element_type";
    pub const SCHEDULE: &str = "schedule_val";
    pub const SCHEDULE_MODIFIER: &str = "schedule_modifier";
    pub const SIMD_MODIFIER: &str = "simd_modifier";
    pub const COLLAPSE: &str = "collapse_val";
    pub const ORDERED: &str = "ordered_val";
    pub const INCLUSIVE: &str = "inclusive";
    pub const SIMDLEN: &str = "simdlen";
    pub const SAFELEN: &str = "safelen";
    pub const REDUCTIONS: &str = "reductions";
    pub const MAP_TYPES: &str = "map_types";
    pub const LINKAGE: &str = "linkage";
    pub const ADAPT_VALUE_BY_REF: &str = "adapt_value_by_ref";
}

// ── Clause-level enums ──────────────────────────────────────────────

/// Memory ordering on atomic and flush operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MemoryOrder {
    #[default]
    None,
    SeqCst,
    AcqRel,
    Acquire,
    Release,
    Relaxed,
}

impl MemoryOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryOrder::None => "none",
            MemoryOrder::SeqCst => "seq_cst",
            MemoryOrder::AcqRel => "acq_rel",
            MemoryOrder::Acquire => "acquire",
            MemoryOrder::Release => "release",
            MemoryOrder::Relaxed => "relaxed",
        }
    }
}

bitflags! {
    /// Synchronization hint bits (`omp_sync_hint_*`). Empty means none.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct SyncHint: u64 {
        const UNCONTENDED = 0x1;
        const CONTENDED = 0x2;
        const NONSPECULATIVE = 0x4;
        const SPECULATIVE = 0x8;
    }
}

/// Loop schedule kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScheduleKind {
    Static,
    Dynamic,
    Guided,
    Auto,
    Runtime,
}

impl ScheduleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleKind::Static => "static",
            ScheduleKind::Dynamic => "dynamic",
            ScheduleKind::Guided => "guided",
            ScheduleKind::Auto => "auto",
            ScheduleKind::Runtime => "runtime",
        }
    }
}

/// Schedule modifier as written in a clause slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScheduleModifier {
    Monotonic,
    Nonmonotonic,
    Simd,
}

impl ScheduleModifier {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleModifier::Monotonic => "monotonic",
            ScheduleModifier::Nonmonotonic => "nonmonotonic",
            ScheduleModifier::Simd => "simd",
        }
    }
}

/// Thread affinity policy of a parallel region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcBind {
    Master,
    Close,
    Spread,
    Primary,
}

impl ProcBind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcBind::Master => "master",
            ProcBind::Close => "close",
            ProcBind::Spread => "spread",
            ProcBind::Primary => "primary",
        }
    }
}

/// Integer comparison predicate of the host `cmpi` operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl CmpPredicate {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpPredicate::Eq => "eq",
            CmpPredicate::Ne => "ne",
            CmpPredicate::Slt => "slt",
            CmpPredicate::Sle => "sle",
            CmpPredicate::Sgt => "sgt",
            CmpPredicate::Sge => "sge",
        }
    }
}

bitflags! {
    /// Data-mapping bits of a target data operation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct MapBits: u64 {
        const TO = 0x01;
        const FROM = 0x02;
        const ALWAYS = 0x04;
        const DELETE = 0x08;
    }
}

// ── Attribute values ────────────────────────────────────────────────

/// A single attribute value.
///
/// Floats are stored as `u64` bits so the enum stays `Eq + Hash`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Presence-only flag.
    Unit,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    SymbolRef(String),
    Type(IrType),
    Array(Vec<Attribute>),
    /// Operand group sizes of a variadic operation.
    Segments(SmallVec<[u32; 8]>),
    MemoryOrder(MemoryOrder),
    SyncHint(SyncHint),
    ScheduleKind(ScheduleKind),
    ScheduleModifier(ScheduleModifier),
    ProcBind(ProcBind),
    Predicate(CmpPredicate),
    MapBits(MapBits),
}

impl Attribute {
    #[inline]
    pub fn float(value: f64) -> Self {
        Attribute::Float(value.to_bits())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Attribute::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Attribute::SymbolRef(s) | Attribute::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&IrType> {
        match self {
            Attribute::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_segments(&self) -> Option<&[u32]> {
        match self {
            Attribute::Segments(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Unit => f.write_str("unit"),
            Attribute::Bool(b) => write!(f, "{b}"),
            Attribute::Int(v) => write!(f, "{v}"),
            Attribute::Float(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            Attribute::Str(s) => write!(f, "\"{s}\""),
            Attribute::SymbolRef(s) => write!(f, "@{s}"),
            Attribute::Type(t) => write!(f, "{t}"),
            Attribute::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Attribute::Segments(sizes) => write!(f, "{sizes:?}"),
            Attribute::MemoryOrder(m) => f.write_str(m.as_str()),
            Attribute::SyncHint(h) => {
                if h.is_empty() {
                    f.write_str("none")
                } else {
                    write!(f, "{:#x}", h.bits())
                }
            }
            Attribute::ScheduleKind(k) => f.write_str(k.as_str()),
            Attribute::ScheduleModifier(m) => f.write_str(m.as_str()),
            Attribute::ProcBind(p) => f.write_str(p.as_str()),
            Attribute::Predicate(p) => f.write_str(p.as_str()),
            Attribute::MapBits(bits) => write!(f, "{:#x}", bits.bits()),
        }
    }
}

// ── Attribute map ───────────────────────────────────────────────────

/// Ordered name→value attribute list.
///
/// Operations carry a handful of attributes, so a linear scan over a
/// small inline vector beats hashing. Insertion order is preserved and
/// is what the printer shows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttrMap {
    entries: SmallVec<[(&'static str, Attribute); 4]>,
}

impl AttrMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.entries
            .iter()
            .find_map(|(key, value)| (*key == name).then_some(value))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or overwrite an attribute.
    pub fn set(&mut self, name: &'static str, value: Attribute) {
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        let pos = self.entries.iter().position(|(key, _)| *key == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Attribute)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
