//! Value types carried by the IR.
//!
//! Two families share one enum. The *host* family (`Int`, `Float`,
//! `Logical`, `Index`, `Ref`, `Seq`, `Box`, `MemRef`, `Opaque`) is what the
//! lowering engine produces. The *target* family (`Int`, `Float`, `Ptr`,
//! `Struct`) is what the dialect-conversion pass rewrites values into.
//! `Int` and `Float` are legal in both.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
    /// Signless integer of the given bit width. `Int(1)` is the boolean type.
    Int(u32),
    /// IEEE float of the given bit width.
    Float(u32),
    /// Source-language logical of the given kind (bytes).
    Logical(u32),
    /// Machine-width index.
    Index,
    /// Reference to storage holding the element type.
    Ref(Box<IrType>),
    /// Sequence (array) of the element type.
    Seq(Box<IrType>),
    /// Boxed descriptor of the element type.
    Box(Box<IrType>),
    /// Descriptor-backed memory reference.
    MemRef(Box<IrType>),
    /// Host type the target converter has no rule for.
    Opaque(String),
    /// Target pointer.
    Ptr(Box<IrType>),
    /// Target aggregate.
    Struct(Vec<IrType>),
}

impl IrType {
    pub const I1: IrType = IrType::Int(1);
    pub const I8: IrType = IrType::Int(8);
    pub const I32: IrType = IrType::Int(32);
    pub const I64: IrType = IrType::Int(64);

    #[inline]
    pub fn reference(elem: IrType) -> IrType {
        IrType::Ref(Box::new(elem))
    }

    #[inline]
    pub fn seq(elem: IrType) -> IrType {
        IrType::Seq(Box::new(elem))
    }

    #[inline]
    pub fn ptr(elem: IrType) -> IrType {
        IrType::Ptr(Box::new(elem))
    }

    #[inline]
    pub fn memref(elem: IrType) -> IrType {
        IrType::MemRef(Box::new(elem))
    }

    /// Element type behind a reference-like or container type.
    pub fn element_type(&self) -> Option<&IrType> {
        match self {
            IrType::Ref(e)
            | IrType::Seq(e)
            | IrType::Box(e)
            | IrType::MemRef(e)
            | IrType::Ptr(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn is_reference(&self) -> bool {
        matches!(self, IrType::Ref(_) | IrType::Ptr(_))
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(self, IrType::Int(_) | IrType::Index)
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, IrType::Float(_))
    }

    /// Bit width of scalar integer, float, and logical types.
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            IrType::Int(w) | IrType::Float(w) => Some(*w),
            IrType::Logical(kind) => Some(kind * 8),
            _ => None,
        }
    }

    /// Storage size in bytes for scalar types.
    pub fn byte_size(&self) -> Option<u64> {
        match self {
            IrType::Int(w) | IrType::Float(w) => Some(u64::from(w.div_ceil(8))),
            IrType::Logical(kind) => Some(u64::from(*kind)),
            IrType::Index => Some(8),
            _ => None,
        }
    }

    /// Whether every component of this type belongs to the target family.
    pub fn is_target_legal(&self) -> bool {
        match self {
            IrType::Int(_) | IrType::Float(_) => true,
            IrType::Ptr(e) => e.is_target_legal(),
            IrType::Struct(fields) => fields.iter().all(IrType::is_target_legal),
            _ => false,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Int(w) => write!(f, "i{w}"),
            IrType::Float(w) => write!(f, "f{w}"),
            IrType::Logical(k) => write!(f, "!logical<{k}>"),
            IrType::Index => f.write_str("index"),
            IrType::Ref(e) => write!(f, "!ref<{e}>"),
            IrType::Seq(e) => write!(f, "!seq<?x{e}>"),
            IrType::Box(e) => write!(f, "!box<{e}>"),
            IrType::MemRef(e) => write!(f, "memref<{e}>"),
            IrType::Opaque(name) => write!(f, "!opaque<{name}>"),
            IrType::Ptr(e) => write!(f, "!llvm.ptr<{e}>"),
            IrType::Struct(fields) => {
                f.write_str("!llvm.struct<(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str(")>")
            }
        }
    }
}
