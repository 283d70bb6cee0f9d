//! Read-only view of the front end's resolved symbols.
//!
//! The engine never owns symbols: it asks a [`SymbolTable`] for the flags,
//! storage type, and common-block placement of a [`SymbolId`]. Front ends
//! implement the trait over their own tables; [`SymbolArena`] is a simple
//! owned implementation used by drivers and tests.

use bitflags::bitflags;
use omp_ir::IrType;

/// Handle of a resolved source symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolId(u32);

impl SymbolId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Semantic flags computed by the front end.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct SymbolFlags: u16 {
        /// Data-sharing attribute fixed by language rules (loop variables).
        const PREDETERMINED = 1 << 0;
        /// Construct-local copy initialized from the original.
        const FIRST_PRIVATE = 1 << 1;
        /// Construct-local copy published back after the construct.
        const LAST_PRIVATE = 1 << 2;
        const THREADPRIVATE = 1 << 3;
        /// Symbol is a construct-local alias of a host-scope symbol.
        const HOST_ASSOCIATED = 1 << 4;
        const ALLOCATABLE = 1 << 5;
        const POINTER = 1 << 6;
        /// Symbol already lives in global storage.
        const GLOBAL = 1 << 7;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    CommonBlock,
}

/// Everything the engine needs to know about one symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub flags: SymbolFlags,
    /// Storage type (the element type of the symbol's address).
    pub ty: IrType,
    /// Storage size in bytes; bounds common-block members.
    pub size: u64,
    /// Containing common block, for common-block members.
    pub common_block: Option<SymbolId>,
    /// Byte offset inside the containing common block.
    pub offset: u64,
    /// Host-scope symbol this one is associated with.
    pub host: Option<SymbolId>,
}

impl SymbolInfo {
    /// A plain variable of type `ty`; the size comes from the type.
    pub fn variable(name: impl Into<String>, ty: IrType) -> Self {
        let size = ty.byte_size().unwrap_or(0);
        Self {
            name: name.into(),
            kind: SymbolKind::Variable,
            flags: SymbolFlags::empty(),
            ty,
            size,
            common_block: None,
            offset: 0,
            host: None,
        }
    }

    /// A common block spanning `size` bytes.
    pub fn common_block(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::CommonBlock,
            flags: SymbolFlags::GLOBAL,
            ty: IrType::seq(IrType::I8),
            size,
            common_block: None,
            offset: 0,
            host: None,
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: SymbolFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn in_common(mut self, block: SymbolId, offset: u64) -> Self {
        self.common_block = Some(block);
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn host_associated(mut self, host: SymbolId) -> Self {
        self.host = Some(host);
        self.flags |= SymbolFlags::HOST_ASSOCIATED;
        self
    }

    #[inline]
    pub fn has(&self, flags: SymbolFlags) -> bool {
        self.flags.intersects(flags)
    }
}

pub trait SymbolTable {
    fn get(&self, id: SymbolId) -> Option<&SymbolInfo>;

    /// Follow host association to the symbol that owns the storage.
    fn ultimate(&self, id: SymbolId) -> SymbolId {
        let mut current = id;
        // Association chains are short; the bound guards against cycles.
        for _ in 0..64 {
            match self.get(current).and_then(|info| info.host) {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// Common block containing the ultimate symbol of `id`.
    fn common_block_of(&self, id: SymbolId) -> Option<SymbolId> {
        self.get(self.ultimate(id))
            .and_then(|info| info.common_block)
            .or_else(|| self.get(id).and_then(|info| info.common_block))
    }
}

/// Owned symbol table.
#[derive(Clone, Debug, Default)]
pub struct SymbolArena {
    symbols: Vec<SymbolInfo>,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self::default()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "symbol counts never exceed u32"
    )]
    pub fn push(&mut self, info: SymbolInfo) -> SymbolId {
        let id = SymbolId::new(self.symbols.len() as u32);
        self.symbols.push(info);
        id
    }

    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut SymbolInfo> {
        self.symbols.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolTable for SymbolArena {
    fn get(&self, id: SymbolId) -> Option<&SymbolInfo> {
        self.symbols.get(id.index())
    }
}
