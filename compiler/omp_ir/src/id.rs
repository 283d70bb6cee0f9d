//! Arena handles for operations, blocks, regions, and values.
//!
//! Every entity in an [`IrModule`](crate::IrModule) lives in a flat arena
//! and is named by a `u32` newtype. Handles are allocated sequentially,
//! which lets [`Checkpoint`](crate::Checkpoint) roll a module back by
//! truncating each arena.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an ID from a raw index.
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Operation handle.
    OpId,
    "op"
);

define_id!(
    /// Block handle. Blocks belong to exactly one region.
    BlockId,
    "^bb"
);

define_id!(
    /// Region handle. Regions belong to an operation, or to the module
    /// itself for the top-level body.
    RegionId,
    "region"
);

define_id!(
    /// SSA value handle: an operation result or a block argument.
    ValueId,
    "%"
);

/// Convert an arena length into the next sequential handle index.
#[expect(
    clippy::cast_possible_truncation,
    reason = "arena sizes never exceed u32"
)]
#[inline]
pub(crate) fn next_index(len: usize) -> u32 {
    len as u32
}
