//! Region-structured IR shared by the parallel-construct lowering engine
//! and the dialect-conversion pass.
//!
//! # Architecture
//!
//! - [`IrModule`]: arena of operations, blocks, regions, and values with
//!   checkpoint/rollback
//! - [`IrBuilder`]: insertion-point builder with an RAII
//!   [`InsertionGuard`]
//! - [`OpKind`]: parallel-dialect (`omp.*`) and host (`host.*`) operations
//! - [`IrType`]: host and target value types
//! - [`Attribute`]: constant operation attributes
//! - [`verify_module`]: structural checks run after lowering

mod attr;
mod builder;
mod id;
mod module;
mod op;
mod print;
mod span;
mod types;
mod verify;

pub use attr::{
    names, AttrMap, Attribute, CmpPredicate, MapBits, MemoryOrder, ProcBind, ScheduleKind,
    ScheduleModifier, SyncHint,
};
pub use builder::{InsertPoint, InsertionGuard, IrBuilder, OpBuilder};
pub use id::{BlockId, OpId, RegionId, ValueId};
pub use module::{Checkpoint, IrModule, OpState};
pub use op::{Block, Dialect, OpKind, Operation, Region, Value, ValueDef};
pub use print::ModuleDisplay;
pub use span::Span;
pub use types::IrType;
pub use verify::{verify_module, VerifyError};
