//! The module arena.
//!
//! [`IrModule`] owns every operation, block, region, and value. Entities
//! are never freed individually: detaching an operation only unlinks it
//! from its block, and the arena slot stays behind as a dead entry. The
//! "live" IR is whatever is reachable from the module body.
//!
//! # Rollback
//!
//! Because handles are allocated sequentially, a [`Checkpoint`] is just the
//! four arena lengths. [`IrModule::rollback`] truncates the arenas and
//! unlinks every later entity from the surviving blocks and regions. Edits
//! to entities that predate the checkpoint (attribute changes, moves) are
//! not undone; the lowering engine only ever appends.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::attr::{names, AttrMap, Attribute};
use crate::id::{next_index, BlockId, OpId, RegionId, ValueId};
use crate::op::{Block, OpKind, Operation, Region, Value, ValueDef};
use crate::span::Span;
use crate::types::IrType;

/// Arena lengths captured by [`IrModule::checkpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    ops: usize,
    blocks: usize,
    regions: usize,
    values: usize,
}

impl Checkpoint {
    /// Whether `op` was created after this checkpoint.
    #[inline]
    pub fn is_newer_op(&self, op: OpId) -> bool {
        op.index() >= self.ops
    }
}

/// Everything needed to create one operation.
#[derive(Clone, Debug)]
pub struct OpState {
    pub kind: OpKind,
    pub attrs: AttrMap,
    pub operands: SmallVec<[ValueId; 4]>,
    pub result_types: SmallVec<[IrType; 1]>,
    pub num_regions: usize,
    pub successors: SmallVec<[BlockId; 2]>,
    pub span: Span,
}

impl OpState {
    pub fn new(kind: OpKind, span: Span) -> Self {
        Self {
            kind,
            attrs: AttrMap::new(),
            operands: SmallVec::new(),
            result_types: SmallVec::new(),
            num_regions: 0,
            successors: SmallVec::new(),
            span,
        }
    }
}

/// Arena-backed module: one top-level region with a single body block.
#[derive(Clone, Debug)]
pub struct IrModule {
    ops: Vec<Operation>,
    blocks: Vec<Block>,
    regions: Vec<Region>,
    values: Vec<Value>,
    body: BlockId,
}

impl Default for IrModule {
    fn default() -> Self {
        Self::new()
    }
}

impl IrModule {
    /// Create an empty module with its body block.
    pub fn new() -> Self {
        let region = RegionId::new(0);
        let body = BlockId::new(0);
        Self {
            ops: Vec::new(),
            blocks: vec![Block {
                args: SmallVec::new(),
                ops: Vec::new(),
                parent: region,
            }],
            regions: vec![Region {
                blocks: vec![body],
                parent: None,
            }],
            values: Vec::new(),
            body,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// The module body block.
    #[inline]
    pub fn body(&self) -> BlockId {
        self.body
    }

    #[inline]
    pub fn op(&self, id: OpId) -> &Operation {
        &self.ops[id.index()]
    }

    #[inline]
    pub fn op_mut(&mut self, id: OpId) -> &mut Operation {
        &mut self.ops[id.index()]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.index()]
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    #[inline]
    pub fn value_type(&self, id: ValueId) -> &IrType {
        &self.values[id.index()].ty
    }

    /// Number of blocks ever created, live or dead.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Whether `id` names an entity in the value arena.
    #[inline]
    pub fn has_value(&self, id: ValueId) -> bool {
        id.index() < self.values.len()
    }

    /// Operation defining `value`, or `None` for block arguments.
    pub fn defining_op(&self, value: ValueId) -> Option<OpId> {
        match self.value(value).def {
            ValueDef::OpResult { op, .. } => Some(op),
            ValueDef::BlockArg { .. } => None,
        }
    }

    /// Operation owning the region that contains `block`.
    pub fn parent_op(&self, block: BlockId) -> Option<OpId> {
        self.region(self.block(block).parent).parent
    }

    /// Entry block of region `index` of `op`.
    pub fn entry_block(&self, op: OpId, index: usize) -> Option<BlockId> {
        let region = *self.op(op).regions.get(index)?;
        self.region(region).entry()
    }

    // ── Construction ────────────────────────────────────────────────

    fn push_value(&mut self, ty: IrType, def: ValueDef) -> ValueId {
        let id = ValueId::new(next_index(self.values.len()));
        self.values.push(Value { ty, def });
        id
    }

    fn push_region(&mut self, parent: Option<OpId>) -> RegionId {
        let id = RegionId::new(next_index(self.regions.len()));
        self.regions.push(Region {
            blocks: Vec::new(),
            parent,
        });
        id
    }

    /// Create a detached operation with fresh results and empty regions.
    pub fn create_op(&mut self, state: OpState) -> OpId {
        let id = OpId::new(next_index(self.ops.len()));
        let results = state
            .result_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| {
                self.push_value(
                    ty,
                    ValueDef::OpResult {
                        op: id,
                        index: next_index(index),
                    },
                )
            })
            .collect();
        let regions = (0..state.num_regions)
            .map(|_| self.push_region(Some(id)))
            .collect();
        self.ops.push(Operation {
            kind: state.kind,
            attrs: state.attrs,
            operands: state.operands,
            results,
            regions,
            successors: state.successors,
            span: state.span,
            parent: None,
        });
        id
    }

    /// Append a new block with the given argument types to `region`.
    pub fn append_block(&mut self, region: RegionId, arg_types: &[IrType]) -> BlockId {
        let id = BlockId::new(next_index(self.blocks.len()));
        let args = arg_types
            .iter()
            .enumerate()
            .map(|(index, ty)| {
                self.push_value(
                    ty.clone(),
                    ValueDef::BlockArg {
                        block: id,
                        index: next_index(index),
                    },
                )
            })
            .collect();
        self.blocks.push(Block {
            args,
            ops: Vec::new(),
            parent: region,
        });
        self.regions[region.index()].blocks.push(id);
        id
    }

    /// Link a detached operation into `block`, before `before` or at the end.
    pub fn insert_op(&mut self, block: BlockId, before: Option<OpId>, op: OpId) {
        let list = &mut self.blocks[block.index()].ops;
        let pos = before
            .and_then(|anchor| list.iter().position(|&o| o == anchor))
            .unwrap_or(list.len());
        list.insert(pos, op);
        self.ops[op.index()].parent = Some(block);
    }

    /// Unlink an operation from its block. The arena entry stays.
    pub fn detach_op(&mut self, op: OpId) {
        if let Some(block) = self.ops[op.index()].parent.take() {
            self.blocks[block.index()].ops.retain(|&o| o != op);
        }
    }

    /// Put `new` where `old` is and detach `old`.
    pub fn replace_op(&mut self, old: OpId, new: OpId) {
        if let Some(block) = self.op(old).parent {
            self.insert_op(block, Some(old), new);
            self.detach_op(old);
        }
    }

    /// Move every block of `from` to the end of `to`.
    pub fn move_region_blocks(&mut self, from: RegionId, to: RegionId) {
        let moved = std::mem::take(&mut self.regions[from.index()].blocks);
        for &block in &moved {
            self.blocks[block.index()].parent = to;
        }
        self.regions[to.index()].blocks.extend(moved);
    }

    /// Give block argument `index` of `block` a new type.
    ///
    /// Returns the replacement value. The old value is left dangling;
    /// callers remap its uses.
    pub fn retype_block_arg(&mut self, block: BlockId, index: usize, ty: IrType) -> ValueId {
        let new = self.push_value(
            ty,
            ValueDef::BlockArg {
                block,
                index: next_index(index),
            },
        );
        self.blocks[block.index()].args[index] = new;
        new
    }

    /// Rewrite operands of every operation through `map`.
    ///
    /// Returns how many operand slots changed.
    pub fn replace_uses(&mut self, map: &FxHashMap<ValueId, ValueId>) -> usize {
        if map.is_empty() {
            return 0;
        }
        let mut changed = 0;
        for op in &mut self.ops {
            for operand in &mut op.operands {
                if let Some(&new) = map.get(operand) {
                    *operand = new;
                    changed += 1;
                }
            }
        }
        changed
    }

    // ── Traversal ───────────────────────────────────────────────────

    /// All live operations in pre-order, starting from the module body.
    pub fn walk(&self) -> Vec<OpId> {
        let mut out = Vec::with_capacity(self.ops.len());
        self.walk_block(self.body, &mut out);
        out
    }

    /// Live operations nested anywhere under `region`, in pre-order.
    pub fn walk_region(&self, region: RegionId) -> Vec<OpId> {
        let mut out = Vec::new();
        for &block in &self.region(region).blocks {
            self.walk_block(block, &mut out);
        }
        out
    }

    fn walk_block(&self, block: BlockId, out: &mut Vec<OpId>) {
        for &op in &self.block(block).ops {
            out.push(op);
            for &region in &self.op(op).regions {
                for &inner in &self.region(region).blocks {
                    self.walk_block(inner, out);
                }
            }
        }
    }

    /// Count live operations of the given kind.
    pub fn count(&self, kind: OpKind) -> usize {
        self.walk()
            .into_iter()
            .filter(|&op| self.op(op).kind == kind)
            .count()
    }

    /// Find a top-level declaration by kind and `sym_name`.
    pub fn lookup_symbol(&self, kind: OpKind, name: &str) -> Option<OpId> {
        self.block(self.body).ops.iter().copied().find(|&op| {
            let op = self.op(op);
            op.kind == kind
                && op
                    .attrs
                    .get(names::SYM_NAME)
                    .and_then(Attribute::as_symbol)
                    == Some(name)
        })
    }

    // ── Checkpoint / rollback ───────────────────────────────────────

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            ops: self.ops.len(),
            blocks: self.blocks.len(),
            regions: self.regions.len(),
            values: self.values.len(),
        }
    }

    /// Discard every entity created after `cp`.
    pub fn rollback(&mut self, cp: Checkpoint) {
        self.ops.truncate(cp.ops);
        self.blocks.truncate(cp.blocks);
        self.regions.truncate(cp.regions);
        self.values.truncate(cp.values);

        for block in &mut self.blocks {
            block.ops.retain(|op| op.index() < cp.ops);
            block.args.retain(|arg| arg.index() < cp.values);
        }
        for region in &mut self.regions {
            region.blocks.retain(|block| block.index() < cp.blocks);
        }
    }
}
