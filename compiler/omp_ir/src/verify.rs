//! Structural verification of a finished module.
//!
//! Checks the invariants every pass relies on: each region of a live
//! operation has at least one block, each block of an operation's region
//! ends in exactly one terminator, and every operand names a value that
//! exists in the arena.

use crate::id::{BlockId, OpId, ValueId};
use crate::module::IrModule;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("{op} ({kind}) has an empty region")]
    EmptyRegion { op: OpId, kind: &'static str },
    #[error("block {block} in {op} ({kind}) does not end in a terminator")]
    MissingTerminator {
        block: BlockId,
        op: OpId,
        kind: &'static str,
    },
    #[error("terminator {op} ({kind}) is not the last operation of block {block}")]
    MisplacedTerminator {
        block: BlockId,
        op: OpId,
        kind: &'static str,
    },
    #[error("{op} ({kind}) uses unknown value {value}")]
    DanglingOperand {
        op: OpId,
        kind: &'static str,
        value: ValueId,
    },
}

/// Verify the whole module, reporting the first violation.
pub fn verify_module(module: &IrModule) -> Result<(), VerifyError> {
    check_terminators(module, module.body(), None)?;
    for op_id in module.walk() {
        let op = module.op(op_id);
        let kind = op.kind.name();
        for &value in &op.operands {
            if !module.has_value(value) {
                return Err(VerifyError::DanglingOperand {
                    op: op_id,
                    kind,
                    value,
                });
            }
        }
        for &region in &op.regions {
            let blocks = &module.region(region).blocks;
            if blocks.is_empty() {
                return Err(VerifyError::EmptyRegion { op: op_id, kind });
            }
            for &block in blocks {
                check_terminators(module, block, Some(op_id))?;
            }
        }
    }
    Ok(())
}

/// The module body has no terminator; nested blocks need exactly one, last.
fn check_terminators(
    module: &IrModule,
    block: BlockId,
    owner: Option<OpId>,
) -> Result<(), VerifyError> {
    let ops = &module.block(block).ops;
    for (i, &op) in ops.iter().enumerate() {
        let kind = module.op(op).kind;
        if kind.is_terminator() && (owner.is_none() || i + 1 != ops.len()) {
            return Err(VerifyError::MisplacedTerminator {
                block,
                op,
                kind: kind.name(),
            });
        }
    }
    if let Some(owner) = owner {
        let terminated = ops
            .last()
            .is_some_and(|&op| module.op(op).kind.is_terminator());
        if !terminated {
            return Err(VerifyError::MissingTerminator {
                block,
                op: owner,
                kind: module.op(owner).kind.name(),
            });
        }
    }
    Ok(())
}
