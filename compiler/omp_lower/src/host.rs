//! The host lowering service.
//!
//! General expression and statement code generation belongs to the front
//! end. The engine reaches it through [`HostLowering`], handing over a
//! [`LowerEnv`] that exposes the builder (positioned where the host should
//! emit), the current symbol bindings, and the placeholder blocks created
//! for unstructured bodies.

use omp_ir::{BlockId, IrBuilder, ValueId};
use rustc_hash::FxHashMap;

use crate::bindings::SymbolBindings;
use crate::directive::{EvalId, ExprRef, StmtRef};
use crate::error::LowerResult;

/// Engine state lent to the host for one call.
pub struct LowerEnv<'a> {
    pub builder: &'a mut IrBuilder,
    pub bindings: &'a SymbolBindings,
    /// Pre-created blocks of unstructured evaluations, for branch targets.
    pub eval_blocks: &'a FxHashMap<EvalId, BlockId>,
}

pub trait HostLowering {
    /// Lower `expr` to a value at the insertion point.
    fn lower_value(&mut self, expr: ExprRef, env: &mut LowerEnv<'_>) -> LowerResult<ValueId>;

    /// Lower the designator `expr` to its address at the insertion point.
    fn lower_address(&mut self, expr: ExprRef, env: &mut LowerEnv<'_>) -> LowerResult<ValueId>;

    /// Evaluate `expr` to a fixed integer, if it is a constant.
    fn fold_int(&self, expr: ExprRef) -> Option<i64>;

    /// Lower an executable statement at the insertion point.
    fn lower_statement(&mut self, stmt: StmtRef, env: &mut LowerEnv<'_>) -> LowerResult<()>;

    /// Emit the host construct introduced by `header` and position the
    /// builder inside its body. The engine lowers the body next, then
    /// calls [`exit_nested`](HostLowering::exit_nested).
    fn enter_nested(&mut self, header: StmtRef, env: &mut LowerEnv<'_>) -> LowerResult<()>;

    /// Finish the construct opened by `enter_nested` and leave the builder
    /// positioned after it.
    fn exit_nested(&mut self, header: StmtRef, env: &mut LowerEnv<'_>) -> LowerResult<()>;
}
