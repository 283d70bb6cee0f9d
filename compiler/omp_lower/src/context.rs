//! Lowering context and the per-call lowerer.
//!
//! [`LoweringContext`] is the compilation-unit state that outlives a single
//! construct: the builder and module, symbol bindings, the reduction and
//! critical-section registries, options, and collected diagnostics.
//!
//! [`Lowerer`] borrows the context together with the host and symbol
//! services for the duration of one top-level construct. Handlers for the
//! individual construct kinds are `impl Lowerer` blocks in sibling modules.

use omp_ir::{Checkpoint, IrBuilder, IrModule, OpId, Span, ValueId};
use rustc_hash::FxHashMap;

use crate::bindings::SymbolBindings;
use crate::directive::{EvalId, ExprRef};
use crate::error::{Diagnostic, LowerError, LowerResult};
use crate::host::{HostLowering, LowerEnv};
use crate::options::LowerOptions;
use crate::reduction::ReductionRegistry;
use crate::symbol::{SymbolFlags, SymbolId, SymbolInfo, SymbolTable};

/// State shared by every construct of one compilation unit.
pub struct LoweringContext {
    pub(crate) builder: IrBuilder,
    pub(crate) bindings: SymbolBindings,
    pub(crate) reductions: ReductionRegistry,
    /// Named critical sections → their declaration.
    pub(crate) criticals: FxHashMap<String, OpId>,
    pub(crate) eval_blocks: FxHashMap<EvalId, omp_ir::BlockId>,
    pub(crate) options: LowerOptions,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

/// Registry and module state captured before a top-level construct.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Snapshot {
    checkpoint: Checkpoint,
    diagnostics: usize,
}

impl LoweringContext {
    pub fn new(options: LowerOptions) -> Self {
        Self::with_module(IrModule::new(), options)
    }

    /// Continue lowering into an existing module.
    pub fn with_module(module: IrModule, options: LowerOptions) -> Self {
        Self {
            builder: IrBuilder::new(module),
            bindings: SymbolBindings::new(),
            reductions: ReductionRegistry::new(),
            criticals: FxHashMap::default(),
            eval_blocks: FxHashMap::default(),
            options,
            diagnostics: Vec::new(),
        }
    }

    #[inline]
    pub fn builder(&self) -> &IrBuilder {
        &self.builder
    }

    /// Builder access for hosts that emit surrounding code.
    #[inline]
    pub fn builder_mut(&mut self) -> &mut IrBuilder {
        &mut self.builder
    }

    #[inline]
    pub fn module(&self) -> &IrModule {
        self.builder.module()
    }

    /// Record the storage of `symbol` in the current scope.
    pub fn bind(&mut self, symbol: SymbolId, storage: ValueId) {
        self.bindings.bind(symbol, storage);
    }

    #[inline]
    pub fn bindings(&self) -> &SymbolBindings {
        &self.bindings
    }

    #[inline]
    pub fn reductions(&self) -> &ReductionRegistry {
        &self.reductions
    }

    #[inline]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[inline]
    pub fn options(&self) -> &LowerOptions {
        &self.options
    }

    pub fn into_module(self) -> IrModule {
        self.builder.into_module()
    }

    pub(crate) fn env(&mut self) -> LowerEnv<'_> {
        LowerEnv {
            builder: &mut self.builder,
            bindings: &self.bindings,
            eval_blocks: &self.eval_blocks,
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            checkpoint: self.builder.module().checkpoint(),
            diagnostics: self.diagnostics.len(),
        }
    }

    /// Remove everything produced since `snapshot`.
    pub(crate) fn restore(&mut self, snapshot: Snapshot) {
        let cp = snapshot.checkpoint;
        self.builder.module_mut().rollback(cp);
        self.reductions.forget_after(cp);
        self.criticals.retain(|_, op| !cp.is_newer_op(*op));
        self.diagnostics.truncate(snapshot.diagnostics);
        let blocks = self.builder.module().block_count();
        self.eval_blocks.retain(|_, block| block.index() < blocks);
    }
}

/// Borrowed services for lowering one top-level construct.
pub(crate) struct Lowerer<'a, H: ?Sized, S: ?Sized> {
    pub(crate) cx: &'a mut LoweringContext,
    pub(crate) host: &'a mut H,
    pub(crate) symbols: &'a S,
}

impl<'a, H: HostLowering + ?Sized, S: SymbolTable + ?Sized> Lowerer<'a, H, S> {
    pub(crate) fn new(cx: &'a mut LoweringContext, host: &'a mut H, symbols: &'a S) -> Self {
        Self { cx, host, symbols }
    }

    /// Run `f` in a fresh binding scope, restoring the insertion point and
    /// popping the scope on every exit path.
    pub(crate) fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> LowerResult<T>,
    ) -> LowerResult<T> {
        let ip = self.cx.builder.insertion_point();
        let depth = self.cx.bindings.depth();
        self.cx.bindings.push_scope();
        let result = f(self);
        while self.cx.bindings.depth() > depth {
            self.cx.bindings.pop_scope();
        }
        self.cx.builder.set_insertion_point(ip);
        result
    }

    // ── Host service ────────────────────────────────────────────────

    pub(crate) fn value(&mut self, expr: ExprRef) -> LowerResult<ValueId> {
        self.host.lower_value(expr, &mut self.cx.env())
    }

    pub(crate) fn address(&mut self, expr: ExprRef) -> LowerResult<ValueId> {
        self.host.lower_address(expr, &mut self.cx.env())
    }

    /// Constant-fold `expr`, which must be a fixed integer.
    pub(crate) fn fold(&self, expr: ExprRef, what: &str, span: Span) -> LowerResult<i64> {
        self.host
            .fold_int(expr)
            .ok_or_else(|| LowerError::invariant(format!("{what} is not a constant integer"), span))
    }

    // ── Symbols ─────────────────────────────────────────────────────

    pub(crate) fn symbol(&self, id: SymbolId, span: Span) -> LowerResult<&'a SymbolInfo> {
        let symbols: &'a S = self.symbols;
        symbols
            .get(id)
            .ok_or_else(|| LowerError::invariant(format!("missing symbol {}", id.raw()), span))
    }

    /// Current storage of `symbol`.
    ///
    /// A host-associated symbol without a binding of its own picks up its
    /// host's binding, which is then recorded for the rest of the scope.
    pub(crate) fn symbol_address(&mut self, symbol: SymbolId, span: Span) -> LowerResult<ValueId> {
        if let Some(addr) = self.cx.bindings.lookup(symbol) {
            return Ok(addr);
        }
        let info = self.symbol(symbol, span)?;
        if info.has(SymbolFlags::HOST_ASSOCIATED) {
            if let Some(addr) = info.host.and_then(|host| self.cx.bindings.lookup(host)) {
                self.cx.bindings.bind(symbol, addr);
                return Ok(addr);
            }
        }
        Err(LowerError::invariant(
            format!("missing binding for symbol {}", info.name),
            span,
        ))
    }

    pub(crate) fn warn(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(span = %diagnostic.span, "{}", diagnostic.message);
        self.cx.diagnostics.push(diagnostic);
    }
}
