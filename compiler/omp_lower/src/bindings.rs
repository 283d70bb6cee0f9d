//! Symbol → storage bindings.
//!
//! [`SymbolBindings`] maps each symbol to the IR value currently standing
//! for its storage. Every construct pushes a scope on entry and pops it on
//! exit, so a privatized clone or threadprivate handle is only visible
//! inside the construct that created it and the enclosing binding comes
//! back automatically afterwards.

use omp_ir::ValueId;
use rustc_hash::FxHashMap;

use crate::symbol::SymbolId;

#[derive(Clone, Debug)]
pub struct SymbolBindings {
    scopes: Vec<FxHashMap<SymbolId, ValueId>>,
}

impl Default for SymbolBindings {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolBindings {
    /// Create bindings with a single root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![FxHashMap::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// Pop the innermost scope. The root scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind `symbol` in the innermost scope, shadowing outer bindings.
    pub fn bind(&mut self, symbol: SymbolId, value: ValueId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(symbol, value);
        }
    }

    /// Innermost binding of `symbol`.
    pub fn lookup(&self, symbol: SymbolId) -> Option<ValueId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&symbol).copied())
    }

    /// Whether `symbol` is bound in the innermost scope itself.
    pub fn is_bound_here(&self, symbol: SymbolId) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.contains_key(&symbol))
    }
}
