//! Shared fixtures for the lowering tests.
//!
//! [`TestHost`] is a scripted host: expressions are registered up front as
//! constants, symbol references, or additions; statements become opaque
//! `host.stmt` operations; nested host constructs become `host.if` regions.

use omp_ir::{names, Attribute, IrModule, IrType, OpId, OpKind, Span, ValueId};
use rustc_hash::FxHashMap;

use crate::context::LoweringContext;
use crate::directive::{
    Clause, ConstructKind, CountedLoop, Directive, EvalId, EvalKind, Evaluation, ExprRef,
    LoopBounds, StmtRef,
};
use crate::error::{LowerError, LowerResult};
use crate::host::{HostLowering, LowerEnv};
use crate::options::LowerOptions;
use crate::symbol::{SymbolArena, SymbolId, SymbolInfo};

#[derive(Clone, Debug)]
pub enum TestExpr {
    Int(IrType, i64),
    Float(IrType, f64),
    Symbol(SymbolId),
    Add(ExprRef, ExprRef),
    /// A value the host cannot fold.
    Opaque(IrType),
}

#[derive(Default)]
pub struct TestHost {
    exprs: FxHashMap<ExprRef, TestExpr>,
    open: Vec<OpId>,
    next_stmt: u32,
    next_eval: u32,
}

impl TestHost {
    fn push(&mut self, expr: TestExpr) -> ExprRef {
        #[expect(clippy::cast_possible_truncation, reason = "test fixture sizes")]
        let id = ExprRef::new(self.exprs.len() as u32);
        self.exprs.insert(id, expr);
        id
    }

    /// An `i32` constant.
    pub fn int(&mut self, value: i64) -> ExprRef {
        self.push(TestExpr::Int(IrType::I32, value))
    }

    pub fn typed_int(&mut self, ty: IrType, value: i64) -> ExprRef {
        self.push(TestExpr::Int(ty, value))
    }

    pub fn float(&mut self, value: f64) -> ExprRef {
        self.push(TestExpr::Float(IrType::Float(64), value))
    }

    pub fn sym(&mut self, symbol: SymbolId) -> ExprRef {
        self.push(TestExpr::Symbol(symbol))
    }

    pub fn add(&mut self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.push(TestExpr::Add(lhs, rhs))
    }

    pub fn opaque(&mut self, ty: IrType) -> ExprRef {
        self.push(TestExpr::Opaque(ty))
    }

    pub fn eval_id(&mut self) -> EvalId {
        self.next_eval += 1;
        EvalId::new(self.next_eval)
    }

    /// A statement evaluation referencing `uses`.
    pub fn stmt(&mut self, uses: &[SymbolId]) -> Evaluation {
        self.next_stmt += 1;
        let id = self.eval_id();
        Evaluation::new(id, EvalKind::Statement(StmtRef::new(self.next_stmt)))
            .with_uses(uses.iter().copied())
    }

    /// A counted loop over `var` from `lower` to `upper`.
    pub fn counted(
        &mut self,
        var: SymbolId,
        lower: i64,
        upper: i64,
        body: Vec<Evaluation>,
    ) -> Evaluation {
        let lower = self.int(lower);
        let upper = self.int(upper);
        self.next_stmt += 1;
        let id = self.eval_id();
        Evaluation::new(
            id,
            EvalKind::Loop(CountedLoop {
                header: StmtRef::new(self.next_stmt),
                var,
                bounds: Some(LoopBounds {
                    lower,
                    upper,
                    step: None,
                }),
                body,
            }),
        )
        .with_uses([var])
    }

    /// A host construct with a nested body.
    pub fn nested(&mut self, body: Vec<Evaluation>) -> Evaluation {
        self.next_stmt += 1;
        let id = self.eval_id();
        Evaluation::new(
            id,
            EvalKind::Nested {
                header: StmtRef::new(self.next_stmt),
                body,
            },
        )
    }

    /// A nested directive evaluation.
    pub fn directive(&mut self, dir: Directive) -> Evaluation {
        let id = self.eval_id();
        Evaluation::new(id, EvalKind::Directive(Box::new(dir)))
    }

    fn expr(&self, expr: ExprRef) -> LowerResult<&TestExpr> {
        self.exprs.get(&expr).ok_or_else(|| {
            LowerError::invariant(format!("unknown expression {}", expr.raw()), Span::DUMMY)
        })
    }
}

impl HostLowering for TestHost {
    fn lower_value(&mut self, expr: ExprRef, env: &mut LowerEnv<'_>) -> LowerResult<ValueId> {
        match self.expr(expr)?.clone() {
            TestExpr::Int(ty, v) => Ok(env.builder.const_int(ty, v)),
            TestExpr::Float(ty, v) => Ok(env.builder.const_float(ty, v)),
            TestExpr::Symbol(sym) => {
                let bound = env
                    .bindings
                    .lookup(sym)
                    .ok_or_else(|| LowerError::invariant("unbound symbol", Span::DUMMY))?;
                if env.builder.value_type(bound).is_reference() {
                    Ok(env.builder.load(bound))
                } else {
                    Ok(bound)
                }
            }
            TestExpr::Add(lhs, rhs) => {
                let lhs = self.lower_value(lhs, env)?;
                let rhs = self.lower_value(rhs, env)?;
                let ty = env.builder.value_type(lhs).clone();
                let rhs = env.builder.convert(&ty, rhs);
                let kind = if ty.is_float() { OpKind::AddF } else { OpKind::AddI };
                Ok(env.builder.binary(kind, lhs, rhs))
            }
            TestExpr::Opaque(ty) => {
                let op = env
                    .builder
                    .build(OpKind::Generic("host.opaque"))
                    .result(ty)
                    .finish();
                Ok(env.builder.result(op))
            }
        }
    }

    fn lower_address(&mut self, expr: ExprRef, env: &mut LowerEnv<'_>) -> LowerResult<ValueId> {
        match self.expr(expr)? {
            TestExpr::Symbol(sym) => env
                .bindings
                .lookup(*sym)
                .ok_or_else(|| LowerError::invariant("unbound symbol", Span::DUMMY)),
            _ => Err(LowerError::invariant("not a designator", Span::DUMMY)),
        }
    }

    fn fold_int(&self, expr: ExprRef) -> Option<i64> {
        match self.exprs.get(&expr)? {
            TestExpr::Int(_, v) => Some(*v),
            _ => None,
        }
    }

    fn lower_statement(&mut self, stmt: StmtRef, env: &mut LowerEnv<'_>) -> LowerResult<()> {
        env.builder
            .build(OpKind::Generic("host.stmt"))
            .attr(names::VALUE, Attribute::Int(i64::from(stmt.raw())))
            .finish();
        Ok(())
    }

    fn enter_nested(&mut self, _header: StmtRef, env: &mut LowerEnv<'_>) -> LowerResult<()> {
        let cond = env.builder.const_int(IrType::I1, 1);
        let op = env.builder.build(OpKind::If).operand(cond).regions(1).finish();
        let region = env.builder.module().op(op).regions[0];
        env.builder.create_block(region, &[]);
        let term = env.builder.terminate(OpKind::IfYield, &[]);
        env.builder.position_before(term);
        self.open.push(op);
        Ok(())
    }

    fn exit_nested(&mut self, _header: StmtRef, env: &mut LowerEnv<'_>) -> LowerResult<()> {
        let op = self
            .open
            .pop()
            .ok_or_else(|| LowerError::invariant("unbalanced nested construct", Span::DUMMY))?;
        env.builder.position_after(op);
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub struct Fixture {
    pub cx: LoweringContext,
    pub host: TestHost,
    pub symbols: SymbolArena,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_options(LowerOptions::default())
    }

    pub fn with_options(options: LowerOptions) -> Self {
        Self {
            cx: LoweringContext::new(options),
            host: TestHost::default(),
            symbols: SymbolArena::new(),
        }
    }

    /// A variable with module-level stack storage bound to it.
    pub fn var(&mut self, name: &str, ty: IrType) -> SymbolId {
        self.declare(SymbolInfo::variable(name, ty))
    }

    /// Push `info` and bind fresh storage of its type.
    pub fn declare(&mut self, info: SymbolInfo) -> SymbolId {
        let ty = info.ty.clone();
        let name = info.name.clone();
        let sym = self.symbols.push(info);
        let storage = self.cx.builder_mut().alloca(ty, Some(&name));
        self.cx.bind(sym, storage);
        sym
    }

    /// Push `info` without binding storage.
    pub fn symbol(&mut self, info: SymbolInfo) -> SymbolId {
        self.symbols.push(info)
    }

    pub fn lower(&mut self, dir: &Directive) -> LowerResult<()> {
        crate::lower_construct(&mut self.cx, &mut self.host, &self.symbols, dir)
    }

    pub fn module(&self) -> &IrModule {
        self.cx.module()
    }

    pub fn count(&self, kind: OpKind) -> usize {
        self.module().count(kind)
    }

    /// Live operations of `kind`, in pre-order.
    pub fn ops(&self, kind: OpKind) -> Vec<OpId> {
        let module = self.module();
        module
            .walk()
            .into_iter()
            .filter(|&op| module.op(op).kind == kind)
            .collect()
    }

    /// The only live operation of `kind`.
    pub fn single(&self, kind: OpKind) -> OpId {
        let ops = self.ops(kind);
        assert_eq!(ops.len(), 1, "expected exactly one {}", kind.name());
        ops[0]
    }

    /// Kinds of the operations directly in the entry block of `op`.
    pub fn entry_kinds(&self, op: OpId) -> Vec<OpKind> {
        let module = self.module();
        let Some(entry) = module.entry_block(op, 0) else {
            return Vec::new();
        };
        module
            .block(entry)
            .ops
            .iter()
            .map(|&o| module.op(o).kind)
            .collect()
    }
}

/// A directive of `kind` with `clauses` and `body`.
pub fn directive(kind: ConstructKind, clauses: Vec<Clause>, body: Vec<Evaluation>) -> Directive {
    clauses
        .into_iter()
        .fold(Directive::new(kind, Span::new(10, 20)), Directive::clause)
        .body(body)
}
