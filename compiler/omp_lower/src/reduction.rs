//! Reduction declarations.
//!
//! A reduction declaration names an identity value and a two-argument
//! combiner for one (operator, element class, bit width) key. Declarations
//! are module-level and created lazily through [`ReductionRegistry`], which
//! guarantees one declaration per key for the whole compilation unit.
//!
//! Declaration names follow `<op>_reduction_<i|f>_<width>`, except logical
//! AND which is always `and_reduction` over `i1`.

use omp_ir::{names, Attribute, Checkpoint, IrBuilder, IrType, OpId, OpKind, Span, ValueId};
use rustc_hash::FxHashMap;

use crate::classify::ClauseBuckets;
use crate::context::Lowerer;
use crate::directive::{Clause, ClauseKind, IntrinsicOperator, ReductionOperator};
use crate::error::{LowerError, LowerResult};
use crate::host::HostLowering;
use crate::symbol::{SymbolId, SymbolTable};

/// Operators with a reduction lowering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReductionKind {
    Add,
    Multiply,
    And,
}

impl ReductionKind {
    /// Map a clause operator to a supported reduction kind.
    pub fn from_operator(
        op: &ReductionOperator,
        construct: &'static str,
        span: Span,
    ) -> LowerResult<Self> {
        match op {
            ReductionOperator::Intrinsic(IntrinsicOperator::Add) => Ok(ReductionKind::Add),
            ReductionOperator::Intrinsic(IntrinsicOperator::Multiply) => {
                Ok(ReductionKind::Multiply)
            }
            ReductionOperator::Intrinsic(IntrinsicOperator::And) => Ok(ReductionKind::And),
            ReductionOperator::Intrinsic(other) => Err(LowerError::unsupported(
                construct,
                format!("reduction operator {other:?}"),
                span,
            )),
            ReductionOperator::Procedure(name) => Err(LowerError::unsupported(
                construct,
                format!("reduction procedure {name}"),
                span,
            )),
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            ReductionKind::Add => "add",
            ReductionKind::Multiply => "multiply",
            ReductionKind::And => "and",
        }
    }

    /// Identity element of the operator.
    pub fn identity(self) -> i64 {
        match self {
            ReductionKind::Add => 0,
            ReductionKind::Multiply | ReductionKind::And => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementClass {
    Integer,
    Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReductionKey {
    pub kind: ReductionKind,
    pub class: ElementClass,
    pub width: u32,
}

impl ReductionKey {
    /// Build the key for `kind` over storage type `ty`.
    ///
    /// Logical storage reduces as `i1`. Anything other than a scalar
    /// integer, float, or logical has no reduction.
    pub fn new(
        kind: ReductionKind,
        ty: &IrType,
        construct: &'static str,
        span: Span,
    ) -> LowerResult<Self> {
        let (class, width) = match ty {
            IrType::Int(w) => (ElementClass::Integer, *w),
            IrType::Index => (ElementClass::Integer, 64),
            IrType::Float(w) => (ElementClass::Float, *w),
            IrType::Logical(_) => (ElementClass::Integer, 1),
            other => {
                return Err(LowerError::unsupported(
                    construct,
                    format!("reduction over {other}"),
                    span,
                ))
            }
        };
        match (kind, class) {
            (ReductionKind::And, ElementClass::Float) => Err(LowerError::unsupported(
                construct,
                "logical and reduction over a floating-point type",
                span,
            )),
            (ReductionKind::And, ElementClass::Integer) => Ok(Self {
                kind,
                class,
                width: 1,
            }),
            _ => Ok(Self { kind, class, width }),
        }
    }

    /// Element type the declaration is written over.
    pub fn element_type(self) -> IrType {
        match self.class {
            ElementClass::Integer => IrType::Int(self.width),
            ElementClass::Float => IrType::Float(self.width),
        }
    }

    pub fn symbol_name(self) -> String {
        if self.kind == ReductionKind::And {
            return "and_reduction".to_owned();
        }
        let class = match self.class {
            ElementClass::Integer => 'i',
            ElementClass::Float => 'f',
        };
        format!("{}_reduction_{class}_{}", self.kind.prefix(), self.width)
    }

    fn combiner(self) -> OpKind {
        match (self.kind, self.class) {
            (ReductionKind::Add, ElementClass::Integer) => OpKind::AddI,
            (ReductionKind::Add, ElementClass::Float) => OpKind::AddF,
            (ReductionKind::Multiply, ElementClass::Integer) => OpKind::MulI,
            (ReductionKind::Multiply, ElementClass::Float) => OpKind::MulF,
            (ReductionKind::And, _) => OpKind::AndI,
        }
    }
}

/// A created declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReductionDecl {
    pub op: OpId,
    pub name: String,
    pub ty: IrType,
    pub identity: i64,
}

/// De-duplicating map of reduction declarations for one module.
#[derive(Clone, Debug, Default)]
pub struct ReductionRegistry {
    decls: FxHashMap<ReductionKey, ReductionDecl>,
}

impl ReductionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ReductionKey) -> Option<&ReductionDecl> {
        self.decls.get(&key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Return the declaration for `key`, creating it at the start of the
    /// module body on first request.
    pub fn lookup_or_create(
        &mut self,
        builder: &mut IrBuilder,
        key: ReductionKey,
    ) -> &ReductionDecl {
        self.decls.entry(key).or_insert_with(|| {
            let decl = create_declaration(builder, key);
            tracing::debug!(name = %decl.name, "created reduction declaration");
            decl
        })
    }

    /// Drop declarations created after `cp`.
    pub fn forget_after(&mut self, cp: Checkpoint) {
        self.decls.retain(|_, decl| !cp.is_newer_op(decl.op));
    }
}

fn create_declaration(builder: &mut IrBuilder, key: ReductionKey) -> ReductionDecl {
    let ty = key.element_type();
    let name = key.symbol_name();
    let identity = key.kind.identity();

    let mut b = builder.guard();
    let body = b.module().body();
    b.position_at_start(body);
    let decl = b
        .build(OpKind::ReductionDeclare)
        .attr(names::SYM_NAME, Attribute::SymbolRef(name.clone()))
        .attr(names::TYPE, Attribute::Type(ty.clone()))
        .regions(2)
        .span(Span::DUMMY)
        .finish();
    let regions = b.module().op(decl).regions.clone();

    // Initializer: one argument (the original value), yields the identity.
    b.create_block(regions[0], std::slice::from_ref(&ty));
    let init = match key.class {
        ElementClass::Integer => b.const_int(ty.clone(), identity),
        ElementClass::Float => b.const_float(ty.clone(), if identity == 0 { 0.0 } else { 1.0 }),
    };
    b.terminate(OpKind::Yield, &[init]);

    // Combiner: two arguments, yields their combination.
    let combiner = b.create_block(regions[1], &[ty.clone(), ty.clone()]);
    let args = b.module().block(combiner).args.clone();
    let combined = b.binary(key.combiner(), args[0], args[1]);
    b.terminate(OpKind::Yield, &[combined]);

    ReductionDecl {
        op: decl,
        name,
        ty,
        identity,
    }
}

// ── Clause lowering ─────────────────────────────────────────────────

/// One reduction object of a construct, resolved outside its region.
#[derive(Clone, Debug)]
pub(crate) struct ReductionTarget {
    pub symbol: SymbolId,
    /// Storage the partial results are combined into.
    pub original: ValueId,
    pub key: ReductionKey,
    pub decl: String,
}

/// A private accumulator inside the construct's region.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Accumulator {
    pub private: ValueId,
    pub original: ValueId,
}

/// The `reductions` attribute: declaration names in operand order.
pub(crate) fn reductions_attr(targets: &[ReductionTarget]) -> Attribute {
    Attribute::Array(
        targets
            .iter()
            .map(|t| Attribute::SymbolRef(t.decl.clone()))
            .collect(),
    )
}

impl<H: HostLowering + ?Sized, S: SymbolTable + ?Sized> Lowerer<'_, H, S> {
    /// Resolve every `reduction` clause object, creating declarations on
    /// first use. Runs at the construct's own insertion point, before its
    /// operation exists.
    pub(crate) fn reduction_targets(
        &mut self,
        buckets: &ClauseBuckets<'_>,
        span: Span,
    ) -> LowerResult<Vec<ReductionTarget>> {
        let construct = buckets.construct().name();
        let mut targets = Vec::new();
        for node in buckets.iter(ClauseKind::Reduction) {
            let Clause::Reduction { op, objects } = &node.clause else {
                continue;
            };
            let kind = ReductionKind::from_operator(op, construct, node.span)?;
            for &symbol in objects {
                let info = self.symbol(symbol, node.span)?;
                let key = ReductionKey::new(kind, &info.ty, construct, node.span)?;
                let decl = self
                    .cx
                    .reductions
                    .lookup_or_create(&mut self.cx.builder, key)
                    .name
                    .clone();
                let original = self.symbol_address(symbol, span)?;
                targets.push(ReductionTarget {
                    symbol,
                    original,
                    key,
                    decl,
                });
            }
        }
        Ok(targets)
    }

    /// Allocate one accumulator per target, initialised to the identity,
    /// and rebind each symbol to it.
    pub(crate) fn open_accumulators(
        &mut self,
        targets: &[ReductionTarget],
        span: Span,
    ) -> LowerResult<Vec<Accumulator>> {
        let mut accumulators = Vec::with_capacity(targets.len());
        for target in targets {
            let info = self.symbol(target.symbol, span)?;
            let private = self.cx.builder.alloca(info.ty.clone(), Some(&info.name));
            let identity = target.key.kind.identity();
            let init = match target.key.class {
                ElementClass::Integer => self.cx.builder.const_int(info.ty.clone(), identity),
                ElementClass::Float => self
                    .cx
                    .builder
                    .const_float(info.ty.clone(), if identity == 0 { 0.0 } else { 1.0 }),
            };
            self.cx.builder.store(init, private);
            self.cx.bindings.bind(target.symbol, private);
            accumulators.push(Accumulator {
                private,
                original: target.original,
            });
        }
        Ok(accumulators)
    }

    /// Contribute each accumulator's partial value to its original.
    pub(crate) fn contribute(&mut self, accumulators: &[Accumulator]) {
        for acc in accumulators {
            let partial = self.cx.builder.load(acc.private);
            self.cx
                .builder
                .build(OpKind::Reduction)
                .operands([partial, acc.original])
                .finish();
        }
    }
}
