//! Module mutation shared by the conversion patterns.
//!
//! A rewrite never edits an operation in place. It creates a replacement of
//! the same kind with converted result types, moves the old regions into
//! it, retypes any illegal block arguments of those regions, and redirects
//! every use of the old results and arguments to the new values. Because
//! uses are redirected eagerly, an operation visited later in pre-order
//! already sees converted operands.

use omp_ir::{AttrMap, Attribute, IrModule, IrType, OpId, OpState, ValueId};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{ConversionFailure, ConversionResult, FailureReason};
use crate::types::TypeConverter;

pub type Operands = SmallVec<[ValueId; 4]>;

pub struct Rewriter<'m> {
    module: &'m mut IrModule,
    converter: &'m dyn TypeConverter,
    /// Pre-conversion type of every value a rewrite introduced with a
    /// different type.
    origins: FxHashMap<ValueId, IrType>,
    rewrites: usize,
}

impl<'m> Rewriter<'m> {
    pub fn new(module: &'m mut IrModule, converter: &'m dyn TypeConverter) -> Self {
        Self {
            module,
            converter,
            origins: FxHashMap::default(),
            rewrites: 0,
        }
    }

    #[inline]
    pub fn module(&self) -> &IrModule {
        &*self.module
    }

    #[inline]
    pub fn converter(&self) -> &dyn TypeConverter {
        self.converter
    }

    /// Operations replaced so far.
    #[inline]
    pub fn rewrites(&self) -> usize {
        self.rewrites
    }

    /// The type `value` had before any conversion.
    pub fn source_type(&self, value: ValueId) -> &IrType {
        self.origins
            .get(&value)
            .unwrap_or_else(|| self.module.value_type(value))
    }

    pub fn fail(&self, op: OpId, reason: FailureReason) -> ConversionFailure {
        ConversionFailure::new(op, self.module.op(op).kind, reason)
    }

    // ── Legality ────────────────────────────────────────────────────

    #[inline]
    pub fn is_legal_value(&self, value: ValueId) -> bool {
        self.converter.is_legal(self.module.value_type(value))
    }

    pub fn operands_legal(&self, op: OpId) -> bool {
        self.module
            .op(op)
            .operands
            .iter()
            .all(|&v| self.is_legal_value(v))
    }

    pub fn results_legal(&self, op: OpId) -> bool {
        self.module
            .op(op)
            .results
            .iter()
            .all(|&v| self.is_legal_value(v))
    }

    /// Arguments of every block in the regions `op` owns directly.
    pub fn block_args_legal(&self, op: OpId) -> bool {
        self.module.op(op).regions.iter().all(|&region| {
            self.module.region(region).blocks.iter().all(|&block| {
                self.module
                    .block(block)
                    .args
                    .iter()
                    .all(|&v| self.is_legal_value(v))
            })
        })
    }

    pub fn type_attrs_legal(&self, op: OpId) -> bool {
        self.module
            .op(op)
            .attrs
            .iter()
            .all(|(_, attr)| self.attr_legal(attr))
    }

    fn attr_legal(&self, attr: &Attribute) -> bool {
        match attr {
            Attribute::Type(ty) => self.converter.is_legal(ty),
            Attribute::Array(items) => items.iter().all(|item| self.attr_legal(item)),
            _ => true,
        }
    }

    /// Operands, values and block arguments all legal.
    pub fn signature_legal(&self, op: OpId) -> bool {
        self.operands_legal(op) && self.results_legal(op) && self.block_args_legal(op)
    }

    // ── Conversion ──────────────────────────────────────────────────

    pub fn convert_type(&self, op: OpId, ty: &IrType) -> ConversionResult<IrType> {
        if self.converter.is_legal(ty) {
            return Ok(ty.clone());
        }
        self.converter
            .convert_type(ty)
            .filter(|converted| self.converter.is_legal(converted))
            .ok_or_else(|| self.fail(op, FailureReason::UnconvertibleType(ty.clone())))
    }

    /// The current operands of `op`, failing on the first one that is
    /// still illegal.
    pub fn legal_operands(&self, op: OpId) -> ConversionResult<Operands> {
        let operands = &self.module.op(op).operands;
        for (index, &value) in operands.iter().enumerate() {
            if !self.is_legal_value(value) {
                let ty = self.module.value_type(value).clone();
                return Err(self.fail(op, FailureReason::IllegalOperand { index, ty }));
            }
        }
        Ok(operands.clone())
    }

    /// `attrs` with every type attribute converted.
    pub fn convert_attrs(&self, op: OpId, attrs: &AttrMap) -> ConversionResult<AttrMap> {
        let mut out = AttrMap::new();
        for (name, attr) in attrs.iter() {
            out.set(name, self.convert_attr(op, attr)?);
        }
        Ok(out)
    }

    fn convert_attr(&self, op: OpId, attr: &Attribute) -> ConversionResult<Attribute> {
        match attr {
            Attribute::Type(ty) => Ok(Attribute::Type(self.convert_type(op, ty)?)),
            Attribute::Array(items) => items
                .iter()
                .map(|item| self.convert_attr(op, item))
                .collect::<ConversionResult<Vec<_>>>()
                .map(Attribute::Array),
            other => Ok(other.clone()),
        }
    }

    /// Replace `op` with an operation of the same kind carrying `operands`
    /// and `attrs`. Result and block-argument types are converted; the
    /// module is untouched if any of them has no target type.
    pub fn replace_op(
        &mut self,
        op: OpId,
        operands: Operands,
        attrs: AttrMap,
    ) -> ConversionResult<OpId> {
        let old = self.module.op(op);
        let kind = old.kind;
        let span = old.span;
        let old_results = old.results.clone();
        let old_regions = old.regions.clone();
        let successors = old.successors.clone();

        let result_types = old_results
            .iter()
            .map(|&v| self.convert_type(op, self.module.value_type(v)))
            .collect::<ConversionResult<SmallVec<[IrType; 1]>>>()?;
        let mut retyped_args = Vec::new();
        for &region in &old_regions {
            for &block in &self.module.region(region).blocks {
                for (index, &arg) in self.module.block(block).args.iter().enumerate() {
                    let ty = self.module.value_type(arg);
                    if !self.converter.is_legal(ty) {
                        retyped_args.push((block, index, arg, self.convert_type(op, ty)?));
                    }
                }
            }
        }

        let mut state = OpState::new(kind, span);
        state.attrs = attrs;
        state.operands = operands;
        state.result_types = result_types;
        state.num_regions = old_regions.len();
        state.successors = successors;
        let new = self.module.create_op(state);
        let new_regions = self.module.op(new).regions.clone();
        for (&from, &to) in old_regions.iter().zip(&new_regions) {
            self.module.move_region_blocks(from, to);
        }
        self.module.replace_op(op, new);

        let mut uses = FxHashMap::default();
        let new_results = self.module.op(new).results.clone();
        for (&from, &to) in old_results.iter().zip(&new_results) {
            self.record(from, to, &mut uses);
        }
        for (block, index, arg, ty) in retyped_args {
            let to = self.module.retype_block_arg(block, index, ty);
            self.record(arg, to, &mut uses);
        }
        self.module.replace_uses(&uses);
        self.rewrites += 1;
        tracing::trace!(%op, %new, kind = kind.name(), "operation rewritten");
        Ok(new)
    }

    fn record(&mut self, from: ValueId, to: ValueId, uses: &mut FxHashMap<ValueId, ValueId>) {
        let source = self.source_type(from).clone();
        if &source != self.module.value_type(to) {
            self.origins.insert(to, source);
        }
        uses.insert(from, to);
    }
}
