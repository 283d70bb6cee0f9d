//! Type conversion from the host family to the target family.

use omp_ir::IrType;

/// Maps host types onto target-representation types.
///
/// Implementations must be idempotent: converting a type that is already
/// legal returns an equal type.
pub trait TypeConverter {
    /// Target counterpart of `ty`, or `None` when there is no rule for it.
    fn convert_type(&self, ty: &IrType) -> Option<IrType>;

    /// Whether `ty` may appear in converted IR as is.
    fn is_legal(&self, ty: &IrType) -> bool {
        ty.is_target_legal()
    }
}

/// The standard converter.
///
/// | Host type          | Target type                              |
/// |--------------------|------------------------------------------|
/// | `Int(w)`, `Float(w)` | unchanged                              |
/// | `Index`            | `Int(index_bitwidth)`                    |
/// | `Logical(k)`       | `Int(8 * k)`                             |
/// | `Ref`/`Box`/`Seq` of `T` | `Ptr(T')`                          |
/// | `MemRef(T)`        | `Struct(Ptr(T'), Ptr(T'), Int(index))`   |
/// | `Opaque`           | no rule                                  |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetTypeConverter {
    pub index_bitwidth: u32,
}

impl Default for TargetTypeConverter {
    fn default() -> Self {
        Self { index_bitwidth: 64 }
    }
}

impl TargetTypeConverter {
    pub fn new(index_bitwidth: u32) -> Self {
        Self { index_bitwidth }
    }
}

impl TypeConverter for TargetTypeConverter {
    fn convert_type(&self, ty: &IrType) -> Option<IrType> {
        match ty {
            IrType::Int(w) => Some(IrType::Int(*w)),
            IrType::Float(w) => Some(IrType::Float(*w)),
            IrType::Index => Some(IrType::Int(self.index_bitwidth)),
            IrType::Logical(kind) => Some(IrType::Int(kind * 8)),
            IrType::Ref(elem) | IrType::Box(elem) | IrType::Seq(elem) | IrType::Ptr(elem) => {
                Some(IrType::ptr(self.convert_type(elem)?))
            }
            IrType::MemRef(elem) => {
                let elem = self.convert_type(elem)?;
                Some(IrType::Struct(vec![
                    IrType::ptr(elem.clone()),
                    IrType::ptr(elem),
                    IrType::Int(self.index_bitwidth),
                ]))
            }
            IrType::Struct(fields) => fields
                .iter()
                .map(|field| self.convert_type(field))
                .collect::<Option<Vec<_>>>()
                .map(IrType::Struct),
            IrType::Opaque(_) => None,
        }
    }
}

#[cfg(test)]
mod tests;
