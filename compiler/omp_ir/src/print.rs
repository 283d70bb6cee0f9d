//! Textual rendering of a module, used by tests and debug logging.

use std::fmt::{self, Write};

use crate::id::BlockId;
use crate::module::IrModule;

/// Displays a module in an MLIR-like generic form.
pub struct ModuleDisplay<'m> {
    module: &'m IrModule,
}

impl IrModule {
    pub fn display(&self) -> ModuleDisplay<'_> {
        ModuleDisplay { module: self }
    }
}

impl fmt::Display for ModuleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("module {\n")?;
        write_block_body(f, self.module, self.module.body(), 1)?;
        f.write_str("}\n")
    }
}

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("  ")?;
    }
    Ok(())
}

fn write_block_body(
    f: &mut fmt::Formatter<'_>,
    module: &IrModule,
    block: BlockId,
    depth: usize,
) -> fmt::Result {
    for &op_id in &module.block(block).ops {
        let op = module.op(op_id);
        indent(f, depth)?;
        if !op.results.is_empty() {
            let mut names = String::new();
            for (i, r) in op.results.iter().enumerate() {
                if i > 0 {
                    names.push_str(", ");
                }
                write!(names, "{r}")?;
            }
            write!(f, "{names} = ")?;
        }
        write!(f, "{}", op.kind.name())?;
        if !op.operands.is_empty() {
            f.write_str("(")?;
            for (i, v) in op.operands.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{v}")?;
            }
            f.write_str(")")?;
        }
        for succ in &op.successors {
            write!(f, " {succ}")?;
        }
        if !op.attrs.is_empty() {
            f.write_str(" {")?;
            for (i, (name, value)) in op.attrs.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name} = {value}")?;
            }
            f.write_str("}")?;
        }
        if !op.results.is_empty() {
            f.write_str(" : ")?;
            for (i, r) in op.results.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", module.value_type(*r))?;
            }
        }
        for &region in &op.regions {
            f.write_str(" {\n")?;
            for &inner in &module.region(region).blocks {
                indent(f, depth)?;
                write!(f, "{inner}(")?;
                for (i, arg) in module.block(inner).args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}: {}", module.value_type(*arg))?;
                }
                f.write_str("):\n")?;
                write_block_body(f, module, inner, depth + 1)?;
            }
            indent(f, depth)?;
            f.write_str("}")?;
        }
        f.write_str("\n")?;
    }
    Ok(())
}
