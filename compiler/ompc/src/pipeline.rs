//! The `lower → verify → convert → verify` pipeline.
//!
//! A [`Pipeline`] owns the lowering context for one translation unit. The
//! front end binds module-level storage through
//! [`context_mut`](Pipeline::context_mut), lowers constructs (all at once
//! or one at a time), and calls [`finish`](Pipeline::finish) to verify and
//! convert the module.

use omp_convert::{convert_module, ConversionStats};
use omp_ir::{verify_module, IrModule};
use omp_lower::{
    lower_construct, lower_translation_unit, Diagnostic, Directive, HostLowering, LoweringContext,
    SymbolTable,
};

use crate::error::CompileError;
use crate::options::PipelineOptions;

/// A converted translation unit.
#[derive(Debug)]
pub struct CompiledUnit {
    pub module: IrModule,
    pub stats: ConversionStats,
    /// Warnings collected while lowering.
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Pipeline {
    cx: LoweringContext,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            cx: LoweringContext::new(options.lower.clone()),
            options,
        }
    }

    /// Continue from a module the front end has already populated.
    pub fn with_module(module: IrModule, options: PipelineOptions) -> Self {
        Self {
            cx: LoweringContext::with_module(module, options.lower.clone()),
            options,
        }
    }

    #[inline]
    pub fn context(&self) -> &LoweringContext {
        &self.cx
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut LoweringContext {
        &mut self.cx
    }

    #[inline]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Lower one construct. A failing construct leaves no IR behind, so
    /// the pipeline stays usable.
    pub fn lower<H, S>(
        &mut self,
        host: &mut H,
        symbols: &S,
        dir: &Directive,
    ) -> Result<(), CompileError>
    where
        H: HostLowering + ?Sized,
        S: SymbolTable + ?Sized,
    {
        lower_construct(&mut self.cx, host, symbols, dir)?;
        Ok(())
    }

    /// Lower every construct in order, stopping at the first failure.
    pub fn lower_all<H, S>(
        &mut self,
        host: &mut H,
        symbols: &S,
        directives: &[Directive],
    ) -> Result<(), CompileError>
    where
        H: HostLowering + ?Sized,
        S: SymbolTable + ?Sized,
    {
        lower_translation_unit(&mut self.cx, host, symbols, directives)?;
        Ok(())
    }

    /// Verify the lowered module, convert it to the target types, and
    /// verify the result.
    pub fn finish(self) -> Result<CompiledUnit, CompileError> {
        let _span = tracing::debug_span!("finish_unit").entered();
        let diagnostics = self.cx.diagnostics().to_vec();
        let mut module = self.cx.into_module();

        if self.options.verify {
            verify_module(&module)?;
        }
        tracing::trace!(module = %module.display(), "lowered");

        let stats = convert_module(&mut module, &self.options.convert)?;
        tracing::debug!(
            iterations = stats.iterations,
            rewrites = stats.rewrites,
            "converted"
        );

        if self.options.verify {
            verify_module(&module)?;
        }
        tracing::trace!(module = %module.display(), "converted");

        Ok(CompiledUnit {
            module,
            stats,
            diagnostics,
        })
    }
}

/// Run the whole pipeline over `directives` in a fresh module.
pub fn compile_unit<H, S>(
    host: &mut H,
    symbols: &S,
    directives: &[Directive],
    options: &PipelineOptions,
) -> Result<CompiledUnit, CompileError>
where
    H: HostLowering + ?Sized,
    S: SymbolTable + ?Sized,
{
    let mut pipeline = Pipeline::new(options.clone());
    pipeline.lower_all(host, symbols, directives)?;
    pipeline.finish()
}
