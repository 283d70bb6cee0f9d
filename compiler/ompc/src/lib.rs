//! Pipeline driver for parallel-construct translation units.
//!
//! Ties the crates together for one translation unit:
//!
//! 1. `omp_lower` lowers each construct into `omp.*` and host operations.
//! 2. `omp_ir` verifies the lowered module.
//! 3. `omp_convert` rewrites every type into the target family.
//! 4. The converted module is verified again.
//!
//! Every stage reports through [`CompileError`].

mod error;
mod options;
mod pipeline;

use std::sync::Once;

pub use error::CompileError;
pub use options::PipelineOptions;
pub use pipeline::{compile_unit, CompiledUnit, Pipeline};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=omp_lower=debug` or
/// `RUST_LOG=omp_convert=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true),
                )
                .init();
        }
    });
}
