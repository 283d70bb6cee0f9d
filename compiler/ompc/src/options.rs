//! Pipeline configuration.

use omp_convert::ConversionOptions;
use omp_lower::LowerOptions;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineOptions {
    pub lower: LowerOptions,
    pub convert: ConversionOptions,
    /// Run the IR verifier after lowering and after conversion.
    pub verify: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            lower: LowerOptions::default(),
            convert: ConversionOptions::default(),
            verify: true,
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn with_lower(mut self, lower: LowerOptions) -> Self {
        self.lower = lower;
        self
    }

    #[must_use]
    pub fn with_convert(mut self, convert: ConversionOptions) -> Self {
        self.convert = convert;
        self
    }

    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}
