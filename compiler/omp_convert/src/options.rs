//! Conversion configuration.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Width `index` lowers to.
    pub index_bitwidth: u32,
    /// Rewrite sweeps before the pass gives up on reaching a fixed point.
    pub max_iterations: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            index_bitwidth: 64,
            max_iterations: 8,
        }
    }
}

impl ConversionOptions {
    #[must_use]
    pub fn with_index_bitwidth(mut self, bits: u32) -> Self {
        self.index_bitwidth = bits;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }
}
