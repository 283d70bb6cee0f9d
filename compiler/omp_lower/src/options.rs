//! Lowering configuration.

/// What to do when the collapsed loop variables are wider than 64 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NarrowingPolicy {
    /// Narrow to 64 bits and record a warning diagnostic.
    #[default]
    Warn,
    /// Refuse as an unsupported construct.
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowerOptions {
    /// Allocator handle used by `allocate` clauses without an explicit
    /// allocator expression.
    pub default_allocator: i64,
    pub narrowing: NarrowingPolicy,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            default_allocator: 1,
            narrowing: NarrowingPolicy::Warn,
        }
    }
}

impl LowerOptions {
    #[must_use]
    pub fn with_default_allocator(mut self, allocator: i64) -> Self {
        self.default_allocator = allocator;
        self
    }

    #[must_use]
    pub fn with_narrowing(mut self, narrowing: NarrowingPolicy) -> Self {
        self.narrowing = narrowing;
        self
    }
}
