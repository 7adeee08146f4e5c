//! Configuration for filter compilation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Options controlling how a filter is compiled.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompileOptions {
    /// Whether primitives propagate null sentinels.
    pub null_check: bool,

    /// Maximum evaluation stack depth.
    pub max_stack_depth: usize,

    /// Attach descriptive names to virtual registers for program listings.
    pub name_registers: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            null_check: true,
            max_stack_depth: 1024,
            name_registers: true,
        }
    }
}

impl CompileOptions {
    /// Null-aware compilation (the default).
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Compilation for columns known to hold no nulls: primitives treat
    /// sentinels as ordinary values.
    #[must_use]
    pub fn unchecked() -> Self {
        Self {
            null_check: false,
            ..Self::default()
        }
    }

    /// Builder method to set null checking.
    #[must_use]
    pub fn with_null_check(mut self, null_check: bool) -> Self {
        self.null_check = null_check;
        self
    }

    /// Builder method to set the maximum stack depth.
    #[must_use]
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Builder method to enable/disable register names.
    #[must_use]
    pub fn with_register_names(mut self, enabled: bool) -> Self {
        self.name_registers = enabled;
        self
    }
}
