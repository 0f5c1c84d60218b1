//! Loader configuration.

use crate::arch::Machine;

/// Loader configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// The only machine this loader accepts images for.
    pub machine: Machine,
    /// Clear the `p_memsz - p_filesz` tail of each loadable segment.
    pub zero_fill_bss: bool,
}

impl LoaderConfig {
    /// Configuration for `machine`, with every option off.
    pub const fn new(machine: Machine) -> Self {
        Self {
            machine,
            zero_fill_bss: false,
        }
    }

    /// Sets [`LoaderConfig::zero_fill_bss`].
    pub const fn zero_fill_bss(mut self, enabled: bool) -> Self {
        self.zero_fill_bss = enabled;
        self
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new(Machine::default())
    }
}
