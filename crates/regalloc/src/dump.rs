//! # Diagnostic Dumps
//!
//! Textual dumps of the function between phases, gated by a dump-flag
//! bitset and routed through per-phase debug channels. Dump content is for
//! human consumption only and not part of any contract.

use opal_backend_lir::{Function, PrettyPrint};

/// Bitset selecting which intermediate dumps are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DumpFlags(u32);

impl DumpFlags {
    pub const NONE: Self = Self(0);
    /// Dump after the perm-placement walker has run
    pub const AFTER_PERM_PLACEMENT: Self = Self(1 << 0);
    /// Dump after registers are set and duplicates placed
    pub const AFTER_REGISTER_SET: Self = Self(1 << 1);
    /// Trace parallel-copy chains and cycles as they are analyzed
    pub const PARCOPY_CHAINS: Self = Self(1 << 2);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Debug channel for the SSA-destruction phases
pub(crate) const CHANNEL_SSA_DESTR: &str = "opal::ssa_destr";
/// Debug channel for parallel-copy analysis
pub(crate) const CHANNEL_PARCOPY: &str = "opal::ssa_destr::parcopy";
/// Debug channel for the PBQP solver
pub(crate) const CHANNEL_PBQP: &str = "opal::pbqp";

/// Emits a full function dump on the SSA-destruction channel if `flag` is
/// set in `flags`
pub(crate) fn dump_function(flags: DumpFlags, flag: DumpFlags, what: &str, function: &Function) {
    if flags.contains(flag) {
        log::debug!(
            target: CHANNEL_SSA_DESTR,
            "{} ({}):\n{}",
            what,
            function.name,
            function.pretty_print(1)
        );
    }
}
