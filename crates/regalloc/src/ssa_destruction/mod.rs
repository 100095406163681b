//! # SSA Destruction
//!
//! Eliminates phi-functions of one register class after register
//! allocation, inserting the copies, permutations, and duplicates needed so
//! that every value arrives in its phi's register along every incoming
//! edge.
//!
//! ## Routes
//!
//! Two semantically equivalent realizations, selected by
//! [`SsaDestructionOptions::use_parallel_copy_planner`]:
//!
//! - **Parallel-copy planner** (`parcopy`): per predecessor edge, the phi
//!   arguments are translated into a register permutation with use counts;
//!   the realizer drains chains into plain copies, serves forks and
//!   out-of-cycle readers with restore copies, and lowers the residual
//!   cycles to one permutation node.
//! - **Perm placement** (`perms` + `dupls`): one permutation node per
//!   predecessor edge covering the non-live-in arguments, followed by a
//!   walker that pins arguments to their final registers and inserts
//!   duplicates where values interfere or registers diverge.
//!
//! Both routes end with the same post-condition (every phi argument carries
//! the phi's register and is pinned), which is checked before the phis are
//! rewritten into [`NodeKind::RegIn`] markers.

mod dupls;
mod parcopy;
mod perms;

use index_vec::IndexVec;
use opal_backend_lir::{
    cfg, BlockId, Function, Liveness, NodeId, NodeKind, PrettyPrint, RegisterClass,
};

use crate::dump::{self, DumpFlags, CHANNEL_SSA_DESTR};

/// Per-block lists of the phis of the current register class
pub(crate) type PhiLists = IndexVec<BlockId, Vec<NodeId>>;

/// Options for one `destroy_ssa` invocation
#[derive(Debug, Clone, Copy)]
pub struct SsaDestructionOptions {
    /// Which intermediate dumps to produce
    pub dump_flags: DumpFlags,
    /// `true` selects the parallel-copy planner; `false` the perm-placement
    /// walker with duplicate insertion
    pub use_parallel_copy_planner: bool,
}

impl Default for SsaDestructionOptions {
    fn default() -> Self {
        Self {
            dump_flags: DumpFlags::NONE,
            use_parallel_copy_planner: true,
        }
    }
}

/// Pass-wide context threaded through the destruction walkers
pub(crate) struct DestructionEnv<'a> {
    pub class: &'a RegisterClass,
    pub liveness: &'a Liveness,
    pub options: &'a SsaDestructionOptions,
}

impl DestructionEnv<'_> {
    /// Rejects register constraint modifiers no walker understands
    pub(crate) fn check_supported(&self, reg: usize) {
        let bits = self.class.kind(reg).unsupported_bits();
        if bits != 0 {
            panic!(
                "register constraint modifier {:#x} on {} is not handled",
                bits,
                self.class.reg_name(reg)
            );
        }
    }
}

/// Runs SSA destruction for `class` on `function`, in place.
///
/// On return no phi of `class` remains: each one has been rewritten into a
/// [`NodeKind::RegIn`] marker after its arguments were placed into its
/// register along every incoming edge. All failure modes are invariant
/// violations of the incoming IR and abort with a diagnostic.
pub fn destroy_ssa(
    function: &mut Function,
    class: &RegisterClass,
    liveness: &Liveness,
    options: &SsaDestructionOptions,
) {
    log::debug!(
        target: CHANNEL_SSA_DESTR,
        "SSA destruction for {} (class {})",
        function.name,
        class.name()
    );

    liveness.invalidate();
    function.clear_pins();

    let phis = collect_phis(function, class);
    let env = DestructionEnv {
        class,
        liveness,
        options,
    };

    if options.use_parallel_copy_planner {
        log::debug!(target: CHANNEL_SSA_DESTR, "analyzing parallel copies");
        parcopy::analyze_parallel_copies(&env, function, &phis);
    } else {
        log::debug!(target: CHANNEL_SSA_DESTR, "placing perms");
        perms::insert_all_perms(&env, function, &phis);
        dump::dump_function(
            options.dump_flags,
            DumpFlags::AFTER_PERM_PLACEMENT,
            "ssa_destr_perms_placed",
            function,
        );

        log::debug!(target: CHANNEL_SSA_DESTR, "setting regs and placing dupls");
        dupls::set_regs_or_place_dupls(&env, function, &phis);
    }

    liveness.invalidate();
    dump::dump_function(
        options.dump_flags,
        DumpFlags::AFTER_REGISTER_SET,
        "ssa_destr_regs_set",
        function,
    );

    if let Err(err) = check_function(function, class) {
        log::error!(
            target: CHANNEL_SSA_DESTR,
            "post-mortem dump of {}:\n{}",
            function.name,
            function.pretty_print(1)
        );
        panic!("SSA destruction left a bad phi: {err}");
    }

    strip_phis(function, liveness, &phis);
}

/// Post-condition verifier: every surviving phi of `class` must have all
/// its arguments in the phi's register and pinned.
///
/// Aborts with a targeted message on the first violation.
pub fn destroy_ssa_check(function: &Function, class: &RegisterClass) {
    if let Err(err) = check_function(function, class) {
        log::error!(
            target: CHANNEL_SSA_DESTR,
            "post-mortem dump of {}:\n{}",
            function.name,
            function.pretty_print(1)
        );
        panic!("SSA destruction check failed: {err}");
    }
}

/// A violation of the SSA-destruction post-condition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error(
        "registers of phi %{phi} ({phi_reg}) and its argument %{arg} ({arg_reg}) differ"
    )]
    RegisterMismatch {
        phi: usize,
        arg: usize,
        phi_reg: String,
        arg_reg: String,
    },

    #[error("argument %{arg} of phi %{phi} is not pinned")]
    NotPinned { phi: usize, arg: usize },
}

/// The check predicate behind [`destroy_ssa_check`], usable from tests
pub(crate) fn check_function(
    function: &Function,
    class: &RegisterClass,
) -> Result<(), CheckError> {
    for (block_id, _) in function.block_iter() {
        for phi in function.phis_of(block_id) {
            if !function.node_has_class(phi, class) {
                continue;
            }
            let phi_reg = function.register_of(phi);
            for &arg in function.node(phi).ins() {
                let arg_reg = function.register_of(arg);
                if class.kind(arg_reg).is_ignored() {
                    continue;
                }
                if arg_reg != phi_reg {
                    return Err(CheckError::RegisterMismatch {
                        phi: phi.index(),
                        arg: arg.index(),
                        phi_reg: class.reg_name(phi_reg).to_owned(),
                        arg_reg: class.reg_name(arg_reg).to_owned(),
                    });
                }
                if !function.is_pinned(arg) {
                    return Err(CheckError::NotPinned {
                        phi: phi.index(),
                        arg: arg.index(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Build the per-block lists of phis belonging to `class`
fn collect_phis(function: &Function, class: &RegisterClass) -> PhiLists {
    let mut lists: PhiLists = index_vec::index_vec![Vec::new(); function.blocks.len()];
    for (block_id, _) in function.block_iter() {
        for phi in function.phis_of(block_id) {
            if function.node_has_class(phi, class) {
                lists[block_id].push(phi);
            }
        }
    }
    lists
}

/// Rewrites every processed phi into a `RegIn` marker: the value now simply
/// arrives in its register at block entry, so no phi-function remains
fn strip_phis(function: &mut Function, liveness: &Liveness, phis: &PhiLists) {
    let mut stripped = 0usize;
    for (_, list) in phis.iter_enumerated() {
        for &phi in list {
            function.node_mut(phi).kind = NodeKind::RegIn;
            stripped += 1;
        }
    }
    if stripped > 0 {
        log::debug!(target: CHANNEL_SSA_DESTR, "stripped {stripped} phis");
        liveness.invalidate();
    }
}

/// Stable block order shared by the destruction walkers
pub(crate) fn walk_order(function: &Function) -> Vec<BlockId> {
    cfg::reverse_postorder(function)
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
