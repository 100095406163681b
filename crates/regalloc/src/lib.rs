//! # Opal register-allocation back end
//!
//! The two passes that finish register allocation:
//!
//! 1. **SSA destruction** ([`destroy_ssa`]): eliminates phi-functions after
//!    register assignment, replacing them with parallel copies realized as
//!    chains of moves, permutation nodes, and restore copies. Two routes are
//!    provided: the parallel-copy planner (chains/cycles/forks analyzed per
//!    predecessor edge) and the perm-placement walker (one permutation per
//!    edge plus duplicate insertion). They are semantically equivalent and
//!    selected by [`SsaDestructionOptions::use_parallel_copy_planner`].
//! 2. **PBQP back-propagation** ([`solve_pbqp`]): reconstructs an optimal
//!    node assignment from the recorded reduction trace of a Partitioned
//!    Boolean Quadratic Problem, respecting the cost matrices along every
//!    remaining edge.
//!
//! Both passes are single-threaded, non-suspending, and never report errors
//! across the public boundary: every failure is an IR invariant violated by
//! an earlier pass and aborts with a diagnostic dump.

pub use dump::DumpFlags;
pub use ssa_destruction::{
    destroy_ssa, destroy_ssa_check, CheckError, SsaDestructionOptions,
};

pub mod dump;
pub mod pbqp;
pub mod ssa_destruction;

#[cfg(test)]
pub(crate) mod testing;

pub use pbqp::solve_pbqp;
