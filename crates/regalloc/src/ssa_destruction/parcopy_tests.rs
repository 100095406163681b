use opal_backend_lir::{Liveness, RegisterClass};

use super::*;
use crate::ssa_destruction::{destroy_ssa, SsaDestructionOptions};
use crate::testing::{count_in_schedule, edge_scenario, is_copy, is_perm, run_block, RegFile};

fn planner_options() -> SsaDestructionOptions {
    SsaDestructionOptions {
        use_parallel_copy_planner: true,
        ..Default::default()
    }
}

/// Runs route A on the scenario and checks the final register file against
/// the phi expectations
fn run_scenario(
    demands: &[(usize, usize)],
    live_in_sources: &[usize],
    n_regs: usize,
) -> (opal_backend_lir::Function, opal_backend_lir::BlockId, RegFile) {
    let class = RegisterClass::with_normal_regs("gp", n_regs);
    let mut scenario = edge_scenario(&class, demands, live_in_sources);
    let liveness = Liveness::new();

    destroy_ssa(
        &mut scenario.function,
        &class,
        &liveness,
        &planner_options(),
    );

    let regs = run_block(&scenario.function, scenario.pred, RegFile::default());
    for &(dst, arg) in &scenario.expectations {
        assert_eq!(
            regs.get(&dst),
            Some(&arg),
            "register r{dst} does not hold the expected value"
        );
    }
    for &src in live_in_sources {
        assert_eq!(
            regs.get(&src),
            Some(&scenario.arg_of[&src]),
            "live-in source r{src} was clobbered"
        );
    }

    (scenario.function, scenario.pred, regs)
}

#[test]
fn test_pure_chain_emits_two_copies() {
    // r0 <- r1 <- r2
    let (function, pred, _) = run_scenario(&[(0, 1), (1, 2)], &[], 3);
    assert_eq!(count_in_schedule(&function, pred, is_copy), 2);
    assert_eq!(count_in_schedule(&function, pred, is_perm), 0);
}

#[test]
fn test_pure_swap_emits_one_perm() {
    // swap(r0, r1)
    let (function, pred, _) = run_scenario(&[(0, 1), (1, 0)], &[], 3);
    assert_eq!(count_in_schedule(&function, pred, is_copy), 0);
    assert_eq!(count_in_schedule(&function, pred, is_perm), 1);
}

#[test]
fn test_fork_prefers_longest_chain() {
    // r1 and r2 both want r0's value
    let (function, pred, _) = run_scenario(&[(1, 0), (2, 0)], &[], 3);
    // one direct copy plus one restore, never a perm
    assert_eq!(count_in_schedule(&function, pred, is_copy), 2);
    assert_eq!(count_in_schedule(&function, pred, is_perm), 0);
}

#[test]
fn test_cycle_with_out_of_cycle_reader() {
    // swap(r0, r1) while r2 wants r0's old value
    let (function, pred, _) = run_scenario(&[(0, 1), (1, 0), (2, 0)], &[], 3);
    assert_eq!(count_in_schedule(&function, pred, is_perm), 1);
    // the out-of-cycle reader is served by one restore copy
    assert_eq!(count_in_schedule(&function, pred, is_copy), 1);
}

#[test]
fn test_live_in_source_gets_duplicate() {
    // r0 <- r1, with r1's value still live in the phi block
    let (function, pred, _) = run_scenario(&[(0, 1)], &[1], 3);
    assert_eq!(count_in_schedule(&function, pred, is_copy), 1);
    assert_eq!(count_in_schedule(&function, pred, is_perm), 0);
}

#[test]
fn test_longer_chains_and_cycles_together() {
    // cycle (r0 r1 r2), chain r3 <- r4, fork off r4
    let (function, pred, _) =
        run_scenario(&[(0, 1), (1, 2), (2, 0), (3, 4), (5, 4)], &[], 6);
    assert_eq!(count_in_schedule(&function, pred, is_perm), 1);
}

#[test]
fn test_same_register_argument_is_left_alone() {
    // phi and argument already agree on r2
    let (function, pred, _) = run_scenario(&[(2, 2), (0, 1)], &[], 3);
    assert_eq!(count_in_schedule(&function, pred, is_copy), 1);
    assert_eq!(count_in_schedule(&function, pred, is_perm), 0);
}

#[test]
fn test_mark_cycle_parts_classification() {
    // parcopy = [1, 0, 0]: cycle (r0 r1), chain r2 <- r0
    let in_cycle = mark_cycle_parts(&[1, 0, 0], &[2, 1, 0]);
    assert_eq!(&in_cycle[..], &[true, true, false][..]);

    // pure chain r0 <- r1 <- r2
    let in_cycle = mark_cycle_parts(&[1, 2, 2], &[0, 1, 1]);
    assert_eq!(&in_cycle[..], &[false, false, false][..]);

    // live-in source: identity entry with a remaining reader
    let in_cycle = mark_cycle_parts(&[1, 1, 2], &[0, 2, 0]);
    assert_eq!(&in_cycle[..], &[false, true, false][..]);
}

#[test]
fn test_find_longest_chain_breaks_ties_low() {
    let class = RegisterClass::with_normal_regs("gp", 3);
    let liveness = Liveness::new();
    let options = planner_options();
    let env = DestructionEnv {
        class: &class,
        liveness: &liveness,
        options: &options,
    };
    // r1 and r2 both read r0; equal lengths, lower index wins
    assert_eq!(find_longest_chain(&env, &[0, 0, 0], &[2, 0, 0], 0), 1);
}

#[test]
fn test_find_longest_chain_measures_demands() {
    let class = RegisterClass::with_normal_regs("gp", 4);
    let liveness = Liveness::new();
    let options = planner_options();
    let env = DestructionEnv {
        class: &class,
        liveness: &liveness,
        options: &options,
    };
    // r1 <- r0 and r3 <- r2 <- r0: the two-demand chain through r2 wins
    assert_eq!(find_longest_chain(&env, &[0, 0, 0, 2], &[2, 0, 1, 0], 0), 2);
}

#[test]
#[should_panic(expected = "claim register")]
fn test_duplicate_phi_destination_is_detected() {
    let class = RegisterClass::with_normal_regs("gp", 3);
    // two phis both claim r0 for the same predecessor
    let mut scenario = edge_scenario(&class, &[(0, 1), (0, 2)], &[]);
    let liveness = Liveness::new();
    destroy_ssa(
        &mut scenario.function,
        &class,
        &liveness,
        &planner_options(),
    );
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any parallel-copy specification leaves every demanded register
        /// with the value its source held, and live-in sources untouched
        #[test]
        fn parallel_copy_semantics(
            sources in proptest::collection::vec(0..6usize, 6),
            live_mask in any::<u8>(),
        ) {
            let n_regs = sources.len();
            let mut demands = Vec::new();
            for (dst, &src) in sources.iter().enumerate() {
                if dst != src {
                    demands.push((dst, src));
                }
            }
            // live-in marks are only legal on sources that are not
            // themselves overwritten
            let demanded: Vec<usize> = demands.iter().map(|&(d, _)| d).collect();
            let live_in: Vec<usize> = demands
                .iter()
                .map(|&(_, s)| s)
                .filter(|s| !demanded.contains(s))
                .filter(|s| live_mask & (1u8 << (s % 8)) != 0)
                .collect();

            run_scenario(&demands, &live_in, n_regs);
        }
    }
}
