use opal_backend_lir::{
    BlockId, Function, Liveness, NodeId, NodeKind, RegisterClass, RegisterDescr, RegisterKind,
    Terminator,
};

use super::*;
use crate::testing::{count_in_schedule, edge_scenario, is_copy, is_perm, run_block, RegFile};

fn options(use_planner: bool) -> SsaDestructionOptions {
    SsaDestructionOptions {
        use_parallel_copy_planner: use_planner,
        ..Default::default()
    }
}

/// entry -> (left | right) -> merge, with phis over `class` at merge.
/// `phi_specs` are `(phi_reg, left_arg_reg, right_arg_reg)` triples.
struct Diamond {
    function: Function,
    left: BlockId,
    right: BlockId,
    /// `(phi_reg, left_arg, right_arg)` recorded before destruction
    expectations: Vec<(usize, NodeId, NodeId)>,
    phi_count: usize,
}

fn diamond(class: &RegisterClass, phi_specs: &[(usize, usize, usize)]) -> Diamond {
    let mut function = Function::new("diamond");
    let entry = function.entry_block;
    let left = function.add_block();
    let right = function.add_block();
    let merge = function.add_block();

    let cond = function.new_op(entry, "cmp", vec![], false);
    function.blocks[entry].set_terminator(Terminator::branch(cond, left, right));
    function.connect(entry, left);
    function.connect(entry, right);

    let mut expectations = Vec::new();
    let mut left_args: rustc_hash::FxHashMap<usize, NodeId> = Default::default();
    let mut right_args: rustc_hash::FxHashMap<usize, NodeId> = Default::default();
    for &(_, left_reg, right_reg) in phi_specs {
        left_args.entry(left_reg).or_insert_with(|| {
            let node = function.new_op(left, format!("l_r{left_reg}"), vec![], false);
            function.set_register(node, class, left_reg);
            node
        });
        right_args.entry(right_reg).or_insert_with(|| {
            let node = function.new_op(right, format!("r_r{right_reg}"), vec![], false);
            function.set_register(node, class, right_reg);
            node
        });
    }

    function.blocks[left].set_terminator(Terminator::jump(merge));
    function.connect(left, merge);
    function.blocks[right].set_terminator(Terminator::jump(merge));
    function.connect(right, merge);

    for &(phi_reg, left_reg, right_reg) in phi_specs {
        let left_arg = left_args[&left_reg];
        let right_arg = right_args[&right_reg];
        let phi = function.new_phi(merge, vec![left_arg, right_arg]);
        function.set_register(phi, class, phi_reg);
        expectations.push((phi_reg, left_arg, right_arg));
    }

    function.blocks[merge].set_terminator(Terminator::return_values(vec![]));

    Diamond {
        function,
        left,
        right,
        expectations,
        phi_count: phi_specs.len(),
    }
}

fn no_phi_remains(function: &Function) -> bool {
    function.blocks.iter().all(|block| {
        block
            .schedule
            .iter()
            .all(|&id| !matches!(function.nodes[id].kind, NodeKind::Phi { .. }))
    })
}

fn count_reg_in(function: &Function) -> usize {
    function
        .nodes
        .iter()
        .filter(|node| matches!(node.kind, NodeKind::RegIn))
        .count()
}

fn check_diamond(diamond: &Diamond) {
    for &(phi_reg, left_arg, right_arg) in &diamond.expectations {
        let left_file = run_block(&diamond.function, diamond.left, RegFile::default());
        assert_eq!(
            left_file.get(&phi_reg),
            Some(&left_arg),
            "left edge does not deliver the phi value into r{phi_reg}"
        );
        let right_file = run_block(&diamond.function, diamond.right, RegFile::default());
        assert_eq!(
            right_file.get(&phi_reg),
            Some(&right_arg),
            "right edge does not deliver the phi value into r{phi_reg}"
        );
    }
}

#[test]
fn test_diamond_copies_both_routes() {
    for use_planner in [true, false] {
        let class = RegisterClass::with_normal_regs("gp", 4);
        // r0 <- (r1 | r2), r1 <- (r2 | r3): chains on both edges
        let mut d = diamond(&class, &[(0, 1, 2), (1, 2, 3)]);
        let liveness = Liveness::new();
        destroy_ssa(&mut d.function, &class, &liveness, &options(use_planner));

        assert!(no_phi_remains(&d.function));
        assert_eq!(count_reg_in(&d.function), d.phi_count);
        check_diamond(&d);
    }
}

#[test]
fn test_diamond_swap_both_routes() {
    for use_planner in [true, false] {
        let class = RegisterClass::with_normal_regs("gp", 3);
        // left edge swaps r0 and r1, right edge is identity
        let mut d = diamond(&class, &[(0, 1, 0), (1, 0, 1)]);
        let liveness = Liveness::new();
        destroy_ssa(&mut d.function, &class, &liveness, &options(use_planner));

        assert!(no_phi_remains(&d.function));
        check_diamond(&d);
        if use_planner {
            assert_eq!(count_in_schedule(&d.function, d.left, is_perm), 1);
            // the identity edge needs no moves at all
            assert_eq!(count_in_schedule(&d.function, d.right, is_copy), 0);
            assert_eq!(count_in_schedule(&d.function, d.right, is_perm), 0);
        }
    }
}

#[test]
fn test_shared_argument_between_phis_both_routes() {
    for use_planner in [true, false] {
        let class = RegisterClass::with_normal_regs("gp", 3);
        // both phis read the same left value from r0; one keeps the
        // register, the other needs a duplicate
        let mut d = diamond(&class, &[(0, 0, 1), (1, 0, 2)]);
        let liveness = Liveness::new();
        destroy_ssa(&mut d.function, &class, &liveness, &options(use_planner));

        assert!(no_phi_remains(&d.function));
        check_diamond(&d);
    }
}

#[test]
fn test_swap_around_loop_both_routes() {
    for use_planner in [true, false] {
        let class = RegisterClass::with_normal_regs("gp", 4);
        let mut function = Function::new("swap_loop");
        let entry = function.entry_block;
        let header = function.add_block();
        let latch = function.add_block();
        let exit = function.add_block();

        let init_a = function.new_op(entry, "init_a", vec![], false);
        function.set_register(init_a, &class, 2);
        let init_b = function.new_op(entry, "init_b", vec![], false);
        function.set_register(init_b, &class, 3);
        function.blocks[entry].set_terminator(Terminator::jump(header));
        function.connect(entry, header);

        // the values swap registers every iteration
        let phi_a = function.new_phi(header, vec![init_a]);
        function.set_register(phi_a, &class, 0);
        let phi_b = function.new_phi(header, vec![init_b]);
        function.set_register(phi_b, &class, 1);

        let cond = function.new_op(header, "test", vec![phi_a], false);
        function.blocks[header].set_terminator(Terminator::branch(cond, latch, exit));
        function.connect(header, latch);
        function.connect(header, exit);

        function.blocks[latch].set_terminator(Terminator::jump(header));
        function.connect(latch, header);
        function.node_mut(phi_a).kind = NodeKind::Phi {
            args: vec![init_a, phi_b],
        };
        function.node_mut(phi_b).kind = NodeKind::Phi {
            args: vec![init_b, phi_a],
        };

        function.blocks[exit].set_terminator(Terminator::return_values(vec![phi_b]));

        let liveness = Liveness::new();
        destroy_ssa(&mut function, &class, &liveness, &options(use_planner));
        assert!(no_phi_remains(&function));

        // entry edge: initial values move into the loop registers
        let entry_file = run_block(&function, entry, RegFile::default());
        assert_eq!(entry_file.get(&0), Some(&init_a));
        assert_eq!(entry_file.get(&1), Some(&init_b));

        // back edge: the values in r0 and r1 swap
        let mut at_header = RegFile::default();
        at_header.insert(0, phi_a);
        at_header.insert(1, phi_b);
        let latch_file = run_block(&function, latch, at_header);
        assert_eq!(latch_file.get(&0), Some(&phi_b));
        assert_eq!(latch_file.get(&1), Some(&phi_a));
    }
}

#[test]
fn test_joker_argument_is_skipped() {
    for use_planner in [true, false] {
        let class = RegisterClass::new(
            "gp",
            vec![
                RegisterDescr::new("r0", RegisterKind::NORMAL),
                RegisterDescr::new("r1", RegisterKind::NORMAL),
                RegisterDescr::new("jk", RegisterKind::JOKER),
            ],
        );
        let mut scenario = edge_scenario(&class, &[(0, 2), (1, 0)], &[]);
        let liveness = Liveness::new();
        destroy_ssa(
            &mut scenario.function,
            &class,
            &liveness,
            &options(use_planner),
        );
        assert!(no_phi_remains(&scenario.function));

        // only the r1 <- r0 demand produces a move; the joker is ignored
        let regs = run_block(&scenario.function, scenario.pred, RegFile::default());
        assert_eq!(regs.get(&1), Some(&scenario.arg_of[&0]));
    }
}

#[test]
#[should_panic(expected = "not handled")]
fn test_unsupported_constraint_modifier_aborts() {
    let class = RegisterClass::new(
        "gp",
        vec![
            RegisterDescr::new("r0", RegisterKind::NORMAL),
            RegisterDescr::new("rx", RegisterKind::from_bits(1 << 5)),
        ],
    );
    let mut scenario = edge_scenario(&class, &[(0, 1)], &[]);
    let liveness = Liveness::new();
    destroy_ssa(&mut scenario.function, &class, &liveness, &options(true));
}

#[test]
fn test_check_passes_and_is_idempotent() {
    let class = RegisterClass::with_normal_regs("gp", 3);
    let mut d = diamond(&class, &[(0, 1, 2)]);
    let liveness = Liveness::new();
    destroy_ssa(&mut d.function, &class, &liveness, &options(true));

    // running the check twice is the same as running it once
    destroy_ssa_check(&d.function, &class);
    destroy_ssa_check(&d.function, &class);
}

#[test]
#[should_panic(expected = "differ")]
fn test_check_rejects_register_mismatch() {
    let class = RegisterClass::with_normal_regs("gp", 3);
    let mut function = Function::new("bad");
    let entry = function.entry_block;
    let merge = function.add_block();

    let arg = function.new_op(entry, "def", vec![], false);
    function.set_register(arg, &class, 1);
    function.blocks[entry].set_terminator(Terminator::jump(merge));
    function.connect(entry, merge);

    let phi = function.new_phi(merge, vec![arg]);
    function.set_register(phi, &class, 0);
    function.pin(arg, merge);
    function.blocks[merge].set_terminator(Terminator::return_values(vec![]));

    destroy_ssa_check(&function, &class);
}

#[test]
#[should_panic(expected = "not pinned")]
fn test_check_rejects_unpinned_argument() {
    let class = RegisterClass::with_normal_regs("gp", 3);
    let mut function = Function::new("bad");
    let entry = function.entry_block;
    let merge = function.add_block();

    let arg = function.new_op(entry, "def", vec![], false);
    function.set_register(arg, &class, 0);
    function.blocks[entry].set_terminator(Terminator::jump(merge));
    function.connect(entry, merge);

    let phi = function.new_phi(merge, vec![arg]);
    function.set_register(phi, &class, 0);
    function.blocks[merge].set_terminator(Terminator::return_values(vec![]));

    destroy_ssa_check(&function, &class);
}

#[test]
fn test_other_class_phis_are_untouched() {
    let gp = RegisterClass::with_normal_regs("gp", 3);
    let fp = RegisterClass::with_normal_regs("fp", 3);

    let mut function = Function::new("two_classes");
    let entry = function.entry_block;
    let merge = function.add_block();

    let gp_arg = function.new_op(entry, "gp_def", vec![], false);
    function.set_register(gp_arg, &gp, 1);
    let fp_arg = function.new_op(entry, "fp_def", vec![], false);
    function.set_register(fp_arg, &fp, 1);
    function.blocks[entry].set_terminator(Terminator::jump(merge));
    function.connect(entry, merge);

    let gp_phi = function.new_phi(merge, vec![gp_arg]);
    function.set_register(gp_phi, &gp, 0);
    let fp_phi = function.new_phi(merge, vec![fp_arg]);
    function.set_register(fp_phi, &fp, 0);
    function.blocks[merge].set_terminator(Terminator::return_values(vec![]));

    let liveness = Liveness::new();
    destroy_ssa(&mut function, &gp, &liveness, &options(true));

    // the gp phi is gone, the fp phi survives for its own invocation
    assert!(matches!(function.node(gp_phi).kind, NodeKind::RegIn));
    assert!(function.node(fp_phi).is_phi());

    destroy_ssa(&mut function, &fp, &liveness, &options(true));
    assert!(no_phi_remains(&function));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Both routes realize any one-edge phi set with the same observable
        /// register contents
        #[test]
        fn routes_agree_on_semantics(
            sources in proptest::collection::vec(0..5usize, 5),
            live_mask in any::<u8>(),
        ) {
            let n_regs = sources.len();
            let mut demands = Vec::new();
            for (dst, &src) in sources.iter().enumerate() {
                if dst != src {
                    demands.push((dst, src));
                }
            }
            let demanded: Vec<usize> = demands.iter().map(|&(d, _)| d).collect();
            let live_in: Vec<usize> = demands
                .iter()
                .map(|&(_, s)| s)
                .filter(|s| !demanded.contains(s))
                .filter(|s| live_mask & (1u8 << (s % 8)) != 0)
                .collect();

            let class = RegisterClass::with_normal_regs("gp", n_regs);
            for use_planner in [true, false] {
                let mut scenario = edge_scenario(&class, &demands, &live_in);
                let liveness = Liveness::new();
                destroy_ssa(
                    &mut scenario.function,
                    &class,
                    &liveness,
                    &options(use_planner),
                );
                prop_assert!(no_phi_remains(&scenario.function));

                let regs = run_block(&scenario.function, scenario.pred, RegFile::default());
                for &(dst, arg) in &scenario.expectations {
                    prop_assert_eq!(regs.get(&dst), Some(&arg));
                }
                for &src in &live_in {
                    prop_assert_eq!(regs.get(&src), Some(&scenario.arg_of[&src]));
                }
            }
        }
    }
}
