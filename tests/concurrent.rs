//! Shared-read tests: a built graph and its analyses hold no hidden mutable state,
//! so any number of threads may query them at once.

use rayon::prelude::*;

use flowgraph::prelude::*;

/// Alternating diamonds and small loops, `layers` deep.
fn layered_cfg(layers: usize) -> ControlFlowGraph {
    let mut blocks = Vec::new();
    for layer in 0..layers {
        let base = blocks.len();
        if layer % 2 == 0 {
            // Diamond: fork, two arms, join.
            blocks.push(BlockInfo::conditional(base + 2));
            blocks.push(BlockInfo::jump(base + 3));
            blocks.push(BlockInfo::jump(base + 3));
            blocks.push(BlockInfo::fall_through());
        } else {
            // Loop: header conditionally repeats through a latch.
            blocks.push(BlockInfo::fall_through());
            blocks.push(BlockInfo::conditional(base + 3));
            blocks.push(BlockInfo::jump(base + 1));
            blocks.push(BlockInfo::fall_through());
        }
    }
    blocks.push(BlockInfo::ret());
    ControlFlowGraph::from_blocks(blocks).unwrap()
}

#[test]
fn parallel_dominator_computations_agree() {
    let cfg = layered_cfg(16);

    let baseline = Dominators::compute(&cfg, Direction::Forward).unwrap();
    let results: Vec<Dominators> = (0..8)
        .into_par_iter()
        .map(|_| Dominators::compute(&cfg, Direction::Forward).unwrap())
        .collect();

    for doms in &results {
        for node in cfg.node_ids() {
            assert_eq!(
                doms.immediate_dominator(node),
                baseline.immediate_dominator(node),
                "disagreement at {node}"
            );
            assert_eq!(doms.dfs_number(node), baseline.dfs_number(node));
        }
    }
}

#[test]
fn parallel_queries_on_one_tree() {
    let cfg = layered_cfg(12);
    let doms = Dominators::compute(&cfg, Direction::Forward).unwrap();
    let tree = StructureTree::analyze(&cfg, &doms).unwrap();

    let nodes: Vec<NodeId> = cfg.node_ids().collect();
    nodes.par_iter().for_each(|&a| {
        // Dominance must agree with the explicit dominator chain.
        for &b in &nodes {
            let chain = doms.dominators_of(b);
            assert_eq!(doms.dominates(a, b), chain.contains(&a), "{a} vs {b}");
        }
        // Every node is somewhere under the root.
        assert!(tree.leaf_structure(a).is_some());
        let _ = tree.loop_depth(a);
    });

    // The whole graph partitions into the root's leaves exactly once.
    let mut leaves = tree.leaf_blocks(tree.root());
    leaves.sort();
    let mut all: Vec<NodeId> = cfg.node_ids().collect();
    all.sort();
    assert_eq!(leaves, all);
}

#[test]
fn parallel_structure_analyses_classify_identically() {
    let cfg = layered_cfg(10);
    let doms = Dominators::compute(&cfg, Direction::Forward).unwrap();

    let summaries: Vec<(usize, usize)> = (0..8)
        .into_par_iter()
        .map(|_| {
            let tree = StructureTree::analyze(&cfg, &doms).unwrap();
            let mut loops = 0;
            let mut improper = 0;
            let mut stack = vec![tree.root()];
            while let Some(sid) = stack.pop() {
                if let Some(region) = tree.region(sid) {
                    if region.is_natural_loop() {
                        loops += 1;
                    }
                    if region.is_improper() {
                        improper += 1;
                    }
                }
                stack.extend(tree.children(sid));
            }
            (loops, improper)
        })
        .collect();

    // Five odd layers, one loop each; every run sees the same count.
    for &(loops, improper) in &summaries {
        assert_eq!(loops, 5);
        assert_eq!(improper, 0);
    }
}
