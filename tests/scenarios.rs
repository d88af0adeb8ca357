//! End-to-end pipeline tests: build, dominate, structure, mutate.

use flowgraph::prelude::*;

/// The running example: A branches to B and D, B and C form a loop, C exits to D.
///
/// ```text
/// Start -> A -> B <-> C
///          |         |
///          +--> D <--+
///          D -> End
/// ```
fn diamond_with_loop() -> (ControlFlowGraph, [NodeId; 4]) {
    let mut cfg = ControlFlowGraph::new();
    let a = cfg.add_block(BlockInfo::new(FlowKind::ConditionalBranch));
    let b = cfg.add_block(BlockInfo::fall_through());
    let c = cfg.add_block(BlockInfo::new(FlowKind::ConditionalBranch));
    let d = cfg.add_block(BlockInfo::ret());
    cfg.add_edge(cfg.start(), a).unwrap();
    cfg.add_edge(a, b).unwrap();
    cfg.add_edge(b, c).unwrap();
    cfg.add_edge(c, b).unwrap();
    cfg.add_edge(a, d).unwrap();
    cfg.add_edge(c, d).unwrap();
    cfg.add_edge(d, cfg.end()).unwrap();
    (cfg, [a, b, c, d])
}

fn analyze(cfg: &mut ControlFlowGraph) -> Dominators {
    let doms = Dominators::compute(cfg, Direction::Forward).unwrap();
    cfg.analyze_structure(&doms).unwrap();
    doms
}

#[test]
fn loop_in_branch_dominators() {
    let (mut cfg, [a, b, c, d]) = diamond_with_loop();
    let doms = analyze(&mut cfg);

    assert_eq!(doms.immediate_dominator(a), Some(cfg.start()));
    assert_eq!(doms.immediate_dominator(b), Some(a));
    assert_eq!(doms.immediate_dominator(c), Some(b));
    assert_eq!(doms.immediate_dominator(d), Some(a));
    assert_eq!(doms.immediate_dominator(cfg.end()), Some(d));

    assert!(doms.dominates(a, c));
    assert!(!doms.dominates(b, d));
    assert!(!doms.dominates(d, c));
}

#[test]
fn loop_in_branch_structure() {
    let (mut cfg, [a, b, c, d]) = diamond_with_loop();
    analyze(&mut cfg);
    let tree = cfg.structure().unwrap();

    // B and C form a natural loop directly under the root.
    let loop_region = tree.cyclic_region_with_entry(b).unwrap();
    let region = tree.region(loop_region).unwrap();
    assert!(region.is_natural_loop());
    assert!(!region.is_improper());
    let mut loop_blocks = tree.leaf_blocks(loop_region);
    loop_blocks.sort();
    assert_eq!(loop_blocks, vec![b, c]);
    assert_eq!(tree.parent(loop_region), Some(tree.root()));

    // The root's direct children are the loop plus the straight-line leaves.
    let children = tree.children(tree.root());
    assert_eq!(children.len(), 5);
    assert!(children.contains(&loop_region));
    for node in [cfg.start(), cfg.end(), a, d] {
        assert!(children.contains(&tree.leaf_structure(node).unwrap()));
    }

    assert_eq!(tree.loop_depth(b), 1);
    assert_eq!(tree.loop_depth(c), 1);
    assert_eq!(tree.loop_depth(a), 0);
    assert_eq!(tree.loop_depth(d), 0);
}

#[test]
fn removing_backedge_keeps_blocks_and_drops_structure() {
    let (mut cfg, [_, b, c, _]) = diamond_with_loop();
    analyze(&mut cfg);
    assert!(cfg.structure().is_some());

    let backedge = cfg.find_edge(c, b).unwrap();
    let nodes_before = cfg.node_count();
    let removed = cfg.remove_edge(backedge).unwrap();

    // B still has A as a predecessor: nothing is orphaned.
    assert!(!removed);
    assert_eq!(cfg.node_count(), nodes_before);
    assert!(cfg.node(b).is_some());
    assert!(cfg.node(c).is_some());
    // But the snapshot is stale and gone.
    assert!(cfg.structure().is_none());
}

#[test]
fn removing_loop_entry_edge_unravels_the_loop() {
    let (mut cfg, [a, b, c, d]) = diamond_with_loop();
    analyze(&mut cfg);

    // With the structure tree available, severing A -> B leaves B reachable only
    // through C's backedge, which is inside B's own loop: the loop is dead.
    let entry_edge = cfg.find_edge(a, b).unwrap();
    let removed = cfg.remove_edge(entry_edge).unwrap();

    assert!(removed);
    assert!(cfg.node(b).is_none());
    assert!(cfg.node(c).is_none());
    assert!(cfg.node(a).is_some());
    assert!(cfg.node(d).is_some());
    assert!(cfg.structure().is_none());

    // The graph is still analyzable afterwards.
    let doms = Dominators::compute(&cfg, Direction::Forward).unwrap();
    cfg.analyze_structure(&doms).unwrap();
    let mut leaves = cfg
        .structure()
        .unwrap()
        .leaf_blocks(cfg.structure().unwrap().root());
    leaves.sort();
    assert_eq!(leaves, vec![cfg.start(), cfg.end(), a, d]);
}

#[test]
fn without_structure_loop_entry_edge_leaves_dead_cycle() {
    let (mut cfg, [a, b, c, _]) = diamond_with_loop();

    // No structure tree: the entry's backedge predecessor cannot be classified,
    // so the loop survives the edge removal and pruning picks it up instead.
    let entry_edge = cfg.find_edge(a, b).unwrap();
    assert!(!cfg.remove_edge(entry_edge).unwrap());
    assert!(cfg.node(b).is_some());

    assert!(cfg.remove_unreachable_blocks().unwrap());
    assert!(cfg.node(b).is_none());
    assert!(cfg.node(c).is_none());
}

#[test]
fn dominated_catch_edges_are_filtered_by_the_builder() {
    // Block 0 throws; its handler list names a deep wildcard first, then a shallow
    // typed handler the wildcard shadows.
    let cfg = ControlFlowGraph::from_blocks(vec![
        BlockInfo::throw()
            .with_handler_target(1)
            .with_handler_target(2),
        BlockInfo::ret().as_handler(HandlerInfo::catch_all(1, 0)),
        BlockInfo::ret().as_handler(HandlerInfo::catch_class(0, 0, 9)),
    ])
    .unwrap();

    let thrower = NodeId::new(2);
    let live_handler = NodeId::new(3);
    let dead_handler = NodeId::new(4);
    assert_eq!(
        cfg.exception_successors(thrower).collect::<Vec<_>>(),
        vec![live_handler]
    );
    assert_eq!(cfg.exception_predecessors(dead_handler).count(), 0);
}

#[test]
fn postdominators_of_the_running_example() {
    let (cfg, [a, b, c, d]) = diamond_with_loop();
    let post = Dominators::compute(&cfg, Direction::Reverse).unwrap();

    assert!(post.is_valid());
    assert_eq!(post.immediate_dominator(a), Some(d));
    assert_eq!(post.immediate_dominator(b), Some(c));
    assert_eq!(post.immediate_dominator(d), Some(cfg.end()));
    assert!(post.dominates(d, b));
}

#[test]
fn add_block_in_region_keeps_structure_alive() {
    let (mut cfg, [_, b, _, _]) = diamond_with_loop();
    analyze(&mut cfg);

    let loop_region = cfg.structure().unwrap().cyclic_region_with_entry(b).unwrap();
    let fresh = cfg
        .add_block_in_region(BlockInfo::fall_through(), loop_region)
        .unwrap();

    let tree = cfg.structure().expect("structure should survive");
    assert!(tree.leaf_blocks(loop_region).contains(&fresh));
    assert_eq!(tree.loop_depth(fresh), 1);

    // Wiring the new block in is a real mutation and drops the snapshot.
    cfg.add_edge(b, fresh).unwrap();
    assert!(cfg.structure().is_none());
}

#[test]
fn plain_add_block_drops_the_structure_tree() {
    let (mut cfg, _) = diamond_with_loop();
    analyze(&mut cfg);
    assert!(cfg.structure().is_some());

    // A free-standing block belongs to no region, so the tree's leaves would no
    // longer cover the live node set if it stayed queryable.
    cfg.add_block(BlockInfo::fall_through());
    assert!(cfg.structure().is_none());
}

#[test]
fn removal_nesting_limit_is_reported() {
    // A chain two entries longer than the nesting bound, entered once: severing the
    // entry edge orphans every link and exceeds the cascade nesting limit.
    let len = flowgraph::graph::MAX_REMOVAL_NESTING + 2;
    let mut cfg = ControlFlowGraph::new();
    let blocks: Vec<NodeId> = (0..len)
        .map(|_| cfg.add_block(BlockInfo::fall_through()))
        .collect();
    cfg.add_edge(cfg.start(), blocks[0]).unwrap();
    for pair in blocks.windows(2) {
        cfg.add_edge(pair[0], pair[1]).unwrap();
    }
    cfg.add_edge(blocks[len - 1], cfg.end()).unwrap();

    let entry = cfg.find_edge(cfg.start(), blocks[0]).unwrap();
    assert!(matches!(
        cfg.remove_edge(entry),
        Err(Error::RemovalLimit(_))
    ));
}

#[test]
fn switch_heavy_graph_round_trips_through_analysis() {
    // A dispatcher switching over four cases that all rejoin, twice in a row.
    let cfg = ControlFlowGraph::from_blocks(vec![
        BlockInfo::switch(vec![1, 2, 3, 4]),
        BlockInfo::jump(5),
        BlockInfo::jump(5),
        BlockInfo::jump(5),
        BlockInfo::jump(5),
        BlockInfo::switch(vec![6, 7, 6, 7]),
        BlockInfo::jump(8),
        BlockInfo::jump(8),
        BlockInfo::ret(),
    ])
    .unwrap();
    let first = NodeId::new(2);
    let second = NodeId::new(7);
    assert_eq!(cfg.successors(first).count(), 4);
    assert_eq!(cfg.successors(second).count(), 2);

    let doms = Dominators::compute(&cfg, Direction::Forward).unwrap();
    let join = NodeId::new(10);
    assert_eq!(doms.immediate_dominator(join), Some(second));

    let tree = StructureTree::analyze(&cfg, &doms).unwrap();
    assert_eq!(
        tree.leaf_blocks(tree.root()).len(),
        cfg.node_count()
    );
}
