use crate::grid::{Axis, LatticeGraph};
use groute_common::db::core::RoutingProblem;
use groute_common::db::indices::{EdgeId, NodeId};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Checks that every routed net is a single tree spanning exactly its pin
/// tiles. Nets are independent, so the scan runs in parallel.
pub fn verify_routes(
    problem: &RoutingProblem,
    graph: &LatticeGraph,
    trees: &[BTreeSet<EdgeId>],
) -> Result<(), String> {
    log::info!("Starting route verification...");

    let failures: Vec<String> = trees
        .par_iter()
        .enumerate()
        .filter_map(|(n, tree)| verify_net(problem, graph, n, tree).err())
        .collect();

    if failures.is_empty() {
        log::info!("\x1b[32mPASS\x1b[0m: all nets form pin-spanning trees.");
        Ok(())
    } else {
        for msg in &failures {
            log::error!("\x1b[31mFAIL\x1b[0m: {}", msg);
        }
        Err(failures.join("; "))
    }
}

fn verify_net(
    problem: &RoutingProblem,
    graph: &LatticeGraph,
    net_index: usize,
    tree: &BTreeSet<EdgeId>,
) -> Result<(), String> {
    let net = &problem.nets[net_index];

    let mut pin_nodes = BTreeSet::new();
    for pin in &net.pins {
        let (tx, ty) = problem.tile_of_point(pin.x, pin.y);
        pin_nodes.insert(graph.node_at(tx, ty, pin.layer));
    }

    if tree.is_empty() {
        if pin_nodes.len() <= 1 {
            return Ok(());
        }
        return Err(format!(
            "net '{}': empty route but {} distinct pin tiles",
            net.name,
            pin_nodes.len()
        ));
    }

    let mut adjacency: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for &edge in tree {
        let (a, b) = graph.nodes_of(edge);
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    for pin_node in &pin_nodes {
        if !adjacency.contains_key(pin_node) {
            return Err(format!(
                "net '{}': pin tile {:?} not touched by the route",
                net.name,
                graph.position_of(*pin_node)
            ));
        }
    }

    // A connected edge set with one more node than edges is acyclic.
    if adjacency.len() != tree.len() + 1 {
        return Err(format!(
            "net '{}': {} nodes and {} edges, route contains a cycle",
            net.name,
            adjacency.len(),
            tree.len()
        ));
    }

    let Some((&start, _)) = adjacency.iter().next() else {
        return Ok(());
    };
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);
    while let Some(node) = queue.pop_front() {
        for &next in &adjacency[&node] {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    if visited.len() != adjacency.len() {
        return Err(format!(
            "net '{}': route splits into multiple components",
            net.name
        ));
    }

    Ok(())
}

/// Recomputes aggregate demand per edge from the routed trees and checks
/// it against the edge capacities. Only meaningful when no net needed
/// emergency mode.
pub fn verify_capacities(
    problem: &RoutingProblem,
    graph: &LatticeGraph,
    trees: &[BTreeSet<EdgeId>],
) -> Result<(), String> {
    let mut aggregated = vec![0u64; graph.edge_count()];

    for (n, tree) in trees.iter().enumerate() {
        let net = &problem.nets[n];
        for &edge in tree {
            if graph.axis_of(edge) == Axis::Z {
                continue;
            }
            let z = graph.layer_of(edge) as usize;
            let demand = problem.rules.minimum_spacing[z]
                + problem.rules.minimum_width[z].max(net.minimum_width);
            aggregated[edge.index()] += demand as u64;
        }
    }

    let mut overloaded = 0usize;
    let mut first_failure = None;
    for e in 0..graph.edge_count() {
        let edge = EdgeId::new(e);
        if aggregated[e] > graph.capacity(edge) as u64 {
            overloaded += 1;
            if first_failure.is_none() {
                first_failure = Some(format!(
                    "edge {:?}-{:?}: aggregated width {} exceeds capacity {}",
                    graph.position_of(graph.nodes_of(edge).0),
                    graph.position_of(graph.nodes_of(edge).1),
                    aggregated[e],
                    graph.capacity(edge)
                ));
            }
        }
    }

    match first_failure {
        None => {
            log::info!("\x1b[32mPASS\x1b[0m: aggregated widths within capacity.");
            Ok(())
        }
        Some(msg) => {
            log::error!("\x1b[31mFAIL\x1b[0m: {} overloaded edges", overloaded);
            Err(msg)
        }
    }
}
