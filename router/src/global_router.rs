use crate::algo::heap::IndexedHeap;
use crate::grid::{Axis, LatticeGraph};
use groute_common::db::core::RoutingProblem;
use groute_common::db::indices::{EdgeId, NodeId};
use groute_common::geom::coord::GridCoord;
use groute_common::util::config::RouterConfig;
use std::collections::BTreeSet;
use std::io::Write;
use std::time::Instant;

const INVALID: u32 = u32::MAX;

/// Search window for one net: the pin hull grown by the configured margin
/// and clipped to the grid.
#[derive(Clone, Copy, Debug)]
struct BoundingBox {
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
    min_z: u32,
    max_z: u32,
}

impl BoundingBox {
    #[inline(always)]
    fn contains(&self, c: GridCoord) -> bool {
        c.x >= self.min_x
            && c.x <= self.max_x
            && c.y >= self.min_y
            && c.y <= self.max_y
            && c.z >= self.min_z
            && c.z <= self.max_z
    }
}

/// Routes nets one after another, charging each routed net's demand
/// against the edge capacities before the next net starts.
///
/// The per-node search tables are allocated once and cleared in O(1) by
/// bumping `current_iteration`; an entry is valid for the running search
/// only if its `queued` tag equals the current iteration.
pub struct GlobalRouter<'a> {
    problem: &'a RoutingProblem,
    graph: &'a LatticeGraph,

    bounding_box_margin: u32,
    emergency_penalty_factor: f32,

    queued: Vec<u32>,
    distance: Vec<f32>,
    preceding_node: Vec<u32>,
    relevant_edge: Vec<u32>,
    pq: IndexedHeap,
    current_iteration: u32,

    aggregated_width: Vec<u32>,
    emergency_reroutes: usize,
}

impl<'a> GlobalRouter<'a> {
    pub fn new(
        problem: &'a RoutingProblem,
        graph: &'a LatticeGraph,
        config: &RouterConfig,
    ) -> Self {
        let nodes = graph.node_count();
        Self {
            problem,
            graph,
            bounding_box_margin: config.bounding_box_margin,
            emergency_penalty_factor: config.emergency_penalty_factor,
            queued: vec![0; nodes],
            distance: vec![0.0; nodes],
            preceding_node: vec![INVALID; nodes],
            relevant_edge: vec![INVALID; nodes],
            pq: IndexedHeap::new(),
            current_iteration: 0,
            aggregated_width: vec![0; graph.edge_count()],
            emergency_reroutes: 0,
        }
    }

    /// Routes every net in problem order and returns one edge set per net.
    pub fn run(&mut self) -> Vec<BTreeSet<EdgeId>> {
        let total = self.problem.nets.len();
        let mut trees = vec![BTreeSet::new(); total];
        let start = Instant::now();

        for n in 0..total {
            trees[n] = self.route_net(n);

            if (n + 1) % 50 == 0 || n + 1 == total {
                let pct = ((n + 1) as f64 / total as f64) * 100.0;
                eprint!(
                    "\r\x1b[36m[Route] Progress: {:>3.0}% ({}/{}) Time: {:.1}s\x1b[0m",
                    pct,
                    n + 1,
                    total,
                    start.elapsed().as_secs_f32()
                );
                let _ = std::io::stderr().flush();
            }
        }
        if total > 0 {
            eprint!("\r\x1b[2K");
        }

        trees
    }

    /// Committed demand per edge so far. Exceeds the edge capacity only
    /// where emergency mode was needed.
    pub fn aggregated_width(&self) -> &[u32] {
        &self.aggregated_width
    }

    /// Number of nets that could not be routed within capacity limits.
    pub fn emergency_reroutes(&self) -> usize {
        self.emergency_reroutes
    }

    fn demand(&self, net_min_width: u32, layer: u32) -> u32 {
        let z = layer as usize;
        self.problem.rules.minimum_spacing[z] + self.problem.rules.minimum_width[z].max(net_min_width)
    }

    fn route_net(&mut self, net_index: usize) -> BTreeSet<EdgeId> {
        let problem = self.problem;
        let graph = self.graph;
        let net = &problem.nets[net_index];

        if net.pins.is_empty() {
            return BTreeSet::new();
        }

        log::debug!(
            "routing net {}/{} '{}' ({} pins)",
            net_index,
            problem.nets.len(),
            net.name,
            net.pins.len()
        );

        // Distinct pin tiles, first occurrence first: pin #0 is the most
        // central pin after the pre-sort and becomes the search root.
        let mut nodes: Vec<u32> = Vec::with_capacity(net.pins.len());
        for pin in &net.pins {
            let (tx, ty) = problem.tile_of_point(pin.x, pin.y);
            let node = graph.node_at(tx, ty, pin.layer).index() as u32;
            if !nodes.contains(&node) {
                nodes.push(node);
            }
        }

        if nodes.len() <= 1 {
            return BTreeSet::new();
        }

        let bb = self.bounding_box_of(&nodes);
        let source = nodes[0];
        let targets = &nodes[1..];

        let emergencies_before = self.emergency_reroutes;
        let tree = self.grow_search_forest(source, targets, net.minimum_width, bb, true);
        if self.emergency_reroutes > emergencies_before {
            log::warn!(
                "net '{}' was not routable within capacity limits; emergency mode used",
                net.name
            );
        }

        for &edge in &tree {
            if graph.axis_of(edge) == Axis::Z {
                continue;
            }
            let demand = self.demand(net.minimum_width, graph.layer_of(edge));
            self.aggregated_width[edge.index()] += demand;
        }

        tree
    }

    fn bounding_box_of(&self, nodes: &[u32]) -> BoundingBox {
        let graph = self.graph;
        let first = graph.position_of(NodeId::new(nodes[0] as usize));
        let mut bb = BoundingBox {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
            min_z: first.z,
            max_z: first.z,
        };

        for &node in &nodes[1..] {
            let c = graph.position_of(NodeId::new(node as usize));
            bb.min_x = bb.min_x.min(c.x);
            bb.max_x = bb.max_x.max(c.x);
            bb.min_y = bb.min_y.min(c.y);
            bb.max_y = bb.max_y.max(c.y);
            bb.min_z = bb.min_z.min(c.z);
            bb.max_z = bb.max_z.max(c.z);
        }

        let margin = self.bounding_box_margin;
        bb.min_x = bb.min_x.saturating_sub(margin);
        bb.min_y = bb.min_y.saturating_sub(margin);
        bb.min_z = bb.min_z.saturating_sub(margin);
        bb.max_x = (bb.max_x + margin).min(graph.dim_x() - 1);
        bb.max_y = (bb.max_y + margin).min(graph.dim_y() - 1);
        bb.max_z = (bb.max_z + margin).min(graph.dim_z() - 1);

        bb
    }

    fn next_iteration(&mut self) -> u32 {
        self.current_iteration = self.current_iteration.wrapping_add(1);
        if self.current_iteration == 0 {
            self.queued.fill(0);
            self.current_iteration = 1;
        }
        self.current_iteration
    }

    /// Multi-target Dijkstra from `source` until every target is settled,
    /// then the union of the back-pointer chains from each target.
    ///
    /// With `respect_capacity`, edges whose remaining capacity cannot take
    /// this net are not relaxed and the search stays inside `bb`; if the
    /// queue drains with targets outstanding, the search restarts without
    /// capacity limits and with overfilled edges merely penalized.
    fn grow_search_forest(
        &mut self,
        source: u32,
        targets: &[u32],
        min_net_width: u32,
        bb: BoundingBox,
        respect_capacity: bool,
    ) -> BTreeSet<EdgeId> {
        let graph = self.graph;

        self.pq.clear();
        let iteration = self.next_iteration();

        self.pq.push(source, 0.0);
        self.queued[source as usize] = iteration;
        self.distance[source as usize] = 0.0;
        self.preceding_node[source as usize] = INVALID;
        self.relevant_edge[source as usize] = INVALID;

        let mut active: Vec<u32> = targets.to_vec();

        while !active.is_empty() {
            let Some(entry) = self.pq.pop() else {
                // The remaining targets are walled off by committed nets.
                debug_assert!(respect_capacity);
                self.emergency_reroutes += 1;
                return self.grow_search_forest(source, targets, min_net_width, bb, false);
            };

            let current = entry.value;
            debug_assert_eq!(entry.priority, self.distance[current as usize]);

            let (edges, count) = graph.edges_at(NodeId::new(current as usize));
            for &edge in &edges[..count] {
                let (a, b) = graph.nodes_of(edge);
                let other = if a.index() as u32 == current { b } else { a };
                let other = other.index() as u32;

                if respect_capacity && !bb.contains(graph.position_of(NodeId::new(other as usize)))
                {
                    continue;
                }

                if respect_capacity && graph.axis_of(edge) != Axis::Z {
                    let demand = self.demand(min_net_width, graph.layer_of(edge));
                    let agg = self.aggregated_width[edge.index()];
                    if agg as u64 + demand as u64 > graph.capacity(edge) as u64 {
                        continue;
                    }
                }

                let mut weight = 1.0f32;
                if !respect_capacity {
                    let overflow =
                        self.aggregated_width[edge.index()].saturating_sub(graph.capacity(edge));
                    weight += self.emergency_penalty_factor * overflow as f32;
                }

                let new_distance = self.distance[current as usize] + weight;
                let o = other as usize;

                if self.queued[o] < iteration {
                    self.pq.push(other, new_distance);
                    self.queued[o] = iteration;
                    self.distance[o] = new_distance;
                    self.preceding_node[o] = current;
                    self.relevant_edge[o] = edge.index() as u32;
                } else if new_distance < self.distance[o] {
                    self.pq.set_priority(other, new_distance);
                    self.distance[o] = new_distance;
                    self.preceding_node[o] = current;
                    self.relevant_edge[o] = edge.index() as u32;
                } else {
                    debug_assert!(new_distance >= self.distance[o]);
                }
            }

            if let Some(pos) = active.iter().position(|&t| t == current) {
                active.swap_remove(pos);
            }
        }

        // Every target settled: union of the shortest-path chains back to
        // the source. Shared suffixes collapse through the set semantics.
        let mut tree = BTreeSet::new();
        for &target in targets {
            debug_assert_eq!(self.queued[target as usize], iteration);

            let mut node = target as usize;
            while self.preceding_node[node] != INVALID {
                let edge = self.relevant_edge[node];
                debug_assert_ne!(edge, INVALID);
                tree.insert(EdgeId::new(edge as usize));
                node = self.preceding_node[node] as usize;
            }
            debug_assert_eq!(self.relevant_edge[node], INVALID);
        }

        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::lattice::UNLIMITED_CAPACITY;
    use groute_common::db::core::{
        DesignRules, GridDims, LayerCapacity, Net, Pin, RoutingProblem, TileInfo,
    };

    fn problem(
        x_grids: u32,
        y_grids: u32,
        layers: u32,
        horizontal: u32,
        vertical: u32,
    ) -> RoutingProblem {
        RoutingProblem {
            grid: GridDims {
                x_grids,
                y_grids,
                layers,
            },
            capacity: LayerCapacity {
                vertical: vec![vertical; layers as usize],
                horizontal: vec![horizontal; layers as usize],
            },
            rules: DesignRules {
                minimum_width: vec![0; layers as usize],
                minimum_spacing: vec![1; layers as usize],
                via_spacing: vec![1; layers as usize],
            },
            tiles: TileInfo {
                lower_left_x: 0,
                lower_left_y: 0,
                tile_width: 10,
                tile_height: 10,
            },
            nets: Vec::new(),
            adjustments: Vec::new(),
        }
    }

    fn net(name: &str, id: i32, pins: &[(i32, i32, u32)]) -> Net {
        Net {
            name: name.to_string(),
            id,
            num_pins: pins.len(),
            minimum_width: 0,
            pins: pins
                .iter()
                .map(|&(x, y, layer)| Pin { x, y, layer })
                .collect(),
        }
    }

    fn route(problem: &RoutingProblem) -> (Vec<BTreeSet<EdgeId>>, Vec<u32>, usize) {
        let graph = LatticeGraph::from_problem(problem).unwrap();
        let mut router = GlobalRouter::new(problem, &graph, &RouterConfig::default());
        let trees = router.run();
        (
            trees,
            router.aggregated_width().to_vec(),
            router.emergency_reroutes(),
        )
    }

    #[test]
    fn single_pin_net_gets_empty_tree() {
        let mut problem = problem(2, 2, 2, 100, 100);
        problem.nets.push(net("n0", 0, &[(0, 0, 0)]));
        let (trees, _, emergencies) = route(&problem);
        assert!(trees[0].is_empty());
        assert_eq!(emergencies, 0);
    }

    #[test]
    fn zero_pin_net_gets_empty_tree() {
        let mut problem = problem(2, 2, 2, 100, 100);
        problem.nets.push(net("n0", 0, &[]));
        let (trees, _, _) = route(&problem);
        assert!(trees[0].is_empty());
    }

    #[test]
    fn pins_sharing_a_tile_need_no_edges() {
        let mut problem = problem(2, 2, 1, 100, 100);
        problem.nets.push(net("n0", 0, &[(2, 2, 0), (7, 7, 0)]));
        let (trees, agg, _) = route(&problem);
        assert!(trees[0].is_empty());
        assert!(agg.iter().all(|&a| a == 0));
    }

    #[test]
    fn straight_horizontal_path() {
        let mut problem = problem(3, 1, 1, 100, 100);
        problem.nets.push(net("n0", 0, &[(5, 5, 0), (25, 5, 0)]));
        let (trees, agg, emergencies) = route(&problem);

        let graph = LatticeGraph::from_problem(&problem).unwrap();
        let expected: BTreeSet<EdgeId> = [
            graph
                .edge_between(graph.node_at(0, 0, 0), graph.node_at(1, 0, 0))
                .unwrap(),
            graph
                .edge_between(graph.node_at(1, 0, 0), graph.node_at(2, 0, 0))
                .unwrap(),
        ]
        .into_iter()
        .collect();

        assert_eq!(trees[0], expected);
        assert_eq!(emergencies, 0);
        // demand = minimum_spacing + max(minimum_width, net width) = 1
        for edge in &trees[0] {
            assert_eq!(agg[edge.index()], 1);
        }
    }

    #[test]
    fn stacked_pins_route_through_vias() {
        let mut problem = problem(1, 1, 3, 10, 10);
        problem.nets.push(net("n0", 0, &[(5, 5, 0), (5, 5, 2)]));
        let (trees, agg, _) = route(&problem);

        let graph = LatticeGraph::from_problem(&problem).unwrap();
        assert_eq!(trees[0].len(), 2);
        for edge in &trees[0] {
            assert_eq!(graph.axis_of(*edge), Axis::Z);
        }
        // Vias consume no capacity.
        assert!(agg.iter().all(|&a| a == 0));
    }

    #[test]
    fn saturated_edge_forces_detour() {
        let mut problem = problem(3, 2, 1, 1, 10);
        problem.nets.push(net("first", 0, &[(5, 5, 0), (15, 5, 0)]));
        problem.nets.push(net("second", 1, &[(5, 5, 0), (15, 5, 0)]));
        let (trees, agg, emergencies) = route(&problem);

        let graph = LatticeGraph::from_problem(&problem).unwrap();
        let direct = graph
            .edge_between(graph.node_at(0, 0, 0), graph.node_at(1, 0, 0))
            .unwrap();

        // First net takes the single direct edge and saturates it.
        assert_eq!(trees[0].len(), 1);
        assert!(trees[0].contains(&direct));

        // Second net must go up, across, and back down.
        assert_eq!(trees[1].len(), 3);
        assert!(!trees[1].contains(&direct));
        let axes: Vec<Axis> = trees[1].iter().map(|&e| graph.axis_of(e)).collect();
        assert_eq!(axes.iter().filter(|&&a| a == Axis::X).count(), 1);
        assert_eq!(axes.iter().filter(|&&a| a == Axis::Y).count(), 2);

        assert_eq!(emergencies, 0);
        // Within capacity on every edge.
        for e in 0..graph.edge_count() {
            assert!(agg[e] <= graph.capacity(EdgeId::new(e)));
        }
    }

    #[test]
    fn emergency_mode_reuses_saturated_edges() {
        let mut problem = problem(2, 1, 1, 1, 1);
        problem.nets.push(net("first", 0, &[(5, 5, 0), (15, 5, 0)]));
        problem.nets.push(net("second", 1, &[(5, 5, 0), (15, 5, 0)]));
        let (trees, agg, emergencies) = route(&problem);

        let graph = LatticeGraph::from_problem(&problem).unwrap();
        let only = graph
            .edge_between(graph.node_at(0, 0, 0), graph.node_at(1, 0, 0))
            .unwrap();

        assert_eq!(emergencies, 1);
        assert!(trees[1].contains(&only));
        // The capacity bound is gone: both nets committed their demand.
        assert_eq!(agg[only.index()], 2);
        assert!(agg[only.index()] > graph.capacity(only));
    }

    #[test]
    fn multi_pin_net_forms_single_tree() {
        let mut problem = problem(5, 5, 2, 50, 50);
        problem.nets.push(net(
            "n0",
            0,
            &[(25, 25, 0), (5, 5, 0), (45, 5, 1), (5, 45, 0), (45, 45, 1)],
        ));
        let (trees, _, emergencies) = route(&problem);

        let graph = LatticeGraph::from_problem(&problem).unwrap();
        let tree = &trees[0];
        assert_eq!(emergencies, 0);

        // Tree shape: one more node than edges, all pin tiles covered.
        let mut nodes = BTreeSet::new();
        for &edge in tree {
            let (a, b) = graph.nodes_of(edge);
            nodes.insert(a);
            nodes.insert(b);
        }
        assert_eq!(nodes.len(), tree.len() + 1);
        for pin in &problem.nets[0].pins {
            let (tx, ty) = problem.tile_of_point(pin.x, pin.y);
            assert!(nodes.contains(&graph.node_at(tx, ty, pin.layer)));
        }
    }

    #[test]
    fn aggregated_width_accumulates_across_nets() {
        let mut problem = problem(3, 1, 1, 100, 100);
        problem.nets.push(net("a", 0, &[(5, 5, 0), (25, 5, 0)]));
        problem.nets.push(net("b", 1, &[(5, 5, 0), (25, 5, 0)]));
        problem.nets.push(net("c", 2, &[(5, 5, 0), (25, 5, 0)]));
        let (trees, agg, _) = route(&problem);

        // All three nets share the only straight path; each commits 1.
        for tree in &trees {
            assert_eq!(tree.len(), 2);
            for edge in tree {
                assert_eq!(agg[edge.index()], 3);
            }
        }
    }

    #[test]
    fn net_minimum_width_raises_demand() {
        let mut problem = problem(3, 1, 1, 100, 100);
        let mut wide = net("wide", 0, &[(5, 5, 0), (25, 5, 0)]);
        wide.minimum_width = 4;
        problem.nets.push(wide);
        let (trees, agg, _) = route(&problem);

        // demand = 1 + max(0, 4) = 5
        for edge in &trees[0] {
            assert_eq!(agg[edge.index()], 5);
        }
    }

    #[test]
    fn via_capacity_is_unlimited() {
        let problem = problem(2, 2, 2, 10, 10);
        let graph = LatticeGraph::from_problem(&problem).unwrap();
        for e in 0..graph.edge_count() {
            let edge = EdgeId::new(e);
            if graph.axis_of(edge) == Axis::Z {
                assert_eq!(graph.capacity(edge), UNLIMITED_CAPACITY);
            }
        }
    }
}
