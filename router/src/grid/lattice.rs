use super::{Axis, Direction};
use groute_common::db::core::RoutingProblem;
use groute_common::db::indices::{EdgeId, NodeId};
use groute_common::geom::coord::GridCoord;

/// Capacity assigned to via edges: never a routing bottleneck.
pub const UNLIMITED_CAPACITY: u32 = u32::MAX;

/// A cuboid lattice of routing tiles. Nodes and edges are dense integer
/// indices with O(1) encode/decode; the edge index space is partitioned
/// into the X range, then Y, then Z.
pub struct LatticeGraph {
    dim_x: u32,
    dim_y: u32,
    dim_z: u32,
    capacities: Vec<u32>,
}

impl LatticeGraph {
    pub fn new(dim_x: u32, dim_y: u32, dim_z: u32) -> Self {
        assert!(dim_x >= 1 && dim_y >= 1 && dim_z >= 1);
        let edges = (dim_x - 1) * dim_y * dim_z
            + dim_x * (dim_y - 1) * dim_z
            + dim_x * dim_y * (dim_z - 1);
        Self {
            dim_x,
            dim_y,
            dim_z,
            capacities: vec![0; edges as usize],
        }
    }

    /// Builds the lattice for a problem: X edges get the layer's horizontal
    /// capacity, Y edges the vertical capacity, vias are uncapped, and
    /// capacity adjustments then overwrite individual edges.
    pub fn from_problem(problem: &RoutingProblem) -> Result<Self, String> {
        let mut graph = Self::new(
            problem.grid.x_grids,
            problem.grid.y_grids,
            problem.grid.layers,
        );

        for x in 0..graph.dim_x {
            for y in 0..graph.dim_y {
                for z in 0..graph.dim_z {
                    let node = graph.node_at(x, y, z);
                    if graph.can_step(node, Direction::XPlus) {
                        let edge = graph.edge_from(node, Direction::XPlus);
                        graph.set_capacity(edge, problem.capacity.horizontal[z as usize]);
                    }
                    if graph.can_step(node, Direction::YPlus) {
                        let edge = graph.edge_from(node, Direction::YPlus);
                        graph.set_capacity(edge, problem.capacity.vertical[z as usize]);
                    }
                    if graph.can_step(node, Direction::ZPlus) {
                        let edge = graph.edge_from(node, Direction::ZPlus);
                        graph.set_capacity(edge, UNLIMITED_CAPACITY);
                    }
                }
            }
        }

        for adj in &problem.adjustments {
            if adj.col_start >= graph.dim_x
                || adj.row_start >= graph.dim_y
                || adj.layer_start >= graph.dim_z
                || adj.col_end >= graph.dim_x
                || adj.row_end >= graph.dim_y
                || adj.layer_end >= graph.dim_z
            {
                return Err(format!(
                    "capacity adjustment endpoint ({},{},{}) or ({},{},{}) outside the grid",
                    adj.col_start,
                    adj.row_start,
                    adj.layer_start,
                    adj.col_end,
                    adj.row_end,
                    adj.layer_end
                ));
            }

            let start = graph.node_at(adj.col_start, adj.row_start, adj.layer_start);
            let end = graph.node_at(adj.col_end, adj.row_end, adj.layer_end);
            let Some(edge) = graph.edge_between(start, end) else {
                return Err(format!(
                    "capacity adjustment endpoints ({},{},{}) and ({},{},{}) are not grid neighbors",
                    adj.col_start,
                    adj.row_start,
                    adj.layer_start,
                    adj.col_end,
                    adj.row_end,
                    adj.layer_end
                ));
            };
            graph.set_capacity(edge, adj.adjusted_capacity);
        }

        Ok(graph)
    }

    pub fn dim_x(&self) -> u32 {
        self.dim_x
    }

    pub fn dim_y(&self) -> u32 {
        self.dim_y
    }

    pub fn dim_z(&self) -> u32 {
        self.dim_z
    }

    pub fn node_count(&self) -> usize {
        (self.dim_x * self.dim_y * self.dim_z) as usize
    }

    pub fn edge_count(&self) -> usize {
        self.capacities.len()
    }

    #[inline(always)]
    fn x_edge_count(&self) -> u32 {
        (self.dim_x - 1) * self.dim_y * self.dim_z
    }

    #[inline(always)]
    fn y_edge_count(&self) -> u32 {
        self.dim_x * (self.dim_y - 1) * self.dim_z
    }

    #[inline(always)]
    pub fn node_at(&self, x: u32, y: u32, z: u32) -> NodeId {
        debug_assert!(x < self.dim_x && y < self.dim_y && z < self.dim_z);
        NodeId::new((x * self.dim_y * self.dim_z + y * self.dim_z + z) as usize)
    }

    #[inline(always)]
    pub fn position_of(&self, node: NodeId) -> GridCoord {
        debug_assert!(node.index() < self.node_count());
        let mut n = node.index() as u32;
        let x = n / (self.dim_y * self.dim_z);
        n %= self.dim_y * self.dim_z;
        let y = n / self.dim_z;
        let z = n % self.dim_z;
        GridCoord::new(x, y, z)
    }

    pub fn can_step(&self, node: NodeId, dir: Direction) -> bool {
        let c = self.position_of(node);
        match dir {
            Direction::XPlus => c.x + 1 < self.dim_x,
            Direction::XMinus => c.x >= 1,
            Direction::YPlus => c.y + 1 < self.dim_y,
            Direction::YMinus => c.y >= 1,
            Direction::ZPlus => c.z + 1 < self.dim_z,
            Direction::ZMinus => c.z >= 1,
        }
    }

    pub fn neighbor(&self, node: NodeId, dir: Direction) -> NodeId {
        debug_assert!(self.can_step(node, dir));
        let c = self.position_of(node);
        match dir {
            Direction::XPlus => self.node_at(c.x + 1, c.y, c.z),
            Direction::XMinus => self.node_at(c.x - 1, c.y, c.z),
            Direction::YPlus => self.node_at(c.x, c.y + 1, c.z),
            Direction::YMinus => self.node_at(c.x, c.y - 1, c.z),
            Direction::ZPlus => self.node_at(c.x, c.y, c.z + 1),
            Direction::ZMinus => self.node_at(c.x, c.y, c.z - 1),
        }
    }

    /// The edge leaving `node` in direction `dir`. Minus directions resolve
    /// to the same edge as the plus direction from the lower endpoint.
    pub fn edge_from(&self, node: NodeId, dir: Direction) -> EdgeId {
        debug_assert!(self.can_step(node, dir));
        let c = self.position_of(node);
        let (x, y, z, axis) = match dir {
            Direction::XPlus => (c.x, c.y, c.z, Axis::X),
            Direction::XMinus => (c.x - 1, c.y, c.z, Axis::X),
            Direction::YPlus => (c.x, c.y, c.z, Axis::Y),
            Direction::YMinus => (c.x, c.y - 1, c.z, Axis::Y),
            Direction::ZPlus => (c.x, c.y, c.z, Axis::Z),
            Direction::ZMinus => (c.x, c.y, c.z - 1, Axis::Z),
        };

        let index = match axis {
            Axis::X => x * self.dim_y * self.dim_z + y * self.dim_z + z,
            Axis::Y => self.x_edge_count() + y * self.dim_x * self.dim_z + x * self.dim_z + z,
            Axis::Z => {
                self.x_edge_count() + self.y_edge_count() + z * self.dim_x * self.dim_y
                    + x * self.dim_y
                    + y
            }
        };

        debug_assert!((index as usize) < self.edge_count());
        EdgeId::new(index as usize)
    }

    /// The unique edge joining two nodes, or `None` if they are not
    /// lattice neighbors.
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        let pa = self.position_of(a);
        let pb = self.position_of(b);

        let dx = pb.x as i64 - pa.x as i64;
        let dy = pb.y as i64 - pa.y as i64;
        let dz = pb.z as i64 - pa.z as i64;

        let dir = match (dx, dy, dz) {
            (1, 0, 0) => Direction::XPlus,
            (-1, 0, 0) => Direction::XMinus,
            (0, 1, 0) => Direction::YPlus,
            (0, -1, 0) => Direction::YMinus,
            (0, 0, 1) => Direction::ZPlus,
            (0, 0, -1) => Direction::ZMinus,
            _ => return None,
        };

        Some(self.edge_from(a, dir))
    }

    /// All edges incident to `node`, lower-coordinate neighbors included.
    pub fn edges_at(&self, node: NodeId) -> ([EdgeId; 6], usize) {
        let mut edges = [EdgeId::new(0); 6];
        let mut count = 0;
        for dir in Direction::ALL {
            if !self.can_step(node, dir) {
                continue;
            }
            edges[count] = self.edge_from(node, dir);
            count += 1;
        }
        (edges, count)
    }

    /// Decodes an edge into its two endpoints, lower coordinate first.
    pub fn nodes_of(&self, edge: EdgeId) -> (NodeId, NodeId) {
        debug_assert!(edge.index() < self.edge_count());
        let e = edge.index() as u32;
        let x_edges = self.x_edge_count();
        let y_edges = self.y_edge_count();

        if e < x_edges {
            let x = e / (self.dim_y * self.dim_z);
            let r = e % (self.dim_y * self.dim_z);
            let y = r / self.dim_z;
            let z = r % self.dim_z;
            (self.node_at(x, y, z), self.node_at(x + 1, y, z))
        } else if e < x_edges + y_edges {
            let e = e - x_edges;
            let y = e / (self.dim_x * self.dim_z);
            let r = e % (self.dim_x * self.dim_z);
            let x = r / self.dim_z;
            let z = r % self.dim_z;
            (self.node_at(x, y, z), self.node_at(x, y + 1, z))
        } else {
            let e = e - x_edges - y_edges;
            let z = e / (self.dim_x * self.dim_y);
            let r = e % (self.dim_x * self.dim_y);
            let x = r / self.dim_y;
            let y = r % self.dim_y;
            (self.node_at(x, y, z), self.node_at(x, y, z + 1))
        }
    }

    #[inline(always)]
    pub fn axis_of(&self, edge: EdgeId) -> Axis {
        debug_assert!(edge.index() < self.edge_count());
        let e = edge.index() as u32;
        if e < self.x_edge_count() {
            Axis::X
        } else if e < self.x_edge_count() + self.y_edge_count() {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// The layer an X or Y edge runs on (for a via, the lower layer).
    pub fn layer_of(&self, edge: EdgeId) -> u32 {
        self.position_of(self.nodes_of(edge).0).z
    }

    #[inline(always)]
    pub fn capacity(&self, edge: EdgeId) -> u32 {
        self.capacities[edge.index()]
    }

    #[inline(always)]
    pub fn set_capacity(&mut self, edge: EdgeId, capacity: u32) {
        self.capacities[edge.index()] = capacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groute_common::db::core::{
        CapacityAdjustment, DesignRules, GridDims, LayerCapacity, RoutingProblem, TileInfo,
    };

    fn problem(x_grids: u32, y_grids: u32, layers: u32) -> RoutingProblem {
        RoutingProblem {
            grid: GridDims {
                x_grids,
                y_grids,
                layers,
            },
            capacity: LayerCapacity {
                vertical: (0..layers).map(|z| 10 + z).collect(),
                horizontal: (0..layers).map(|z| 20 + z).collect(),
            },
            rules: DesignRules {
                minimum_width: vec![1; layers as usize],
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

    #[test]
    fn edge_count_matches_formula() {
        for (x, y, z) in [(1, 1, 1), (3, 2, 2), (4, 3, 5)] {
            let graph = LatticeGraph::new(x, y, z);
            let expected = (x - 1) * y * z + x * (y - 1) * z + x * y * (z - 1);
            assert_eq!(graph.edge_count(), expected as usize);
            assert_eq!(graph.node_count(), (x * y * z) as usize);
        }
    }

    #[test]
    fn node_position_bijection() {
        for dim_x in 1..=3 {
            for dim_y in 1..=4 {
                for dim_z in 1..=5 {
                    let graph = LatticeGraph::new(dim_x, dim_y, dim_z);
                    for x in 0..dim_x {
                        for y in 0..dim_y {
                            for z in 0..dim_z {
                                let node = graph.node_at(x, y, z);
                                assert_eq!(graph.position_of(node), GridCoord::new(x, y, z));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn neighbors_are_symmetric() {
        let graph = LatticeGraph::new(3, 4, 5);
        for n in 0..graph.node_count() {
            let node = NodeId::new(n);
            for dir in Direction::ALL {
                if !graph.can_step(node, dir) {
                    continue;
                }
                let neighbor = graph.neighbor(node, dir);
                assert!(graph.can_step(neighbor, dir.opposite()));
                assert_eq!(graph.neighbor(neighbor, dir.opposite()), node);
                assert_eq!(
                    graph.edge_from(node, dir),
                    graph.edge_from(neighbor, dir.opposite())
                );
            }
        }
    }

    #[test]
    fn every_edge_decodes_to_its_endpoints() {
        let graph = LatticeGraph::new(3, 4, 5);
        for e in 0..graph.edge_count() {
            let edge = EdgeId::new(e);
            let (a, b) = graph.nodes_of(edge);
            assert_eq!(graph.edge_between(a, b), Some(edge));
            assert_eq!(graph.edge_between(b, a), Some(edge));

            let pa = graph.position_of(a);
            let pb = graph.position_of(b);
            let manhattan = pb.x.abs_diff(pa.x) + pb.y.abs_diff(pa.y) + pb.z.abs_diff(pa.z);
            assert_eq!(manhattan, 1);

            let axis = graph.axis_of(edge);
            match axis {
                Axis::X => assert_eq!(pb.x, pa.x + 1),
                Axis::Y => assert_eq!(pb.y, pa.y + 1),
                Axis::Z => assert_eq!(pb.z, pa.z + 1),
            }

            let (edges, count) = graph.edges_at(a);
            assert!(edges[..count].contains(&edge));
            let (edges, count) = graph.edges_at(b);
            assert!(edges[..count].contains(&edge));
        }
    }

    #[test]
    fn edge_between_rejects_non_neighbors() {
        let graph = LatticeGraph::new(3, 3, 2);
        let a = graph.node_at(0, 0, 0);
        let b = graph.node_at(2, 0, 0);
        let c = graph.node_at(1, 1, 0);
        let d = graph.node_at(1, 0, 1);
        assert_eq!(graph.edge_between(a, b), None);
        assert_eq!(graph.edge_between(a, c), None);
        assert_eq!(graph.edge_between(a, d), None);
        assert_eq!(graph.edge_between(a, a), None);
    }

    #[test]
    fn corner_and_interior_degree() {
        let graph = LatticeGraph::new(3, 3, 3);
        let (_, corner) = graph.edges_at(graph.node_at(0, 0, 0));
        assert_eq!(corner, 3);
        let (_, center) = graph.edges_at(graph.node_at(1, 1, 1));
        assert_eq!(center, 6);
    }

    #[test]
    fn builder_installs_per_layer_capacities() {
        let problem = problem(3, 2, 2);
        let graph = LatticeGraph::from_problem(&problem).unwrap();

        for e in 0..graph.edge_count() {
            let edge = EdgeId::new(e);
            let z = graph.layer_of(edge) as usize;
            match graph.axis_of(edge) {
                Axis::X => assert_eq!(graph.capacity(edge), problem.capacity.horizontal[z]),
                Axis::Y => assert_eq!(graph.capacity(edge), problem.capacity.vertical[z]),
                Axis::Z => assert_eq!(graph.capacity(edge), UNLIMITED_CAPACITY),
            }
        }
    }

    #[test]
    fn builder_applies_adjustment_overwrite() {
        let mut problem = problem(3, 2, 2);
        problem.adjustments.push(CapacityAdjustment {
            col_start: 1,
            row_start: 0,
            layer_start: 0,
            col_end: 0,
            row_end: 0,
            layer_end: 0,
            adjusted_capacity: 3,
        });

        let graph = LatticeGraph::from_problem(&problem).unwrap();
        let a = graph.node_at(0, 0, 0);
        let b = graph.node_at(1, 0, 0);
        let edge = graph.edge_between(a, b).unwrap();
        assert_eq!(graph.capacity(edge), 3);

        // Sibling edges keep the layer default.
        let c = graph.node_at(2, 0, 0);
        let other = graph.edge_between(b, c).unwrap();
        assert_eq!(graph.capacity(other), problem.capacity.horizontal[0]);
    }

    #[test]
    fn builder_rejects_non_adjacent_adjustment() {
        let mut bad = problem(3, 2, 2);
        bad.adjustments.push(CapacityAdjustment {
            col_start: 0,
            row_start: 0,
            layer_start: 0,
            col_end: 2,
            row_end: 0,
            layer_end: 0,
            adjusted_capacity: 3,
        });
        assert!(LatticeGraph::from_problem(&bad).is_err());
    }

    #[test]
    fn builder_rejects_out_of_grid_adjustment() {
        let mut bad = problem(3, 2, 2);
        bad.adjustments.push(CapacityAdjustment {
            col_start: 3,
            row_start: 0,
            layer_start: 0,
            col_end: 2,
            row_end: 0,
            layer_end: 0,
            adjusted_capacity: 3,
        });
        assert!(LatticeGraph::from_problem(&bad).is_err());
    }
}
