pub mod lattice;

pub use lattice::LatticeGraph;

/// Canonical orientation of an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A signed step between neighboring lattice nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    XPlus,
    XMinus,
    YPlus,
    YMinus,
    ZPlus,
    ZMinus,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::XPlus,
        Direction::XMinus,
        Direction::YPlus,
        Direction::YMinus,
        Direction::ZPlus,
        Direction::ZMinus,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::XPlus => Direction::XMinus,
            Direction::XMinus => Direction::XPlus,
            Direction::YPlus => Direction::YMinus,
            Direction::YMinus => Direction::YPlus,
            Direction::ZPlus => Direction::ZMinus,
            Direction::ZMinus => Direction::ZPlus,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Direction::XPlus | Direction::XMinus => Axis::X,
            Direction::YPlus | Direction::YMinus => Axis::Y,
            Direction::ZPlus | Direction::ZMinus => Axis::Z,
        }
    }
}
