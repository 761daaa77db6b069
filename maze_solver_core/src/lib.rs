use serde::{Deserialize, Serialize};

pub mod animation;
pub mod graph;
pub mod map;
pub mod maze;
pub mod plugin;
pub mod session;
pub mod validate;

/// Dense identifier of a passable cell in the maze graph.
pub type NodeId = usize;

/// Node id reserved for the start cell `(0, 0)`.
pub const START_NODE: NodeId = 0;
/// Node id reserved for the end cell `(rows - 1, cols - 1)`.
pub const END_NODE: NodeId = 1;

/// A grid coordinate, 0-indexed from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Cell { row, col }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
