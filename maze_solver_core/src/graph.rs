use std::collections::{HashMap, VecDeque};

use log::debug;
use serde::{Serialize, Serializer};

use crate::{Cell, END_NODE, NodeId, START_NODE, maze::GridMaze};

/// Bijection between passable cells and node ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMap {
    ids: HashMap<Cell, NodeId>,
    cells: Vec<Cell>,
}

impl NodeMap {
    fn insert(&mut self, cell: Cell) -> NodeId {
        let id = self.cells.len();
        self.cells.push(cell);
        self.ids.insert(cell, id);
        id
    }

    /// Looks up the id of a passable cell.
    pub fn node_id(&self, cell: Cell) -> Option<NodeId> {
        self.ids.get(&cell).copied()
    }

    /// Looks up the cell a node id stands for.
    pub fn cell(&self, id: NodeId) -> Option<Cell> {
        self.cells.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates `(id, cell)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Cell)> + '_ {
        self.cells.iter().copied().enumerate()
    }
}

/// Adjacency lists of the maze graph, indexed by node id.
///
/// Every passable cell has an entry, possibly empty. Serializes as a JSON
/// object keyed by node id, which is the shape handed to plugins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    adjacency: Vec<Vec<NodeId>>,
}

impl Graph {
    /// Neighbors of `id` in up/down/left/right order, or `None` for an unknown id.
    pub fn neighbors(&self, id: NodeId) -> Option<&[NodeId]> {
        self.adjacency.get(id).map(Vec::as_slice)
    }

    pub fn contains_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.neighbors(from)
            .is_some_and(|neighbors| neighbors.contains(&to))
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Breadth-first search for a fewest-moves route from `from` to `to`.
    ///
    /// Returns the node sequence including both ends, or `None` when `to`
    /// is unreachable or either id is unknown.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        if from >= self.node_count() || to >= self.node_count() {
            return None;
        }
        let mut came_from: Vec<Option<NodeId>> = vec![None; self.node_count()];
        let mut visited = vec![false; self.node_count()];
        let mut frontier = VecDeque::from([from]);
        visited[from] = true;

        while let Some(current) = frontier.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut node = to;
                while let Some(previous) = came_from[node] {
                    path.push(previous);
                    node = previous;
                }
                path.reverse();
                return Some(path);
            }
            for &next in &self.adjacency[current] {
                if !visited[next] {
                    visited[next] = true;
                    came_from[next] = Some(current);
                    frontier.push_back(next);
                }
            }
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[NodeId])> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .map(|(id, neighbors)| (id, neighbors.as_slice()))
    }
}

impl Serialize for Graph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Converts a maze into its graph and the cell/id mapping.
///
/// Start and end always receive ids 0 and 1; the remaining passable cells
/// are numbered from 2 in row-major order. Identical mazes produce identical
/// output.
pub fn build_graph(maze: &GridMaze) -> (Graph, NodeMap) {
    let (start, end) = (maze.start(), maze.end());

    let mut node_map = NodeMap::default();
    let start_id = node_map.insert(start);
    let end_id = node_map.insert(end);
    debug_assert_eq!((start_id, end_id), (START_NODE, END_NODE));
    for cell in maze.passable_cells() {
        if cell != start && cell != end {
            node_map.insert(cell);
        }
    }

    let adjacency = node_map
        .cells
        .iter()
        .map(|&cell| {
            maze.passable_neighbors(cell)
                .filter_map(|next| node_map.node_id(next))
                .collect()
        })
        .collect();
    let graph = Graph { adjacency };

    debug!(
        "built graph with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    (graph, node_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::parse_maze;

    fn open_3x3() -> GridMaze {
        parse_maze("111\n111\n111\n").unwrap()
    }

    #[test]
    fn reserved_ids_then_row_major() {
        let (_, map) = build_graph(&open_3x3());
        let order: Vec<Cell> = map.iter().map(|(_, cell)| cell).collect();
        assert_eq!(
            order,
            vec![
                Cell::new(0, 0),
                Cell::new(2, 2),
                Cell::new(0, 1),
                Cell::new(0, 2),
                Cell::new(1, 0),
                Cell::new(1, 1),
                Cell::new(1, 2),
                Cell::new(2, 0),
                Cell::new(2, 1),
            ]
        );
    }

    #[test]
    fn node_map_is_a_bijection_over_passable_cells() {
        let maze = parse_maze("1101\n0111\n1001\n1111\n").unwrap();
        let (graph, map) = build_graph(&maze);
        assert_eq!(map.len(), maze.passable_cells().count());
        assert_eq!(graph.node_count(), map.len());
        for (id, cell) in map.iter() {
            assert_eq!(map.node_id(cell), Some(id));
            assert!(maze.is_passable(cell));
        }
        assert_eq!(map.node_id(Cell::new(0, 2)), None);
    }

    #[test]
    fn neighbors_are_symmetric_and_scan_ordered() {
        let maze = open_3x3();
        let (graph, map) = build_graph(&maze);
        for (u, neighbors) in graph.iter() {
            for &v in neighbors {
                assert!(graph.contains_edge(v, u), "{v} -> {u} missing");
            }
        }
        // Center (1, 1) has id 5: up (0,1)=2, down (2,1)=8, left (1,0)=4, right (1,2)=6.
        assert_eq!(map.node_id(Cell::new(1, 1)), Some(5));
        assert_eq!(graph.neighbors(5), Some(&[2, 8, 4, 6][..]));
        assert_eq!(graph.edge_count(), 12);
    }

    #[test]
    fn isolated_cells_get_empty_lists() {
        let maze = parse_maze("101\n000\n101\n").unwrap();
        let (graph, map) = build_graph(&maze);
        assert_eq!(graph.node_count(), 4);
        for (id, _) in map.iter() {
            assert_eq!(graph.neighbors(id), Some(&[][..]));
        }
        assert_eq!(graph.neighbors(4), None);
    }

    #[test]
    fn serializes_as_object_keyed_by_id() {
        let maze = parse_maze("11\n01\n").unwrap();
        let (graph, _) = build_graph(&maze);
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json, serde_json::json!({"0": [2], "1": [2], "2": [1, 0]}));
    }

    #[test]
    fn shortest_path_counts_fewest_moves() {
        let (graph, map) = build_graph(&open_3x3());
        let path = graph.shortest_path(START_NODE, END_NODE).unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(map.cell(path[0]), Some(Cell::new(0, 0)));
        assert_eq!(map.cell(path[4]), Some(Cell::new(2, 2)));
        for pair in path.windows(2) {
            assert!(graph.contains_edge(pair[0], pair[1]));
        }
    }

    #[test]
    fn shortest_path_reports_unreachable_end() {
        let (graph, _) = build_graph(&parse_maze("10\n01\n").unwrap());
        assert_eq!(graph.shortest_path(START_NODE, END_NODE), None);
        assert_eq!(graph.shortest_path(START_NODE, 9), None);
        assert_eq!(graph.shortest_path(START_NODE, START_NODE), Some(vec![0]));
    }

    #[test]
    fn building_twice_is_identical() {
        let maze = parse_maze("1110\n0011\n1111\n").unwrap();
        assert_eq!(build_graph(&maze), build_graph(&maze));
    }
}
