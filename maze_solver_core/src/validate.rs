use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::{END_NODE, NodeId, START_NODE, graph::Graph};

/// Why a plugin's answer was rejected. Checks run in declaration order and
/// stop at the first failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathValidationError {
    #[error("not a sequence: expected an array of node ids, got {found}")]
    NotASequence { found: String },
    #[error("empty path")]
    EmptyPath,
    #[error("wrong endpoints: path runs from {first} to {last}, expected 0 to 1")]
    WrongEndpoints { first: NodeId, last: NodeId },
    #[error("illegal move at index {index}: {from} -> {to}")]
    IllegalMove {
        index: usize,
        from: NodeId,
        to: NodeId,
    },
    #[error("path takes {length} moves but the shortest route takes {shortest}")]
    NotShortest { length: usize, shortest: usize },
}

/// Extra checks beyond structural validity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Reject legal paths that are longer than a breadth-first route.
    pub require_shortest: bool,
}

/// A path that starts at node 0, ends at node 1 and only uses graph edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedPath(Vec<NodeId>);

impl ValidatedPath {
    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    /// Number of moves, one less than the number of nodes.
    pub fn moves(&self) -> usize {
        self.0.len() - 1
    }
}

/// Validates raw plugin output structurally.
pub fn validate_path(raw: &Value, graph: &Graph) -> Result<ValidatedPath, PathValidationError> {
    validate_path_with(raw, graph, ValidationOptions::default())
}

/// Validates raw plugin output, applying `options` after the structural checks.
pub fn validate_path_with(
    raw: &Value,
    graph: &Graph,
    options: ValidationOptions,
) -> Result<ValidatedPath, PathValidationError> {
    let ids = as_node_ids(raw)?;
    let path = validate_ids(&ids, graph)?;

    if options.require_shortest {
        // A legal path proves the end is reachable.
        let shortest = shortest_distance(graph).unwrap_or(0);
        if path.moves() > shortest {
            return Err(PathValidationError::NotShortest {
                length: path.moves(),
                shortest,
            });
        }
    }
    Ok(path)
}

/// Runs the emptiness, endpoint and adjacency checks on a typed path.
pub fn validate_ids(path: &[NodeId], graph: &Graph) -> Result<ValidatedPath, PathValidationError> {
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return Err(PathValidationError::EmptyPath);
    };
    if first != START_NODE || last != END_NODE {
        return Err(PathValidationError::WrongEndpoints { first, last });
    }
    if let Some((index, pair)) = path
        .windows(2)
        .enumerate()
        .find(|(_, pair)| !graph.contains_edge(pair[0], pair[1]))
    {
        return Err(PathValidationError::IllegalMove {
            index,
            from: pair[0],
            to: pair[1],
        });
    }
    debug!("validated path of {} moves", path.len() - 1);
    Ok(ValidatedPath(path.to_vec()))
}

/// Fewest moves from start to end, or `None` when the end is unreachable.
pub fn shortest_distance(graph: &Graph) -> Option<usize> {
    graph
        .shortest_path(START_NODE, END_NODE)
        .map(|path| path.len() - 1)
}

fn as_node_ids(raw: &Value) -> Result<Vec<NodeId>, PathValidationError> {
    let not_a_sequence = |found: &Value| PathValidationError::NotASequence {
        found: describe(found),
    };
    let items = raw.as_array().ok_or_else(|| not_a_sequence(raw))?;
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|id| NodeId::try_from(id).ok())
                .ok_or_else(|| not_a_sequence(item))
        })
        .collect()
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::build_graph, maze::parse_maze};
    use serde_json::json;

    fn open_3x3() -> Graph {
        build_graph(&parse_maze("111\n111\n111\n").unwrap()).0
    }

    #[test]
    fn accepts_legal_path() {
        // 0=(0,0) 2=(0,1) 3=(0,2) 6=(1,2) 1=(2,2)
        let path = validate_path(&json!([0, 2, 3, 6, 1]), &open_3x3()).unwrap();
        assert_eq!(path.nodes(), &[0, 2, 3, 6, 1]);
        assert_eq!(path.moves(), 4);
    }

    #[test]
    fn rejects_non_sequences() {
        let graph = open_3x3();
        for raw in [json!({"0": 1}), json!("0,1"), json!(null), json!(7)] {
            assert!(matches!(
                validate_path(&raw, &graph),
                Err(PathValidationError::NotASequence { .. })
            ));
        }
        let err = validate_path(&json!([0, -2, 1]), &graph).unwrap_err();
        assert_eq!(
            err,
            PathValidationError::NotASequence {
                found: "number -2".to_string()
            }
        );
        assert!(err.to_string().starts_with("not a sequence"));
        assert!(matches!(
            validate_path(&json!([0, 1.5, 1]), &graph),
            Err(PathValidationError::NotASequence { .. })
        ));
    }

    #[test]
    fn rejects_empty_path() {
        let err = validate_path(&json!([]), &open_3x3()).unwrap_err();
        assert_eq!(err, PathValidationError::EmptyPath);
        assert_eq!(err.to_string(), "empty path");
    }

    #[test]
    fn rejects_wrong_endpoints() {
        let graph = open_3x3();
        assert_eq!(
            validate_path(&json!([2, 3, 6, 1]), &graph),
            Err(PathValidationError::WrongEndpoints { first: 2, last: 1 })
        );
        assert_eq!(
            validate_path(&json!([0, 2, 3]), &graph),
            Err(PathValidationError::WrongEndpoints { first: 0, last: 3 })
        );
        assert_eq!(
            validate_path(&json!([0]), &graph),
            Err(PathValidationError::WrongEndpoints { first: 0, last: 0 })
        );
    }

    #[test]
    fn illegal_move_names_index_and_pair() {
        let graph = open_3x3();
        let err = validate_path(&json!([0, 2, 5, 7, 1]), &graph).unwrap_err();
        // 5=(1,1) to 7=(2,0) is diagonal.
        assert_eq!(
            err,
            PathValidationError::IllegalMove {
                index: 2,
                from: 5,
                to: 7
            }
        );
        assert_eq!(err.to_string(), "illegal move at index 2: 5 -> 7");
    }

    #[test]
    fn unknown_node_is_an_illegal_move() {
        let graph = open_3x3();
        assert_eq!(
            validate_path(&json!([0, 2, 99, 1]), &graph),
            Err(PathValidationError::IllegalMove {
                index: 1,
                from: 2,
                to: 99
            })
        );
    }

    #[test]
    fn longer_paths_pass_unless_shortest_is_required() {
        let graph = open_3x3();
        // Detour through the left column and back.
        let detour = json!([0, 4, 5, 2, 3, 6, 1]);
        assert_eq!(validate_path(&detour, &graph).unwrap().moves(), 6);

        let strict = ValidationOptions {
            require_shortest: true,
        };
        assert_eq!(
            validate_path_with(&detour, &graph, strict),
            Err(PathValidationError::NotShortest {
                length: 6,
                shortest: 4
            })
        );
        assert!(validate_path_with(&json!([0, 4, 7, 8, 1]), &graph, strict).is_ok());
    }

    #[test]
    fn shortest_distance_matches_manhattan_on_open_grid() {
        assert_eq!(shortest_distance(&open_3x3()), Some(4));
        let blocked = build_graph(&parse_maze("10\n01\n").unwrap()).0;
        assert_eq!(shortest_distance(&blocked), None);
    }
}
