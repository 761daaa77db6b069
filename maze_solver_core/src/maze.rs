use std::{fmt, fs, io, path::Path};

use log::debug;
use rand::{Rng, seq::SliceRandom};

use crate::{Cell, map::Grid};

/// Side length of the mazes produced by the "random maze" action.
pub const DEFAULT_MAZE_SIZE: usize = 15;

/// Largest side length [`generate_maze`] accepts.
pub const MAX_MAZE_SIZE: usize = 1024;

/// Which of the two reserved cells a check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => f.write_str("start"),
            Endpoint::End => f.write_str("end"),
        }
    }
}

/// Reasons a maze cannot be loaded or built.
#[derive(Debug, thiserror::Error)]
pub enum MazeError {
    #[error("maze contains no rows of 0/1 cells")]
    Empty,
    #[error("unequal row length: row {row} has {found} cells, expected {expected}")]
    UnequalRowLength {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("{endpoint} cell {cell} must be passable")]
    BlockedEndpoint { endpoint: Endpoint, cell: Cell },
    #[error("maze needs at least two cells so that start and end differ")]
    EndpointsCoincide,
    #[error("cannot generate a {rows}x{cols} maze, both sides must be at least 2")]
    TooSmall { rows: usize, cols: usize },
    #[error("cannot generate a {rows}x{cols} maze, sides are limited to {max}", max = MAX_MAZE_SIZE)]
    TooLarge { rows: usize, cols: usize },
    #[error("failed to read maze file: {0}")]
    Io(#[from] io::Error),
}

/// A rectangular maze of passable (`true`) and blocked (`false`) cells.
///
/// Construction guarantees that the start `(0, 0)` and end
/// `(rows - 1, cols - 1)` cells are passable and distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridMaze {
    cells: Grid<bool>,
}

impl GridMaze {
    /// Builds a maze from explicit rows, enforcing every maze invariant.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, MazeError> {
        let width = rows.first().map(Vec::len).ok_or(MazeError::Empty)?;
        if width == 0 {
            return Err(MazeError::Empty);
        }
        if let Some((row, found)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != width)
            .map(|(i, r)| (i, r.len()))
        {
            return Err(MazeError::UnequalRowLength {
                row,
                expected: width,
                found,
            });
        }

        let height = rows.len();
        let flat: Vec<bool> = rows.into_iter().flatten().collect();
        let cells = Grid::from_generator(height, width, |cell| flat[cell.row * width + cell.col]);
        Self::from_grid(cells)
    }

    fn from_grid(cells: Grid<bool>) -> Result<Self, MazeError> {
        if cells.rows() * cells.cols() < 2 {
            return Err(MazeError::EndpointsCoincide);
        }
        let maze = GridMaze { cells };
        for (endpoint, cell) in [(Endpoint::Start, maze.start()), (Endpoint::End, maze.end())] {
            if !maze.is_passable(cell) {
                return Err(MazeError::BlockedEndpoint { endpoint, cell });
            }
        }
        Ok(maze)
    }

    pub fn rows(&self) -> usize {
        self.cells.rows()
    }

    pub fn cols(&self) -> usize {
        self.cells.cols()
    }

    /// The start cell, always `(0, 0)`.
    pub fn start(&self) -> Cell {
        Cell::new(0, 0)
    }

    /// The end cell, always the bottom-right corner.
    pub fn end(&self) -> Cell {
        Cell::new(self.rows() - 1, self.cols() - 1)
    }

    /// Returns true when `cell` is inside the maze and passable.
    pub fn is_passable(&self, cell: Cell) -> bool {
        self.cells.get(cell).copied().unwrap_or(false)
    }

    /// Passable in-bounds neighbors of `cell`, in up/down/left/right order.
    pub fn passable_neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        self.cells
            .neighbors(cell)
            .filter(move |&next| self.is_passable(next))
    }

    /// Iterates over passable cells in row-major order.
    pub fn passable_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells
            .enumerate()
            .filter_map(|(cell, &open)| open.then_some(cell))
    }

    pub fn grid(&self) -> &Grid<bool> {
        &self.cells
    }

    /// Renders the maze in the `0`/`1` text format accepted by [`parse_maze`].
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.rows() * (self.cols() + 1));
        for row in 0..self.rows() {
            if let Some(cells) = self.cells.row(row) {
                out.extend(cells.iter().map(|&open| if open { '1' } else { '0' }));
            }
            out.push('\n');
        }
        out
    }
}

/// Parses a maze from text: one row per line, `1` passable, `0` blocked.
///
/// Any other character is ignored and lines without a single `0`/`1` are
/// skipped, so comments and blank lines are tolerated.
pub fn parse_maze(text: &str) -> Result<GridMaze, MazeError> {
    let rows: Vec<Vec<bool>> = text
        .lines()
        .map(|line| {
            line.chars()
                .filter_map(|ch| match ch {
                    '0' => Some(false),
                    '1' => Some(true),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();
    GridMaze::from_rows(rows)
}

/// Reads and parses a maze file.
pub fn load_maze_file(path: impl AsRef<Path>) -> Result<GridMaze, MazeError> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_maze(&text)
}

/// Carves a random perfect maze and opens a corridor to the end cell.
///
/// Carving walks a depth-first spanning tree over the even-coordinate
/// lattice with an explicit stack. Each frame keeps its own shuffled
/// direction list, so the visiting order matches a recursive backtracker.
pub fn generate_maze<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    rng: &mut R,
) -> Result<GridMaze, MazeError> {
    if rows < 2 || cols < 2 {
        return Err(MazeError::TooSmall { rows, cols });
    }
    if rows > MAX_MAZE_SIZE || cols > MAX_MAZE_SIZE {
        return Err(MazeError::TooLarge { rows, cols });
    }

    const STEPS: [(isize, isize); 4] = [(0, 2), (0, -2), (2, 0), (-2, 0)];

    let mut cells = Grid::filled(rows, cols, false);
    let shuffled = |rng: &mut R| {
        let mut dirs = STEPS;
        dirs.shuffle(rng);
        dirs
    };

    let origin = Cell::new(0, 0);
    cells[origin] = true;
    let mut stack = vec![(origin, shuffled(&mut *rng), 0usize)];
    let mut carved = 1usize;

    while let Some((cell, dirs, next)) = stack.last_mut() {
        let Some(&(dr, dc)) = dirs.get(*next) else {
            stack.pop();
            continue;
        };
        *next += 1;
        let current = *cell;

        let target = match (
            current.row.checked_add_signed(dr),
            current.col.checked_add_signed(dc),
        ) {
            (Some(row), Some(col)) => Cell::new(row, col),
            _ => continue,
        };
        if cells.get(target) != Some(&false) {
            continue;
        }

        let between = Cell::new(
            (current.row + target.row) / 2,
            (current.col + target.col) / 2,
        );
        cells[between] = true;
        cells[target] = true;
        carved += 2;
        let dirs = shuffled(&mut *rng);
        stack.push((target, dirs, 0));
    }

    // The lattice covers even coordinates only; walk from its last cell
    // down and then right so even-sized mazes still reach the end.
    let mut cursor = Cell::new((rows - 1) & !1, (cols - 1) & !1);
    while cursor.row < rows - 1 {
        cursor.row += 1;
        cells[cursor] = true;
    }
    while cursor.col < cols - 1 {
        cursor.col += 1;
        cells[cursor] = true;
    }

    debug!("generated {rows}x{cols} maze, {carved} cells carved");
    GridMaze::from_grid(cells)
}
