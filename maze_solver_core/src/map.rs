use std::ops::{Index, IndexMut};

use crate::Cell;

/// Neighbor offsets in scan order: up, down, left, right.
pub const DIRECTIONS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Cells are addressed by `(row, col)` through [`Cell`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with every cell set to `value`.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` overflows `usize`.
    pub fn filled(rows: usize, cols: usize, value: T) -> Self
    where
        T: Clone,
    {
        let size = rows.checked_mul(cols).expect("Grid size overflow");
        Grid {
            rows,
            cols,
            cells: vec![value; size],
        }
    }

    /// Creates a new grid with the specified dimensions, filled by a generator function.
    ///
    /// The generator is called once per cell in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` overflows `usize`.
    pub fn from_generator<F>(rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(Cell) -> T,
    {
        let size = rows.checked_mul(cols).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(f(Cell { row, col }));
            }
        }
        Grid { rows, cols, cells }
    }

    /// Returns the number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Converts a cell to a flat vector index, or `None` when out of bounds.
    #[inline]
    pub fn cell_to_index(&self, cell: Cell) -> Option<usize> {
        if self.is_valid(cell) {
            Some(cell.row * self.cols + cell.col)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_valid(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    pub fn get(&self, cell: Cell) -> Option<&T> {
        self.cell_to_index(cell).and_then(|index| self.cells.get(index))
    }

    /// Returns the in-bounds 4-directional neighbors of `cell` in scan order
    /// (up, down, left, right).
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        DIRECTIONS.iter().filter_map(move |&(dr, dc)| {
            let row = cell.row.checked_add_signed(dr)?;
            let col = cell.col.checked_add_signed(dc)?;
            let next = Cell { row, col };
            self.is_valid(next).then_some(next)
        })
    }

    /// Returns an iterator that yields `(Cell, &T)` in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Cell, &T)> {
        let cols = self.cols;
        self.cells.iter().enumerate().map(move |(index, value)| {
            (
                Cell {
                    row: index / cols,
                    col: index % cols,
                },
                value,
            )
        })
    }

    /// Returns one row as a slice.
    pub fn row(&self, row: usize) -> Option<&[T]> {
        if row < self.rows {
            Some(&self.cells[row * self.cols..(row + 1) * self.cols])
        } else {
            None
        }
    }
}

impl<T> Index<Cell> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, cell: Cell) -> &Self::Output {
        match self.cell_to_index(cell) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size {}x{}",
                cell, self.rows, self.cols
            ),
        }
    }
}

impl<T> IndexMut<Cell> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, cell: Cell) -> &mut Self::Output {
        let (rows, cols) = (self.rows, self.cols);
        match self.cell_to_index(cell) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size {}x{}",
                cell, rows, cols
            ),
        }
    }
}
