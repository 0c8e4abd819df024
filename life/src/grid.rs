/// Double-buffered Game of Life grid with fixed edges (no wrapping)

use rand::Rng;

use crate::error::{LifeError, Result};
use crate::patterns::Pattern;

const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    buffers: [Vec<bool>; 2],
    /// Index into `buffers` of the live generation. The other buffer is the
    /// write target of the next `step`.
    current: usize,
}

impl Grid {
    /// Create a dead grid. Both buffers are reserved up front and never
    /// resized afterwards.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let len = width
            .checked_mul(height)
            .ok_or(LifeError::Allocation { width, height })?;

        Ok(Self {
            width,
            height,
            buffers: [alloc_buffer(len, width, height)?, alloc_buffer(len, width, height)?],
            current: 0,
        })
    }

    /// Build a grid whose only live cells are `cells`.
    pub fn from_live_cells(width: usize, height: usize, cells: &[(usize, usize)]) -> Result<Self> {
        let mut grid = Self::new(width, height)?;
        for &(x, y) in cells {
            grid.set(x, y, true);
        }
        Ok(grid)
    }

    /// Width and height in cells.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Read-only view of the live generation, row-major.
    pub fn current_buffer(&self) -> &[bool] {
        &self.buffers[self.current]
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// State of the cell at (x, y) in the live generation.
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.current_buffer()[self.index(x, y)]
    }

    /// Set the cell at (x, y) in the live generation.
    pub fn set(&mut self, x: usize, y: usize, alive: bool) {
        let idx = self.index(x, y);
        self.buffers[self.current][idx] = alive;
    }

    /// Kill every cell of the live generation.
    pub fn clear(&mut self) {
        self.buffers[self.current].fill(false);
    }

    /// Overwrite buffer 0 with random cells and make it current.
    ///
    /// A cell is alive when a uniform draw from `0..100` exceeds 50, so the
    /// expected density is 0.49.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.current = 0;
        for cell in self.buffers[0].iter_mut() {
            *cell = rng.random_range(0..100u32) > 50;
        }
    }

    /// Clear the grid and draw `pattern` with its top-left corner at (x, y).
    /// Cells falling outside the grid are dropped.
    pub fn stamp(&mut self, pattern: &Pattern, x: usize, y: usize) {
        self.clear();
        for &(dx, dy) in pattern.cells {
            let (nx, ny) = (x + dx, y + dy);
            if nx < self.width && ny < self.height {
                self.set(nx, ny, true);
            }
        }
    }

    /// Count the live cells in the Moore neighborhood of (x, y). Positions
    /// off the edge of the grid are skipped.
    ///
    /// # Panics
    ///
    /// If (x, y) is outside the grid.
    pub fn count_live_neighbors(&self, x: usize, y: usize) -> u8 {
        assert!(
            x < self.width && y < self.height,
            "cell ({x}, {y}) outside {}x{} grid",
            self.width,
            self.height
        );
        count_neighbors(self.current_buffer(), self.width, self.height, x, y)
    }

    /// Advance one generation.
    ///
    /// Every cell of the next generation is computed from the current
    /// buffer only and written into the other one, then the selector flips.
    pub fn step(&mut self) {
        let (width, height) = (self.width, self.height);
        let [a, b] = &mut self.buffers;
        let (src, dst) = if self.current == 0 { (&*a, b) } else { (&*b, a) };

        for y in 0..height {
            for x in 0..width {
                let idx = y * width + x;
                let neighbors = count_neighbors(src, width, height, x, y);
                dst[idx] = matches!((src[idx], neighbors), (true, 2) | (true, 3) | (false, 3));
            }
        }

        self.current ^= 1;
    }

    /// Number of live cells in the current generation.
    pub fn population(&self) -> usize {
        self.current_buffer().iter().filter(|&&alive| alive).count()
    }

    /// Coordinates of the live cells, row-major.
    pub fn live_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let width = self.width;
        self.current_buffer()
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(move |(idx, _)| (idx % width, idx / width))
    }
}

/// Reserve a dead buffer of `len` cells without aborting on exhaustion.
pub(crate) fn alloc_buffer(len: usize, width: usize, height: usize) -> Result<Vec<bool>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| LifeError::Allocation { width, height })?;
    buffer.resize(len, false);
    Ok(buffer)
}

fn count_neighbors(cells: &[bool], width: usize, height: usize, x: usize, y: usize) -> u8 {
    NEIGHBOR_OFFSETS
        .iter()
        .filter(|(dx, dy)| {
            match (x.checked_add_signed(*dx), y.checked_add_signed(*dy)) {
                (Some(nx), Some(ny)) if nx < width && ny < height => cells[ny * width + nx],
                _ => false,
            }
        })
        .count() as u8
}
