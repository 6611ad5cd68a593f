//! Connected-region labelling (flood fill).

use std::collections::VecDeque;

use crate::Cell;

/// Identifier of a region, `1..=region_count()`.
pub type RegionId = usize;

/// Region label per cell plus the cell count of each region.
///
/// Derived data: rebuilt from the wall grids after every wall placement,
/// never edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMap {
    size: usize,
    /// Row-major region id per cell.
    labels: Vec<RegionId>,
    /// `sizes[id - 1]` is the number of cells in region `id`.
    sizes: Vec<usize>,
}

impl RegionMap {
    /// A map where the whole board is region 1.
    pub fn whole(size: usize) -> Self {
        Self {
            size,
            labels: vec![1; size * size],
            sizes: vec![size * size],
        }
    }

    /// Labels every cell by breadth-first flood fill, scanning row-major so
    /// region ids are assigned in reading order.
    ///
    /// `neighbours` must return the cells reachable from a cell in one step
    /// (i.e. across an open edge).
    pub fn flood<F, I>(size: usize, neighbours: F) -> Self
    where
        F: Fn(Cell) -> I,
        I: IntoIterator<Item = Cell>,
    {
        let mut labels = vec![0; size * size];
        let mut sizes = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..size * size {
            if labels[start] != 0 {
                continue;
            }
            sizes.push(1);
            let id = sizes.len();
            labels[start] = id;
            queue.push_back(Cell::new(start / size, start % size));

            while let Some(cell) = queue.pop_front() {
                for next in neighbours(cell) {
                    let idx = next.row * size + next.col;
                    if labels[idx] == 0 {
                        labels[idx] = id;
                        sizes[id - 1] += 1;
                        queue.push_back(next);
                    }
                }
            }
        }

        Self { size, labels, sizes }
    }

    /// Region id of `cell`. Panics if the cell is off the board.
    pub fn region_of(&self, cell: Cell) -> RegionId {
        self.labels[cell.row * self.size + cell.col]
    }

    /// Number of cells in region `id`, 0 for unknown ids.
    pub fn region_size(&self, id: RegionId) -> usize {
        id.checked_sub(1)
            .and_then(|i| self.sizes.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Size of the region containing `cell`.
    pub fn size_at(&self, cell: Cell) -> usize {
        self.region_size(self.region_of(cell))
    }

    pub fn region_count(&self) -> usize {
        self.sizes.len()
    }

    /// Sum of all region sizes. Always `size²`.
    pub fn total_cells(&self) -> usize {
        self.sizes.iter().sum()
    }
}
