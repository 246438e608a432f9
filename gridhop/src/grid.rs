//! Fixed-size tile grid.
//!
//! The grid owns one [`Cell`] per coordinate and never changes shape after
//! construction. Cells carry walkability, occupancy, the scratch fields the
//! A* search writes, and a cosmetic highlight tag.

use crate::error::ConfigError;

/// Grids above this many cells get a warning at construction: the path search
/// runs synchronously inside a tick and scales with the cell count.
pub const SEARCH_BUDGET_WARN_CELLS: usize = 64 * 64;

/// A cell position in grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another coordinate.
    pub fn manhattan_distance(&self, other: &GridCoord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Chebyshev distance to another coordinate.
    pub fn chebyshev_distance(&self, other: &GridCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// True when the two coordinates differ by exactly one in both axes.
    pub fn is_diagonal_to(&self, other: &GridCoord) -> bool {
        (self.x - other.x).abs() == 1 && (self.y - other.y).abs() == 1
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl From<(i32, i32)> for GridCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl std::fmt::Display for GridCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cosmetic highlight carried by a cell. Only for visualization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CellTag {
    #[default]
    None,
    Selected,
    Path,
}

/// Per-coordinate state.
#[derive(Clone, Debug)]
pub struct Cell {
    coord: GridCoord,
    // Written only by obstacle sync.
    pub(crate) walkable: bool,
    // Written only by mover spawn, release and hop landing.
    pub(crate) occupied: bool,
    // Target of a hop in flight; cleared when the hop lands or is aborted.
    pub(crate) reserved: bool,
    pub tag: CellTag,

    // Search scratch, overwritten by every search that touches the cell.
    pub(crate) g_cost: i32,
    pub(crate) h_cost: i32,
    pub(crate) parent: Option<GridCoord>,
}

impl Cell {
    fn new(coord: GridCoord) -> Self {
        Self {
            coord,
            walkable: true,
            occupied: false,
            reserved: false,
            tag: CellTag::None,
            g_cost: 0,
            h_cost: 0,
            parent: None,
        }
    }

    pub fn coord(&self) -> GridCoord {
        self.coord
    }

    pub fn is_walkable(&self) -> bool {
        self.walkable
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub fn g_cost(&self) -> i32 {
        self.g_cost
    }

    pub fn h_cost(&self) -> i32 {
        self.h_cost
    }

    pub fn f_cost(&self) -> i32 {
        self.g_cost + self.h_cost
    }

    /// The cell this one was reached from in the last search that visited it.
    pub fn parent(&self) -> Option<GridCoord> {
        self.parent
    }
}

/// Row-major grid of [`Cell`]s.
#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>, // Row-major: [y * width + x]
}

impl Grid {
    /// Create a grid with every cell walkable and unoccupied.
    ///
    /// Fails with [`ConfigError::EmptyGrid`] if either dimension is zero.
    pub fn new(width: usize, height: usize) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyGrid { width, height });
        }
        let cell_count = width * height;
        if cell_count > SEARCH_BUDGET_WARN_CELLS {
            log::warn!(
                "Grid {}x{} has {} cells; path searches run to completion inside one tick and may exceed the frame budget",
                width,
                height,
                cell_count
            );
        }

        let mut cells = Vec::with_capacity(cell_count);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                cells.push(Cell::new(GridCoord::new(x, y)));
            }
        }

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Width of the grid in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the grid in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Check if a grid coordinate is within bounds.
    pub fn is_valid(&self, coord: &GridCoord) -> bool {
        coord.x >= 0 && coord.x < self.width as i32 && coord.y >= 0 && coord.y < self.height as i32
    }

    fn index_of(&self, coord: &GridCoord) -> Option<usize> {
        if !self.is_valid(coord) {
            return None;
        }
        Some((coord.y as usize) * self.width + (coord.x as usize))
    }

    /// Get the cell at `(x, y)`, or `None` when out of bounds.
    pub fn get_cell(&self, x: i32, y: i32) -> Option<&Cell> {
        self.get(GridCoord::new(x, y))
    }

    /// Get the cell at the given coordinate.
    /// Returns `None` if the coordinate is out of bounds.
    pub fn get(&self, coord: GridCoord) -> Option<&Cell> {
        let index = self.index_of(&coord)?;
        self.cells.get(index)
    }

    /// Get mutable access to the cell at the given coordinate.
    /// Returns `None` if the coordinate is out of bounds.
    pub fn get_mut(&mut self, coord: GridCoord) -> Option<&mut Cell> {
        let index = self.index_of(&coord)?;
        self.cells.get_mut(index)
    }

    /// Walkable and in bounds.
    pub fn is_walkable(&self, coord: GridCoord) -> bool {
        self.get(coord).map(|cell| cell.walkable).unwrap_or(false)
    }

    pub fn is_occupied(&self, coord: GridCoord) -> bool {
        self.get(coord).map(|cell| cell.occupied).unwrap_or(false)
    }

    /// Occupied, or the target of another mover's hop.
    pub(crate) fn is_claimed(&self, coord: GridCoord) -> bool {
        self.get(coord)
            .map(|cell| cell.occupied || cell.reserved)
            .unwrap_or(false)
    }

    pub(crate) fn set_reserved(&mut self, coord: GridCoord, reserved: bool) {
        if let Some(cell) = self.get_mut(coord) {
            cell.reserved = reserved;
        }
    }

    /// Neighbors of a coordinate (8-directional, includes diagonals).
    ///
    /// Offsets are enumerated x-major from -1 to 1, so the order is stable for
    /// a given grid and the search is reproducible.
    pub fn get_neighbors(&self, coord: &GridCoord) -> Vec<GridCoord> {
        let mut neighbors = Vec::with_capacity(8);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let neighbor = coord.offset(dx, dy);
                if self.is_valid(&neighbor) {
                    neighbors.push(neighbor);
                }
            }
        }
        neighbors
    }

    /// Neighbors of a coordinate (4-directional: up, down, left, right).
    pub fn neighbors_4(&self, coord: &GridCoord) -> Vec<GridCoord> {
        let directions = [(0, -1), (1, 0), (0, 1), (-1, 0)];
        let mut neighbors = Vec::new();
        for (dx, dy) in directions.iter() {
            let neighbor = coord.offset(*dx, *dy);
            if self.is_valid(&neighbor) {
                neighbors.push(neighbor);
            }
        }
        neighbors
    }

    /// Iterate over all coordinates in row-major order.
    pub fn iter_coords(&self) -> impl Iterator<Item = GridCoord> {
        let width = self.width as i32;
        let height = self.height as i32;
        (0..height).flat_map(move |y| (0..width).map(move |x| GridCoord::new(x, y)))
    }

    /// Iterate over all cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.iter_mut()
    }

    /// Set the highlight tag of a cell. Returns `false` if out of bounds.
    pub fn set_tag(&mut self, coord: GridCoord, tag: CellTag) -> bool {
        if let Some(cell) = self.get_mut(coord) {
            cell.tag = tag;
            true
        } else {
            false
        }
    }

    /// Reset every highlight tag to [`CellTag::None`].
    pub fn clear_tags(&mut self) {
        for cell in &mut self.cells {
            cell.tag = CellTag::None;
        }
    }

    pub fn occupied_cells(&self) -> Vec<GridCoord> {
        self.cells
            .iter()
            .filter(|cell| cell.occupied)
            .map(|cell| cell.coord)
            .collect()
    }

    pub fn walkable_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.walkable).count()
    }

    /// Move occupancy from one cell to another in a single step.
    pub(crate) fn hand_over_occupancy(&mut self, from: GridCoord, to: GridCoord) {
        if let Some(cell) = self.get_mut(from) {
            cell.occupied = false;
        }
        if let Some(cell) = self.get_mut(to) {
            cell.occupied = true;
            cell.reserved = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_count_matches_dimensions() {
        let grid = Grid::new(7, 3).unwrap();
        assert_eq!(grid.cell_count(), 21);
        for coord in grid.iter_coords() {
            assert_eq!(grid.get(coord).unwrap().coord(), coord);
        }
    }

    #[test]
    fn empty_grid_is_a_config_error() {
        assert!(matches!(
            Grid::new(0, 4),
            Err(ConfigError::EmptyGrid { width: 0, height: 4 })
        ));
    }

    #[test]
    fn out_of_bounds_lookup_is_none() {
        let grid = Grid::new(4, 4).unwrap();
        assert!(grid.get_cell(-1, 0).is_none());
        assert!(grid.get_cell(4, 0).is_none());
        assert!(grid.get_cell(0, 4).is_none());
        assert!(grid.get_cell(3, 3).is_some());
        assert!(!grid.is_walkable(GridCoord::new(9, 9)));
    }

    #[test]
    fn corner_has_three_neighbors() {
        let grid = Grid::new(5, 5).unwrap();
        let neighbors = grid.get_neighbors(&GridCoord::new(0, 0));
        assert_eq!(
            neighbors,
            vec![GridCoord::new(0, 1), GridCoord::new(1, 0), GridCoord::new(1, 1)]
        );
    }

    #[test]
    fn interior_has_eight_neighbors_in_stable_order() {
        let grid = Grid::new(5, 5).unwrap();
        let center = GridCoord::new(2, 2);
        let neighbors = grid.get_neighbors(&center);
        assert_eq!(neighbors.len(), 8);
        assert_eq!(neighbors.first(), Some(&GridCoord::new(1, 1)));
        assert_eq!(neighbors.last(), Some(&GridCoord::new(3, 3)));
        assert!(neighbors.iter().all(|n| n.chebyshev_distance(&center) == 1));
        assert_eq!(neighbors, grid.get_neighbors(&center));
    }

    #[test]
    fn occupancy_handoff_moves_the_flag() {
        let mut grid = Grid::new(3, 1).unwrap();
        grid.get_mut(GridCoord::new(0, 0)).unwrap().occupied = true;
        grid.hand_over_occupancy(GridCoord::new(0, 0), GridCoord::new(1, 0));
        assert_eq!(grid.occupied_cells(), vec![GridCoord::new(1, 0)]);
    }

    #[test]
    fn reservation_claims_a_cell_until_handoff() {
        let mut grid = Grid::new(3, 1).unwrap();
        let (from, to) = (GridCoord::new(0, 0), GridCoord::new(1, 0));
        grid.get_mut(from).unwrap().occupied = true;
        grid.set_reserved(to, true);
        assert!(grid.is_claimed(to));
        assert!(!grid.is_occupied(to));
        assert!(!grid.get(to).unwrap().is_occupied());

        grid.hand_over_occupancy(from, to);
        assert!(grid.get(to).unwrap().is_occupied());
        assert!(!grid.get(to).unwrap().reserved);
        assert!(!grid.is_claimed(from));
        assert!(grid.get(from).unwrap().is_walkable());
    }
}
