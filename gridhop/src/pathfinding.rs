//! A* pathfinding over a [`Grid`].
//!
//! Movement is restricted to the four orthogonal directions: every diagonal
//! neighbor is skipped during expansion even though the grid enumerates eight.
//! The octile heuristic is still used, and stays admissible because it never
//! exceeds the Manhattan cost.

use std::collections::HashSet;

use crate::grid::{Grid, GridCoord};

/// Cost of an orthogonal step.
pub const ORTHOGONAL_COST: i32 = 10;
/// Cost of a diagonal step. Only reachable through the heuristic.
pub const DIAGONAL_COST: i32 = 14;

/// Octile distance with the step costs above.
pub fn octile_distance(a: &GridCoord, b: &GridCoord) -> i32 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    if dx > dy {
        DIAGONAL_COST * dy + ORTHOGONAL_COST * (dx - dy)
    } else {
        DIAGONAL_COST * dx + ORTHOGONAL_COST * (dy - dx)
    }
}

/// Ordered steps from (excluding) a start cell to (including) a goal cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Path {
    steps: Vec<GridCoord>,
    cost: i32,
}

impl Path {
    pub(crate) fn new(steps: Vec<GridCoord>, cost: i32) -> Self {
        Self { steps, cost }
    }

    pub fn steps(&self) -> &[GridCoord] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total step cost of the path.
    pub fn cost(&self) -> i32 {
        self.cost
    }

    pub fn goal(&self) -> Option<GridCoord> {
        self.steps.last().copied()
    }

    pub fn get(&self, index: usize) -> Option<GridCoord> {
        self.steps.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridCoord> {
        self.steps.iter()
    }

    /// Drop the final step (used by movers that stop short of the goal).
    pub(crate) fn without_goal(mut self) -> Self {
        if self.steps.pop().is_some() {
            self.cost -= ORTHOGONAL_COST;
        }
        self
    }
}

/// A* search with an optional expansion budget.
#[derive(Clone, Copy, Debug, Default)]
pub struct AStarPathfinder {
    /// Stop and report no path after closing this many cells.
    pub max_expansions: Option<usize>,
}

impl AStarPathfinder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = Some(max_expansions);
        self
    }

    /// Find a path from `start` to `goal`.
    ///
    /// Returns `None` when the goal cannot be reached. Start equal to goal
    /// yields an empty path. Only the scratch fields of visited cells are
    /// written; walkability and occupancy are left untouched.
    pub fn find_path(&self, grid: &mut Grid, start: GridCoord, goal: GridCoord) -> Option<Path> {
        if !grid.is_valid(&start) || !grid.is_valid(&goal) {
            return None;
        }

        // Open set: insertion order is the final tie-breaker.
        let mut open: Vec<GridCoord> = Vec::new();
        let mut in_open: HashSet<GridCoord> = HashSet::new();
        let mut closed: HashSet<GridCoord> = HashSet::new();

        {
            let cell = grid.get_mut(start)?;
            cell.g_cost = 0;
            cell.h_cost = octile_distance(&start, &goal);
            cell.parent = None;
        }
        open.push(start);
        in_open.insert(start);

        while !open.is_empty() {
            let index = Self::select_lowest(grid, &open);
            let current = open.remove(index);
            in_open.remove(&current);
            closed.insert(current);

            if current == goal {
                return Some(Self::retrace(grid, start, goal));
            }

            if let Some(limit) = self.max_expansions {
                if closed.len() >= limit {
                    log::warn!(
                        "Path search {} -> {} gave up after {} expansions",
                        start,
                        goal,
                        closed.len()
                    );
                    return None;
                }
            }

            let current_g = grid.get(current).map(|cell| cell.g_cost).unwrap_or(0);
            for neighbor in grid.get_neighbors(&current) {
                if neighbor.is_diagonal_to(&current) {
                    continue;
                }
                if closed.contains(&neighbor) || !grid.is_walkable(neighbor) {
                    continue;
                }

                let tentative_g = current_g + ORTHOGONAL_COST;
                let Some(cell) = grid.get_mut(neighbor) else {
                    continue;
                };
                let is_open = in_open.contains(&neighbor);
                if !is_open || tentative_g < cell.g_cost {
                    cell.g_cost = tentative_g;
                    cell.h_cost = octile_distance(&neighbor, &goal);
                    cell.parent = Some(current);

                    if !is_open {
                        open.push(neighbor);
                        in_open.insert(neighbor);
                    }
                }
            }
        }

        None
    }

    /// Lowest f-cost, ties by lowest h-cost, then first encountered.
    fn select_lowest(grid: &Grid, open: &[GridCoord]) -> usize {
        let cost_of = |coord: &GridCoord| {
            grid.get(*coord)
                .map(|cell| (cell.f_cost(), cell.h_cost))
                .unwrap_or((i32::MAX, i32::MAX))
        };

        let mut best = 0;
        let mut best_cost = cost_of(&open[0]);
        for (index, coord) in open.iter().enumerate().skip(1) {
            let (f, h) = cost_of(coord);
            if f < best_cost.0 || (f == best_cost.0 && h < best_cost.1) {
                best = index;
                best_cost = (f, h);
            }
        }
        best
    }

    fn retrace(grid: &Grid, start: GridCoord, goal: GridCoord) -> Path {
        let cost = grid.get(goal).map(|cell| cell.g_cost).unwrap_or(0);
        let mut steps = Vec::new();
        let mut node = goal;
        while node != start {
            steps.push(node);
            match grid.get(node).and_then(|cell| cell.parent) {
                Some(prev) => node = prev,
                None => break,
            }
        }
        steps.reverse();
        Path::new(steps, cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(width: usize, height: usize) -> Grid {
        Grid::new(width, height).unwrap()
    }

    fn block(grid: &mut Grid, x: i32, y: i32) {
        grid.get_mut(GridCoord::new(x, y)).unwrap().walkable = false;
    }

    fn assert_orthogonal_chain(start: GridCoord, path: &Path) {
        let mut previous = start;
        for step in path.iter() {
            assert_eq!(previous.manhattan_distance(step), 1, "{previous} -> {step}");
            previous = *step;
        }
    }

    #[test]
    fn octile_distance_weights() {
        let a = GridCoord::new(0, 0);
        assert_eq!(octile_distance(&a, &GridCoord::new(3, 0)), 30);
        assert_eq!(octile_distance(&a, &GridCoord::new(2, 2)), 28);
        assert_eq!(octile_distance(&a, &GridCoord::new(1, 4)), 14 + 30);
    }

    #[test]
    fn straight_line_across_ten_by_ten() {
        let mut grid = open_grid(10, 10);
        let path = AStarPathfinder::new()
            .find_path(&mut grid, GridCoord::new(0, 0), GridCoord::new(9, 0))
            .unwrap();
        assert_eq!(path.len(), 9);
        assert_eq!(path.cost(), 90);
        assert!(path.iter().all(|step| step.y == 0));
        assert_eq!(path.goal(), Some(GridCoord::new(9, 0)));
    }

    #[test]
    fn diagonal_goal_takes_orthogonal_detour() {
        let mut grid = open_grid(10, 10);
        let start = GridCoord::new(0, 0);
        let path = AStarPathfinder::new()
            .find_path(&mut grid, start, GridCoord::new(2, 2))
            .unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path.cost(), 40);
        assert_orthogonal_chain(start, &path);
    }

    #[test]
    fn cost_equals_manhattan_on_open_grid() {
        let mut grid = open_grid(6, 5);
        let finder = AStarPathfinder::new();
        let coords: Vec<_> = grid.iter_coords().collect();
        for start in coords.iter().step_by(3) {
            for goal in coords.iter().step_by(4) {
                let path = finder.find_path(&mut grid, *start, *goal).unwrap();
                assert_eq!(path.cost(), start.manhattan_distance(goal) * ORTHOGONAL_COST);
                assert_eq!(path.len() as i32, start.manhattan_distance(goal));
                assert_orthogonal_chain(*start, &path);
            }
        }
    }

    #[test]
    fn full_wall_means_no_path() {
        let mut grid = open_grid(8, 6);
        for y in 0..6 {
            block(&mut grid, 4, y);
        }
        assert!(AStarPathfinder::new()
            .find_path(&mut grid, GridCoord::new(0, 2), GridCoord::new(7, 3))
            .is_none());
    }

    #[test]
    fn diagonal_gap_in_wall_is_not_passable() {
        // Wall with the only opening reachable diagonally.
        let mut grid = open_grid(3, 3);
        block(&mut grid, 1, 0);
        block(&mut grid, 0, 1);
        assert!(AStarPathfinder::new()
            .find_path(&mut grid, GridCoord::new(0, 0), GridCoord::new(2, 2))
            .is_none());
    }

    #[test]
    fn unwalkable_goal_has_no_path() {
        let mut grid = open_grid(5, 5);
        block(&mut grid, 3, 3);
        assert!(AStarPathfinder::new()
            .find_path(&mut grid, GridCoord::new(0, 0), GridCoord::new(3, 3))
            .is_none());
    }

    #[test]
    fn routes_around_obstacles() {
        let mut grid = open_grid(5, 5);
        for y in 0..4 {
            block(&mut grid, 2, y);
        }
        let start = GridCoord::new(0, 0);
        let path = AStarPathfinder::new()
            .find_path(&mut grid, start, GridCoord::new(4, 0))
            .unwrap();
        assert!(path.iter().any(|step| *step == GridCoord::new(2, 4)));
        assert_eq!(path.cost(), 12 * ORTHOGONAL_COST);
        assert_orthogonal_chain(start, &path);
    }

    #[test]
    fn same_start_and_goal_is_empty() {
        let mut grid = open_grid(3, 3);
        let path = AStarPathfinder::new()
            .find_path(&mut grid, GridCoord::new(1, 1), GridCoord::new(1, 1))
            .unwrap();
        assert!(path.is_empty());
        assert_eq!(path.cost(), 0);
    }

    #[test]
    fn out_of_bounds_endpoints_have_no_path() {
        let mut grid = open_grid(3, 3);
        let finder = AStarPathfinder::new();
        assert!(finder
            .find_path(&mut grid, GridCoord::new(-1, 0), GridCoord::new(1, 1))
            .is_none());
        assert!(finder
            .find_path(&mut grid, GridCoord::new(0, 0), GridCoord::new(3, 1))
            .is_none());
    }

    #[test]
    fn repeated_searches_are_deterministic() {
        let mut grid = open_grid(10, 10);
        block(&mut grid, 5, 5);
        let finder = AStarPathfinder::new();
        let first = finder
            .find_path(&mut grid, GridCoord::new(1, 1), GridCoord::new(8, 7))
            .unwrap();
        // Unrelated search in between leaves stale scratch values behind.
        let _ = finder.find_path(&mut grid, GridCoord::new(9, 9), GridCoord::new(0, 3));
        let second = finder
            .find_path(&mut grid, GridCoord::new(1, 1), GridCoord::new(8, 7))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn stale_start_cost_does_not_leak() {
        let mut grid = open_grid(6, 1);
        let finder = AStarPathfinder::new();
        // (3,0) gets g = 30 here.
        let _ = finder.find_path(&mut grid, GridCoord::new(0, 0), GridCoord::new(5, 0));
        let path = finder
            .find_path(&mut grid, GridCoord::new(3, 0), GridCoord::new(5, 0))
            .unwrap();
        assert_eq!(path.cost(), 20);
    }

    #[test]
    fn expansion_budget_gives_up() {
        let mut grid = open_grid(20, 20);
        let finder = AStarPathfinder::new().with_max_expansions(5);
        assert!(finder
            .find_path(&mut grid, GridCoord::new(0, 0), GridCoord::new(19, 19))
            .is_none());
        assert!(finder
            .find_path(&mut grid, GridCoord::new(0, 0), GridCoord::new(2, 0))
            .is_some());
    }

    #[test]
    fn search_leaves_walkability_alone() {
        let mut grid = open_grid(4, 4);
        block(&mut grid, 1, 1);
        let before: Vec<bool> = grid.iter().map(|cell| cell.walkable).collect();
        let _ = AStarPathfinder::new().find_path(&mut grid, GridCoord::new(0, 0), GridCoord::new(3, 3));
        let after: Vec<bool> = grid.iter().map(|cell| cell.walkable).collect();
        assert_eq!(before, after);
    }
}
