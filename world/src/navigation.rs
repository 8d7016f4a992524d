//! Reverse reachability field and A* routes toward the objective.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, VecDeque},
};

use magnet_defence_core::CellCoord;

use crate::grid::Grid;

/// Dense breadth-first distance grid seeded at the objective.
///
/// Distances default to `u32::MAX` for cells that cannot reach the objective,
/// so a single rebuild answers reachability for every pathfinding entity at
/// once.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReachabilityField {
    width: u32,
    height: u32,
    distances: Vec<u32>,
}

impl ReachabilityField {
    /// Rebuilds the field with a reverse breadth-first search from `objective`.
    pub(crate) fn rebuild_with<F>(&mut self, grid: &Grid, objective: CellCoord, mut is_passable: F)
    where
        F: FnMut(CellCoord) -> bool,
    {
        self.width = grid.columns();
        self.height = grid.rows();
        let cell_count = usize::try_from(self.width)
            .ok()
            .and_then(|width| width.checked_mul(usize::try_from(self.height).ok()?))
            .unwrap_or(0);

        if self.distances.len() != cell_count {
            self.distances = vec![u32::MAX; cell_count];
        } else {
            self.distances.fill(u32::MAX);
        }

        let Some(start) = grid.index(objective) else {
            return;
        };
        if !is_passable(objective) {
            return;
        }

        self.distances[start] = 0;
        let mut queue = VecDeque::from([objective]);

        while let Some(cell) = queue.pop_front() {
            let Some(current_index) = grid.index(cell) else {
                continue;
            };
            let current_distance = self.distances[current_index];
            if current_distance >= u32::MAX.saturating_sub(1) {
                continue;
            }
            let next_distance = current_distance + 1;

            for neighbor in grid.neighbors(cell) {
                if !is_passable(neighbor) {
                    continue;
                }
                let Some(neighbor_index) = grid.index(neighbor) else {
                    continue;
                };
                if self.distances[neighbor_index] <= next_distance {
                    continue;
                }
                self.distances[neighbor_index] = next_distance;
                queue.push_back(neighbor);
            }
        }
    }

    /// Step distance from the cell to the objective, ignoring cost.
    pub(crate) fn distance(&self, cell: CellCoord) -> Option<u32> {
        if cell.column() >= self.width || cell.row() >= self.height {
            return None;
        }
        let width = usize::try_from(self.width).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let row = usize::try_from(cell.row()).ok()?;
        self.distances.get(row * width + column).copied()
    }

    /// Reports whether a finite route links the cell to the objective.
    pub(crate) fn reaches(&self, cell: CellCoord) -> bool {
        self.distance(cell).is_some_and(|distance| distance != u32::MAX)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Frontier {
    estimate: u32,
    heuristic: u32,
    row: u32,
    column: u32,
}

/// Cheapest route from `start` to `goal` using the grid's step costs.
///
/// The returned steps exclude `start` and end on `goal`. Equal-cost frontier
/// entries are expanded in row, then column order, so both peers derive the
/// same route from the same grid.
pub(crate) fn find_path(grid: &Grid, start: CellCoord, goal: CellCoord) -> Option<Vec<CellCoord>> {
    if !grid.contains(start) || !grid.contains(goal) {
        return None;
    }
    if start == goal {
        return Some(Vec::new());
    }

    let mut open = BinaryHeap::new();
    let mut best_cost: HashMap<CellCoord, u32> = HashMap::new();
    let mut came_from: HashMap<CellCoord, CellCoord> = HashMap::new();

    let _ = best_cost.insert(start, 0);
    open.push(Reverse(Frontier {
        estimate: start.manhattan_distance(goal),
        heuristic: start.manhattan_distance(goal),
        row: start.row(),
        column: start.column(),
    }));

    while let Some(Reverse(entry)) = open.pop() {
        let cell = CellCoord::new(entry.column, entry.row);
        if cell == goal {
            return Some(reconstruct(&came_from, start, goal));
        }

        let Some(&cost_here) = best_cost.get(&cell) else {
            continue;
        };
        if entry.estimate > cost_here + entry.heuristic {
            continue;
        }

        for neighbor in grid.neighbors(cell) {
            let Some(step) = grid.step_cost(neighbor) else {
                continue;
            };
            let tentative = cost_here.saturating_add(step);
            if best_cost
                .get(&neighbor)
                .is_some_and(|&known| known <= tentative)
            {
                continue;
            }

            let _ = best_cost.insert(neighbor, tentative);
            let _ = came_from.insert(neighbor, cell);
            let heuristic = neighbor.manhattan_distance(goal);
            open.push(Reverse(Frontier {
                estimate: tentative.saturating_add(heuristic),
                heuristic,
                row: neighbor.row(),
                column: neighbor.column(),
            }));
        }
    }

    None
}

fn reconstruct(
    came_from: &HashMap<CellCoord, CellCoord>,
    start: CellCoord,
    goal: CellCoord,
) -> Vec<CellCoord> {
    let mut steps = vec![goal];
    let mut cursor = goal;
    while let Some(&previous) = came_from.get(&cursor) {
        if previous == start {
            break;
        }
        steps.push(previous);
        cursor = previous;
    }
    steps.reverse();
    steps
}

/// Memoised routes to the objective keyed by starting cell.
///
/// Cleared whenever grid occupancy changes.
#[derive(Clone, Debug, Default)]
pub(crate) struct PathCache {
    routes: HashMap<CellCoord, Option<Vec<CellCoord>>>,
}

impl PathCache {
    pub(crate) fn route(
        &mut self,
        grid: &Grid,
        start: CellCoord,
        goal: CellCoord,
    ) -> Option<Vec<CellCoord>> {
        self.routes
            .entry(start)
            .or_insert_with(|| find_path(grid, start, goal))
            .clone()
    }

    pub(crate) fn clear(&mut self) {
        self.routes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magnet_defence_core::Level;

    fn grid(rows: &[&str]) -> (Grid, CellCoord) {
        let layout = Level::from_ascii("nav", rows, Vec::new())
            .parse_layout()
            .expect("valid layout");
        (Grid::from_layout(&layout), layout.objective)
    }

    #[test]
    fn field_counts_steps_from_objective() {
        let (grid, objective) = grid(&["S...", "....", "...O"]);
        let mut field = ReachabilityField::default();
        field.rebuild_with(&grid, objective, |cell| grid.is_traversable(cell));

        assert_eq!(field.distance(objective), Some(0));
        assert_eq!(field.distance(CellCoord::new(0, 0)), Some(5));
        assert!(field.reaches(CellCoord::new(2, 1)));
    }

    #[test]
    fn field_respects_hypothetical_blocks() {
        let (grid, objective) = grid(&["S.O"]);
        let candidate = CellCoord::new(1, 0);
        let mut field = ReachabilityField::default();
        field.rebuild_with(&grid, objective, |cell| {
            cell != candidate && grid.is_traversable(cell)
        });

        assert!(!field.reaches(CellCoord::new(0, 0)));
        assert_eq!(field.distance(candidate), Some(u32::MAX));
    }

    #[test]
    fn field_reaches_past_sixteen_bit_distances() {
        const WIDTH: usize = 257;
        const CORRIDORS: usize = 256;
        let mut rows = Vec::new();
        for corridor in 0..CORRIDORS {
            let mut row = vec!['.'; WIDTH];
            if corridor == 0 {
                row[0] = 'O';
            }
            if corridor == CORRIDORS - 1 {
                row[0] = 'S';
            }
            rows.push(row.into_iter().collect::<String>());
            if corridor + 1 < CORRIDORS {
                let mut wall = vec!['#'; WIDTH];
                wall[if corridor % 2 == 0 { WIDTH - 1 } else { 0 }] = '.';
                rows.push(wall.into_iter().collect());
            }
        }
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let (grid, objective) = grid(&rows);

        let mut field = ReachabilityField::default();
        field.rebuild_with(&grid, objective, |cell| grid.is_traversable(cell));

        let far_end = CellCoord::new(0, (2 * CORRIDORS - 2) as u32);
        let expected = (CORRIDORS * (WIDTH - 1) + (CORRIDORS - 1) * 2) as u32;
        assert!(expected > u32::from(u16::MAX));
        assert_eq!(field.distance(far_end), Some(expected));
        assert!(field.reaches(far_end));
    }

    #[test]
    fn astar_prefers_cheaper_plain_cells() {
        let (grid, objective) = grid(&["S,,,O", "....."]);
        let path = find_path(&grid, CellCoord::new(0, 0), objective).expect("route exists");

        assert_eq!(path.last(), Some(&objective));
        assert!(
            path.iter().all(|cell| !grid.cell(*cell).expect("cell").alternate()),
            "detour through plain cells is cheaper: {path:?}"
        );
    }

    #[test]
    fn astar_reports_missing_routes() {
        let (grid, objective) = grid(&["S#O"]);
        assert_eq!(find_path(&grid, CellCoord::new(0, 0), objective), None);
        assert_eq!(find_path(&grid, objective, objective), Some(Vec::new()));
    }

    #[test]
    fn cache_reuses_routes_until_cleared() {
        let (grid, objective) = grid(&["S..O"]);
        let mut cache = PathCache::default();
        let first = cache.route(&grid, CellCoord::new(0, 0), objective);
        assert_eq!(
            first,
            Some(vec![
                CellCoord::new(1, 0),
                CellCoord::new(2, 0),
                CellCoord::new(3, 0)
            ])
        );
        assert_eq!(cache.routes.len(), 1);
        cache.clear();
        assert!(cache.routes.is_empty());
    }
}
