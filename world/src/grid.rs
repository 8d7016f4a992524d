//! Dense cell grid owned by the world.

use magnet_defence_core::{CellCoord, CellKind, EntityId, LevelLayout};

/// Reserved step cost of a cell enemies cannot enter.
pub const IMPASSABLE: u32 = u32::MAX;

/// Single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    kind: CellKind,
    alternate: bool,
    occupant: Option<EntityId>,
    blocked: bool,
}

impl Cell {
    /// Terrain classification of the cell.
    #[must_use]
    pub const fn kind(&self) -> CellKind {
        self.kind
    }

    /// Whether the alternate tile is drawn. Alternate cells cost one extra step.
    #[must_use]
    pub const fn alternate(&self) -> bool {
        self.alternate
    }

    /// Entity anchored to the cell, if any. Non-owning.
    #[must_use]
    pub const fn occupant(&self) -> Option<EntityId> {
        self.occupant
    }

    /// Whether a blocking entity sits on the cell.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Whether enemies may walk across the cell right now.
    #[must_use]
    pub const fn is_traversable(&self) -> bool {
        self.kind.traversable() && !self.blocked
    }

    /// Whether a blocking entity could be committed to the cell, ignoring routes.
    #[must_use]
    pub const fn is_buildable(&self) -> bool {
        self.kind.buildable() && !self.blocked && self.occupant.is_none()
    }

    /// Extra cost of stepping onto the cell, or [`IMPASSABLE`].
    #[must_use]
    pub const fn cost(&self) -> u32 {
        if !self.is_traversable() {
            IMPASSABLE
        } else if self.alternate {
            1
        } else {
            0
        }
    }
}

/// Row-major grid of cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    columns: u32,
    rows: u32,
    cells: Vec<Cell>,
}

impl Grid {
    pub(crate) fn from_layout(layout: &LevelLayout) -> Self {
        let cells = layout
            .cells
            .iter()
            .map(|cell| Cell {
                kind: cell.kind,
                alternate: cell.alternate,
                occupant: None,
                blocked: false,
            })
            .collect();
        Self {
            columns: layout.columns,
            rows: layout.rows,
            cells,
        }
    }

    /// Number of columns.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Reports whether the coordinate lies inside the grid.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Cell at the coordinate, if inside the grid.
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<&Cell> {
        self.index(coord).and_then(|index| self.cells.get(index))
    }

    /// Iterates every cell with its coordinate in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, &Cell)> + '_ {
        let columns = self.columns.max(1);
        self.cells.iter().enumerate().map(move |(index, cell)| {
            let index = index as u32;
            (CellCoord::new(index % columns, index / columns), cell)
        })
    }

    /// Step cost onto a cell: `1 + cost`, or `None` when impassable or outside.
    #[must_use]
    pub fn step_cost(&self, coord: CellCoord) -> Option<u32> {
        let cost = self.cell(coord)?.cost();
        (cost != IMPASSABLE).then(|| cost + 1)
    }

    /// Reports whether enemies may walk across the cell.
    #[must_use]
    pub fn is_traversable(&self, coord: CellCoord) -> bool {
        self.cell(coord).is_some_and(Cell::is_traversable)
    }

    /// In-bounds 4-neighbourhood in north, east, south, west order.
    pub fn neighbors(&self, cell: CellCoord) -> impl Iterator<Item = CellCoord> {
        let mut candidates = [None; 4];
        let mut count = 0;

        if let Some(row) = cell.row().checked_sub(1) {
            candidates[count] = Some(CellCoord::new(cell.column(), row));
            count += 1;
        }
        if cell.column() + 1 < self.columns {
            candidates[count] = Some(CellCoord::new(cell.column() + 1, cell.row()));
            count += 1;
        }
        if cell.row() + 1 < self.rows {
            candidates[count] = Some(CellCoord::new(cell.column(), cell.row() + 1));
            count += 1;
        }
        if let Some(column) = cell.column().checked_sub(1) {
            candidates[count] = Some(CellCoord::new(column, cell.row()));
            count += 1;
        }

        candidates.into_iter().take(count).flatten()
    }

    /// Row-major offset of a coordinate.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let column = usize::try_from(cell.column()).ok()?;
        let row = usize::try_from(cell.row()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Anchors an entity to a cell; blocking entities also close it to traversal.
    pub(crate) fn occupy(&mut self, coord: CellCoord, entity: EntityId, blocking: bool) {
        if let Some(cell) = self.cell_mut(coord) {
            cell.occupant = Some(entity);
            cell.blocked = blocking;
        }
    }

    /// Clears the anchor if it still points at `entity`.
    ///
    /// Returns `true` when the cell was blocked before.
    pub(crate) fn vacate(&mut self, coord: CellCoord, entity: EntityId) -> bool {
        let Some(cell) = self.cell_mut(coord) else {
            return false;
        };
        if cell.occupant != Some(entity) {
            return false;
        }
        let was_blocked = cell.blocked;
        cell.occupant = None;
        cell.blocked = false;
        was_blocked
    }

    fn cell_mut(&mut self, coord: CellCoord) -> Option<&mut Cell> {
        let index = self.index(coord)?;
        self.cells.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magnet_defence_core::Level;

    fn grid(rows: &[&str]) -> Grid {
        let layout = Level::from_ascii("grid", rows, Vec::new())
            .parse_layout()
            .expect("valid layout");
        Grid::from_layout(&layout)
    }

    #[test]
    fn step_cost_accounts_for_alternate_and_blocked_cells() {
        let mut grid = grid(&["S.,#O"]);
        assert_eq!(grid.step_cost(CellCoord::new(1, 0)), Some(1));
        assert_eq!(grid.step_cost(CellCoord::new(2, 0)), Some(2));
        assert_eq!(grid.step_cost(CellCoord::new(3, 0)), None);
        assert_eq!(grid.step_cost(CellCoord::new(9, 0)), None);

        grid.occupy(CellCoord::new(1, 0), EntityId::new(7), true);
        assert_eq!(grid.step_cost(CellCoord::new(1, 0)), None);
        assert!(!grid.cell(CellCoord::new(1, 0)).expect("cell").is_buildable());
    }

    #[test]
    fn vacate_only_releases_the_recorded_occupant() {
        let mut grid = grid(&["S..O"]);
        let cell = CellCoord::new(1, 0);
        grid.occupy(cell, EntityId::new(3), true);

        assert!(!grid.vacate(cell, EntityId::new(4)));
        assert!(grid.cell(cell).expect("cell").is_blocked());
        assert!(grid.vacate(cell, EntityId::new(3)));
        assert!(grid.is_traversable(cell));
    }

    #[test]
    fn neighbours_stay_inside_bounds() {
        let grid = grid(&["S.", ".O"]);
        let corner: Vec<_> = grid.neighbors(CellCoord::new(0, 0)).collect();
        assert_eq!(corner, vec![CellCoord::new(1, 0), CellCoord::new(0, 1)]);

        let iterated: Vec<_> = grid.iter().map(|(coord, _)| coord).collect();
        assert_eq!(iterated[3], CellCoord::new(1, 1));
    }
}
