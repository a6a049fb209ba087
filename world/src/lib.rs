#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative maze-knowledge store for Maze Recall.
//!
//! The world owns every cell in a dense row-major arena. Cells are created
//! when the grid is configured and live until the next reconfiguration, so a
//! [`CellId`] handed out by [`query::cell_id`] stays valid for the whole run.

use maze_recall_core::{CellCoord, CellGraph, CellId, Command, CommandError, Direction, Event};

const DEFAULT_GRID_COLUMNS: u32 = 16;
const DEFAULT_GRID_ROWS: u32 = 16;

const ORIGIN: CellCoord = CellCoord::new(0, 0);

/// Represents the authoritative maze knowledge gathered by the robot.
#[derive(Debug)]
pub struct World {
    columns: u32,
    rows: u32,
    cells: Vec<Cell>,
}

impl World {
    /// Creates a classic 16x16 maze with no knowledge recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_GRID_COLUMNS, DEFAULT_GRID_ROWS)
    }

    /// Creates a maze with the provided dimensions and no knowledge recorded.
    #[must_use]
    pub fn with_dimensions(columns: u32, rows: u32) -> Self {
        let mut world = Self {
            columns: 0,
            rows: 0,
            cells: Vec::new(),
        };
        world.rebuild(columns, rows);
        world
    }

    fn rebuild(&mut self, columns: u32, rows: u32) {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        self.columns = columns;
        self.rows = rows;
        self.cells.clear();
        self.cells.reserve(capacity);
        for row in 0..rows {
            for column in 0..columns {
                self.cells.push(Cell::unexplored(CellCoord::new(column, row)));
            }
        }
    }

    fn id_of(&self, cell: CellCoord) -> Option<CellId> {
        if cell.column() < self.columns && cell.row() < self.rows {
            let index = u64::from(cell.row()) * u64::from(self.columns) + u64::from(cell.column());
            u32::try_from(index).ok().map(CellId::new)
        } else {
            None
        }
    }

    fn cell(&self, cell: CellId) -> Option<&Cell> {
        self.cells.get(cell.index())
    }

    fn cell_mut(&mut self, cell: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(cell.index())
    }

    fn resolve(&self, cell: CellCoord, out_events: &mut Vec<Event>) -> Option<CellId> {
        let resolved = self.id_of(cell);
        if resolved.is_none() {
            tracing::debug!(%cell, "rejecting command outside the grid");
            out_events.push(Event::CommandRejected {
                reason: CommandError::OutOfBounds { cell },
            });
        }
        resolved
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl CellGraph for World {
    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn coord(&self, cell: CellId) -> Option<CellCoord> {
        self.cell(cell).map(|cell| cell.coord)
    }

    fn predecessor(&self, cell: CellId) -> Option<CellId> {
        self.cell(cell).and_then(|cell| cell.predecessor)
    }

    fn set_predecessor(&mut self, cell: CellId, predecessor: Option<CellId>) {
        if let Some(cell) = self.cell_mut(cell) {
            cell.predecessor = predecessor;
        }
    }

    fn wall_inspected(&self, cell: CellId, direction: Direction) -> bool {
        self.cell(cell)
            .map_or(false, |cell| cell.wall_inspected[direction.index()])
    }

    fn set_wall_inspected(&mut self, cell: CellId, direction: Direction, inspected: bool) {
        if let Some(cell) = self.cell_mut(cell) {
            cell.wall_inspected[direction.index()] = inspected;
        }
    }
}

/// Applies the provided command to the world, mutating knowledge deterministically.
///
/// Only effective changes are broadcast: inspecting a wall that is already
/// known, or assigning the predecessor a cell already has, emits nothing.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureGrid { columns, rows } => {
            world.rebuild(columns, rows);
            tracing::debug!(columns, rows, "configured maze grid");
            out_events.push(Event::GridConfigured { columns, rows });
        }
        Command::InspectWall { cell, direction } => {
            let Some(id) = world.resolve(cell, out_events) else {
                return;
            };
            if world.wall_inspected(id, direction) {
                return;
            }
            world.set_wall_inspected(id, direction, true);
            out_events.push(Event::WallInspected {
                cell: id,
                direction,
            });
        }
        Command::InspectAllWalls { cell } => {
            let Some(id) = world.resolve(cell, out_events) else {
                return;
            };
            if Direction::ALL
                .into_iter()
                .all(|direction| world.wall_inspected(id, direction))
            {
                return;
            }
            for direction in Direction::ALL {
                world.set_wall_inspected(id, direction, true);
            }
            out_events.push(Event::AllWallsInspected { cell: id });
        }
        Command::SetPredecessor { cell, predecessor } => {
            let Some(id) = world.resolve(cell, out_events) else {
                return;
            };
            let predecessor = match predecessor {
                Some(coord) => {
                    let Some(predecessor_id) = world.resolve(coord, out_events) else {
                        return;
                    };
                    Some(predecessor_id)
                }
                None => None,
            };
            if world.predecessor(id) == predecessor {
                return;
            }
            world.set_predecessor(id, predecessor);
            out_events.push(Event::PredecessorSet {
                cell: id,
                predecessor,
            });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::{World, ORIGIN};
    use maze_recall_core::{CellCoord, CellGraph, CellId, Direction};

    /// Provides the dimensions of the maze as `(columns, rows)`.
    #[must_use]
    pub fn dimensions(world: &World) -> (u32, u32) {
        (world.columns, world.rows)
    }

    /// Resolves a coordinate into the identifier of the cell stored there.
    #[must_use]
    pub fn cell_id(world: &World, cell: CellCoord) -> Option<CellId> {
        world.id_of(cell)
    }

    /// Position of the cell addressed by the identifier.
    #[must_use]
    pub fn coord(world: &World, cell: CellId) -> Option<CellCoord> {
        world.coord(cell)
    }

    /// Identifier of the cell the robot starts from, if the grid is non-empty.
    #[must_use]
    pub fn origin(world: &World) -> Option<CellId> {
        world.id_of(ORIGIN)
    }

    /// Coordinate of the predecessor recorded for the provided cell.
    #[must_use]
    pub fn predecessor(world: &World, cell: CellCoord) -> Option<CellCoord> {
        let id = world.id_of(cell)?;
        world
            .predecessor(id)
            .and_then(|predecessor| world.coord(predecessor))
    }

    /// Reports whether the wall of `cell` facing `direction` was inspected.
    #[must_use]
    pub fn wall_inspected(world: &World, cell: CellCoord, direction: Direction) -> bool {
        world
            .id_of(cell)
            .map_or(false, |id| world.wall_inspected(id, direction))
    }

    /// Enumerates cells that carry any recorded knowledge, in row-major order.
    #[must_use]
    pub fn explored_cells(world: &World) -> Vec<CellCoord> {
        world
            .cells
            .iter()
            .filter(|cell| cell.has_knowledge())
            .map(|cell| cell.coord)
            .collect()
    }
}

#[derive(Clone, Debug)]
struct Cell {
    coord: CellCoord,
    predecessor: Option<CellId>,
    wall_inspected: [bool; 4],
}

impl Cell {
    fn unexplored(coord: CellCoord) -> Self {
        Self {
            coord,
            predecessor: None,
            wall_inspected: [false; 4],
        }
    }

    fn has_knowledge(&self) -> bool {
        self.predecessor.is_some() || self.wall_inspected.iter().any(|flag| *flag)
    }
}
