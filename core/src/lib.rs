#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Maze Recall workspace.
//!
//! This crate defines the vocabulary that connects the maze knowledge store,
//! the checkpointed path history, and adapters. The store executes [`Command`]
//! values through its `apply` entry point and broadcasts [`Event`] values
//! describing every knowledge mutation. The path history records those
//! mutations as [`CellMutation`] values so it can revert them later, and
//! reports its own bookkeeping through [`HistoryEvent`] values.
//!
//! Cells are never referenced by pointer. Every cell lives in an arena owned
//! by the store and is addressed by a dense [`CellId`]; the fields the history
//! touches are reached through the [`CellGraph`] trait.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Location of a single maze cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new maze cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.column, self.row)
    }
}

/// Stable arena index of a cell owned by the maze knowledge store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(u32);

impl CellId {
    /// Creates a new cell identifier with the provided arena index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Arena slot addressed by the identifier.
    #[must_use]
    pub fn index(&self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

/// Cardinal directions, one per wall surrounding a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward decreasing row indices.
    North,
    /// Toward increasing column indices.
    East,
    /// Toward increasing row indices.
    South,
    /// Toward decreasing column indices.
    West,
}

impl Direction {
    /// Every direction ordered by wall flag index.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Index of the wall flag that tracks this direction.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    /// Resolves a wall flag index back into its direction.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::North),
            1 => Some(Self::East),
            2 => Some(Self::South),
            3 => Some(Self::West),
            _ => None,
        }
    }
}

/// Selects which inspected-wall flags a recorded mutation covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallTag {
    /// All four walls of the cell were inspected in one go.
    AllDirections,
    /// Exactly one wall of the cell was inspected.
    Direction(Direction),
    /// No wall flag changed; only the cell's predecessor was linked.
    NoWalls,
}

impl WallTag {
    /// Reports whether the tag covers the provided direction.
    #[must_use]
    pub fn covers(self, direction: Direction) -> bool {
        match self {
            Self::AllDirections => true,
            Self::Direction(tagged) => tagged == direction,
            Self::NoWalls => false,
        }
    }

    /// Iterator over the directions covered by the tag.
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::ALL
            .into_iter()
            .filter(move |direction| self.covers(*direction))
    }
}

/// Reversible record of a maze-knowledge mutation performed during one step.
///
/// Reverting the record clears the cell's predecessor and the wall flags
/// selected by [`WallTag`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellMutation {
    /// Cell whose knowledge was modified.
    pub cell: CellId,
    /// Wall flags that were set on the cell.
    pub wall: WallTag,
}

impl CellMutation {
    /// Records that a single wall of `cell` was inspected.
    #[must_use]
    pub const fn wall(cell: CellId, direction: Direction) -> Self {
        Self {
            cell,
            wall: WallTag::Direction(direction),
        }
    }

    /// Records that every wall of `cell` was inspected.
    #[must_use]
    pub const fn all_walls(cell: CellId) -> Self {
        Self {
            cell,
            wall: WallTag::AllDirections,
        }
    }

    /// Records that only the predecessor of `cell` changed.
    #[must_use]
    pub const fn predecessor(cell: CellId) -> Self {
        Self {
            cell,
            wall: WallTag::NoWalls,
        }
    }
}

/// Pending-exploration stack captured from the search algorithm.
///
/// Cells are stored bottom first; the last cell is the top of the stack and
/// names the next target the search intended to visit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrontierSnapshot {
    cells: Vec<CellId>,
}

impl FrontierSnapshot {
    /// Captures a snapshot from cells ordered bottom to top.
    #[must_use]
    pub fn new(cells: Vec<CellId>) -> Self {
        Self { cells }
    }

    /// Snapshot holding a single cell.
    #[must_use]
    pub fn single(cell: CellId) -> Self {
        Self { cells: vec![cell] }
    }

    /// Cell on top of the stack, if any.
    #[must_use]
    pub fn top(&self) -> Option<CellId> {
        self.cells.last().copied()
    }

    /// Iterator over the cells from bottom to top.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = CellId> + '_ {
        self.cells.iter().copied()
    }

    /// Number of cells pending exploration.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether no exploration is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Consumes the snapshot, yielding cells ordered bottom to top.
    #[must_use]
    pub fn into_vec(self) -> Vec<CellId> {
        self.cells
    }
}

/// Number of recent steps the path history keeps revertible.
///
/// Always at least one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShortTermMemory(u32);

impl ShortTermMemory {
    /// Creates a bound of `steps` retained steps, rejecting zero.
    #[must_use]
    pub const fn new(steps: u32) -> Option<Self> {
        if steps == 0 {
            None
        } else {
            Some(Self(steps))
        }
    }

    /// Retrieves the configured number of steps.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Configured number of steps as a container length.
    #[must_use]
    pub fn steps(&self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

/// Mutable cell graph whose knowledge fields the path history maintains.
///
/// Implementors own every cell. Identifiers outside the graph must be
/// tolerated: getters report nothing and setters do nothing.
pub trait CellGraph {
    /// Number of cells stored in the graph.
    fn cell_count(&self) -> usize;

    /// Position of the cell, used for diagnostics.
    fn coord(&self, cell: CellId) -> Option<CellCoord>;

    /// Cell visited immediately before `cell` on the current path.
    fn predecessor(&self, cell: CellId) -> Option<CellId>;

    /// Replaces the predecessor back-reference of `cell`.
    fn set_predecessor(&mut self, cell: CellId, predecessor: Option<CellId>);

    /// Reports whether the wall of `cell` facing `direction` was inspected.
    fn wall_inspected(&self, cell: CellId, direction: Direction) -> bool;

    /// Updates the inspected flag for the wall of `cell` facing `direction`.
    fn set_wall_inspected(&mut self, cell: CellId, direction: Direction, inspected: bool);
}

/// Commands that express all permissible maze-knowledge mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Rebuilds the cell arena with the provided dimensions, discarding knowledge.
    ConfigureGrid {
        /// Number of cell columns in the maze.
        columns: u32,
        /// Number of cell rows in the maze.
        rows: u32,
    },
    /// Marks a single wall of a cell as inspected.
    InspectWall {
        /// Cell whose wall was sensed.
        cell: CellCoord,
        /// Side of the cell the sensed wall lies on.
        direction: Direction,
    },
    /// Marks every wall of a cell as inspected.
    InspectAllWalls {
        /// Cell whose walls were sensed.
        cell: CellCoord,
    },
    /// Links a cell to the cell the robot arrived from.
    SetPredecessor {
        /// Cell receiving the back-reference.
        cell: CellCoord,
        /// Cell visited immediately before, or `None` to clear the link.
        predecessor: Option<CellCoord>,
    },
}

/// Events broadcast by the knowledge store after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that the cell arena was rebuilt.
    GridConfigured {
        /// Number of cell columns in the maze.
        columns: u32,
        /// Number of cell rows in the maze.
        rows: u32,
    },
    /// Confirms that a previously unknown wall flag was set.
    WallInspected {
        /// Cell whose wall flag changed.
        cell: CellId,
        /// Side of the cell whose flag changed.
        direction: Direction,
    },
    /// Confirms that every wall flag of a cell is now set.
    AllWallsInspected {
        /// Cell whose wall flags changed.
        cell: CellId,
    },
    /// Confirms that a cell's predecessor back-reference changed.
    PredecessorSet {
        /// Cell whose back-reference changed.
        cell: CellId,
        /// New predecessor of the cell.
        predecessor: Option<CellId>,
    },
    /// Reports that a command was rejected without mutating the store.
    CommandRejected {
        /// Specific reason the command failed.
        reason: CommandError,
    },
}

/// Reasons a knowledge-store command may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandError {
    /// The referenced coordinate lies outside the configured grid.
    OutOfBounds {
        /// Offending coordinate.
        cell: CellCoord,
    },
}

/// Bookkeeping notifications emitted by the path history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryEvent {
    /// A complete step was committed to the window.
    StepRecorded {
        /// Cell the robot occupies after the step.
        cell: CellId,
        /// Steps taken since the checkpoint after the commit.
        size: usize,
    },
    /// The oldest cell slid out of the window.
    StepEvicted {
        /// Cell that left the window.
        cell: CellId,
    },
    /// The mutations of a step left the window and became permanent.
    MutationsCommitted {
        /// Cell the committed step arrived at.
        cell: CellId,
        /// Number of mutation records made permanent.
        count: usize,
    },
    /// The oldest frontier snapshot lost its last reference and was retired,
    /// advancing the checkpoint.
    FrontierRetired {
        /// Number of frontier snapshots still retained.
        retained: usize,
    },
    /// Every mutation since the checkpoint was reverted.
    RolledBack {
        /// Cell the window was reseeded with.
        checkpoint: CellId,
        /// Number of mutation records reverted.
        reverted: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::{
        CellCoord, CellId, CellMutation, Direction, FrontierSnapshot, ShortTermMemory, WallTag,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn direction_indices_match_wall_flag_layout() {
        for (index, direction) in Direction::ALL.into_iter().enumerate() {
            assert_eq!(direction.index(), index);
            assert_eq!(Direction::from_index(index), Some(direction));
        }
        assert_eq!(Direction::from_index(4), None);
    }

    #[test]
    fn all_directions_tag_covers_every_wall() {
        let covered: Vec<_> = WallTag::AllDirections.directions().collect();
        assert_eq!(covered, Direction::ALL.to_vec());
    }

    #[test]
    fn single_direction_tag_covers_one_wall() {
        let tag = WallTag::Direction(Direction::South);
        let covered: Vec<_> = tag.directions().collect();
        assert_eq!(covered, vec![Direction::South]);
        assert!(!tag.covers(Direction::North));
    }

    #[test]
    fn predecessor_record_covers_no_wall() {
        let mutation = CellMutation::predecessor(CellId::new(4));
        assert_eq!(mutation.wall.directions().count(), 0);
        assert_round_trip(&mutation);
    }

    #[test]
    fn frontier_top_is_last_cell() {
        let snapshot = FrontierSnapshot::new(vec![CellId::new(3), CellId::new(7)]);
        assert_eq!(snapshot.top(), Some(CellId::new(7)));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(FrontierSnapshot::default().top(), None);
    }

    #[test]
    fn short_term_memory_rejects_zero() {
        assert_eq!(ShortTermMemory::new(0), None);
        assert_eq!(ShortTermMemory::new(5).map(|stm| stm.steps()), Some(5));
    }

    #[test]
    fn cell_coord_displays_as_pair() {
        assert_eq!(CellCoord::new(2, 9).to_string(), "(2,9)");
    }

    #[test]
    fn cell_mutation_round_trips_through_bincode() {
        assert_round_trip(&CellMutation::wall(CellId::new(4), Direction::West));
        assert_round_trip(&CellMutation::all_walls(CellId::new(11)));
    }

    #[test]
    fn frontier_snapshot_round_trips_through_bincode() {
        let snapshot = FrontierSnapshot::new(vec![CellId::new(1), CellId::new(2)]);
        assert_round_trip(&snapshot);
    }
}
