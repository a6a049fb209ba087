use std::{fs, path::Path};

use anyhow::{Context, Result};
use maze_recall_core::{CellCoord, Direction};
use serde::Deserialize;
use thiserror::Error;

/// Script format version understood by this adapter.
const SUPPORTED_SCRIPT_VERSION: u32 = 1;

/// Scripted exploration run replayed through the path history.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReplayScript {
    /// Format version of the script document.
    pub(crate) version: u32,
    /// Number of steps the history keeps revertible.
    pub(crate) short_term_memory: u32,
    /// Dimensions of the maze explored by the script.
    pub(crate) grid: GridConfig,
    /// Steps replayed in order.
    #[serde(default)]
    pub(crate) steps: Vec<ScriptStep>,
}

/// Maze dimensions declared by a script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct GridConfig {
    /// Number of cell columns.
    pub(crate) columns: u32,
    /// Number of cell rows.
    pub(crate) rows: u32,
}

impl GridConfig {
    fn contains(&self, cell: [u32; 2]) -> bool {
        cell[0] < self.columns && cell[1] < self.rows
    }
}

/// Single scripted action.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum ScriptStep {
    /// The robot moves onto `cell` and senses walls on arrival.
    Move {
        /// Destination as `[column, row]`.
        cell: [u32; 2],
        /// Frontier stack after the move, bottom first.
        #[serde(default)]
        frontier: Vec<[u32; 2]>,
        /// Walls of the destination sensed one by one.
        #[serde(default)]
        walls: Vec<Direction>,
        /// Whether every wall of the destination was sensed at once.
        #[serde(default)]
        all_walls: bool,
    },
    /// Exploration since the checkpoint is abandoned.
    Rollback,
}

/// Validation failures for a parsed replay script.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub(crate) enum ScriptError {
    /// The script declares a format version this adapter cannot replay.
    #[error("unsupported replay script version {found}; expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    /// The script keeps no steps revertible.
    #[error("short_term_memory must be at least 1")]
    ZeroShortTermMemory,
    /// The maze has no cells, so there is no origin to start from.
    #[error("grid must contain at least one cell")]
    EmptyGrid,
    /// A step references a coordinate outside the maze.
    #[error("step {step} references cell ({column},{row}) outside the grid")]
    OutOfBounds { step: usize, column: u32, row: u32 },
}

impl ReplayScript {
    /// Loads and validates the script stored at `path`.
    pub(crate) fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read replay script at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid replay script at {}", path.display()))
    }

    /// Parses and validates a script from TOML text.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let script: Self =
            toml::from_str(contents).context("failed to parse replay script toml contents")?;
        script.validate()?;
        Ok(script)
    }

    fn validate(&self) -> Result<(), ScriptError> {
        if self.version != SUPPORTED_SCRIPT_VERSION {
            return Err(ScriptError::UnsupportedVersion {
                found: self.version,
                expected: SUPPORTED_SCRIPT_VERSION,
            });
        }
        if self.short_term_memory == 0 {
            return Err(ScriptError::ZeroShortTermMemory);
        }
        if self.grid.columns == 0 || self.grid.rows == 0 {
            return Err(ScriptError::EmptyGrid);
        }

        for (index, step) in self.steps.iter().enumerate() {
            let ScriptStep::Move { cell, frontier, .. } = step else {
                continue;
            };
            if let Some(outside) = std::iter::once(cell)
                .chain(frontier)
                .find(|candidate| !self.grid.contains(**candidate))
            {
                return Err(ScriptError::OutOfBounds {
                    step: index + 1,
                    column: outside[0],
                    row: outside[1],
                });
            }
        }

        Ok(())
    }
}

/// Converts a script coordinate pair into a cell coordinate.
pub(crate) fn coord(cell: [u32; 2]) -> CellCoord {
    CellCoord::new(cell[0], cell[1])
}
