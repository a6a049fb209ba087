//! Drives the knowledge store and the path history through a replay script.

use std::fmt;

use anyhow::{bail, Context, Result};
use maze_recall_core::{
    CellCoord, CellGraph, CellId, Command, Event, FrontierSnapshot, HistoryEvent,
    ShortTermMemory,
};
use maze_recall_system_history::{diagnostics, mutations_from_events, PathHistory};
use maze_recall_world::{self as world, query, World};

use crate::script::{coord, GridConfig, ReplayScript, ScriptStep};

/// Summary of the history state once a script has been replayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReplayReport {
    /// Configured short-term memory.
    pub(crate) short_term_memory: ShortTermMemory,
    /// Steps taken since the checkpoint.
    pub(crate) size: usize,
    /// Cell the robot would return to on a rollback.
    pub(crate) checkpoint: CellCoord,
    /// Route from the origin to the checkpoint, origin excluded.
    pub(crate) checkpoint_path: Vec<CellCoord>,
    /// Frontier stack recorded at the checkpoint, bottom first.
    pub(crate) checkpoint_stack: Vec<CellCoord>,
    /// Moves committed over the whole run.
    pub(crate) moves: usize,
    /// Rollbacks performed over the whole run.
    pub(crate) rollbacks: usize,
    /// Steps that slid out of the window over the whole run.
    pub(crate) evictions: usize,
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "window: {} of {} steps",
            self.size,
            self.short_term_memory.get()
        )?;
        writeln!(f, "checkpoint: {}", self.checkpoint)?;
        writeln!(f, "checkpoint path: {}", Cells(&self.checkpoint_path))?;
        writeln!(f, "checkpoint stack: {}", Cells(&self.checkpoint_stack))?;
        write!(
            f,
            "moves: {}, rollbacks: {}, evictions: {}",
            self.moves, self.rollbacks, self.evictions
        )
    }
}

struct Cells<'a>(&'a [CellCoord]);

impl fmt::Display for Cells<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("-");
        }
        for (index, cell) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{cell}")?;
        }
        Ok(())
    }
}

/// Knowledge store and path history advanced in lockstep by script steps.
#[derive(Debug)]
pub(crate) struct Replay {
    world: World,
    history: PathHistory,
    position: CellId,
    events: Vec<HistoryEvent>,
    moves: usize,
    rollbacks: usize,
}

impl Replay {
    /// Creates a replay on a freshly configured grid with the robot at the origin.
    pub(crate) fn new(grid: GridConfig, short_term_memory: ShortTermMemory) -> Result<Self> {
        let mut world = World::new();
        let mut world_events = Vec::new();
        world::apply(
            &mut world,
            Command::ConfigureGrid {
                columns: grid.columns,
                rows: grid.rows,
            },
            &mut world_events,
        );
        let origin = query::origin(&world).context("configured grid has no origin cell")?;

        Ok(Self {
            world,
            history: PathHistory::new(short_term_memory, origin),
            position: origin,
            events: Vec::new(),
            moves: 0,
            rollbacks: 0,
        })
    }

    /// Applies one script step. `number` is the 1-based position used in messages.
    pub(crate) fn apply(&mut self, number: usize, step: &ScriptStep) -> Result<()> {
        match step {
            ScriptStep::Move {
                cell,
                frontier,
                walls,
                all_walls,
            } => {
                let target = coord(*cell);
                let cell = query::cell_id(&self.world, target)
                    .with_context(|| format!("step {number} moves outside the maze"))?;
                let mut world_events = Vec::new();
                if discovers(&self.world, cell, self.position) {
                    let predecessor = query::coord(&self.world, self.position);
                    world::apply(
                        &mut self.world,
                        Command::SetPredecessor {
                            cell: target,
                            predecessor,
                        },
                        &mut world_events,
                    );
                }
                if *all_walls {
                    world::apply(
                        &mut self.world,
                        Command::InspectAllWalls { cell: target },
                        &mut world_events,
                    );
                } else {
                    for &direction in walls {
                        world::apply(
                            &mut self.world,
                            Command::InspectWall {
                                cell: target,
                                direction,
                            },
                            &mut world_events,
                        );
                    }
                }
                if let Some(reason) = world_events.iter().find_map(|event| match event {
                    Event::CommandRejected { reason } => Some(reason),
                    _ => None,
                }) {
                    bail!("step {number} was rejected by the maze: {reason:?}");
                }

                let snapshot = frontier
                    .iter()
                    .map(|&entry| query::cell_id(&self.world, coord(entry)))
                    .collect::<Option<Vec<_>>>()
                    .map(FrontierSnapshot::new)
                    .with_context(|| format!("step {number} lists a frontier outside the maze"))?;

                self.history
                    .moved(cell)
                    .stack_update(snapshot)
                    .modified_cells_update(mutations_from_events(&world_events), &mut self.events)
                    .with_context(|| format!("step {number} could not be recorded"))?;
                self.position = cell;
                self.moves += 1;
                tracing::info!(
                    step = number,
                    cell = %target,
                    size = self.history.size(),
                    "recorded move"
                );
            }
            ScriptStep::Rollback => {
                self.history
                    .reset_modified_cells(&mut self.world, &mut self.events)
                    .with_context(|| format!("step {number} could not roll back"))?;
                self.position = self
                    .history
                    .current_cell()
                    .context("history lost its current cell during rollback")?;
                self.rollbacks += 1;
                tracing::info!(
                    step = number,
                    checkpoint = ?query::coord(&self.world, self.position),
                    "rolled back"
                );
            }
        }

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                frontiers = %diagnostics::frontier_report(&self.history, &self.world),
                mutations = %diagnostics::mutation_report(&self.history, &self.world),
                "history after step {number}"
            );
        }
        Ok(())
    }

    /// Summarises the current history state.
    pub(crate) fn report(&self) -> Result<ReplayReport> {
        let checkpoint = self.history.checkpoint_cell(&self.world)?;
        let checkpoint_path = self
            .history
            .checkpoint_path(&self.world)?
            .route()
            .map(|cell| self.locate(cell))
            .collect::<Result<Vec<_>>>()?;
        let checkpoint_stack = self
            .history
            .checkpoint_stack()?
            .iter()
            .map(|cell| self.locate(cell))
            .collect::<Result<Vec<_>>>()?;
        let evictions = self
            .events
            .iter()
            .filter(|event| matches!(event, HistoryEvent::StepEvicted { .. }))
            .count();

        Ok(ReplayReport {
            short_term_memory: self.history.short_term_memory(),
            size: self.history.size(),
            checkpoint: self.locate(checkpoint)?,
            checkpoint_path,
            checkpoint_stack,
            moves: self.moves,
            rollbacks: self.rollbacks,
            evictions,
        })
    }

    /// Renders the retained frontiers and pending mutations.
    pub(crate) fn dump(&self) -> String {
        format!(
            "frontiers:\n{}mutations:\n{}",
            diagnostics::frontier_report(&self.history, &self.world),
            diagnostics::mutation_report(&self.history, &self.world)
        )
    }

    fn locate(&self, cell: CellId) -> Result<CellCoord> {
        query::coord(&self.world, cell)
            .with_context(|| format!("cell #{} lies outside the maze", cell.get()))
    }
}

/// Whether moving from `previous` onto `target` discovers `target`.
///
/// Only an unlinked cell other than the origin is discovered, and never when
/// linking it would close a predecessor loop through `previous`.
fn discovers(world: &World, target: CellId, previous: CellId) -> bool {
    if target == previous
        || world.predecessor(target).is_some()
        || query::origin(world) == Some(target)
    {
        return false;
    }

    let mut runner = Some(previous);
    for _ in 0..world.cell_count() {
        match runner {
            Some(cell) if cell == target => return false,
            Some(cell) => runner = world.predecessor(cell),
            None => return true,
        }
    }
    false
}

/// Replays every step of `script` and returns the finished replay.
pub(crate) fn run(script: &ReplayScript, short_term_memory: ShortTermMemory) -> Result<Replay> {
    let mut replay = Replay::new(script.grid, short_term_memory)?;
    for (index, step) in script.steps.iter().enumerate() {
        replay.apply(index + 1, step)?;
    }
    Ok(replay)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(steps: u32) -> ShortTermMemory {
        ShortTermMemory::new(steps).expect("non-zero short term memory")
    }

    fn corridor() -> ReplayScript {
        ReplayScript::parse(include_str!("../scripts/corridor.toml"))
            .expect("bundled script is valid")
    }

    fn down_the_column(rows: u32) -> Vec<ScriptStep> {
        (1..rows)
            .map(|row| ScriptStep::Move {
                cell: [0, row],
                frontier: vec![[1, 0], [0, row + 1]],
                walls: vec![maze_recall_core::Direction::East],
                all_walls: false,
            })
            .collect()
    }

    fn moving(cell: [u32; 2], frontier: &[[u32; 2]]) -> ScriptStep {
        ScriptStep::Move {
            cell,
            frontier: frontier.to_vec(),
            walls: Vec::new(),
            all_walls: false,
        }
    }

    fn replay_steps(grid: GridConfig, steps: u32, script: &[ScriptStep]) -> Replay {
        let mut replay = Replay::new(grid, memory(steps)).expect("replay starts");
        for (index, step) in script.iter().enumerate() {
            replay.apply(index + 1, step).expect("step applies");
        }
        replay
    }

    fn predecessor(replay: &Replay, column: u32, row: u32) -> Option<CellCoord> {
        query::predecessor(&replay.world, CellCoord::new(column, row))
    }

    #[test]
    fn fresh_replay_reports_origin() {
        let replay = Replay::new(GridConfig { columns: 3, rows: 3 }, memory(2))
            .expect("replay starts");
        let report = replay.report().expect("report builds");

        assert_eq!(report.size, 0);
        assert_eq!(report.checkpoint, CellCoord::new(0, 0));
        assert!(report.checkpoint_path.is_empty());
        assert_eq!(report.checkpoint_stack, vec![CellCoord::new(0, 0)]);
    }

    #[test]
    fn checkpoint_trails_the_robot() {
        let mut replay = Replay::new(GridConfig { columns: 2, rows: 8 }, memory(2))
            .expect("replay starts");
        for (index, step) in down_the_column(5).iter().enumerate() {
            replay.apply(index + 1, step).expect("step applies");
        }
        let report = replay.report().expect("report builds");

        assert_eq!(report.size, 2);
        assert_eq!(report.checkpoint, CellCoord::new(0, 2));
        assert_eq!(
            report.checkpoint_path,
            vec![CellCoord::new(0, 1), CellCoord::new(0, 2)]
        );
        assert_eq!(
            report.checkpoint_stack,
            vec![CellCoord::new(1, 0), CellCoord::new(0, 3)]
        );
        assert_eq!(report.evictions, 2);
    }

    #[test]
    fn rollback_places_robot_on_checkpoint() {
        let mut replay = Replay::new(GridConfig { columns: 2, rows: 8 }, memory(2))
            .expect("replay starts");
        let mut steps = down_the_column(5);
        steps.push(ScriptStep::Rollback);
        for (index, step) in steps.iter().enumerate() {
            replay.apply(index + 1, step).expect("step applies");
        }
        let report = replay.report().expect("report builds");

        // The checkpoint snapshot's top cell lost its predecessor, so the
        // reseeded checkpoint is that cell itself.
        assert_eq!(report.size, 0);
        assert_eq!(report.rollbacks, 1);
        assert_eq!(report.checkpoint, CellCoord::new(0, 3));
        assert!(report.checkpoint_path.is_empty());
        assert_eq!(
            query::coord(&replay.world, replay.position),
            Some(CellCoord::new(0, 3))
        );
        assert_eq!(query::predecessor(&replay.world, CellCoord::new(0, 4)), None);
        assert_eq!(query::predecessor(&replay.world, CellCoord::new(0, 3)), None);
        assert_eq!(
            query::predecessor(&replay.world, CellCoord::new(0, 2)),
            Some(CellCoord::new(0, 1))
        );
    }

    #[test]
    fn backtracking_keeps_first_predecessor() {
        let replay = replay_steps(
            GridConfig { columns: 2, rows: 3 },
            1,
            &[
                moving([0, 1], &[[0, 2]]),
                moving([0, 2], &[[1, 1]]),
                moving([0, 1], &[[1, 1]]),
            ],
        );

        assert_eq!(predecessor(&replay, 0, 1), Some(CellCoord::new(0, 0)));
        assert_eq!(predecessor(&replay, 0, 2), Some(CellCoord::new(0, 1)));
        assert!(replay.report().is_ok());
    }

    #[test]
    fn returning_to_origin_leaves_it_unlinked() {
        let replay = replay_steps(
            GridConfig { columns: 2, rows: 2 },
            2,
            &[moving([0, 1], &[[1, 0]]), moving([0, 0], &[[1, 0]])],
        );

        assert_eq!(predecessor(&replay, 0, 0), None);
        let report = replay.report().expect("report builds");
        assert_eq!(report.checkpoint, CellCoord::new(0, 0));
        assert!(report.checkpoint_path.is_empty());
    }

    #[test]
    fn rollback_clears_wall_free_moves() {
        let mut replay = replay_steps(
            GridConfig { columns: 2, rows: 2 },
            5,
            &[
                moving([0, 1], &[[1, 1]]),
                moving([1, 1], &[[1, 0]]),
                moving([1, 0], &[[1, 0]]),
                moving([0, 0], &[[1, 0]]),
            ],
        );
        replay
            .apply(5, &ScriptStep::Rollback)
            .expect("rollback applies");

        for (column, row) in [(0, 0), (0, 1), (1, 1), (1, 0)] {
            assert_eq!(predecessor(&replay, column, row), None);
        }
        assert!(query::explored_cells(&replay.world).is_empty());
        assert_eq!(
            replay.report().expect("report builds").checkpoint,
            CellCoord::new(0, 0)
        );
    }

    #[test]
    fn revisiting_an_unlinked_checkpoint_closes_no_loop() {
        let mut steps = down_the_column(5);
        steps.push(ScriptStep::Rollback);
        steps.push(moving([0, 4], &[[0, 5]]));
        steps.push(moving([0, 3], &[[0, 5]]));
        let replay = replay_steps(GridConfig { columns: 2, rows: 8 }, 2, &steps);

        assert_eq!(predecessor(&replay, 0, 4), Some(CellCoord::new(0, 3)));
        assert_eq!(predecessor(&replay, 0, 3), None);
        assert!(replay.report().is_ok());
    }

    #[test]
    fn bundled_script_replays() {
        let script = corridor();
        let replay = run(&script, memory(script.short_term_memory)).expect("script replays");
        let report = replay.report().expect("report builds");

        assert_eq!(report.rollbacks, 1);
        assert!(report.size <= 2);
        assert!(replay.dump().starts_with("frontiers:\n"));
    }

    #[test]
    fn report_lists_cells_in_order() {
        let report = ReplayReport {
            short_term_memory: memory(3),
            size: 1,
            checkpoint: CellCoord::new(0, 1),
            checkpoint_path: vec![CellCoord::new(0, 1)],
            checkpoint_stack: Vec::new(),
            moves: 2,
            rollbacks: 0,
            evictions: 0,
        };

        assert_eq!(
            report.to_string(),
            "window: 1 of 3 steps\n\
             checkpoint: (0,1)\n\
             checkpoint path: (0,1)\n\
             checkpoint stack: -\n\
             moves: 2, rollbacks: 0, evictions: 0"
        );
    }
}
