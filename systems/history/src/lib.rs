#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Checkpointed path history that keeps recent exploration revertible.
//!
//! The search algorithm reports every robot step to a [`PathHistory`]: the
//! cell it moved to, the frontier stack it intends to explore next, and the
//! wall knowledge it gathered on arrival. The history keeps only the most
//! recent [`ShortTermMemory`] steps. Older steps become permanent, and the
//! oldest retained frontier snapshot defines the checkpoint the search can
//! always return to. [`PathHistory::reset_modified_cells`] reverts every
//! mutation recorded since that checkpoint.
//!
//! Steps are recorded through a typed chain so the three parts of a step
//! cannot be supplied out of order:
//!
//! ```ignore
//! history
//!     .moved(cell)
//!     .stack_update(frontier)
//!     .modified_cells_update(mutations, &mut events)?;
//! ```

use std::{collections::VecDeque, mem};

use maze_recall_core::{
    CellGraph, CellId, CellMutation, FrontierSnapshot, HistoryEvent, ShortTermMemory,
};

mod capture;
pub mod diagnostics;
mod error;

pub use capture::mutations_from_events;
pub use error::HistoryError;

/// Bounded, revertible log of the robot's recent path.
#[derive(Clone, Debug)]
pub struct PathHistory {
    short_term_memory: ShortTermMemory,
    window: VecDeque<WindowEntry>,
    frontiers: VecDeque<RetainedFrontier>,
}

impl PathHistory {
    /// Creates a history positioned at `origin` with no steps taken.
    #[must_use]
    pub fn new(short_term_memory: ShortTermMemory, origin: CellId) -> Self {
        let mut history = Self {
            short_term_memory,
            window: VecDeque::with_capacity(short_term_memory.steps().saturating_add(1)),
            frontiers: VecDeque::new(),
        };
        history.initialize(short_term_memory, origin);
        history
    }

    /// Discards every recorded step and re-seeds the history at `origin`.
    ///
    /// Arriving at the origin is never reported as a move, so the origin is
    /// seeded as the checkpoint cell together with the single-cell frontier
    /// `[origin]`.
    pub fn initialize(&mut self, short_term_memory: ShortTermMemory, origin: CellId) {
        self.short_term_memory = short_term_memory;
        self.window.clear();
        self.frontiers.clear();
        self.seed(FrontierSnapshot::single(origin), origin);
    }

    fn seed(&mut self, frontier: FrontierSnapshot, checkpoint: CellId) {
        self.frontiers.push_back(RetainedFrontier {
            snapshot: frontier,
            references: 1,
        });
        self.window.push_back(WindowEntry::new(checkpoint));
    }

    /// Number of steps taken since the checkpoint.
    #[must_use]
    pub fn size(&self) -> usize {
        self.window.len().saturating_sub(1)
    }

    /// Bound on the number of steps kept revertible.
    #[must_use]
    pub const fn short_term_memory(&self) -> ShortTermMemory {
        self.short_term_memory
    }

    /// Cell the robot occupied at the last recorded step.
    #[must_use]
    pub fn current_cell(&self) -> Option<CellId> {
        self.window.back().map(|entry| entry.cell)
    }

    /// Starts recording a step that moved the robot onto `cell`.
    ///
    /// Nothing is recorded until the returned chain is completed with
    /// [`MovedStep::stack_update`] and [`FrontierStep::modified_cells_update`].
    pub fn moved(&mut self, cell: CellId) -> MovedStep<'_> {
        MovedStep {
            history: self,
            cell,
        }
    }

    /// Records a complete step in one call.
    pub fn record_step(
        &mut self,
        cell: CellId,
        frontier: FrontierSnapshot,
        mutations: Vec<CellMutation>,
        out_events: &mut Vec<HistoryEvent>,
    ) -> Result<(), HistoryError> {
        self.moved(cell)
            .stack_update(frontier)
            .modified_cells_update(mutations, out_events)
    }

    /// Cell the search can always return to.
    ///
    /// This is the predecessor of the top cell of the oldest retained frontier
    /// snapshot, or that top cell itself when it has no predecessor (which is
    /// only the case for the origin).
    pub fn checkpoint_cell<G>(&self, graph: &G) -> Result<CellId, HistoryError>
    where
        G: CellGraph + ?Sized,
    {
        let top = self
            .checkpoint_frontier()?
            .top()
            .ok_or(HistoryError::EmptyCheckpointSnapshot)?;
        Ok(graph.predecessor(top).unwrap_or(top))
    }

    /// Route from the origin to the checkpoint cell, origin excluded.
    pub fn checkpoint_path<G>(&self, graph: &G) -> Result<CheckpointPath, HistoryError>
    where
        G: CellGraph + ?Sized,
    {
        let checkpoint = self.checkpoint_cell(graph)?;
        let limit = graph.cell_count();

        let mut chain = vec![checkpoint];
        let mut runner = graph.predecessor(checkpoint);
        while let Some(cell) = runner {
            if chain.len() >= limit {
                return Err(HistoryError::PredecessorCycle { start: checkpoint });
            }
            chain.push(cell);
            runner = graph.predecessor(cell);
        }

        // The walk always ends on the origin, which is never a move target.
        let _ = chain.pop();
        chain.reverse();
        Ok(CheckpointPath { cells: chain })
    }

    /// Copy of the frontier snapshot captured at the checkpoint.
    pub fn checkpoint_stack(&self) -> Result<FrontierSnapshot, HistoryError> {
        self.checkpoint_frontier().cloned()
    }

    fn checkpoint_frontier(&self) -> Result<&FrontierSnapshot, HistoryError> {
        self.frontiers
            .front()
            .map(|entry| &entry.snapshot)
            .ok_or(HistoryError::EmptyFrontierQueue)
    }

    /// Reverts every mutation recorded since the checkpoint and rewinds the
    /// history to it.
    ///
    /// Every recorded cell loses its predecessor and the wall flags named by
    /// its record. Afterwards the history is exactly what
    /// [`PathHistory::initialize`] would produce at the checkpoint: the
    /// checkpoint snapshot is the only retained frontier and the window holds
    /// the checkpoint cell alone. The checkpoint cell is derived after the
    /// reversal, so calling this twice in a row changes nothing the second
    /// time.
    pub fn reset_modified_cells<G>(
        &mut self,
        graph: &mut G,
        out_events: &mut Vec<HistoryEvent>,
    ) -> Result<(), HistoryError>
    where
        G: CellGraph + ?Sized,
    {
        let checkpoint_stack = self.checkpoint_stack()?;
        if checkpoint_stack.is_empty() {
            return Err(HistoryError::EmptyCheckpointSnapshot);
        }

        let mut reverted = 0;
        for mutation in self.window.iter().flat_map(|entry| &entry.mutations) {
            graph.set_predecessor(mutation.cell, None);
            for direction in mutation.wall.directions() {
                graph.set_wall_inspected(mutation.cell, direction, false);
            }
            reverted += 1;
        }

        self.window.clear();
        self.frontiers.clear();
        self.frontiers.push_back(RetainedFrontier {
            snapshot: checkpoint_stack,
            references: 1,
        });
        let checkpoint = self.checkpoint_cell(graph)?;
        self.window.push_back(WindowEntry::new(checkpoint));

        tracing::debug!(
            checkpoint = checkpoint.get(),
            reverted,
            "rolled back to checkpoint"
        );
        out_events.push(HistoryEvent::RolledBack {
            checkpoint,
            reverted,
        });
        Ok(())
    }

    fn commit(
        &mut self,
        cell: CellId,
        frontier: FrontierSnapshot,
        mutations: Vec<CellMutation>,
        out_events: &mut Vec<HistoryEvent>,
    ) -> Result<(), HistoryError> {
        if self.window.is_empty() {
            return Err(HistoryError::EmptyPathWindow);
        }
        let Some(newest) = self.frontiers.back_mut() else {
            return Err(HistoryError::EmptyFrontierQueue);
        };

        // The new step depends on whichever frontier is in effect until the
        // frontier update below re-attributes it.
        newest.references = newest.references.saturating_add(1);
        self.window.push_back(WindowEntry::new(cell));

        if self.size() > self.short_term_memory.steps() {
            self.evict_oldest(out_events);
        }

        let oldest_retired = self.frontiers.len() > 1
            && self
                .frontiers
                .front()
                .map_or(false, |entry| entry.references == 0);
        if oldest_retired {
            let _ = self.frontiers.pop_front();
            tracing::debug!(
                retained = self.frontiers.len(),
                "retired checkpoint frontier"
            );
            out_events.push(HistoryEvent::FrontierRetired {
                retained: self.frontiers.len(),
            });
        }

        if let Some(previous) = self.frontiers.back_mut() {
            previous.references = previous.references.saturating_sub(1);
        }
        self.frontiers.push_back(RetainedFrontier {
            snapshot: frontier,
            references: 1,
        });

        if let Some(current) = self.window.back_mut() {
            current.mutations = mutations;
        }

        let size = self.size();
        tracing::trace!(
            cell = cell.get(),
            size,
            frontiers = self.frontiers.len(),
            "recorded step"
        );
        out_events.push(HistoryEvent::StepRecorded { cell, size });
        Ok(())
    }

    fn evict_oldest(&mut self, out_events: &mut Vec<HistoryEvent>) {
        if let Some(evicted) = self.window.pop_front() {
            tracing::debug!(cell = evicted.cell.get(), "evicted step from window");
            out_events.push(HistoryEvent::StepEvicted { cell: evicted.cell });
        }
        if let Some(oldest) = self.frontiers.front_mut() {
            oldest.references = oldest.references.saturating_sub(1);
        }

        // The new checkpoint entry's mutations can no longer be reverted.
        if let Some(checkpoint) = self.window.front_mut() {
            let committed = mem::take(&mut checkpoint.mutations);
            if !committed.is_empty() {
                out_events.push(HistoryEvent::MutationsCommitted {
                    cell: checkpoint.cell,
                    count: committed.len(),
                });
            }
        }
    }
}

/// Step whose destination cell is known, awaiting its frontier snapshot.
#[derive(Debug)]
#[must_use = "a step is only recorded once its frontier and mutations are supplied"]
pub struct MovedStep<'h> {
    history: &'h mut PathHistory,
    cell: CellId,
}

impl<'h> MovedStep<'h> {
    /// Cell the robot moved onto.
    #[must_use]
    pub fn cell(&self) -> CellId {
        self.cell
    }

    /// Supplies the frontier stack the search holds after the move.
    pub fn stack_update(self, frontier: FrontierSnapshot) -> FrontierStep<'h> {
        FrontierStep {
            history: self.history,
            cell: self.cell,
            frontier,
        }
    }
}

/// Step awaiting the maze-knowledge mutations performed on arrival.
#[derive(Debug)]
#[must_use = "a step is only recorded once its mutations are supplied"]
pub struct FrontierStep<'h> {
    history: &'h mut PathHistory,
    cell: CellId,
    frontier: FrontierSnapshot,
}

impl FrontierStep<'_> {
    /// Supplies the step's mutations and commits the whole step.
    ///
    /// An empty list is expected when the step did not physically move the
    /// robot, which happens when the search resumes at the checkpoint after a
    /// rollback. On error nothing is recorded.
    pub fn modified_cells_update(
        self,
        mutations: Vec<CellMutation>,
        out_events: &mut Vec<HistoryEvent>,
    ) -> Result<(), HistoryError> {
        self.history
            .commit(self.cell, self.frontier, mutations, out_events)
    }
}

/// Cells leading from the origin to the checkpoint.
///
/// The origin itself is excluded; the first cell is adjacent to the origin
/// and the last cell is the checkpoint. A checkpoint at the origin yields an
/// empty path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckpointPath {
    cells: Vec<CellId>,
}

impl CheckpointPath {
    /// Iterator over the cells in travel order.
    pub fn route(&self) -> impl DoubleEndedIterator<Item = CellId> + '_ {
        self.cells.iter().copied()
    }

    /// Final cell of the route, absent when the checkpoint is the origin.
    #[must_use]
    pub fn checkpoint(&self) -> Option<CellId> {
        self.cells.last().copied()
    }

    /// Number of moves needed to reach the checkpoint from the origin.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the checkpoint is the origin.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Consumes the path, yielding cells in travel order.
    #[must_use]
    pub fn into_vec(self) -> Vec<CellId> {
        self.cells
    }
}

impl IntoIterator for CheckpointPath {
    type Item = CellId;
    type IntoIter = std::vec::IntoIter<CellId>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

/// Query functions that provide read-only access to the history state.
pub mod query {
    use super::PathHistory;
    use maze_recall_core::{CellId, CellMutation, FrontierSnapshot};

    /// Cells in the window, checkpoint first and current cell last.
    pub fn window_cells(history: &PathHistory) -> impl Iterator<Item = CellId> + '_ {
        history.window.iter().map(|entry| entry.cell)
    }

    /// Retained frontier snapshots with their reference counts, oldest first.
    pub fn frontier_entries(
        history: &PathHistory,
    ) -> impl Iterator<Item = (&FrontierSnapshot, u32)> + '_ {
        history
            .frontiers
            .iter()
            .map(|entry| (&entry.snapshot, entry.references))
    }

    /// Revertible mutation lists, one per step since the checkpoint, oldest first.
    pub fn pending_mutations(history: &PathHistory) -> impl Iterator<Item = &[CellMutation]> + '_ {
        history
            .window
            .iter()
            .skip(1)
            .map(|entry| entry.mutations.as_slice())
    }

    /// Sum of all frontier reference counts.
    #[must_use]
    pub fn reference_total(history: &PathHistory) -> u64 {
        history
            .frontiers
            .iter()
            .map(|entry| u64::from(entry.references))
            .sum()
    }
}

#[derive(Clone, Debug)]
struct WindowEntry {
    cell: CellId,
    mutations: Vec<CellMutation>,
}

impl WindowEntry {
    fn new(cell: CellId) -> Self {
        Self {
            cell,
            mutations: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
struct RetainedFrontier {
    snapshot: FrontierSnapshot,
    references: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_recall_core::{CellCoord, Direction};

    /// Straight corridor graph where cell `n` sits at column 0, row `n`.
    #[derive(Debug)]
    struct Corridor {
        predecessors: Vec<Option<CellId>>,
        walls: Vec<[bool; 4]>,
    }

    impl Corridor {
        fn new(length: usize) -> Self {
            Self {
                predecessors: vec![None; length],
                walls: vec![[false; 4]; length],
            }
        }
    }

    impl CellGraph for Corridor {
        fn cell_count(&self) -> usize {
            self.predecessors.len()
        }

        fn coord(&self, cell: CellId) -> Option<CellCoord> {
            (cell.index() < self.predecessors.len()).then(|| CellCoord::new(0, cell.get()))
        }

        fn predecessor(&self, cell: CellId) -> Option<CellId> {
            self.predecessors.get(cell.index()).copied().flatten()
        }

        fn set_predecessor(&mut self, cell: CellId, predecessor: Option<CellId>) {
            if let Some(slot) = self.predecessors.get_mut(cell.index()) {
                *slot = predecessor;
            }
        }

        fn wall_inspected(&self, cell: CellId, direction: Direction) -> bool {
            self.walls
                .get(cell.index())
                .map_or(false, |walls| walls[direction.index()])
        }

        fn set_wall_inspected(&mut self, cell: CellId, direction: Direction, inspected: bool) {
            if let Some(walls) = self.walls.get_mut(cell.index()) {
                walls[direction.index()] = inspected;
            }
        }
    }

    fn stm(steps: u32) -> ShortTermMemory {
        ShortTermMemory::new(steps).expect("non-zero short term memory")
    }

    fn id(value: u32) -> CellId {
        CellId::new(value)
    }

    fn walk(history: &mut PathHistory, graph: &mut Corridor, to: u32) -> Vec<HistoryEvent> {
        let mut events = Vec::new();
        graph.set_predecessor(id(to), Some(id(to - 1)));
        graph.set_wall_inspected(id(to), Direction::East, true);
        history
            .moved(id(to))
            .stack_update(FrontierSnapshot::single(id(to + 1)))
            .modified_cells_update(
                vec![CellMutation::wall(id(to), Direction::East)],
                &mut events,
            )
            .expect("step commits");
        events
    }

    #[test]
    fn new_history_is_seeded_at_origin() {
        let history = PathHistory::new(stm(3), id(0));
        let graph = Corridor::new(4);

        assert_eq!(history.size(), 0);
        assert_eq!(history.current_cell(), Some(id(0)));
        assert_eq!(history.checkpoint_cell(&graph), Ok(id(0)));
        assert_eq!(
            history.checkpoint_stack(),
            Ok(FrontierSnapshot::single(id(0)))
        );
        assert_eq!(query::reference_total(&history), 1);
    }

    #[test]
    fn references_track_window_length() {
        let mut history = PathHistory::new(stm(2), id(0));
        let mut graph = Corridor::new(10);

        for cell in 1..8 {
            let _ = walk(&mut history, &mut graph, cell);
            let window_length = query::window_cells(&history).count();
            assert_eq!(query::reference_total(&history), window_length as u64);
            assert_eq!(
                query::pending_mutations(&history).count(),
                history.size(),
                "one mutation list per step since the checkpoint"
            );
        }
    }

    #[test]
    fn eviction_commits_the_oldest_mutations() {
        let mut history = PathHistory::new(stm(1), id(0));
        let mut graph = Corridor::new(5);

        let first = walk(&mut history, &mut graph, 1);
        assert_eq!(
            first,
            vec![HistoryEvent::StepRecorded {
                cell: id(1),
                size: 1
            }]
        );

        let second = walk(&mut history, &mut graph, 2);
        assert_eq!(
            second,
            vec![
                HistoryEvent::StepEvicted { cell: id(0) },
                HistoryEvent::MutationsCommitted {
                    cell: id(1),
                    count: 1
                },
                HistoryEvent::FrontierRetired { retained: 1 },
                HistoryEvent::StepRecorded {
                    cell: id(2),
                    size: 1
                },
            ]
        );
        assert_eq!(history.checkpoint_cell(&graph), Ok(id(1)));
    }

    #[test]
    fn dropping_an_unfinished_step_records_nothing() {
        let mut history = PathHistory::new(stm(2), id(0));

        let pending = history.moved(id(1));
        assert_eq!(pending.cell(), id(1));
        let _ = pending.stack_update(FrontierSnapshot::single(id(2)));

        assert_eq!(history.size(), 0);
        assert_eq!(query::reference_total(&history), 1);
    }

    #[test]
    fn empty_checkpoint_snapshot_is_reported() {
        let mut history = PathHistory::new(stm(1), id(0));
        let mut graph = Corridor::new(4);
        let mut events = Vec::new();

        history
            .record_step(id(1), FrontierSnapshot::default(), Vec::new(), &mut events)
            .expect("step commits");
        history
            .record_step(id(2), FrontierSnapshot::default(), Vec::new(), &mut events)
            .expect("step commits");

        assert_eq!(
            history.checkpoint_cell(&graph),
            Err(HistoryError::EmptyCheckpointSnapshot)
        );
        assert_eq!(
            history.reset_modified_cells(&mut graph, &mut events),
            Err(HistoryError::EmptyCheckpointSnapshot)
        );
        assert_eq!(history.size(), 1, "failed rollback leaves the window intact");
    }

    #[test]
    fn cyclic_predecessors_are_reported() {
        let mut graph = Corridor::new(3);
        graph.set_predecessor(id(0), Some(id(1)));
        graph.set_predecessor(id(1), Some(id(0)));

        let history = PathHistory::new(stm(4), id(1));
        assert_eq!(
            history.checkpoint_path(&graph),
            Err(HistoryError::PredecessorCycle { start: id(0) })
        );
    }
}
