use maze_recall_core::CellId;
use thiserror::Error;

/// Contract failures reported by the path history.
///
/// None of these can occur while callers follow the step protocol: every
/// history is seeded on construction and the step chain enforces the
/// `moved`, `stack_update`, `modified_cells_update` order. Receiving one means
/// the history or the cell graph was corrupted by the caller, so it must be
/// treated as fatal rather than retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// The path window held no cells when a step was committed.
    #[error("path window is empty; the history was never seeded")]
    EmptyPathWindow,
    /// No frontier snapshot was retained when one was required.
    #[error("frontier queue holds no snapshot references")]
    EmptyFrontierQueue,
    /// The checkpoint snapshot has no top cell to derive a checkpoint from.
    #[error("checkpoint frontier snapshot is empty")]
    EmptyCheckpointSnapshot,
    /// Following predecessor links never reached a cell without one.
    #[error("predecessor chain starting at {start:?} never reaches the origin")]
    PredecessorCycle {
        /// Cell the walk started from.
        start: CellId,
    },
}
