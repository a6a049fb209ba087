//! Human-readable dumps of the history containers.
//!
//! These mirror the debugging printouts used while tuning exploration and are
//! not part of the bookkeeping contract.

use std::fmt::Write as _;

use maze_recall_core::{CellGraph, CellId};

use crate::{query, PathHistory};

/// Renders every retained frontier as `<refs> of { cells }`, oldest first.
///
/// Cells are listed from the top of each stack downwards.
#[must_use]
pub fn frontier_report<G>(history: &PathHistory, graph: &G) -> String
where
    G: CellGraph + ?Sized,
{
    let mut report = String::new();
    for (snapshot, references) in query::frontier_entries(history) {
        let _ = write!(report, "<{references}> of {{");
        for cell in snapshot.iter().rev() {
            let _ = write!(report, " {}", describe(graph, cell));
        }
        report.push_str(" }\n");
    }
    report
}

/// Renders the revertible mutation lists as `{ cells }`, oldest step first.
#[must_use]
pub fn mutation_report<G>(history: &PathHistory, graph: &G) -> String
where
    G: CellGraph + ?Sized,
{
    let mut report = String::new();
    for mutations in query::pending_mutations(history) {
        report.push('{');
        for mutation in mutations {
            let _ = write!(report, " {}", describe(graph, mutation.cell));
        }
        report.push_str(" }\n");
    }
    report
}

fn describe<G>(graph: &G, cell: CellId) -> String
where
    G: CellGraph + ?Sized,
{
    graph
        .coord(cell)
        .map_or_else(|| format!("#{}", cell.get()), |coord| coord.to_string())
}
