use maze_recall_core::{CellMutation, Event, WallTag};

/// Converts knowledge-store events into the mutation list of one step.
///
/// Each cell/direction pair is recorded once. A cell whose walls were all
/// inspected keeps a single [`WallTag::AllDirections`] record in the position
/// of its first record. A predecessor change is recorded as
/// [`WallTag::NoWalls`] unless the cell already has a record, since reverting
/// any record clears the predecessor; a later wall record replaces it in
/// place.
#[must_use]
pub fn mutations_from_events(events: &[Event]) -> Vec<CellMutation> {
    let mut mutations = Vec::new();
    for event in events {
        let mutation = match event {
            Event::WallInspected { cell, direction } => CellMutation::wall(*cell, *direction),
            Event::AllWallsInspected { cell } => CellMutation::all_walls(*cell),
            Event::PredecessorSet { cell, .. } => CellMutation::predecessor(*cell),
            Event::GridConfigured { .. } | Event::CommandRejected { .. } => continue,
        };
        record(&mut mutations, mutation);
    }
    mutations
}

fn record(mutations: &mut Vec<CellMutation>, mutation: CellMutation) {
    let absorbed = mutations.iter().any(|existing| {
        existing.cell == mutation.cell
            && (mutation.wall == WallTag::NoWalls
                || existing.wall == WallTag::AllDirections
                || existing.wall == mutation.wall)
    });
    if absorbed {
        return;
    }

    let first = mutations
        .iter()
        .position(|existing| existing.cell == mutation.cell);
    match (mutation.wall, first) {
        (WallTag::AllDirections, Some(position)) => {
            mutations[position] = mutation;
            mutations.retain(|existing| {
                existing.cell != mutation.cell || existing.wall == WallTag::AllDirections
            });
        }
        // A predecessor-only record is always the cell's sole record.
        (_, Some(position)) if mutations[position].wall == WallTag::NoWalls => {
            mutations[position] = mutation;
        }
        _ => mutations.push(mutation),
    }
}
