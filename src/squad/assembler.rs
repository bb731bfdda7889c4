use std::collections::BTreeMap;

use crate::domain::{Candidate, Position};
use crate::squad::{
    CompactEntry, FullEntry, SlotRole, SlottedEntry, SquadEntry, ViewMode,
};

pub const BENCH_SIZE: usize = 4;

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn entry(candidate: &Candidate, view: ViewMode) -> SquadEntry {
    match view {
        ViewMode::Compact => SquadEntry::Compact(CompactEntry {
            name: candidate.web_name.clone(),
            position: candidate.position,
            team: candidate.team_short_name.clone(),
            cost_m: round1(candidate.cost()),
            predicted_points: round2(candidate.predicted_points),
            value: round2(candidate.value()),
            player_id: candidate.player_id,
            fpl_player_id: candidate.fpl_player_id,
            team_id: candidate.team_id,
        }),
        ViewMode::Full => SquadEntry::Full(FullEntry {
            prediction_id: candidate.prediction_id,
            player_id: candidate.player_id,
            target_gw: candidate.target_gw,
            model_name: candidate.model_name.clone(),
            predicted_points: candidate.predicted_points,
            value: candidate.value(),
            created_at: candidate.created_at,
            fpl_player_id: candidate.fpl_player_id,
            web_name: candidate.web_name.clone(),
            position: candidate.position,
            now_cost: candidate.now_cost,
            status: candidate.status.clone(),
            team_id: candidate.team_id,
            team_short_name: candidate.team_short_name.clone(),
            team_name: candidate.team_name.clone(),
        }),
    }
}

/// Group picks by position, preserving pick order within each position.
pub fn group_by_position(rows: &[Candidate]) -> BTreeMap<Position, Vec<Candidate>> {
    let mut grouped: BTreeMap<Position, Vec<Candidate>> =
        Position::ALL.iter().map(|&p| (p, Vec::new())).collect();
    for candidate in rows {
        if let Some(bucket) = grouped.get_mut(&candidate.position) {
            bucket.push(candidate.clone());
        }
    }
    grouped
}

pub fn position_views(
    grouped: &BTreeMap<Position, Vec<Candidate>>,
    view: ViewMode,
) -> BTreeMap<Position, Vec<SquadEntry>> {
    grouped
        .iter()
        .map(|(&position, rows)| (position, rows.iter().map(|c| entry(c, view)).collect()))
        .collect()
}

/// Fixed 4-slot bench: slot 0 the bench goalkeeper if any, then outfield
/// players DEF -> MID -> FWD, cut to exactly four slots.
pub fn bench_list(
    bench_grouped: &BTreeMap<Position, Vec<Candidate>>,
    view: ViewMode,
) -> Vec<SquadEntry> {
    let mut list = Vec::with_capacity(BENCH_SIZE);
    if let Some(gk) = bench_grouped
        .get(&Position::Gkp)
        .and_then(|rows| rows.first())
    {
        list.push(entry(gk, view));
    }
    for position in [Position::Def, Position::Mid, Position::Fwd] {
        for candidate in bench_grouped.get(&position).into_iter().flatten() {
            if list.len() >= BENCH_SIZE {
                return list;
            }
            list.push(entry(candidate, view));
        }
    }
    list
}

/// Flat 15-entry list: the starting positions in fixed order GKP -> DEF ->
/// MID -> FWD, then the 4 bench slots. Slots are 1-based within each group.
pub fn squad_list(
    starting_grouped: &BTreeMap<Position, Vec<Candidate>>,
    bench: &[SquadEntry],
    view: ViewMode,
) -> Vec<SlottedEntry> {
    let mut list = Vec::new();
    let mut slot = 0usize;
    for position in Position::ALL {
        for candidate in starting_grouped.get(&position).into_iter().flatten() {
            slot += 1;
            list.push(SlottedEntry {
                entry: entry(candidate, view),
                role: SlotRole::Starting,
                slot,
            });
        }
    }
    for (index, bench_entry) in bench.iter().enumerate() {
        list.push(SlottedEntry {
            entry: bench_entry.clone(),
            role: SlotRole::Bench,
            slot: index + 1,
        });
    }
    list
}
