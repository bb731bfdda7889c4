use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error};

use crate::domain::{Candidate, Position};
use crate::squad::feasibility::can_complete;
use crate::squad::ranking::{rank, Strategy};
use crate::squad::{CandidatePool, PositionCounts, SquadRules, BUDGET_EPSILON};

/// Working state of one in-progress build. Cloned wholesale for speculative
/// commits: a pick is applied to a copy, the copy is validated by the
/// feasibility check, and then either kept or dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub selected_ids: BTreeSet<i64>,
    pub team_counts: BTreeMap<i64, usize>,
    pub total_have: BTreeMap<Position, usize>,
    pub starting_have: BTreeMap<Position, usize>,
}

impl SelectionState {
    pub fn have(&self, position: Position) -> usize {
        self.total_have.get(&position).copied().unwrap_or(0)
    }

    pub fn starting(&self, position: Position) -> usize {
        self.starting_have.get(&position).copied().unwrap_or(0)
    }

    pub fn team_count(&self, team_id: i64) -> usize {
        self.team_counts.get(&team_id).copied().unwrap_or(0)
    }

    fn commit(&mut self, candidate: &Candidate, starting_phase: bool) {
        self.selected_ids.insert(candidate.player_id);
        *self.team_counts.entry(candidate.team_id).or_insert(0) += 1;
        *self.total_have.entry(candidate.position).or_insert(0) += 1;
        if starting_phase {
            *self.starting_have.entry(candidate.position).or_insert(0) += 1;
        }
    }

    pub fn remaining_needed(&self, quota: &PositionCounts) -> BTreeMap<Position, usize> {
        Position::ALL
            .iter()
            .map(|&p| (p, quota.get(p).saturating_sub(self.have(p))))
            .collect()
    }
}

#[derive(Debug)]
pub struct PickOutcome {
    pub picked: Vec<Candidate>,
    pub remaining_budget_m: f64,
    pub reasons: Vec<String>,
    pub guard_hit: bool,
}

fn push_reason(reasons: &mut Vec<String>, cap: usize, reason: String) {
    if reasons.len() < cap {
        reasons.push(reason);
    }
}

/// Walk a ranked bucket and commit the first candidate whose speculative
/// pick still leaves the full quota completable. Returns the pick, or the
/// reason the whole bucket was exhausted.
fn try_pick_one(
    position: Position,
    ordered: &[Candidate],
    pool: &CandidatePool,
    state: &mut SelectionState,
    quota: &PositionCounts,
    formation: Option<&PositionCounts>,
    max_per_team: usize,
    remaining_budget_m: f64,
) -> Result<Candidate, String> {
    if state.have(position) >= quota.get(position) {
        return Err(format!("position {position} already full for the squad"));
    }
    if let Some(formation) = formation {
        if state.starting(position) >= formation.get(position) {
            return Err(format!("position {position} already full for the starting XI"));
        }
    }

    for candidate in ordered {
        if state.selected_ids.contains(&candidate.player_id) {
            continue;
        }
        if state.team_count(candidate.team_id) >= max_per_team {
            continue;
        }
        let cost = candidate.cost();
        if cost > remaining_budget_m + BUDGET_EPSILON {
            continue;
        }

        let mut trial = state.clone();
        trial.commit(candidate, formation.is_some());

        let remaining_needed = trial.remaining_needed(quota);
        let feasible = can_complete(
            remaining_budget_m - cost,
            &remaining_needed,
            pool,
            &trial.selected_ids,
            &trial.team_counts,
            max_per_team,
        );
        if feasible {
            *state = trial;
            return Ok(candidate.clone());
        }
        debug!(
            player_id = candidate.player_id,
            %position,
            "pick would strand the remaining quota, skipping"
        );
    }

    Err(format!(
        "no feasible candidate for position {position} under current constraints"
    ))
}

/// Build the starting XI by alternating ranking strategies over the fixed
/// position cycle until the formation is met or a full pass stalls.
pub fn pick_starting_xi(
    pool: &CandidatePool,
    rules: &SquadRules,
    budget_m: f64,
    max_per_team: usize,
    state: &mut SelectionState,
) -> PickOutcome {
    let ordered_points: BTreeMap<Position, Vec<Candidate>> = Position::ALL
        .iter()
        .map(|&p| (p, rank(pool.bucket(p), Strategy::Points)))
        .collect();
    let ordered_value: BTreeMap<Position, Vec<Candidate>> = Position::ALL
        .iter()
        .map(|&p| (p, rank(pool.bucket(p), Strategy::Value)))
        .collect();

    let mut picked = Vec::new();
    let mut reasons = Vec::new();
    let mut remaining_budget_m = budget_m;
    let mut guard_hit = false;
    let mut cycle: u32 = 0;
    let mut guard: u32 = 0;

    let starting_done = |state: &SelectionState| {
        Position::ALL
            .iter()
            .all(|&p| state.starting(p) >= rules.formation.get(p))
    };

    while !starting_done(state) {
        guard += 1;
        if guard > rules.starting_guard {
            error!(
                guard = rules.starting_guard,
                "iteration guard hit while building the starting XI"
            );
            push_reason(
                &mut reasons,
                rules.max_reasons,
                "guard hit while building the starting XI (unexpected loop)".to_string(),
            );
            guard_hit = true;
            break;
        }

        let strategy = if cycle % 2 == 0 {
            Strategy::Points
        } else {
            Strategy::Value
        };
        let ordered = match strategy {
            Strategy::Points => &ordered_points,
            Strategy::Value => &ordered_value,
        };

        let mut progress = false;
        for &position in &rules.starting_cycle {
            if state.starting(position) >= rules.formation.get(position) {
                continue;
            }
            match try_pick_one(
                position,
                &ordered[&position],
                pool,
                state,
                &rules.quota,
                Some(&rules.formation),
                max_per_team,
                remaining_budget_m,
            ) {
                Ok(candidate) => {
                    remaining_budget_m -= candidate.cost();
                    picked.push(candidate);
                    progress = true;
                }
                Err(reason) => {
                    push_reason(
                        &mut reasons,
                        rules.max_reasons,
                        format!("[starting:{strategy}] {reason}"),
                    );
                }
            }
        }

        if !progress {
            push_reason(
                &mut reasons,
                rules.max_reasons,
                "cannot progress while building the starting XI; try relaxing filters".to_string(),
            );
            break;
        }
        cycle += 1;
    }

    PickOutcome {
        picked,
        remaining_budget_m,
        reasons,
        guard_hit,
    }
}

/// Fill the remaining quota by value, on top of the state the starting
/// build left behind, so bench picks are disjoint by construction.
pub fn pick_bench(
    pool: &CandidatePool,
    rules: &SquadRules,
    budget_m: f64,
    max_per_team: usize,
    state: &mut SelectionState,
) -> PickOutcome {
    let ordered_value: BTreeMap<Position, Vec<Candidate>> = Position::ALL
        .iter()
        .map(|&p| (p, rank(pool.bucket(p), Strategy::Value)))
        .collect();

    let mut picked = Vec::new();
    let mut reasons = Vec::new();
    let mut remaining_budget_m = budget_m;
    let mut guard_hit = false;
    let mut guard: u32 = 0;

    let quota_done = |state: &SelectionState| {
        Position::ALL
            .iter()
            .all(|&p| state.have(p) >= rules.quota.get(p))
    };

    while !quota_done(state) {
        guard += 1;
        if guard > rules.bench_guard {
            error!(
                guard = rules.bench_guard,
                "iteration guard hit while building the bench"
            );
            push_reason(
                &mut reasons,
                rules.max_reasons,
                "guard hit while building the bench (unexpected loop)".to_string(),
            );
            guard_hit = true;
            break;
        }

        let mut progress = false;
        for &position in &rules.bench_cycle {
            if state.have(position) >= rules.quota.get(position) {
                continue;
            }
            match try_pick_one(
                position,
                &ordered_value[&position],
                pool,
                state,
                &rules.quota,
                None,
                max_per_team,
                remaining_budget_m,
            ) {
                Ok(candidate) => {
                    remaining_budget_m -= candidate.cost();
                    picked.push(candidate);
                    progress = true;
                }
                Err(reason) => {
                    push_reason(
                        &mut reasons,
                        rules.max_reasons,
                        format!("[bench:value] {reason}"),
                    );
                }
            }
        }

        if !progress {
            push_reason(
                &mut reasons,
                rules.max_reasons,
                "cannot progress while building the bench; try relaxing filters".to_string(),
            );
            break;
        }
    }

    PickOutcome {
        picked,
        remaining_budget_m,
        reasons,
        guard_hit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_candidate;
    use crate::squad::CandidateFilter;

    fn pool_of(candidates: Vec<Candidate>) -> CandidatePool {
        CandidatePool::build(candidates, &CandidateFilter::default())
    }

    fn small_rules() -> SquadRules {
        SquadRules {
            quota: PositionCounts {
                gkp: 1,
                def: 2,
                mid: 0,
                fwd: 0,
            },
            formation: PositionCounts {
                gkp: 1,
                def: 1,
                mid: 0,
                fwd: 0,
            },
            ..SquadRules::default()
        }
    }

    #[test]
    fn failed_trial_leaves_state_untouched() {
        // Only one GKP; committing the expensive DEF would strand it.
        let candidates = vec![
            test_candidate(1, Position::Def, 1, 95, 9.0),
            test_candidate(2, Position::Def, 2, 40, 3.0),
            test_candidate(3, Position::Def, 3, 41, 3.1),
            test_candidate(4, Position::Gkp, 4, 45, 2.0),
        ];
        let pool = pool_of(candidates);
        let rules = small_rules();
        let mut state = SelectionState::default();
        let before = state.clone();

        // budget 13.0: 9.5 DEF + 4.5 GKP overruns once the second DEF is due
        let picked = try_pick_one(
            Position::Def,
            &rank(pool.bucket(Position::Def), Strategy::Points),
            &pool,
            &mut state,
            &rules.quota,
            None,
            3,
            13.0,
        )
        .unwrap();
        // the top-ranked 9.5m defender must have been rejected and rolled back
        assert_ne!(picked.player_id, 1);
        assert_eq!(state.selected_ids.len(), 1);
        assert!(state.selected_ids.contains(&picked.player_id));
        assert!(!before.selected_ids.contains(&picked.player_id));
    }

    #[test]
    fn try_pick_respects_team_cap() {
        let candidates = vec![
            test_candidate(1, Position::Def, 7, 50, 9.0),
            test_candidate(2, Position::Def, 8, 45, 2.0),
        ];
        let pool = pool_of(candidates);
        let rules = small_rules();
        let mut state = SelectionState::default();
        state.team_counts.insert(7, 1);

        let picked = try_pick_one(
            Position::Def,
            &rank(pool.bucket(Position::Def), Strategy::Points),
            &pool,
            &mut state,
            &rules.quota,
            None,
            1,
            100.0,
        )
        .unwrap();
        assert_eq!(picked.player_id, 2);
    }

    #[test]
    fn full_position_yields_reason_not_pick() {
        let pool = pool_of(vec![test_candidate(1, Position::Gkp, 1, 45, 3.0)]);
        let rules = small_rules();
        let mut state = SelectionState::default();
        state.total_have.insert(Position::Gkp, 1);

        let result = try_pick_one(
            Position::Gkp,
            pool.bucket(Position::Gkp),
            &pool,
            &mut state,
            &rules.quota,
            None,
            3,
            100.0,
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("already full"));
    }

    #[test]
    fn bench_continues_from_starting_state() {
        let candidates = vec![
            test_candidate(1, Position::Gkp, 1, 45, 3.0),
            test_candidate(2, Position::Def, 2, 50, 5.0),
            test_candidate(3, Position::Def, 3, 40, 4.0),
        ];
        let pool = pool_of(candidates);
        let rules = small_rules();
        let mut state = SelectionState::default();

        let starting = pick_starting_xi(&pool, &rules, 100.0, 3, &mut state);
        assert_eq!(starting.picked.len(), 2);
        assert!(!starting.guard_hit);

        let bench = pick_bench(&pool, &rules, starting.remaining_budget_m, 3, &mut state);
        assert_eq!(bench.picked.len(), 1);

        let starting_ids: BTreeSet<i64> =
            starting.picked.iter().map(|c| c.player_id).collect();
        let bench_ids: BTreeSet<i64> = bench.picked.iter().map(|c| c.player_id).collect();
        assert!(starting_ids.is_disjoint(&bench_ids));
    }

    #[test]
    fn stalled_pass_reports_bounded_reasons() {
        // Nothing affordable: every pass fails on every open position.
        let candidates = vec![
            test_candidate(1, Position::Gkp, 1, 450, 3.0),
            test_candidate(2, Position::Def, 2, 500, 5.0),
            test_candidate(3, Position::Def, 3, 400, 4.0),
        ];
        let pool = pool_of(candidates);
        let rules = small_rules();
        let mut state = SelectionState::default();

        let outcome = pick_starting_xi(&pool, &rules, 60.0, 3, &mut state);
        assert!(outcome.picked.is_empty());
        assert!(!outcome.reasons.is_empty());
        assert!(outcome.reasons.len() <= rules.max_reasons);
        assert!(!outcome.guard_hit);
    }
}
