use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::{Candidate, Position};
use crate::squad::selector::{pick_bench, pick_starting_xi, SelectionState};
use crate::squad::{
    assembler, CandidateFilter, CandidatePool, Diagnostics, FailureKind, FiltersEcho,
    SquadFailure, SquadRecommendation, SquadRequest, SquadRules, SquadSummary,
};

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn team_count_keys(counts: &BTreeMap<i64, usize>) -> BTreeMap<String, usize> {
    counts
        .iter()
        .map(|(team_id, count)| (team_id.to_string(), *count))
        .collect()
}

fn have_by_position(rows: &[Candidate]) -> BTreeMap<Position, usize> {
    let mut have: BTreeMap<Position, usize> = Position::ALL.iter().map(|&p| (p, 0)).collect();
    for candidate in rows {
        *have.entry(candidate.position).or_insert(0) += 1;
    }
    have
}

/// One-shot squad build: bucket the pool, assemble a starting XI, fill the
/// bench, and serialize the result. Every failure path returns a structured
/// diagnostic payload instead of an error.
pub fn build_squad(
    candidates: Vec<Candidate>,
    request: &SquadRequest,
    rules: &SquadRules,
) -> Result<SquadRecommendation, SquadFailure> {
    let filters = FiltersEcho::new(request, rules);
    let filter = CandidateFilter::from_request(request);
    let pool = CandidatePool::build(candidates, &filter);
    let candidates_count = pool.counts();

    let fail = |kind: FailureKind, diagnostics: Diagnostics| SquadFailure {
        target_gw: Some(request.target_gw),
        model_name: request.model_name.clone(),
        generated_at: Utc::now(),
        filters: Some(filters.clone()),
        kind,
        error: kind.to_string(),
        diagnostics,
    };

    // Quick fail on raw counts, before any allocation attempt.
    let missing = pool.missing_for(&rules.quota);
    if !missing.is_empty() {
        warn!(
            target_gw = request.target_gw,
            missing = missing.len(),
            "candidate pool cannot cover the quota"
        );
        return Err(fail(
            FailureKind::InsufficientCandidates,
            Diagnostics {
                missing_by_position: Some(missing),
                candidates_count: Some(candidates_count),
                ..Diagnostics::default()
            },
        ));
    }

    let mut state = SelectionState::default();
    let starting = pick_starting_xi(
        &pool,
        rules,
        request.budget_m,
        request.max_per_team,
        &mut state,
    );

    let starting_have = have_by_position(&starting.picked);
    let starting_done =
        Position::ALL.iter().all(|&p| starting_have[&p] >= rules.formation.get(p));
    if !starting_done {
        let kind = if starting.guard_hit {
            FailureKind::GuardExceeded
        } else {
            FailureKind::StuckBuildingStarting
        };
        return Err(fail(
            kind,
            Diagnostics {
                reasons: starting.reasons,
                starting_have: Some(starting_have),
                spent_m: Some(round1(request.budget_m - starting.remaining_budget_m)),
                remaining_m: Some(round1(starting.remaining_budget_m)),
                team_counts: Some(team_count_keys(&state.team_counts)),
                candidates_count: Some(candidates_count),
                ..Diagnostics::default()
            },
        ));
    }
    debug!(
        spent_m = request.budget_m - starting.remaining_budget_m,
        "starting XI complete"
    );

    let bench = pick_bench(
        &pool,
        rules,
        starting.remaining_budget_m,
        request.max_per_team,
        &mut state,
    );

    let final_rows: Vec<Candidate> = starting
        .picked
        .iter()
        .chain(bench.picked.iter())
        .cloned()
        .collect();
    let final_have = have_by_position(&final_rows);
    let squad_done = Position::ALL.iter().all(|&p| final_have[&p] >= rules.quota.get(p))
        && final_rows.len() == rules.quota.total();
    if !squad_done {
        let kind = if bench.guard_hit {
            FailureKind::GuardExceeded
        } else {
            FailureKind::StuckBuildingBench
        };
        let mut reasons = starting.reasons;
        reasons.extend(bench.reasons);
        reasons.truncate(rules.max_reasons);
        return Err(fail(
            kind,
            Diagnostics {
                reasons,
                have_by_position: Some(final_have),
                spent_m: Some(round1(request.budget_m - bench.remaining_budget_m)),
                remaining_m: Some(round1(bench.remaining_budget_m)),
                team_counts: Some(team_count_keys(&state.team_counts)),
                candidates_count: Some(candidates_count),
                hint: Some(
                    "try relaxing filters (e.g. max_cost, min_predicted_points, or status=all)"
                        .to_string(),
                ),
                ..Diagnostics::default()
            },
        ));
    }

    let starting_grouped = assembler::group_by_position(&starting.picked);
    let bench_grouped = assembler::group_by_position(&bench.picked);
    let bench_entries = assembler::bench_list(&bench_grouped, request.view);
    let squad_entries =
        assembler::squad_list(&starting_grouped, &bench_entries, request.view);

    let spent_m = request.budget_m - bench.remaining_budget_m;
    Ok(SquadRecommendation {
        target_gw: request.target_gw,
        model_name: request.model_name.clone(),
        generated_at: Utc::now(),
        filters,
        summary: SquadSummary {
            spent_m: round1(spent_m),
            remaining_m: round1(bench.remaining_budget_m),
            team_counts: team_count_keys(&state.team_counts),
            squad_counts: final_have,
        },
        starting_xi: assembler::position_views(&starting_grouped, request.view),
        bench: assembler::position_views(&bench_grouped, request.view),
        bench_list: bench_entries,
        squad_list: squad_entries,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::domain::{test_candidate, StatusFilter};
    use crate::squad::{ViewMode, BUDGET_EPSILON};

    fn request() -> SquadRequest {
        SquadRequest {
            target_gw: 5,
            model_name: "baseline_rollavg_v0".to_string(),
            status: StatusFilter::Available,
            max_cost: None,
            min_predicted_points: None,
            budget_m: 100.0,
            max_per_team: 3,
            view: ViewMode::Compact,
        }
    }

    /// Exactly quota-many candidates per position, spread over enough teams
    /// that the cap never binds, all affordable.
    fn exact_pool() -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let mut id = 0;
        for (position, count) in [
            (Position::Gkp, 2usize),
            (Position::Def, 5),
            (Position::Mid, 5),
            (Position::Fwd, 3),
        ] {
            for _ in 0..count {
                id += 1;
                candidates.push(test_candidate(id, position, id % 8 + 1, 50, 4.0 + id as f64));
            }
        }
        candidates
    }

    /// A deeper pool: several options per slot across many teams.
    fn rich_pool() -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let mut id = 0;
        for (position, count) in [
            (Position::Gkp, 6usize),
            (Position::Def, 12),
            (Position::Mid, 12),
            (Position::Fwd, 8),
        ] {
            for slot in 0..count {
                id += 1;
                let team_id = id % 10 + 1;
                let now_cost = 40 + (slot as i64 % 6) * 15;
                let points = 2.0 + (id % 7) as f64 + slot as f64 * 0.3;
                candidates.push(test_candidate(id, position, team_id, now_cost, points));
            }
        }
        candidates
    }

    #[test]
    fn exact_quota_pool_builds_and_spends_everything() {
        let candidates = exact_pool();
        let expected_spend: f64 = candidates.iter().map(|c| c.cost()).sum();
        let built = build_squad(candidates, &request(), &SquadRules::default()).unwrap();

        assert_eq!(built.squad_list.len(), 15);
        assert_eq!(built.bench_list.len(), 4);
        assert!((built.summary.spent_m - expected_spend).abs() < 0.05 + BUDGET_EPSILON);
        for position in Position::ALL {
            assert_eq!(
                built.summary.squad_counts[&position],
                SquadRules::default().quota.get(position)
            );
        }
    }

    #[test]
    fn squad_ids_are_disjoint_and_complete() {
        let built = build_squad(rich_pool(), &request(), &SquadRules::default()).unwrap();
        let ids: BTreeSet<i64> = built
            .squad_list
            .iter()
            .map(|slotted| slotted.entry.player_id())
            .collect();
        assert_eq!(ids.len(), 15);
    }

    #[test]
    fn starting_counts_match_formation() {
        let rules = SquadRules::default();
        let built = build_squad(rich_pool(), &request(), &rules).unwrap();
        for position in Position::ALL {
            assert_eq!(
                built.starting_xi[&position].len(),
                rules.formation.get(position)
            );
            assert_eq!(
                built.bench[&position].len(),
                rules.quota.get(position) - rules.formation.get(position)
            );
        }
    }

    #[test]
    fn team_cap_is_never_exceeded() {
        // one team holds six midfielders that outscore everyone else
        let mut candidates = rich_pool();
        let mut boosted = 0;
        for candidate in candidates.iter_mut() {
            if candidate.position == Position::Mid && boosted < 6 {
                candidate.team_id = 1;
                candidate.predicted_points += 50.0;
                boosted += 1;
            }
        }
        let built = build_squad(candidates, &request(), &SquadRules::default()).unwrap();
        for count in built.summary.team_counts.values() {
            assert!(*count <= 3);
        }
        assert!(built.summary.team_counts.get("1").copied().unwrap_or(0) <= 3);
    }

    #[test]
    fn final_spend_stays_within_budget() {
        let built = build_squad(rich_pool(), &request(), &SquadRules::default()).unwrap();
        assert!(built.summary.spent_m <= 100.0 + BUDGET_EPSILON);
        assert!(built.summary.remaining_m >= -BUDGET_EPSILON);
    }

    #[test]
    fn identical_inputs_build_identical_squads() {
        let first = build_squad(rich_pool(), &request(), &SquadRules::default()).unwrap();
        let second = build_squad(rich_pool(), &request(), &SquadRules::default()).unwrap();
        let mut a = serde_json::to_value(&first).unwrap();
        let mut b = serde_json::to_value(&second).unwrap();
        // generated_at is the only wall-clock field
        a.as_object_mut().unwrap().remove("generated_at");
        b.as_object_mut().unwrap().remove("generated_at");
        assert_eq!(a, b);
    }

    #[test]
    fn missing_position_fails_fast_with_counts() {
        let candidates: Vec<Candidate> = exact_pool()
            .into_iter()
            .filter(|c| c.position != Position::Fwd)
            .collect();
        let failure = build_squad(candidates, &request(), &SquadRules::default()).unwrap_err();
        assert_eq!(failure.kind, FailureKind::InsufficientCandidates);
        let missing = failure.diagnostics.missing_by_position.unwrap();
        let fwd = missing.get(&Position::Fwd).unwrap();
        assert_eq!(fwd.need, 3);
        assert_eq!(fwd.have, 0);
    }

    #[test]
    fn starved_budget_reports_stuck_with_reasons() {
        let mut req = request();
        req.budget_m = 50.0;
        // every candidate costs 9.0m; 15 picks need 135m
        let mut candidates = rich_pool();
        for candidate in candidates.iter_mut() {
            candidate.now_cost = 90;
        }
        let failure = build_squad(candidates, &req, &SquadRules::default()).unwrap_err();
        assert!(matches!(
            failure.kind,
            FailureKind::StuckBuildingStarting | FailureKind::StuckBuildingBench
        ));
        assert!(!failure.diagnostics.reasons.is_empty());
    }

    #[test]
    fn filtered_status_drops_unavailable_candidates() {
        let mut candidates = rich_pool();
        for candidate in candidates.iter_mut() {
            if candidate.position == Position::Fwd {
                candidate.status = "i".to_string();
            }
        }
        let failure = build_squad(candidates, &request(), &SquadRules::default()).unwrap_err();
        assert_eq!(failure.kind, FailureKind::InsufficientCandidates);
    }
}
