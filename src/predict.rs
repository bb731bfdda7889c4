use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::info;

use crate::store::{SquadStore, UpsertOutcome};

pub const DEFAULT_MODEL: &str = "baseline_rollavg_v0";
pub const DEFAULT_WINDOW: usize = 5;
pub const MAX_WINDOW: usize = 10;

/// A scoring model turns a player's recent per-gameweek points into a
/// predicted score. Models are deliberately tiny and swappable.
pub trait ScoringModel: Send + Sync {
    fn name(&self) -> &str;
    fn predict(&self, recent_points: &[f64]) -> f64;
}

/// Baseline: plain average of the points handed in (the caller limits the
/// history to the rolling window).
#[derive(Debug, Clone, Copy)]
pub struct RollingAverage;

impl ScoringModel for RollingAverage {
    fn name(&self) -> &str {
        DEFAULT_MODEL
    }

    fn predict(&self, recent_points: &[f64]) -> f64 {
        if recent_points.is_empty() {
            return 0.0;
        }
        recent_points.iter().sum::<f64>() / recent_points.len() as f64
    }
}

#[derive(Clone)]
pub struct ModelRegistry {
    models: Vec<Arc<dyn ScoringModel>>,
}

impl ModelRegistry {
    pub fn with_defaults() -> Self {
        Self {
            models: vec![Arc::new(RollingAverage)],
        }
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn ScoringModel>> {
        self.models.iter().find(|m| m.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name()).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelRun {
    pub target_gw: u32,
    pub window: usize,
    pub used_finished_gws: Vec<u32>,
    pub model_name: String,
    pub inserted: u64,
    pub updated: u64,
    pub total_players_predicted: u64,
}

/// Score every player with stats in the last `window` finished gameweeks
/// and upsert the results for `target_gw`.
pub fn run_model(
    store: &SquadStore,
    model: &dyn ScoringModel,
    target_gw: u32,
    window: usize,
) -> Result<ModelRun> {
    let mut finished = store.finished_gameweeks(window)?;
    if finished.is_empty() {
        return Err(anyhow!(
            "no finished gameweeks found; ingest gameweeks first"
        ));
    }
    finished.sort_unstable();

    let history = store.points_history_over(&finished)?;
    let mut inserted = 0u64;
    let mut updated = 0u64;
    for (&player_id, points) in &history {
        let predicted = model.predict(points);
        match store.upsert_prediction(player_id, target_gw, model.name(), predicted)? {
            UpsertOutcome::Inserted => inserted += 1,
            UpsertOutcome::Updated | UpsertOutcome::Unchanged => updated += 1,
        }
    }

    info!(
        target_gw,
        model = model.name(),
        players = history.len(),
        "prediction run complete"
    );
    Ok(ModelRun {
        target_gw,
        window,
        used_finished_gws: finished,
        model_name: model.name().to_string(),
        inserted,
        updated,
        total_players_predicted: history.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Position;
    use crate::store::{GameweekUpsert, GwStatUpsert, PlayerUpsert, TeamUpsert};

    #[test]
    fn rolling_average_is_a_plain_mean() {
        let model = RollingAverage;
        assert_eq!(model.predict(&[]), 0.0);
        assert_eq!(model.predict(&[2.0, 4.0, 9.0]), 5.0);
    }

    #[test]
    fn registry_resolves_default_model() {
        let registry = ModelRegistry::with_defaults();
        assert!(registry.by_name(DEFAULT_MODEL).is_some());
        assert!(registry.by_name("nonexistent").is_none());
        assert_eq!(registry.names(), vec![DEFAULT_MODEL]);
    }

    #[test]
    fn run_requires_finished_gameweeks() {
        let store = SquadStore::open_in_memory().unwrap();
        let result = run_model(&store, &RollingAverage, 3, DEFAULT_WINDOW);
        assert!(result.is_err());
    }

    #[test]
    fn run_averages_only_the_window() {
        let store = SquadStore::open_in_memory().unwrap();
        store
            .upsert_team(&TeamUpsert {
                fpl_team_id: 1,
                name: "Arsenal".to_string(),
                short_name: "ARS".to_string(),
            })
            .unwrap();
        let team_id = store.team_id_by_fpl(1).unwrap().unwrap();
        store
            .upsert_player(&PlayerUpsert {
                fpl_player_id: 10,
                first_name: "A".to_string(),
                second_name: "B".to_string(),
                web_name: "AB".to_string(),
                team_id,
                position: Position::Mid,
                now_cost: 60,
                status: "a".to_string(),
            })
            .unwrap();
        let player_id = store.player_id_by_fpl(10).unwrap().unwrap();

        for gw in 1..=4u32 {
            store
                .upsert_gameweek(&GameweekUpsert {
                    gw,
                    deadline_time: None,
                    is_current: false,
                    is_next: false,
                    is_finished: true,
                    name: None,
                })
                .unwrap();
            store
                .upsert_gw_stat(&GwStatUpsert {
                    player_id,
                    gw,
                    minutes: 90,
                    goals_scored: 0,
                    assists: 0,
                    clean_sheets: 0,
                    total_points: gw as i64,
                })
                .unwrap();
        }

        // window 2 -> gameweeks 3 and 4 -> mean 3.5
        let run = run_model(&store, &RollingAverage, 5, 2).unwrap();
        assert_eq!(run.used_finished_gws, vec![3, 4]);
        assert_eq!(run.inserted, 1);
        assert_eq!(run.total_players_predicted, 1);

        let candidates_total = store.list_predictions(5, 10, 0).unwrap();
        assert_eq!(candidates_total.0, 1);
        assert!((candidates_total.1[0].predicted_points - 3.5).abs() < 1e-9);

        // second run upserts in place
        let run = run_model(&store, &RollingAverage, 5, 2).unwrap();
        assert_eq!(run.inserted, 0);
        assert_eq!(run.updated, 1);
    }
}
