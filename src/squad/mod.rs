pub mod assembler;
pub mod builder;
pub mod feasibility;
pub mod pool;
pub mod ranking;
pub mod selector;

pub use builder::build_squad;
pub use pool::{CandidateFilter, CandidatePool};

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Position, StatusFilter};

/// Tolerance for budget comparisons so exact-budget squads do not fail on
/// floating-point representation.
pub const BUDGET_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionCounts {
    #[serde(rename = "GKP")]
    pub gkp: usize,
    #[serde(rename = "DEF")]
    pub def: usize,
    #[serde(rename = "MID")]
    pub mid: usize,
    #[serde(rename = "FWD")]
    pub fwd: usize,
}

impl PositionCounts {
    pub fn get(&self, position: Position) -> usize {
        match position {
            Position::Gkp => self.gkp,
            Position::Def => self.def,
            Position::Mid => self.mid,
            Position::Fwd => self.fwd,
        }
    }

    pub fn total(&self) -> usize {
        self.gkp + self.def + self.mid + self.fwd
    }

    /// Full-squad quota: 2 GKP / 5 DEF / 5 MID / 3 FWD.
    pub fn squad_default() -> Self {
        Self {
            gkp: 2,
            def: 5,
            mid: 5,
            fwd: 3,
        }
    }

    /// Default starting formation: one goalkeeper plus 3-4-3.
    pub fn formation_default() -> Self {
        Self {
            gkp: 1,
            def: 3,
            mid: 4,
            fwd: 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum SquadRulesError {
    #[error("formation requires {formation} {position} but the quota allows only {quota}")]
    FormationExceedsQuota {
        position: Position,
        formation: usize,
        quota: usize,
    },
}

/// Everything the builder needs besides the candidates themselves. Passed
/// per call so differently-configured builds can run side by side.
#[derive(Debug, Clone)]
pub struct SquadRules {
    pub quota: PositionCounts,
    pub formation: PositionCounts,
    pub starting_cycle: [Position; 4],
    pub bench_cycle: [Position; 4],
    pub starting_guard: u32,
    pub bench_guard: u32,
    pub max_reasons: usize,
}

impl Default for SquadRules {
    fn default() -> Self {
        Self {
            quota: PositionCounts::squad_default(),
            formation: PositionCounts::formation_default(),
            // Cheap, plentiful positions first keeps budget flexibility for
            // the scarce ones.
            starting_cycle: [Position::Fwd, Position::Mid, Position::Def, Position::Gkp],
            bench_cycle: [Position::Gkp, Position::Def, Position::Mid, Position::Fwd],
            starting_guard: 2000,
            bench_guard: 3000,
            max_reasons: 6,
        }
    }
}

impl SquadRules {
    pub fn validate(&self) -> Result<(), SquadRulesError> {
        for position in Position::ALL {
            let formation = self.formation.get(position);
            let quota = self.quota.get(position);
            if formation > quota {
                return Err(SquadRulesError::FormationExceedsQuota {
                    position,
                    formation,
                    quota,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Compact,
    Full,
}

impl Display for ViewMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compact => write!(f, "compact"),
            Self::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown view mode: {0} (expected \"compact\" or \"full\")")]
pub struct ViewModeParseError(pub String);

impl FromStr for ViewMode {
    type Err = ViewModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "full" => Ok(Self::Full),
            _ => Err(ViewModeParseError(s.to_string())),
        }
    }
}

pub const BUDGET_MIN_M: f64 = 50.0;
pub const BUDGET_MAX_M: f64 = 200.0;
pub const MAX_PER_TEAM_MIN: usize = 1;
pub const MAX_PER_TEAM_MAX: usize = 3;

#[derive(Debug, Error)]
pub enum InvalidSquadRequest {
    #[error("budget_m must be between {BUDGET_MIN_M} and {BUDGET_MAX_M}, got {0}")]
    BudgetOutOfRange(f64),
    #[error("max_per_team must be between {MAX_PER_TEAM_MIN} and {MAX_PER_TEAM_MAX}, got {0}")]
    MaxPerTeamOutOfRange(usize),
    #[error("max_cost must be non-negative, got {0}")]
    NegativeMaxCost(f64),
    #[error("min_predicted_points must be non-negative, got {0}")]
    NegativeMinPoints(f64),
}

#[derive(Debug, Clone)]
pub struct SquadRequest {
    pub target_gw: u32,
    pub model_name: String,
    pub status: StatusFilter,
    pub max_cost: Option<f64>,
    pub min_predicted_points: Option<f64>,
    pub budget_m: f64,
    pub max_per_team: usize,
    pub view: ViewMode,
}

impl SquadRequest {
    pub fn validate(&self) -> Result<(), InvalidSquadRequest> {
        if !(BUDGET_MIN_M..=BUDGET_MAX_M).contains(&self.budget_m) {
            return Err(InvalidSquadRequest::BudgetOutOfRange(self.budget_m));
        }
        if !(MAX_PER_TEAM_MIN..=MAX_PER_TEAM_MAX).contains(&self.max_per_team) {
            return Err(InvalidSquadRequest::MaxPerTeamOutOfRange(self.max_per_team));
        }
        if let Some(max_cost) = self.max_cost {
            if max_cost < 0.0 {
                return Err(InvalidSquadRequest::NegativeMaxCost(max_cost));
            }
        }
        if let Some(min_points) = self.min_predicted_points {
            if min_points < 0.0 {
                return Err(InvalidSquadRequest::NegativeMinPoints(min_points));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FiltersEcho {
    pub status: StatusFilter,
    pub max_cost: Option<f64>,
    pub min_predicted_points: Option<f64>,
    pub budget_m: f64,
    pub max_per_team: usize,
    pub rules: PositionCounts,
    pub starting_formation: PositionCounts,
    pub view: ViewMode,
}

impl FiltersEcho {
    pub fn new(request: &SquadRequest, rules: &SquadRules) -> Self {
        Self {
            status: request.status,
            max_cost: request.max_cost,
            min_predicted_points: request.min_predicted_points,
            budget_m: request.budget_m,
            max_per_team: request.max_per_team,
            rules: rules.quota,
            starting_formation: rules.formation,
            view: request.view,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactEntry {
    pub name: String,
    pub position: Position,
    pub team: String,
    pub cost_m: f64,
    pub predicted_points: f64,
    pub value: f64,
    pub player_id: i64,
    pub fpl_player_id: i64,
    pub team_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullEntry {
    pub prediction_id: i64,
    pub player_id: i64,
    pub target_gw: u32,
    pub model_name: String,
    pub predicted_points: f64,
    pub value: f64,
    pub created_at: Option<DateTime<Utc>>,
    pub fpl_player_id: i64,
    pub web_name: String,
    pub position: Position,
    pub now_cost: i64,
    pub status: String,
    pub team_id: i64,
    pub team_short_name: String,
    pub team_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SquadEntry {
    Compact(CompactEntry),
    Full(FullEntry),
}

impl SquadEntry {
    pub fn player_id(&self) -> i64 {
        match self {
            Self::Compact(entry) => entry.player_id,
            Self::Full(entry) => entry.player_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Compact(entry) => &entry.name,
            Self::Full(entry) => &entry.web_name,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Self::Compact(entry) => entry.position,
            Self::Full(entry) => entry.position,
        }
    }

    pub fn team_label(&self) -> &str {
        match self {
            Self::Compact(entry) => &entry.team,
            Self::Full(entry) => &entry.team_short_name,
        }
    }

    pub fn cost_m(&self) -> f64 {
        match self {
            Self::Compact(entry) => entry.cost_m,
            Self::Full(entry) => entry.now_cost as f64 / 10.0,
        }
    }

    pub fn predicted_points(&self) -> f64 {
        match self {
            Self::Compact(entry) => entry.predicted_points,
            Self::Full(entry) => entry.predicted_points,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Self::Compact(entry) => entry.value,
            Self::Full(entry) => entry.value,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotRole {
    Starting,
    Bench,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlottedEntry {
    #[serde(flatten)]
    pub entry: SquadEntry,
    pub role: SlotRole,
    pub slot: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SquadSummary {
    pub spent_m: f64,
    pub remaining_m: f64,
    pub team_counts: BTreeMap<String, usize>,
    pub squad_counts: BTreeMap<Position, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SquadRecommendation {
    pub target_gw: u32,
    pub model_name: String,
    pub generated_at: DateTime<Utc>,
    pub filters: FiltersEcho,
    pub summary: SquadSummary,
    pub starting_xi: BTreeMap<Position, Vec<SquadEntry>>,
    pub bench: BTreeMap<Position, Vec<SquadEntry>>,
    pub bench_list: Vec<SquadEntry>,
    pub squad_list: Vec<SlottedEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Error)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[error("no next gameweek is marked; ingest gameweeks first")]
    NoNextGameweek,
    #[error("not enough candidates to satisfy squad rules under current filters")]
    InsufficientCandidates,
    #[error("failed to build a valid starting XI with current constraints")]
    StuckBuildingStarting,
    #[error("failed to build a valid squad with current constraints")]
    StuckBuildingBench,
    #[error("iteration guard exceeded while building the squad")]
    GuardExceeded,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NeedHave {
    pub need: usize,
    pub have: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_by_position: Option<BTreeMap<Position, NeedHave>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_have: Option<BTreeMap<Position, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub have_by_position: Option<BTreeMap<Position, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spent_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_counts: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates_count: Option<BTreeMap<Position, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SquadFailure {
    pub target_gw: Option<u32>,
    pub model_name: String,
    pub generated_at: DateTime<Utc>,
    pub filters: Option<FiltersEcho>,
    pub kind: FailureKind,
    pub error: String,
    pub diagnostics: Diagnostics,
}

impl SquadFailure {
    pub fn new(kind: FailureKind, model_name: impl Into<String>) -> Self {
        Self {
            target_gw: None,
            model_name: model_name.into(),
            generated_at: Utc::now(),
            filters: None,
            kind,
            error: kind.to_string(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn no_next_gameweek(model_name: impl Into<String>) -> Self {
        Self::new(FailureKind::NoNextGameweek, model_name)
    }
}

/// A squad build always produces a structured payload; infeasibility is a
/// normal outcome, not a transport error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SquadOutcome {
    Built(Box<SquadRecommendation>),
    Failed(Box<SquadFailure>),
}

impl From<Result<SquadRecommendation, SquadFailure>> for SquadOutcome {
    fn from(result: Result<SquadRecommendation, SquadFailure>) -> Self {
        match result {
            Ok(recommendation) => Self::Built(Box::new(recommendation)),
            Err(failure) => Self::Failed(Box::new(failure)),
        }
    }
}
