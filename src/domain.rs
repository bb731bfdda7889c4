use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Gkp,
    Def,
    Mid,
    Fwd,
}

impl Position {
    pub const ALL: [Position; 4] = [Position::Gkp, Position::Def, Position::Mid, Position::Fwd];

    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Gkp => "GKP",
            Self::Def => "DEF",
            Self::Mid => "MID",
            Self::Fwd => "FWD",
        }
    }

    pub fn from_element_type(element_type: i64) -> Option<Self> {
        match element_type {
            1 => Some(Self::Gkp),
            2 => Some(Self::Def),
            3 => Some(Self::Mid),
            4 => Some(Self::Fwd),
            _ => None,
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

#[derive(Debug, Error)]
#[error("unknown position: {0}")]
pub struct PositionParseError(pub String);

impl FromStr for Position {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GKP" | "GK" | "GOALKEEPER" => Ok(Self::Gkp),
            "DEF" | "DEFENDER" => Ok(Self::Def),
            "MID" | "MIDFIELDER" => Ok(Self::Mid),
            "FWD" | "FORWARD" => Ok(Self::Fwd),
            _ => Err(PositionParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    Available,
    All,
}

impl StatusFilter {
    pub fn accepts(&self, status: &str) -> bool {
        match self {
            Self::Available => status == "a",
            Self::All => true,
        }
    }
}

impl Display for StatusFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown status filter: {0} (expected \"available\" or \"all\")")]
pub struct StatusFilterParseError(pub String);

impl FromStr for StatusFilter {
    type Err = StatusFilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" | "a" => Ok(Self::Available),
            "all" => Ok(Self::All),
            _ => Err(StatusFilterParseError(s.to_string())),
        }
    }
}

/// One scored, costed pick option: a prediction row joined with its player
/// and team display fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub prediction_id: i64,
    pub player_id: i64,
    pub fpl_player_id: i64,
    pub web_name: String,
    pub position: Position,
    pub now_cost: i64,
    pub status: String,
    pub team_id: i64,
    pub team_name: String,
    pub team_short_name: String,
    pub target_gw: u32,
    pub model_name: String,
    pub predicted_points: f64,
    pub created_at: Option<DateTime<Utc>>,
}

impl Candidate {
    /// Price in millions; the upstream feed stores price x 10 as an integer.
    pub fn cost(&self) -> f64 {
        self.now_cost as f64 / 10.0
    }

    /// Predicted points per million. Cost is floored at 0.1 so a zero-priced
    /// row cannot divide by zero.
    pub fn value(&self) -> f64 {
        let cost = self.cost();
        let denom = if cost > 0.0 { cost } else { 0.1 };
        self.predicted_points / denom
    }
}

#[cfg(test)]
pub(crate) fn test_candidate(
    player_id: i64,
    position: Position,
    team_id: i64,
    now_cost: i64,
    predicted_points: f64,
) -> Candidate {
    Candidate {
        prediction_id: player_id,
        player_id,
        fpl_player_id: player_id + 1000,
        web_name: format!("Player{player_id}"),
        position,
        now_cost,
        status: "a".to_string(),
        team_id,
        team_name: format!("Team {team_id}"),
        team_short_name: format!("T{team_id:02}"),
        target_gw: 1,
        model_name: "baseline_rollavg_v0".to_string(),
        predicted_points,
        created_at: None,
    }
}
