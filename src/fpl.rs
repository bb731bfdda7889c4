use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::Position;
use crate::store::{
    GameweekUpsert, GwStatUpsert, PlayerUpsert, SquadStore, TeamUpsert, UpsertOutcome,
};

pub const DEFAULT_BASE_URL: &str = "https://fantasy.premierleague.com/api";

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapEvent {
    pub id: u32,
    pub deadline_time: Option<String>,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub is_next: bool,
    #[serde(default)]
    pub finished: bool,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapTeam {
    pub id: i64,
    pub name: String,
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapElement {
    pub id: i64,
    pub first_name: String,
    pub second_name: String,
    pub web_name: String,
    pub team: i64,
    pub element_type: i64,
    pub now_cost: i64,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bootstrap {
    #[serde(default)]
    pub events: Vec<BootstrapEvent>,
    #[serde(default)]
    pub teams: Vec<BootstrapTeam>,
    #[serde(default)]
    pub elements: Vec<BootstrapElement>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LiveStats {
    #[serde(default)]
    pub minutes: i64,
    #[serde(default)]
    pub goals_scored: i64,
    #[serde(default)]
    pub assists: i64,
    #[serde(default)]
    pub clean_sheets: i64,
    #[serde(default)]
    pub total_points: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveElement {
    pub id: i64,
    #[serde(default)]
    pub stats: LiveStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventLive {
    #[serde(default)]
    pub elements: Vec<LiveElement>,
}

pub struct FplClient {
    client: Client,
    base_url: String,
}

impl FplClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("squad-oracle/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch_bootstrap(&self) -> Result<Bootstrap> {
        self.fetch_json(&format!("{}/bootstrap-static/", self.base_url))
            .await
    }

    pub async fn fetch_event_live(&self, gw: u32) -> Result<EventLive> {
        self.fetch_json(&format!("{}/event/{gw}/live/", self.base_url))
            .await
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed GET request: {url}"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed reading response body: {url}"))?;
        if !status.is_success() {
            let preview: String = body.chars().take(180).collect();
            return Err(anyhow!("GET {url} returned {status}: {preview}"));
        }
        serde_json::from_str(&body).with_context(|| format!("invalid JSON response: {url}"))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestCounts {
    pub inserted: u64,
    pub updated: u64,
    pub total_source: u64,
}

impl IngestCounts {
    fn absorb(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BootstrapIngest {
    pub teams: IngestCounts,
    pub gameweeks: IngestCounts,
    pub players: IngestCounts,
    pub skipped_players: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GwStatsIngest {
    pub gw: u32,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub total_source: u64,
}

fn parse_deadline(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Upsert teams, gameweeks, then players from a bootstrap payload. Players
/// referencing an unknown team or element type are skipped and counted.
pub fn ingest_bootstrap(store: &SquadStore, data: &Bootstrap) -> Result<BootstrapIngest> {
    let mut summary = BootstrapIngest::default();

    summary.teams.total_source = data.teams.len() as u64;
    for team in &data.teams {
        let short_name = team.short_name.clone().unwrap_or_else(|| team.name.clone());
        let outcome = store.upsert_team(&TeamUpsert {
            fpl_team_id: team.id,
            name: team.name.clone(),
            short_name,
        })?;
        summary.teams.absorb(outcome);
    }

    summary.gameweeks.total_source = data.events.len() as u64;
    for event in &data.events {
        let outcome = store.upsert_gameweek(&GameweekUpsert {
            gw: event.id,
            deadline_time: parse_deadline(event.deadline_time.as_deref()),
            is_current: event.is_current,
            is_next: event.is_next,
            is_finished: event.finished,
            name: event.name.clone(),
        })?;
        summary.gameweeks.absorb(outcome);
    }

    summary.players.total_source = data.elements.len() as u64;
    for element in &data.elements {
        let Some(position) = Position::from_element_type(element.element_type) else {
            warn!(
                fpl_player_id = element.id,
                element_type = element.element_type,
                "skipping player with unknown element type"
            );
            summary.skipped_players += 1;
            continue;
        };
        let Some(team_id) = store.team_id_by_fpl(element.team)? else {
            warn!(
                fpl_player_id = element.id,
                fpl_team_id = element.team,
                "skipping player with unknown team"
            );
            summary.skipped_players += 1;
            continue;
        };
        let outcome = store.upsert_player(&PlayerUpsert {
            fpl_player_id: element.id,
            first_name: element.first_name.clone(),
            second_name: element.second_name.clone(),
            web_name: element.web_name.clone(),
            team_id,
            position,
            now_cost: element.now_cost,
            status: element.status.clone(),
        })?;
        summary.players.absorb(outcome);
    }

    info!(
        teams = summary.teams.inserted + summary.teams.updated,
        gameweeks = summary.gameweeks.inserted + summary.gameweeks.updated,
        players = summary.players.inserted + summary.players.updated,
        skipped = summary.skipped_players,
        "bootstrap ingest applied"
    );
    Ok(summary)
}

/// Upsert one gameweek's per-player stats from an event-live payload.
/// Elements without a matching stored player are skipped and counted.
pub fn ingest_gw_stats(store: &SquadStore, gw: u32, data: &EventLive) -> Result<GwStatsIngest> {
    let mut inserted = 0u64;
    let mut updated = 0u64;
    let mut skipped = 0u64;

    for element in &data.elements {
        let Some(player_id) = store.player_id_by_fpl(element.id)? else {
            skipped += 1;
            continue;
        };
        let outcome = store.upsert_gw_stat(&GwStatUpsert {
            player_id,
            gw,
            minutes: element.stats.minutes,
            goals_scored: element.stats.goals_scored,
            assists: element.stats.assists,
            clean_sheets: element.stats.clean_sheets,
            total_points: element.stats.total_points,
        })?;
        match outcome {
            UpsertOutcome::Inserted => inserted += 1,
            UpsertOutcome::Updated => updated += 1,
            UpsertOutcome::Unchanged => {}
        }
    }

    info!(gw, inserted, updated, skipped, "gameweek stats ingest applied");
    Ok(GwStatsIngest {
        gw,
        inserted,
        updated,
        skipped,
        total_source: data.elements.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrap() -> Bootstrap {
        Bootstrap {
            events: vec![BootstrapEvent {
                id: 1,
                deadline_time: Some("2025-08-15T17:30:00Z".to_string()),
                is_current: false,
                is_next: true,
                finished: false,
                name: Some("Gameweek 1".to_string()),
            }],
            teams: vec![BootstrapTeam {
                id: 3,
                name: "Arsenal".to_string(),
                short_name: Some("ARS".to_string()),
            }],
            elements: vec![
                BootstrapElement {
                    id: 77,
                    first_name: "Bukayo".to_string(),
                    second_name: "Saka".to_string(),
                    web_name: "Saka".to_string(),
                    team: 3,
                    element_type: 3,
                    now_cost: 100,
                    status: "a".to_string(),
                },
                // manager entry: element_type outside 1-4
                BootstrapElement {
                    id: 78,
                    first_name: "Mikel".to_string(),
                    second_name: "Arteta".to_string(),
                    web_name: "Arteta".to_string(),
                    team: 3,
                    element_type: 5,
                    now_cost: 0,
                    status: "a".to_string(),
                },
            ],
        }
    }

    #[test]
    fn bootstrap_ingest_upserts_and_skips() {
        let store = SquadStore::open_in_memory().unwrap();
        let summary = ingest_bootstrap(&store, &bootstrap()).unwrap();
        assert_eq!(summary.teams.inserted, 1);
        assert_eq!(summary.gameweeks.inserted, 1);
        assert_eq!(summary.players.inserted, 1);
        assert_eq!(summary.skipped_players, 1);

        // re-ingest is a no-op
        let summary = ingest_bootstrap(&store, &bootstrap()).unwrap();
        assert_eq!(summary.players.inserted, 0);
        assert_eq!(summary.players.updated, 0);

        assert_eq!(store.resolve_target_gw(None).unwrap(), Some(1));
    }

    #[test]
    fn gw_stats_ingest_matches_players_by_fpl_id() {
        let store = SquadStore::open_in_memory().unwrap();
        ingest_bootstrap(&store, &bootstrap()).unwrap();

        let live = EventLive {
            elements: vec![
                LiveElement {
                    id: 77,
                    stats: LiveStats {
                        minutes: 90,
                        goals_scored: 1,
                        assists: 0,
                        clean_sheets: 0,
                        total_points: 9,
                    },
                },
                LiveElement {
                    id: 9999,
                    stats: LiveStats::default(),
                },
            ],
        };
        let summary = ingest_gw_stats(&store, 1, &live).unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.skipped, 1);

        let history = store.points_history_over(&[1]).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.values().next().unwrap(), &vec![9.0]);
    }

    #[test]
    fn deadline_parsing_accepts_zulu_suffix() {
        let parsed = parse_deadline(Some("2025-08-15T17:30:00Z")).unwrap();
        assert_eq!(parsed.timezone(), Utc);
        assert!(parse_deadline(Some("not a date")).is_none());
        assert!(parse_deadline(None).is_none());
    }
}
