pub mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::warn;

use crate::domain::{Candidate, Position};
use crate::store::migrations::BASE_MIGRATION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamRecord {
    pub id: i64,
    pub fpl_team_id: i64,
    pub name: String,
    pub short_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerRecord {
    pub id: i64,
    pub fpl_player_id: i64,
    pub first_name: String,
    pub second_name: String,
    pub web_name: String,
    pub team_id: i64,
    pub position: String,
    pub now_cost: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameweekRecord {
    pub gw: u32,
    pub deadline_time: Option<DateTime<Utc>>,
    pub is_current: bool,
    pub is_next: bool,
    pub is_finished: bool,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub player_id: i64,
    pub target_gw: u32,
    pub model_name: String,
    pub predicted_points: f64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TeamUpsert {
    pub fpl_team_id: i64,
    pub name: String,
    pub short_name: String,
}

#[derive(Debug, Clone)]
pub struct PlayerUpsert {
    pub fpl_player_id: i64,
    pub first_name: String,
    pub second_name: String,
    pub web_name: String,
    pub team_id: i64,
    pub position: Position,
    pub now_cost: i64,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct GameweekUpsert {
    pub gw: u32,
    pub deadline_time: Option<DateTime<Utc>>,
    pub is_current: bool,
    pub is_next: bool,
    pub is_finished: bool,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct GwStatUpsert {
    pub player_id: i64,
    pub gw: u32,
    pub minutes: i64,
    pub goals_scored: i64,
    pub assists: i64,
    pub clean_sheets: i64,
    pub total_points: i64,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerQuery {
    pub position: Option<Position>,
    pub team_id: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MaeReport {
    pub samples: u64,
    pub mae: Option<f64>,
}

pub struct SquadStore {
    conn: Connection,
}

impl SquadStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    // --- teams ---

    pub fn upsert_team(&self, team: &TeamUpsert) -> Result<UpsertOutcome> {
        let existing = self
            .conn
            .query_row(
                "SELECT id, name, short_name FROM teams WHERE fpl_team_id = ?1",
                params![team.fpl_team_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            None => {
                self.conn.execute(
                    "INSERT INTO teams(fpl_team_id, name, short_name) VALUES (?1, ?2, ?3)",
                    params![team.fpl_team_id, team.name, team.short_name],
                )?;
                Ok(UpsertOutcome::Inserted)
            }
            Some((id, name, short_name)) => {
                if name == team.name && short_name == team.short_name {
                    return Ok(UpsertOutcome::Unchanged);
                }
                self.conn.execute(
                    "UPDATE teams SET name = ?1, short_name = ?2 WHERE id = ?3",
                    params![team.name, team.short_name, id],
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    pub fn list_teams(&self) -> Result<Vec<TeamRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, fpl_team_id, name, short_name FROM teams ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TeamRecord {
                    id: row.get(0)?,
                    fpl_team_id: row.get(1)?,
                    name: row.get(2)?,
                    short_name: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn team_id_by_fpl(&self, fpl_team_id: i64) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM teams WHERE fpl_team_id = ?1",
                params![fpl_team_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    // --- players ---

    pub fn upsert_player(&self, player: &PlayerUpsert) -> Result<UpsertOutcome> {
        let existing = self
            .conn
            .query_row(
                r#"
SELECT id, first_name, second_name, web_name, team_id, position, now_cost, status
FROM players WHERE fpl_player_id = ?1
"#,
                params![player.fpl_player_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            None => {
                self.conn.execute(
                    r#"
INSERT INTO players(
    fpl_player_id, first_name, second_name, web_name, team_id, position, now_cost, status
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#,
                    params![
                        player.fpl_player_id,
                        player.first_name,
                        player.second_name,
                        player.web_name,
                        player.team_id,
                        player.position.as_code(),
                        player.now_cost,
                        player.status
                    ],
                )?;
                Ok(UpsertOutcome::Inserted)
            }
            Some((id, first, second, web, team_id, position, now_cost, status)) => {
                let unchanged = first == player.first_name
                    && second == player.second_name
                    && web == player.web_name
                    && team_id == player.team_id
                    && position == player.position.as_code()
                    && now_cost == player.now_cost
                    && status == player.status;
                if unchanged {
                    return Ok(UpsertOutcome::Unchanged);
                }
                self.conn.execute(
                    r#"
UPDATE players
SET first_name = ?1, second_name = ?2, web_name = ?3,
    team_id = ?4, position = ?5, now_cost = ?6, status = ?7
WHERE id = ?8
"#,
                    params![
                        player.first_name,
                        player.second_name,
                        player.web_name,
                        player.team_id,
                        player.position.as_code(),
                        player.now_cost,
                        player.status,
                        id
                    ],
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    pub fn player_id_by_fpl(&self, fpl_player_id: i64) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM players WHERE fpl_player_id = ?1",
                params![fpl_player_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn list_players(
        &self,
        query: &PlayerQuery,
        limit: usize,
        offset: usize,
    ) -> Result<(u64, Vec<PlayerRecord>)> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut bound: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(position) = query.position {
            clauses.push("position = ?");
            bound.push(Box::new(position.as_code().to_string()));
        }
        if let Some(team_id) = query.team_id {
            clauses.push("team_id = ?");
            bound.push(Box::new(team_id));
        }
        if let Some(search) = &query.search {
            clauses.push("web_name LIKE ? COLLATE NOCASE");
            bound.push(Box::new(format!("%{search}%")));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            bound.iter().map(|p| p.as_ref()).collect();

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM players{where_sql}"),
            params_ref.as_slice(),
            |row| row.get(0),
        )?;

        let sql = format!(
            r#"
SELECT id, fpl_player_id, first_name, second_name, web_name, team_id, position, now_cost, status
FROM players{where_sql}
ORDER BY id
LIMIT {limit} OFFSET {offset}
"#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok(PlayerRecord {
                    id: row.get(0)?,
                    fpl_player_id: row.get(1)?,
                    first_name: row.get(2)?,
                    second_name: row.get(3)?,
                    web_name: row.get(4)?,
                    team_id: row.get(5)?,
                    position: row.get(6)?,
                    now_cost: row.get(7)?,
                    status: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((total as u64, rows))
    }

    // --- gameweeks ---

    pub fn upsert_gameweek(&self, gameweek: &GameweekUpsert) -> Result<UpsertOutcome> {
        let deadline = gameweek.deadline_time.map(|dt| dt.to_rfc3339());
        let existing = self
            .conn
            .query_row(
                r#"
SELECT id, deadline_time, is_current, is_next, is_finished, name
FROM gameweeks WHERE gw = ?1
"#,
                params![gameweek.gw],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)? != 0,
                        row.get::<_, i64>(3)? != 0,
                        row.get::<_, i64>(4)? != 0,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            None => {
                self.conn.execute(
                    r#"
INSERT INTO gameweeks(gw, deadline_time, is_current, is_next, is_finished, name)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#,
                    params![
                        gameweek.gw,
                        deadline,
                        gameweek.is_current as i64,
                        gameweek.is_next as i64,
                        gameweek.is_finished as i64,
                        gameweek.name
                    ],
                )?;
                Ok(UpsertOutcome::Inserted)
            }
            Some((id, old_deadline, is_current, is_next, is_finished, name)) => {
                let unchanged = old_deadline == deadline
                    && is_current == gameweek.is_current
                    && is_next == gameweek.is_next
                    && is_finished == gameweek.is_finished
                    && name == gameweek.name;
                if unchanged {
                    return Ok(UpsertOutcome::Unchanged);
                }
                self.conn.execute(
                    r#"
UPDATE gameweeks
SET deadline_time = ?1, is_current = ?2, is_next = ?3, is_finished = ?4, name = ?5
WHERE id = ?6
"#,
                    params![
                        deadline,
                        gameweek.is_current as i64,
                        gameweek.is_next as i64,
                        gameweek.is_finished as i64,
                        gameweek.name,
                        id
                    ],
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    pub fn current_and_next_gameweeks(
        &self,
    ) -> Result<(Option<GameweekRecord>, Option<GameweekRecord>)> {
        let current = self.gameweek_where("is_current = 1")?;
        let next = self.gameweek_where("is_next = 1")?;
        Ok((current, next))
    }

    fn gameweek_where(&self, clause: &str) -> Result<Option<GameweekRecord>> {
        let sql = format!(
            r#"
SELECT gw, deadline_time, is_current, is_next, is_finished, name
FROM gameweeks WHERE {clause} ORDER BY gw LIMIT 1
"#
        );
        Ok(self
            .conn
            .query_row(&sql, [], row_to_gameweek)
            .optional()?)
    }

    /// Resolve the build target: an explicit gameweek wins, otherwise the
    /// one marked next. None means nothing is marked next.
    pub fn resolve_target_gw(&self, explicit: Option<u32>) -> Result<Option<u32>> {
        if let Some(gw) = explicit {
            return Ok(Some(gw));
        }
        Ok(self
            .conn
            .query_row(
                "SELECT gw FROM gameweeks WHERE is_next = 1 ORDER BY gw LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Most recent finished gameweeks, newest first, at most `window`.
    pub fn finished_gameweeks(&self, window: usize) -> Result<Vec<u32>> {
        let mut stmt = self.conn.prepare(
            "SELECT gw FROM gameweeks WHERE is_finished = 1 ORDER BY gw DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![window as i64], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- per-gameweek stats ---

    pub fn upsert_gw_stat(&self, stat: &GwStatUpsert) -> Result<UpsertOutcome> {
        let existing = self
            .conn
            .query_row(
                r#"
SELECT id, minutes, goals_scored, assists, clean_sheets, total_points
FROM player_gw_stats WHERE player_id = ?1 AND gw = ?2
"#,
                params![stat.player_id, stat.gw],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            None => {
                self.conn.execute(
                    r#"
INSERT INTO player_gw_stats(
    player_id, gw, minutes, goals_scored, assists, clean_sheets, total_points
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#,
                    params![
                        stat.player_id,
                        stat.gw,
                        stat.minutes,
                        stat.goals_scored,
                        stat.assists,
                        stat.clean_sheets,
                        stat.total_points
                    ],
                )?;
                Ok(UpsertOutcome::Inserted)
            }
            Some((id, minutes, goals, assists, clean_sheets, total_points)) => {
                let unchanged = minutes == stat.minutes
                    && goals == stat.goals_scored
                    && assists == stat.assists
                    && clean_sheets == stat.clean_sheets
                    && total_points == stat.total_points;
                if unchanged {
                    return Ok(UpsertOutcome::Unchanged);
                }
                self.conn.execute(
                    r#"
UPDATE player_gw_stats
SET minutes = ?1, goals_scored = ?2, assists = ?3, clean_sheets = ?4, total_points = ?5
WHERE id = ?6
"#,
                    params![
                        stat.minutes,
                        stat.goals_scored,
                        stat.assists,
                        stat.clean_sheets,
                        stat.total_points,
                        id
                    ],
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    /// Per-player points across the given gameweeks, ordered by gameweek
    /// within each player. Players with no rows in the range are absent.
    pub fn points_history_over(&self, gameweeks: &[u32]) -> Result<BTreeMap<i64, Vec<f64>>> {
        if gameweeks.is_empty() {
            return Ok(BTreeMap::new());
        }
        let placeholders = vec!["?"; gameweeks.len()].join(", ");
        let sql = format!(
            r#"
SELECT player_id, total_points
FROM player_gw_stats
WHERE gw IN ({placeholders})
ORDER BY player_id, gw
"#
        );
        let bound: Vec<Box<dyn rusqlite::types::ToSql>> = gameweeks
            .iter()
            .map(|gw| Box::new(*gw as i64) as Box<dyn rusqlite::types::ToSql>)
            .collect();
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            bound.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut history: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        for (player_id, points) in rows {
            history.entry(player_id).or_default().push(points as f64);
        }
        Ok(history)
    }

    // --- predictions ---

    pub fn upsert_prediction(
        &self,
        player_id: i64,
        target_gw: u32,
        model_name: &str,
        predicted_points: f64,
    ) -> Result<UpsertOutcome> {
        let existing = self
            .conn
            .query_row(
                r#"
SELECT id FROM predictions
WHERE player_id = ?1 AND target_gw = ?2 AND model_name = ?3
"#,
                params![player_id, target_gw, model_name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        match existing {
            None => {
                self.conn.execute(
                    r#"
INSERT INTO predictions(player_id, target_gw, model_name, predicted_points, created_at)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
                    params![
                        player_id,
                        target_gw,
                        model_name,
                        predicted_points,
                        Utc::now().to_rfc3339()
                    ],
                )?;
                Ok(UpsertOutcome::Inserted)
            }
            Some(id) => {
                self.conn.execute(
                    "UPDATE predictions SET predicted_points = ?1 WHERE id = ?2",
                    params![predicted_points, id],
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    pub fn list_predictions(
        &self,
        target_gw: u32,
        limit: usize,
        offset: usize,
    ) -> Result<(u64, Vec<PredictionRecord>)> {
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM predictions WHERE target_gw = ?1",
            params![target_gw],
            |row| row.get(0),
        )?;
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, player_id, target_gw, model_name, predicted_points, created_at
FROM predictions
WHERE target_gw = ?1
ORDER BY predicted_points DESC, player_id ASC
LIMIT ?2 OFFSET ?3
"#,
        )?;
        let rows = stmt
            .query_map(params![target_gw, limit as i64, offset as i64], |row| {
                Ok(PredictionRecord {
                    id: row.get(0)?,
                    player_id: row.get(1)?,
                    target_gw: row.get(2)?,
                    model_name: row.get(3)?,
                    predicted_points: row.get(4)?,
                    created_at: parse_datetime(row.get::<_, Option<String>>(5)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((total as u64, rows))
    }

    /// The candidate join: one row per prediction for the target gameweek
    /// and model, with player and team display fields attached.
    pub fn fetch_candidates(&self, target_gw: u32, model_name: &str) -> Result<Vec<Candidate>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT pr.id, pr.target_gw, pr.model_name, pr.predicted_points, pr.created_at,
       pl.id, pl.fpl_player_id, pl.web_name, pl.position, pl.now_cost, pl.status,
       t.id, t.name, t.short_name
FROM predictions pr
JOIN players pl ON pl.id = pr.player_id
JOIN teams t ON t.id = pl.team_id
WHERE pr.target_gw = ?1 AND pr.model_name = ?2
ORDER BY pr.id
"#,
        )?;
        let raw = stmt
            .query_map(params![target_gw, model_name], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, String>(10)?,
                    row.get::<_, i64>(11)?,
                    row.get::<_, String>(12)?,
                    row.get::<_, String>(13)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut candidates = Vec::with_capacity(raw.len());
        for (
            prediction_id,
            gw,
            model,
            predicted_points,
            created_at,
            player_id,
            fpl_player_id,
            web_name,
            position_raw,
            now_cost,
            status,
            team_id,
            team_name,
            team_short_name,
        ) in raw
        {
            let position = match position_raw.parse::<Position>() {
                Ok(position) => position,
                Err(_) => {
                    warn!(player_id, position = %position_raw, "skipping unknown position");
                    continue;
                }
            };
            candidates.push(Candidate {
                prediction_id,
                player_id,
                fpl_player_id,
                web_name,
                position,
                now_cost,
                status,
                team_id,
                team_name,
                team_short_name,
                target_gw: gw,
                model_name: model,
                predicted_points,
                created_at: parse_datetime(created_at),
            });
        }
        Ok(candidates)
    }

    /// Mean absolute error of stored predictions against realized points,
    /// joined on the same player and gameweek.
    pub fn baseline_mae(
        &self,
        model_name: &str,
        min_gw: Option<u32>,
        max_gw: Option<u32>,
    ) -> Result<MaeReport> {
        let mut sql = String::from(
            r#"
SELECT COUNT(*), AVG(ABS(pr.predicted_points - st.total_points))
FROM predictions pr
JOIN player_gw_stats st ON st.player_id = pr.player_id AND st.gw = pr.target_gw
WHERE pr.model_name = ?
"#,
        );
        let mut bound: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(model_name.to_string())];
        if let Some(min_gw) = min_gw {
            sql.push_str(" AND pr.target_gw >= ?");
            bound.push(Box::new(min_gw as i64));
        }
        if let Some(max_gw) = max_gw {
            sql.push_str(" AND pr.target_gw <= ?");
            bound.push(Box::new(max_gw as i64));
        }
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            bound.iter().map(|p| p.as_ref()).collect();
        let (samples, mae): (i64, Option<f64>) =
            self.conn
                .query_row(&sql, params_ref.as_slice(), |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
        Ok(MaeReport {
            samples: samples as u64,
            mae,
        })
    }
}

fn row_to_gameweek(row: &rusqlite::Row<'_>) -> rusqlite::Result<GameweekRecord> {
    Ok(GameweekRecord {
        gw: row.get(0)?,
        deadline_time: parse_datetime(row.get::<_, Option<String>>(1)?),
        is_current: row.get::<_, i64>(2)? != 0,
        is_next: row.get::<_, i64>(3)? != 0,
        is_finished: row.get::<_, i64>(4)? != 0,
        name: row.get(5)?,
    })
}

fn parse_datetime(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SquadStore {
        let store = SquadStore::open_in_memory().unwrap();
        store
            .upsert_team(&TeamUpsert {
                fpl_team_id: 100,
                name: "Arsenal".to_string(),
                short_name: "ARS".to_string(),
            })
            .unwrap();
        store
            .upsert_team(&TeamUpsert {
                fpl_team_id: 200,
                name: "Liverpool".to_string(),
                short_name: "LIV".to_string(),
            })
            .unwrap();
        store
    }

    fn seed_player(store: &SquadStore, fpl_id: i64, team_id: i64, position: Position) -> i64 {
        store
            .upsert_player(&PlayerUpsert {
                fpl_player_id: fpl_id,
                first_name: "First".to_string(),
                second_name: "Second".to_string(),
                web_name: format!("Web{fpl_id}"),
                team_id,
                position,
                now_cost: 55,
                status: "a".to_string(),
            })
            .unwrap();
        store.player_id_by_fpl(fpl_id).unwrap().unwrap()
    }

    #[test]
    fn team_upsert_tracks_changes() {
        let store = seeded();
        let again = TeamUpsert {
            fpl_team_id: 100,
            name: "Arsenal".to_string(),
            short_name: "ARS".to_string(),
        };
        assert_eq!(store.upsert_team(&again).unwrap(), UpsertOutcome::Unchanged);
        let renamed = TeamUpsert {
            short_name: "AFC".to_string(),
            ..again
        };
        assert_eq!(store.upsert_team(&renamed).unwrap(), UpsertOutcome::Updated);
    }

    #[test]
    fn player_listing_filters_and_paginates() {
        let store = seeded();
        let team = store.team_id_by_fpl(100).unwrap().unwrap();
        for i in 0..5 {
            seed_player(&store, 1000 + i, team, Position::Mid);
        }
        seed_player(&store, 2000, team, Position::Def);

        let (total, rows) = store
            .list_players(
                &PlayerQuery {
                    position: Some(Position::Mid),
                    ..PlayerQuery::default()
                },
                2,
                2,
            )
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(rows.len(), 2);

        let (total, rows) = store
            .list_players(
                &PlayerQuery {
                    search: Some("web10".to_string()),
                    ..PlayerQuery::default()
                },
                50,
                0,
            )
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn resolve_target_gw_prefers_explicit_then_next() {
        let store = seeded();
        assert_eq!(store.resolve_target_gw(Some(9)).unwrap(), Some(9));
        assert_eq!(store.resolve_target_gw(None).unwrap(), None);

        store
            .upsert_gameweek(&GameweekUpsert {
                gw: 7,
                deadline_time: None,
                is_current: false,
                is_next: true,
                is_finished: false,
                name: Some("Gameweek 7".to_string()),
            })
            .unwrap();
        assert_eq!(store.resolve_target_gw(None).unwrap(), Some(7));
    }

    #[test]
    fn finished_gameweeks_are_newest_first() {
        let store = seeded();
        for gw in 1..=6u32 {
            store
                .upsert_gameweek(&GameweekUpsert {
                    gw,
                    deadline_time: None,
                    is_current: false,
                    is_next: false,
                    is_finished: gw <= 4,
                    name: None,
                })
                .unwrap();
        }
        assert_eq!(store.finished_gameweeks(3).unwrap(), vec![4, 3, 2]);
    }

    #[test]
    fn points_history_covers_only_selected_gameweeks() {
        let store = seeded();
        let team = store.team_id_by_fpl(100).unwrap().unwrap();
        let player = seed_player(&store, 1000, team, Position::Fwd);
        for (gw, points) in [(1u32, 2i64), (2, 6), (3, 10)] {
            store
                .upsert_gw_stat(&GwStatUpsert {
                    player_id: player,
                    gw,
                    minutes: 90,
                    goals_scored: 0,
                    assists: 0,
                    clean_sheets: 0,
                    total_points: points,
                })
                .unwrap();
        }
        let history = store.points_history_over(&[2, 3]).unwrap();
        assert_eq!(history.get(&player).unwrap(), &vec![6.0, 10.0]);
        assert!(store.points_history_over(&[]).unwrap().is_empty());
    }

    #[test]
    fn candidate_join_carries_team_fields() {
        let store = seeded();
        let team = store.team_id_by_fpl(200).unwrap().unwrap();
        let player = seed_player(&store, 1000, team, Position::Gkp);
        store
            .upsert_prediction(player, 7, "baseline_rollavg_v0", 4.25)
            .unwrap();

        let candidates = store.fetch_candidates(7, "baseline_rollavg_v0").unwrap();
        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(candidate.team_short_name, "LIV");
        assert_eq!(candidate.position, Position::Gkp);
        assert_eq!(candidate.predicted_points, 4.25);

        // wrong model or gameweek joins nothing
        assert!(store.fetch_candidates(8, "baseline_rollavg_v0").unwrap().is_empty());
        assert!(store.fetch_candidates(7, "other_model").unwrap().is_empty());
    }

    #[test]
    fn prediction_upsert_overwrites_points() {
        let store = seeded();
        let team = store.team_id_by_fpl(100).unwrap().unwrap();
        let player = seed_player(&store, 1000, team, Position::Mid);
        assert_eq!(
            store
                .upsert_prediction(player, 7, "baseline_rollavg_v0", 3.0)
                .unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store
                .upsert_prediction(player, 7, "baseline_rollavg_v0", 5.0)
                .unwrap(),
            UpsertOutcome::Updated
        );
        let (total, rows) = store.list_predictions(7, 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].predicted_points, 5.0);
    }

    #[test]
    fn mae_compares_predictions_to_realized_points() {
        let store = seeded();
        let team = store.team_id_by_fpl(100).unwrap().unwrap();
        let player = seed_player(&store, 1000, team, Position::Mid);
        store
            .upsert_prediction(player, 3, "baseline_rollavg_v0", 6.0)
            .unwrap();
        store
            .upsert_gw_stat(&GwStatUpsert {
                player_id: player,
                gw: 3,
                minutes: 90,
                goals_scored: 1,
                assists: 0,
                clean_sheets: 0,
                total_points: 8,
            })
            .unwrap();

        let report = store
            .baseline_mae("baseline_rollavg_v0", None, None)
            .unwrap();
        assert_eq!(report.samples, 1);
        assert!((report.mae.unwrap() - 2.0).abs() < 1e-9);

        let empty = store.baseline_mae("baseline_rollavg_v0", Some(5), None).unwrap();
        assert_eq!(empty.samples, 0);
        assert!(empty.mae.is_none());
    }
}
