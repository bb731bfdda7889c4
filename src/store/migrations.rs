pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fpl_team_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    short_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS players (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fpl_player_id INTEGER NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    second_name TEXT NOT NULL,
    web_name TEXT NOT NULL,
    team_id INTEGER NOT NULL REFERENCES teams(id),
    position TEXT NOT NULL,
    now_cost INTEGER NOT NULL,
    status TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_players_position ON players(position);
CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id);
CREATE INDEX IF NOT EXISTS idx_players_web_name ON players(web_name);

CREATE TABLE IF NOT EXISTS gameweeks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gw INTEGER NOT NULL UNIQUE,
    deadline_time TEXT,
    is_current INTEGER NOT NULL DEFAULT 0,
    is_next INTEGER NOT NULL DEFAULT 0,
    is_finished INTEGER NOT NULL DEFAULT 0,
    name TEXT
);

CREATE TABLE IF NOT EXISTS player_gw_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    player_id INTEGER NOT NULL REFERENCES players(id),
    gw INTEGER NOT NULL,
    minutes INTEGER NOT NULL DEFAULT 0,
    goals_scored INTEGER NOT NULL DEFAULT 0,
    assists INTEGER NOT NULL DEFAULT 0,
    clean_sheets INTEGER NOT NULL DEFAULT 0,
    total_points INTEGER NOT NULL DEFAULT 0,
    UNIQUE(player_id, gw)
);

CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    player_id INTEGER NOT NULL REFERENCES players(id),
    target_gw INTEGER NOT NULL,
    model_name TEXT NOT NULL,
    predicted_points REAL NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(player_id, target_gw, model_name)
);
CREATE INDEX IF NOT EXISTS idx_predictions_target_model
    ON predictions(target_gw, model_name);
"#;
