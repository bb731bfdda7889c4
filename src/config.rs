use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fpl::DEFAULT_BASE_URL;
use crate::predict::{DEFAULT_MODEL, DEFAULT_WINDOW};
use crate::squad::{PositionCounts, SquadRules};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fpl: FplConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub squad: SquadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FplConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_window")]
    pub window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadConfig {
    #[serde(default = "default_budget_m")]
    pub budget_m: f64,
    #[serde(default = "default_max_per_team")]
    pub max_per_team: usize,
    #[serde(default = "PositionCounts::squad_default")]
    pub quota: PositionCounts,
    #[serde(default = "PositionCounts::formation_default")]
    pub formation: PositionCounts,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub base_url: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/squad-oracle/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(base_url) = overrides.base_url {
            self.fpl.base_url = base_url;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Squad rules for the builder: configured quota and formation on top
    /// of the fixed cycle orders and guards.
    pub fn squad_rules(&self) -> Result<SquadRules> {
        let rules = SquadRules {
            quota: self.squad.quota,
            formation: self.squad.formation,
            ..SquadRules::default()
        };
        rules.validate().context("invalid [squad] configuration")?;
        Ok(rules)
    }

    pub fn default_template() -> String {
        let template = r#"[storage]
db_path = "~/.local/share/squad-oracle/squad.db"

[fpl]
base_url = "https://fantasy.premierleague.com/api"
timeout_secs = 30

[model]
name = "baseline_rollavg_v0"
window = 5

[squad]
budget_m = 100.0
max_per_team = 3

[squad.quota]
GKP = 2
DEF = 5
MID = 5
FWD = 3

[squad.formation]
GKP = 1
DEF = 3
MID = 4
FWD = 3
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for FplConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            window: default_window(),
        }
    }
}

impl Default for SquadConfig {
    fn default() -> Self {
        Self {
            budget_m: default_budget_m(),
            max_per_team: default_max_per_team(),
            quota: PositionCounts::squad_default(),
            formation: PositionCounts::formation_default(),
        }
    }
}

fn default_db_path() -> String {
    "~/.local/share/squad-oracle/squad.db".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_model_name() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_budget_m() -> f64 {
    100.0
}

fn default_max_per_team() -> usize {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_back_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).unwrap();
        assert_eq!(parsed.squad.budget_m, 100.0);
        assert_eq!(parsed.squad.quota.total(), 15);
        assert_eq!(parsed.model.window, DEFAULT_WINDOW);
        assert!(parsed.squad_rules().is_ok());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: Config = toml::from_str("[squad]\nbudget_m = 90.0\n").unwrap();
        assert_eq!(parsed.squad.budget_m, 90.0);
        assert_eq!(parsed.squad.max_per_team, 3);
        assert_eq!(parsed.fpl.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn invalid_formation_is_rejected() {
        let parsed: Config = toml::from_str(
            "[squad.formation]\nGKP = 3\nDEF = 3\nMID = 4\nFWD = 3\n",
        )
        .unwrap();
        assert!(parsed.squad_rules().is_err());
    }

    #[test]
    fn tilde_paths_expand_to_home() {
        let expanded = expand_tilde("~/data/squad.db");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert_eq!(expand_tilde("/tmp/x.db"), PathBuf::from("/tmp/x.db"));
    }
}
