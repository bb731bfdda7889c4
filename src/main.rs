use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use squad_oracle::config::{Config, ConfigOverrides};
use squad_oracle::domain::{Position, StatusFilter};
use squad_oracle::fpl::{ingest_bootstrap, ingest_gw_stats, FplClient};
use squad_oracle::output::csv::{players_to_csv, predictions_to_csv, squad_to_csv};
use squad_oracle::output::json::render_json;
use squad_oracle::output::table::{
    render_gameweeks_table, render_mae, render_model_run, render_players_table,
    render_predictions_table, render_squad_failure, render_squad_table, render_teams_table,
};
use squad_oracle::predict::{run_model, ModelRegistry, MAX_WINDOW};
use squad_oracle::server::run_server;
use squad_oracle::squad::{
    build_squad, SquadFailure, SquadOutcome, SquadRequest, ViewMode,
};
use squad_oracle::store::{PlayerQuery, SquadStore};
use tracing::warn;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "squad-oracle",
    about = "Fantasy football squad recommendations"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db_path: Option<String>,
    #[arg(long)]
    fpl_base_url: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a full 15-man squad recommendation
    Squad {
        #[arg(long)]
        target_gw: Option<u32>,
        #[arg(long)]
        model_name: Option<String>,
        #[arg(long, default_value = "available")]
        status: String,
        #[arg(long)]
        max_cost: Option<f64>,
        #[arg(long)]
        min_predicted_points: Option<f64>,
        #[arg(long)]
        budget_m: Option<f64>,
        #[arg(long)]
        max_per_team: Option<usize>,
        #[arg(long, default_value = "compact")]
        view: String,
    },
    /// List stored players
    Players {
        #[arg(long)]
        position: Option<String>,
        #[arg(long)]
        team_id: Option<i64>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// List stored teams
    Teams,
    /// Show the current and next gameweek
    Gameweeks,
    /// List predictions for a target gameweek
    Predictions {
        #[arg(long)]
        target_gw: u32,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Run a scoring model and store its predictions
    Predict {
        #[arg(long)]
        target_gw: Option<u32>,
        #[arg(long)]
        window: Option<usize>,
        #[arg(long)]
        model_name: Option<String>,
    },
    /// Evaluate stored predictions against realized points
    Eval {
        #[arg(long)]
        model_name: Option<String>,
        #[arg(long)]
        min_gw: Option<u32>,
        #[arg(long)]
        max_gw: Option<u32>,
    },
    /// Pull data from the FPL API into the store
    Ingest {
        #[command(subcommand)]
        source: IngestCommands,
    },
    /// Run the REST API server
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Inspect or initialize the config file
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Subcommand)]
enum IngestCommands {
    /// Teams, players and gameweeks from bootstrap-static
    Bootstrap,
    /// Per-player stats for one finished gameweek
    GwStats {
        #[arg(long)]
        gw: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db_path.clone(),
        base_url: cli.fpl_base_url.clone(),
    });

    if let Commands::Config { init, show } = &cli.command {
        if *init {
            Config::write_template(&config_path)?;
            println!("Wrote config template to {}", config_path.display());
        }
        if *show || !*init {
            println!("{}", render_json(&config)?);
        }
        return Ok(());
    }
    if let Commands::Serve { host, port } = &cli.command {
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let store = SquadStore::open(&config.resolved_db_path())?;

    match &cli.command {
        Commands::Squad {
            target_gw,
            model_name,
            status,
            max_cost,
            min_predicted_points,
            budget_m,
            max_per_team,
            view,
        } => {
            let model_name = model_name.clone().unwrap_or_else(|| config.model.name.clone());
            let status = StatusFilter::from_str(status)?;
            let view = ViewMode::from_str(view)?;
            let rules = config.squad_rules()?;

            let outcome: SquadOutcome = match store.resolve_target_gw(*target_gw)? {
                None => SquadOutcome::Failed(Box::new(SquadFailure::no_next_gameweek(model_name))),
                Some(gw) => {
                    let request = SquadRequest {
                        target_gw: gw,
                        model_name,
                        status,
                        max_cost: *max_cost,
                        min_predicted_points: *min_predicted_points,
                        budget_m: budget_m.unwrap_or(config.squad.budget_m),
                        max_per_team: max_per_team.unwrap_or(config.squad.max_per_team),
                        view,
                    };
                    request.validate()?;
                    let candidates = store.fetch_candidates(request.target_gw, &request.model_name)?;
                    build_squad(candidates, &request, &rules).into()
                }
            };
            print_squad(&outcome, cli.output)?;
        }
        Commands::Players {
            position,
            team_id,
            search,
            limit,
            offset,
        } => {
            let position = position
                .as_deref()
                .map(Position::from_str)
                .transpose()?;
            let (total, players) = store.list_players(
                &PlayerQuery {
                    position,
                    team_id: *team_id,
                    search: search.clone(),
                },
                (*limit).clamp(1, 200),
                *offset,
            )?;
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_players_table(&players));
                    println!("{} of {total} players", players.len());
                }
                OutputFormat::Json => println!("{}", render_json(&players)?),
                OutputFormat::Csv => println!("{}", players_to_csv(&players)?),
            }
        }
        Commands::Teams => {
            let teams = store.list_teams()?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_teams_table(&teams)),
                OutputFormat::Json => println!("{}", render_json(&teams)?),
                OutputFormat::Csv => {
                    warn!("CSV output for teams not implemented, using JSON");
                    println!("{}", render_json(&teams)?);
                }
            }
        }
        Commands::Gameweeks => {
            let (current, next) = store.current_and_next_gameweeks()?;
            match cli.output {
                OutputFormat::Table => println!(
                    "{}",
                    render_gameweeks_table(current.as_ref(), next.as_ref())
                ),
                OutputFormat::Json => {
                    println!("{}", render_json(&serde_json::json!({
                        "current": current,
                        "next": next,
                    }))?)
                }
                OutputFormat::Csv => {
                    warn!("CSV output for gameweeks not implemented, using JSON");
                    println!("{}", render_json(&serde_json::json!({
                        "current": current,
                        "next": next,
                    }))?)
                }
            }
        }
        Commands::Predictions {
            target_gw,
            limit,
            offset,
        } => {
            let (total, rows) =
                store.list_predictions(*target_gw, (*limit).clamp(1, 200), *offset)?;
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_predictions_table(&rows));
                    println!("{} of {total} predictions", rows.len());
                }
                OutputFormat::Json => println!("{}", render_json(&rows)?),
                OutputFormat::Csv => println!("{}", predictions_to_csv(&rows)?),
            }
        }
        Commands::Predict {
            target_gw,
            window,
            model_name,
        } => {
            let window = window.unwrap_or(config.model.window);
            if window == 0 || window > MAX_WINDOW {
                return Err(anyhow!("window must be between 1 and {MAX_WINDOW}"));
            }
            let model_name = model_name.clone().unwrap_or_else(|| config.model.name.clone());
            let registry = ModelRegistry::with_defaults();
            let model = registry
                .by_name(&model_name)
                .ok_or_else(|| anyhow!("unknown model: {model_name}"))?;
            let target_gw = store
                .resolve_target_gw(*target_gw)?
                .ok_or_else(|| anyhow!("no next gameweek is marked; pass --target-gw"))?;
            let run = run_model(&store, model.as_ref(), target_gw, window)?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_model_run(&run)),
                OutputFormat::Json | OutputFormat::Csv => println!("{}", render_json(&run)?),
            }
        }
        Commands::Eval {
            model_name,
            min_gw,
            max_gw,
        } => {
            let model_name = model_name.clone().unwrap_or_else(|| config.model.name.clone());
            let report = store.baseline_mae(&model_name, *min_gw, *max_gw)?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_mae(&report)),
                OutputFormat::Json | OutputFormat::Csv => println!("{}", render_json(&report)?),
            }
        }
        Commands::Ingest { source } => {
            let client = FplClient::new(config.fpl.base_url.clone(), config.fpl.timeout_secs)?;
            match source {
                IngestCommands::Bootstrap => {
                    let data = client.fetch_bootstrap().await?;
                    let summary = ingest_bootstrap(&store, &data)?;
                    println!("{}", render_json(&summary)?);
                }
                IngestCommands::GwStats { gw } => {
                    let data = client.fetch_event_live(*gw).await?;
                    let summary = ingest_gw_stats(&store, *gw, &data)?;
                    println!("{}", render_json(&summary)?);
                }
            }
        }
        Commands::Config { .. } | Commands::Serve { .. } => {
            unreachable!("handled before dispatch")
        }
    }

    Ok(())
}

fn print_squad(outcome: &SquadOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => match outcome {
            SquadOutcome::Built(recommendation) => {
                println!("{}", render_squad_table(recommendation))
            }
            SquadOutcome::Failed(failure) => println!("{}", render_squad_failure(failure)),
        },
        OutputFormat::Json => println!("{}", render_json(outcome)?),
        OutputFormat::Csv => match outcome {
            SquadOutcome::Built(recommendation) => {
                println!("{}", squad_to_csv(recommendation)?)
            }
            SquadOutcome::Failed(failure) => {
                warn!("CSV output for a failed build not available, using JSON");
                println!("{}", render_json(failure.as_ref())?);
            }
        },
    }
    Ok(())
}
