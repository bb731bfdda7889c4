use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::predict::ModelRun;
use crate::squad::{SlotRole, SquadFailure, SquadRecommendation};
use crate::store::{GameweekRecord, MaeReport, PlayerRecord, PredictionRecord, TeamRecord};

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn render_squad_table(recommendation: &SquadRecommendation) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "Slot", "Role", "Name", "Pos", "Team", "Cost", "Points", "Value",
    ]);
    for slotted in &recommendation.squad_list {
        let role = match slotted.role {
            SlotRole::Starting => Cell::new("starting").fg(Color::Green),
            SlotRole::Bench => Cell::new("bench").fg(Color::Yellow),
        };
        table.add_row(Row::from(vec![
            Cell::new(slotted.slot.to_string()),
            role,
            Cell::new(slotted.entry.name()),
            Cell::new(slotted.entry.position().to_string()),
            Cell::new(slotted.entry.team_label()),
            Cell::new(format!("{:.1}", slotted.entry.cost_m())),
            Cell::new(format!("{:.2}", slotted.entry.predicted_points())),
            Cell::new(format!("{:.2}", slotted.entry.value())),
        ]));
    }

    let summary = &recommendation.summary;
    format!(
        "Squad for GW{} ({})\n{}\nSpent: {:.1}m | Remaining: {:.1}m",
        recommendation.target_gw, recommendation.model_name, table, summary.spent_m,
        summary.remaining_m,
    )
}

pub fn render_squad_failure(failure: &SquadFailure) -> String {
    let mut out = format!("Squad build failed: {}\n", failure.error);
    let diagnostics = &failure.diagnostics;
    if let Some(missing) = &diagnostics.missing_by_position {
        let mut table = base_table();
        table.set_header(vec!["Position", "Need", "Have"]);
        for (position, need_have) in missing {
            table.add_row(vec![
                position.to_string(),
                need_have.need.to_string(),
                need_have.have.to_string(),
            ]);
        }
        out.push_str(&table.to_string());
        out.push('\n');
    }
    for reason in &diagnostics.reasons {
        out.push_str(&format!("- {reason}\n"));
    }
    if let Some(hint) = &diagnostics.hint {
        out.push_str(&format!("hint: {hint}\n"));
    }
    if let (Some(spent), Some(remaining)) = (diagnostics.spent_m, diagnostics.remaining_m) {
        out.push_str(&format!("Spent: {spent:.1}m | Remaining: {remaining:.1}m\n"));
    }
    out
}

pub fn render_players_table(players: &[PlayerRecord]) -> String {
    let mut table = base_table();
    table.set_header(vec!["ID", "Name", "Pos", "Team", "Cost", "Status"]);
    for player in players {
        table.add_row(vec![
            player.id.to_string(),
            player.web_name.clone(),
            player.position.clone(),
            player.team_id.to_string(),
            format!("{:.1}", player.now_cost as f64 / 10.0),
            player.status.clone(),
        ]);
    }
    table.to_string()
}

pub fn render_teams_table(teams: &[TeamRecord]) -> String {
    let mut table = base_table();
    table.set_header(vec!["ID", "FPL ID", "Name", "Short"]);
    for team in teams {
        table.add_row(vec![
            team.id.to_string(),
            team.fpl_team_id.to_string(),
            team.name.clone(),
            team.short_name.clone(),
        ]);
    }
    table.to_string()
}

pub fn render_gameweeks_table(
    current: Option<&GameweekRecord>,
    next: Option<&GameweekRecord>,
) -> String {
    let mut table = base_table();
    table.set_header(vec!["", "GW", "Deadline", "Finished", "Name"]);
    for (label, gameweek) in [("current", current), ("next", next)] {
        match gameweek {
            Some(gw) => table.add_row(vec![
                label.to_string(),
                gw.gw.to_string(),
                gw.deadline_time
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string()),
                if gw.is_finished { "yes" } else { "no" }.to_string(),
                gw.name.clone().unwrap_or_else(|| "-".to_string()),
            ]),
            None => table.add_row(vec![
                label.to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
            ]),
        };
    }
    table.to_string()
}

pub fn render_predictions_table(rows: &[PredictionRecord]) -> String {
    let mut table = base_table();
    table.set_header(vec!["Player", "GW", "Model", "Predicted"]);
    for row in rows {
        table.add_row(vec![
            row.player_id.to_string(),
            row.target_gw.to_string(),
            row.model_name.clone(),
            format!("{:.2}", row.predicted_points),
        ]);
    }
    table.to_string()
}

pub fn render_model_run(run: &ModelRun) -> String {
    format!(
        "Model {} predicted {} players for GW{} (window {}, gameweeks {:?}): {} inserted, {} updated",
        run.model_name,
        run.total_players_predicted,
        run.target_gw,
        run.window,
        run.used_finished_gws,
        run.inserted,
        run.updated,
    )
}

pub fn render_mae(report: &MaeReport) -> String {
    match report.mae {
        Some(mae) => format!("MAE over {} samples: {mae:.3}", report.samples),
        None => "No overlapping predictions and stats to evaluate.".to_string(),
    }
}
