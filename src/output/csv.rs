use anyhow::Result;

use crate::squad::SquadRecommendation;
use crate::store::{PlayerRecord, PredictionRecord};

pub fn squad_to_csv(recommendation: &SquadRecommendation) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "slot",
        "role",
        "name",
        "position",
        "team",
        "cost_m",
        "predicted_points",
        "value",
        "player_id",
    ])?;
    for slotted in &recommendation.squad_list {
        writer.write_record([
            slotted.slot.to_string(),
            format!("{:?}", slotted.role).to_lowercase(),
            slotted.entry.name().to_string(),
            slotted.entry.position().to_string(),
            slotted.entry.team_label().to_string(),
            format!("{:.1}", slotted.entry.cost_m()),
            format!("{:.2}", slotted.entry.predicted_points()),
            format!("{:.2}", slotted.entry.value()),
            slotted.entry.player_id().to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn players_to_csv(players: &[PlayerRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "fpl_player_id",
        "web_name",
        "position",
        "team_id",
        "now_cost",
        "status",
    ])?;
    for player in players {
        writer.write_record([
            player.id.to_string(),
            player.fpl_player_id.to_string(),
            player.web_name.clone(),
            player.position.clone(),
            player.team_id.to_string(),
            player.now_cost.to_string(),
            player.status.clone(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn predictions_to_csv(rows: &[PredictionRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["player_id", "target_gw", "model_name", "predicted_points"])?;
    for row in rows {
        writer.write_record([
            row.player_id.to_string(),
            row.target_gw.to_string(),
            row.model_name.clone(),
            format!("{:.4}", row.predicted_points),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
