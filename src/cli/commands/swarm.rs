//! `aegisctl swarm|health` handlers.

use anyhow::Result;
use comfy_table::Cell;

use crate::cli::client::AegisClient;
use crate::cli::display::{list_table, render_list, status_cell};

pub async fn handle_swarm(client: &AegisClient, json: bool) -> Result<()> {
    let snapshot = client.get_swarm().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "totalSlots": snapshot.total_slots,
            "availableSlots": snapshot.available_slots,
            "activeAgents": snapshot.active_agents,
        }))?);
        return Ok(());
    }

    println!("slots: {} total, {} available, {} agents active", snapshot.total_slots, snapshot.available_slots, snapshot.active_agents);

    let mut table = list_table(&["slot", "status", "agent", "task", "progress"]);
    for s in &snapshot.slots {
        table.add_row(vec![
            Cell::new(s.index.to_string()),
            status_cell(&format!("{:?}", s.status).to_lowercase()),
            Cell::new(s.agent_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into())),
            Cell::new(s.task_title.clone().unwrap_or_else(|| "-".into())),
            Cell::new(format!("{}%", s.progress)),
        ]);
    }
    println!("\n{}", render_list("slot", table, snapshot.slots.len()));
    Ok(())
}

pub async fn handle_health(client: &AegisClient, json: bool) -> Result<()> {
    let health = client.health().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "healthy": health.healthy,
            "version": health.version,
            "uptimeSec": health.uptime_sec,
            "activeWorkers": health.active_workers,
            "totalWorkers": health.total_workers,
            "activeMissions": health.active_missions,
        }))?);
        return Ok(());
    }

    println!("healthy:          {}", health.healthy);
    println!("version:          {}", health.version);
    println!("uptime:           {}s", health.uptime_sec);
    println!("workers:          {}/{} active", health.active_workers, health.total_workers);
    println!("active missions:  {}", health.active_missions);
    Ok(())
}
