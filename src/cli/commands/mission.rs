//! `aegisctl submit|status|list|cancel|watch` handlers.

use std::io::Read;

use anyhow::{Context, Result};
use futures::StreamExt;
use uuid::Uuid;

use crate::cli::client::AegisClient;
use crate::cli::display::{list_table, render_list, status_cell};
use crate::domain::models::mission::MissionBrief;

fn read_brief(path: &str) -> Result<MissionBrief> {
    let raw = if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("failed to read mission brief from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read mission brief from {path}"))?
    };
    serde_json::from_str(&raw).context("mission brief is not valid JSON")
}

pub async fn handle_submit(client: &AegisClient, brief_path: &str, dry_run: bool, json: bool) -> Result<()> {
    let brief = read_brief(brief_path)?;
    let resp = client.submit_mission(&brief, dry_run).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "missionId": resp.mission_id,
            "channel": resp.channel,
            "estimatedDurationMs": resp.estimated_duration_ms,
            "totalTasks": resp.total_tasks,
        }))?);
        return Ok(());
    }

    println!("Mission submitted: {}", resp.mission_id);
    println!("  channel:            {}", resp.channel);
    println!("  total tasks:        {}", resp.total_tasks);
    println!("  estimated duration: {} ms", resp.estimated_duration_ms);
    Ok(())
}

pub async fn handle_status(client: &AegisClient, mission_id: Uuid, json: bool) -> Result<()> {
    let detail = client.get_mission(mission_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "mission": detail.mission,
            "agents": detail.agents,
        }))?);
        return Ok(());
    }

    let m = &detail.mission;
    println!("{}  {}", m.id, m.brief.title);
    println!("  status:    {:?}", m.status);
    println!("  progress:  {}%", m.progress);
    println!("  phase:     {}", m.current_phase.as_deref().unwrap_or("-"));
    println!("  tasks:     {} pending, {} in-progress, {} completed, {} failed", m.buckets.pending.len(), m.buckets.in_progress.len(), m.buckets.completed.len(), m.buckets.failed.len());
    if let Some(reason) = &m.failure_reason {
        println!("  reason:    {reason}");
    }

    if !detail.agents.is_empty() {
        let mut table = list_table(&["agent", "task", "status", "progress"]);
        for a in &detail.agents {
            table.add_row(vec![a.id.to_string(), a.current_task.to_string(), format!("{:?}", a.status), format!("{}%", a.progress)]);
        }
        println!("\n{}", render_list("agent", table, detail.agents.len()));
    }
    Ok(())
}

pub async fn handle_list(client: &AegisClient, json: bool) -> Result<()> {
    let resp = client.list_missions().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "missions": resp.missions }))?);
        return Ok(());
    }

    let mut table = list_table(&["id", "title", "status", "progress", "agents"]);
    for m in &resp.missions {
        table.add_row(vec![
            comfy_table::Cell::new(m.id.to_string()),
            comfy_table::Cell::new(&m.title),
            status_cell(&format!("{:?}", m.status).to_lowercase()),
            comfy_table::Cell::new(format!("{}%", m.progress)),
            comfy_table::Cell::new(m.agent_count.to_string()),
        ]);
    }
    println!("{}", render_list("mission", table, resp.missions.len()));
    Ok(())
}

pub async fn handle_cancel(client: &AegisClient, mission_id: Uuid, reason: Option<String>, json: bool) -> Result<()> {
    let mission = client.cancel_mission(mission_id, reason).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&mission)?);
        return Ok(());
    }

    println!("Mission {} cancelled (status: {:?})", mission.id, mission.status);
    Ok(())
}

pub async fn handle_watch(client: &AegisClient, mission_id: Uuid) -> Result<()> {
    let resp = client.stream_mission_events(mission_id).await?;
    let mut stream = resp.bytes_stream();
    let mut buf = String::new();

    println!("watching mission {mission_id}, ctrl-c to stop");
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("event stream read failed")?;
        buf.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(pos) = buf.find("\n\n") {
            let frame = buf[..pos].to_string();
            buf.drain(..pos + 2);
            for line in frame.lines() {
                if let Some(data) = line.strip_prefix("data: ") {
                    println!("{data}");
                }
            }
        }
    }
    Ok(())
}
