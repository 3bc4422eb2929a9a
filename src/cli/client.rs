//! Thin HTTP client the CLI uses to talk to the aegisd control plane.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::agent::Agent;
use crate::domain::models::mission::{Mission, MissionBrief, MissionStatus};

pub struct AegisClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub uptime_sec: u64,
    pub active_workers: usize,
    pub total_workers: usize,
    pub active_missions: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitMissionRequest<'a> {
    brief: &'a MissionBrief,
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMissionResponse {
    pub mission_id: Uuid,
    pub channel: String,
    pub estimated_duration_ms: i64,
    pub total_tasks: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionSummary {
    pub id: Uuid,
    pub status: MissionStatus,
    pub progress: u8,
    pub agent_count: usize,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMissionsResponse {
    pub missions: Vec<MissionSummary>,
}

#[derive(Debug, Deserialize)]
pub struct MissionDetail {
    #[serde(flatten)]
    pub mission: Mission,
    pub agents: Vec<Agent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSummary {
    pub index: usize,
    pub status: crate::domain::models::slot::SlotStatus,
    pub agent_id: Option<Uuid>,
    pub task_title: Option<String>,
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub avg_execution_ms: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmSnapshot {
    pub total_slots: usize,
    pub available_slots: usize,
    pub active_agents: usize,
    pub slots: Vec<SlotSummary>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    kind: String,
    message: String,
}

impl AegisClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body: ErrorEnvelope = resp.json().await.with_context(|| format!("request failed with status {status} and an unparseable body"))?;
        bail!("{} ({}): {}", status, body.error.kind, body.error.message);
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self.http.get(format!("{}/health", self.base_url)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn submit_mission(&self, brief: &MissionBrief, dry_run: bool) -> Result<SubmitMissionResponse> {
        let resp = self.http.post(format!("{}/missions", self.base_url)).json(&SubmitMissionRequest { brief, dry_run }).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn list_missions(&self) -> Result<ListMissionsResponse> {
        let resp = self.http.get(format!("{}/missions", self.base_url)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn get_mission(&self, mission_id: Uuid) -> Result<MissionDetail> {
        let resp = self.http.get(format!("{}/missions/{mission_id}", self.base_url)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn cancel_mission(&self, mission_id: Uuid, reason: Option<String>) -> Result<Mission> {
        #[derive(Serialize)]
        struct Body {
            reason: Option<String>,
        }
        #[derive(Deserialize)]
        struct Resp {
            mission: Mission,
        }
        let resp = self.http.post(format!("{}/missions/{mission_id}/cancel", self.base_url)).json(&Body { reason }).send().await?;
        Ok(Self::check(resp).await?.json::<Resp>().await?.mission)
    }

    pub async fn get_swarm(&self) -> Result<SwarmSnapshot> {
        let resp = self.http.get(format!("{}/swarm", self.base_url)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Opens the mission's SSE channel and returns the raw byte stream; the
    /// caller is responsible for parsing `data:` frames out of it.
    pub async fn stream_mission_events(&self, mission_id: Uuid) -> Result<reqwest::Response> {
        let resp = self.http.get(format!("{}/missions/{mission_id}/events", self.base_url)).send().await?;
        Self::check(resp).await
    }
}
