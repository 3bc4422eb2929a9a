//! Containerised execution strategy (spec.md §4.2): spins up a sandbox
//! bound-mounted at `/workspace`, runs a fixed entrypoint, parses progress
//! markers of shape `[PROGRESS:<n>]` from its output stream, auto-removes
//! on exit. No container-runtime crate exists in this corpus, so — the way
//! the teacher's Claude Code substrate shells out to an external CLI — this
//! shells out to the `docker` binary via `tokio::process::Command`.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::domain::models::config::ContainerConfig;
use crate::domain::models::task::Task;
use crate::domain::ports::errors::AegisError;
use crate::domain::ports::execution::{ExecutionEvent, ExecutionStrategy};

const PROGRESS_PREFIX: &str = "[PROGRESS:";
const STOP_GRACE_SECS: &str = "5";

pub struct ContainerizedStrategy {
    image: String,
    socket_path: String,
    network: String,
    /// Name of the container the in-flight `execute` call is running,
    /// if any — read by `is_healthy` from a concurrent health-sweep task.
    running_container: Arc<Mutex<Option<String>>>,
}

impl ContainerizedStrategy {
    pub fn new(config: &ContainerConfig) -> Self {
        Self {
            image: config.image.clone(),
            socket_path: config.socket_path.clone(),
            network: config.network.clone(),
            running_container: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl ExecutionStrategy for ContainerizedStrategy {
    async fn execute(
        &self,
        task: &Task,
        workspace_path: &str,
        cancel: CancellationToken,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<(), AegisError> {
        let container_name = format!("aegis-{}", task.id);

        let mut cmd = Command::new("docker");
        cmd.env("DOCKER_HOST", format!("unix://{}", self.socket_path))
            .args([
                "run",
                "--rm",
                "--name",
                &container_name,
                "--network",
                &self.network,
                "-v",
                &format!("{workspace_path}:/workspace:rw"),
                &self.image,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| AegisError::IoFailure(format!("failed to spawn docker run: {e}")))?;

        let stdout = child.stdout.take().ok_or_else(|| AegisError::IoFailure("missing stdout handle".into()))?;
        let stderr = child.stderr.take().ok_or_else(|| AegisError::IoFailure("missing stderr handle".into()))?;

        *self.running_container.lock().await = Some(container_name.clone());

        let events_for_stdout = events.clone();
        let stdout_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
                    if let Some(value) = rest.strip_suffix(']').and_then(|v| v.parse::<u8>().ok()) {
                        let _ = events_for_stdout.send(ExecutionEvent::Progress(value)).await;
                        continue;
                    }
                }
                let _ = events_for_stdout.send(ExecutionEvent::Log(line)).await;
            }
        });

        // Drained on its own task, same as stdout: `docker run`'s stderr pipe
        // has a bounded OS buffer, so a task that writes heavily to stderr
        // before exiting would otherwise block on that write and `child.wait()`
        // below would never return.
        let stderr_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => output.push_str(&line),
                }
            }
            output
        });

        let wait_result = tokio::select! {
            status = child.wait() => status.map_err(|e| AegisError::IoFailure(e.to_string())),
            () = cancel.cancelled() => {
                let _ = Command::new("docker").args(["stop", "-t", STOP_GRACE_SECS, &container_name]).status().await;
                let _ = child.kill().await;
                *self.running_container.lock().await = None;
                return Err(AegisError::IoFailure("cancelled".to_string()));
            }
        };

        let stderr_output = stderr_task.await.unwrap_or_default();
        let _ = stdout_task.await;
        *self.running_container.lock().await = None;

        let status = wait_result?;
        if status.success() {
            Ok(())
        } else {
            Err(AegisError::IoFailure(format!("container exited with {:?}: {}", status.code(), stderr_output)))
        }
    }

    async fn is_healthy(&self) -> bool {
        let name = self.running_container.lock().await.clone();
        let Some(name) = name else { return true };
        Command::new("docker")
            .args(["inspect", "-f", "{{.State.Running}}", &name])
            .output()
            .await
            .map(|out| String::from_utf8_lossy(&out.stdout).trim() == "true")
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_marker_parses_numeric_payload() {
        let line = "[PROGRESS:42]";
        let rest = line.strip_prefix(PROGRESS_PREFIX).unwrap();
        let value: u8 = rest.strip_suffix(']').unwrap().parse().unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn container_name_is_derived_from_task_id() {
        let config = ContainerConfig {
            enabled: true,
            image: "x".into(),
            socket_path: "/var/run/docker.sock".into(),
            network: "none".into(),
        };
        let strategy = ContainerizedStrategy::new(&config);
        assert_eq!(strategy.image, "x");
    }
}
