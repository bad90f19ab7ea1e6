use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct JobResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

enum JobState {
    Running(JoinHandle<JobResult>),
}

/// Tracks long-running shell commands spawned by the `bash` built-in tool so
/// `check_background_command` can poll them across cycles. A job that
/// outlives its cycle budget is the reason the `RUNNING` / `BATCH_RUNNING`
/// status codes exist in the wire protocol at all.
#[derive(Default, Clone)]
pub struct BackgroundJobRegistry {
    jobs: Arc<Mutex<HashMap<String, JobState>>>,
}

impl BackgroundJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, command: String, cwd: Option<String>) -> String {
        let job_id = Uuid::new_v4().to_string();
        let handle = tokio::spawn(async move { run_command(command, cwd).await });
        self.jobs.lock().insert(job_id.clone(), JobState::Running(handle));
        job_id
    }

    /// Returns `None` if no job is known by this id, `Some(None)` if it is
    /// still running, `Some(Some(result))` once it has completed (the job
    /// is reaped on this call and a later poll of the same id returns
    /// `None`).
    pub async fn poll(&self, job_id: &str) -> Option<Option<JobResult>> {
        let taken = self.jobs.lock().remove(job_id);
        match taken {
            None => None,
            Some(JobState::Running(handle)) => {
                if handle.is_finished() {
                    match handle.await {
                        Ok(result) => Some(Some(result)),
                        Err(e) => Some(Some(JobResult { exit_code: None, stdout: String::new(), stderr: e.to_string() })),
                    }
                } else {
                    self.jobs.lock().insert(job_id.to_string(), JobState::Running(handle));
                    Some(None)
                }
            }
        }
    }
}

async fn run_command(command: String, cwd: Option<String>) -> JobResult {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(&command).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    match cmd.spawn() {
        Ok(mut child) => {
            let mut stdout = String::new();
            let mut stderr = String::new();
            if let Some(mut out) = child.stdout.take() {
                let _ = out.read_to_string(&mut stdout).await;
            }
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_string(&mut stderr).await;
            }
            let status = child.wait().await.ok();
            JobResult {
                exit_code: status.and_then(|s| s.code()),
                stdout,
                stderr,
            }
        }
        Err(e) => JobResult {
            exit_code: None,
            stdout: String::new(),
            stderr: e.to_string(),
        },
    }
}
