//! Admin service reporting: heartbeat and checkpoint pushes
//!
//! Single-shot HTTP POSTs with a bounded timeout. Failures are logged at
//! warn, counted, and dropped.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::ReportError;

/// Request timeout for admin pushes
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_IDLE_PER_HOST: usize = 3;
const HEARTBEAT_PATH: &str = "/worker/status";
const CHECKPOINT_PATH: &str = "/msa/task/offset";

/// Role advertised in heartbeats
pub const WORKER_ROLE: &str = "reader";

/// Address this worker advertises to the admin service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerIdentity {
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
struct Heartbeat<'a> {
    ip: &'a str,
    port: u16,
    role: &'static str,
}

/// Resumable position of the active task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub task_id: String,
    pub repl_id: String,
    pub repl_offset: i64,
}

/// Admin response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct AdminResponse {
    pub code: i64,
    #[serde(default)]
    pub message: Value,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Client for the admin service
#[derive(Debug, Clone)]
pub struct AdminReporter {
    client: reqwest::Client,
    admin_url: String,
    identity: WorkerIdentity,
}

impl AdminReporter {
    pub fn new(admin_url: &str, identity: WorkerIdentity) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(REPORT_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()?;

        Ok(Self {
            client,
            admin_url: admin_url.trim_end_matches('/').to_string(),
            identity,
        })
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    /// Push one heartbeat
    pub async fn heartbeat(&self) -> Result<AdminResponse, ReportError> {
        let body = Heartbeat {
            ip: &self.identity.ip,
            port: self.identity.port,
            role: WORKER_ROLE,
        };
        self.post(HEARTBEAT_PATH, &body).await
    }

    /// Push one checkpoint
    pub async fn checkpoint(&self, checkpoint: &Checkpoint) -> Result<AdminResponse, ReportError> {
        self.post(CHECKPOINT_PATH, checkpoint).await
    }

    /// Heartbeat with failures logged and dropped
    #[instrument(name = "report_heartbeat", skip(self))]
    pub async fn report_heartbeat(&self) {
        match self.heartbeat().await {
            Ok(_) => debug!("heartbeat sent"),
            Err(e) => {
                warn!(error = %e, "heartbeat failed");
                observability::record_report_failure("heartbeat");
            }
        }
    }

    /// Checkpoint with failures logged and dropped
    #[instrument(
        name = "report_checkpoint",
        skip(self, checkpoint),
        fields(task_id = %checkpoint.task_id, offset = checkpoint.repl_offset)
    )]
    pub async fn report_checkpoint(&self, checkpoint: Checkpoint) {
        match self.checkpoint(&checkpoint).await {
            Ok(_) => debug!("checkpoint sent"),
            Err(e) => {
                warn!(error = %e, "checkpoint failed");
                observability::record_report_failure("checkpoint");
            }
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<AdminResponse, ReportError> {
        let url = format!("{}{}", self.admin_url, path);
        let resp = self.client.post(&url).json(body).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        check_response(status, &bytes)
    }
}

/// Accept only a 2xx response whose envelope carries `code == 0`
pub fn check_response(status: StatusCode, body: &[u8]) -> Result<AdminResponse, ReportError> {
    if !status.is_success() {
        return Err(ReportError::Status(status.as_u16()));
    }

    let resp: AdminResponse =
        serde_json::from_slice(body).map_err(|e| ReportError::InvalidBody(e.to_string()))?;

    if resp.code != 0 {
        let message = match &resp.message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ReportError::Rejected {
            code: resp.code,
            message,
        });
    }

    Ok(resp)
}
