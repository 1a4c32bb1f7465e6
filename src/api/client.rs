use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;

use crate::api::{
    ErrorBody, HeartbeatDto, JobRequestDto, JobResponseDto, ReportOutcomeDto, ReportSplitDto,
    SplitAckDto, StatsDto,
};
use crate::error::{EternityError, Result};
use crate::puzzle::{Tile, TileSet};
use crate::scheduler::{
    Assignment, Coordinator, JobId, OutcomeReport, ReportAck, SplitReport,
};

/// The four calls a worker makes against the coordinator.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    async fn request_job(&self, worker_id: &str) -> Result<Option<Assignment>>;

    async fn heartbeat(&self, job_id: JobId, worker_id: &str) -> Result<()>;

    async fn report_split(&self, report: &SplitReport) -> Result<Vec<JobId>>;

    async fn report_outcome(&self, report: &OutcomeReport) -> Result<ReportAck>;
}

/// HTTP/JSON client for a remote coordinator.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        Ok(self.client.post(self.url(path)).json(body).send().await?)
    }

    /// The coordinator's tile set, so workers search the same puzzle.
    pub async fn tiles(&self) -> Result<TileSet> {
        let response = self.client.get(self.url("/api/jobs/pieces")).send().await?;
        let response = check(response, None, "").await?;
        let tiles: Vec<Tile> = response.json().await?;
        TileSet::new(tiles)
    }

    pub async fn stats(&self) -> Result<StatsDto> {
        let response = self.client.get(self.url("/api/jobs/stats")).send().await?;
        let response = check(response, None, "").await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-success status into the matching domain error.
async fn check(response: Response, job_id: Option<JobId>, worker_id: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match (status, job_id) {
        (StatusCode::CONFLICT, Some(job_id)) => Err(EternityError::LeaseConflict {
            job_id,
            worker_id: worker_id.to_string(),
        }),
        (StatusCode::NOT_FOUND, Some(job_id)) => Err(EternityError::JobNotFound(job_id)),
        _ => {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            Err(EternityError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl CoordinatorClient for HttpClient {
    async fn request_job(&self, worker_id: &str) -> Result<Option<Assignment>> {
        let body = JobRequestDto {
            worker_id: worker_id.to_string(),
        };
        let response = self.post("/api/jobs/request", &body).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let response = check(response, None, worker_id).await?;
        let dto: JobResponseDto = response.json().await?;
        dto.into_assignment().map(Some)
    }

    async fn heartbeat(&self, job_id: JobId, worker_id: &str) -> Result<()> {
        let body = HeartbeatDto {
            job_id,
            worker_id: worker_id.to_string(),
        };
        let response = self.post("/api/jobs/heartbeat", &body).await?;
        check(response, Some(job_id), worker_id).await?;
        Ok(())
    }

    async fn report_split(&self, report: &SplitReport) -> Result<Vec<JobId>> {
        let body = ReportSplitDto::from(report);
        let response = self.post("/api/jobs/report-split", &body).await?;
        let response = check(response, Some(report.job_id), &report.worker_id).await?;
        let ack: SplitAckDto = response.json().await?;
        Ok(ack.children)
    }

    async fn report_outcome(&self, report: &OutcomeReport) -> Result<ReportAck> {
        let body = ReportOutcomeDto::from(report);
        let response = self.post("/api/jobs/report-outcome", &body).await?;
        let response = check(response, Some(report.job_id), &report.worker_id).await?;
        Ok(response.json().await?)
    }
}

/// In-process client; used when the worker shares a process with the
/// coordinator.
#[derive(Clone)]
pub struct LocalClient {
    coordinator: Arc<Coordinator>,
}

impl LocalClient {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl CoordinatorClient for LocalClient {
    async fn request_job(&self, worker_id: &str) -> Result<Option<Assignment>> {
        self.coordinator.request_job(worker_id).await
    }

    async fn heartbeat(&self, job_id: JobId, worker_id: &str) -> Result<()> {
        self.coordinator.heartbeat(job_id, worker_id)
    }

    async fn report_split(&self, report: &SplitReport) -> Result<Vec<JobId>> {
        self.coordinator.report_split(report.clone())
    }

    async fn report_outcome(&self, report: &OutcomeReport) -> Result<ReportAck> {
        self.coordinator.report_outcome(report.clone())
    }
}
