use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::api::{
    ErrorBody, HeartbeatDto, JobRequestDto, JobResponseDto, JobView, ReportOutcomeDto,
    ReportSplitDto, SolutionDto, SplitAckDto, StatsDto, VerifyDto,
};
use crate::error::{EternityError, Result};
use crate::scheduler::{Coordinator, JobId, ReportAck, SolutionId};

/// Error half of every handler; maps the domain error onto a status code.
pub struct ApiError(EternityError);

impl From<EternityError> for ApiError {
    fn from(e: EternityError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            EternityError::JobNotFound(_) | EternityError::SolutionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            EternityError::LeaseConflict { .. } => StatusCode::CONFLICT,
            EternityError::Unauthorized => StatusCode::FORBIDDEN,
            EternityError::Codec(_)
            | EternityError::InvalidBoard(_)
            | EternityError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/jobs/request", post(request_job_handler))
        .route("/api/jobs/heartbeat", post(heartbeat_handler))
        .route("/api/jobs/report-split", post(report_split_handler))
        .route("/api/jobs/report-outcome", post(report_outcome_handler))
        .route("/api/jobs/stats", get(stats_handler))
        .route("/api/jobs/pieces", get(pieces_handler))
        .route("/api/jobs/:id", get(job_handler))
        .route("/api/solutions", get(solutions_handler))
        .route("/api/solutions/:id/verify", post(verify_solution_handler))
        .layer(cors)
        .with_state(coordinator)
}

/// Serve the API on `addr` until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    coordinator: Arc<Coordinator>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "Failed to bind coordinator API");
        e
    })?;
    tracing::info!(addr = %addr, "Coordinator API listening");

    axum::serve(listener, router(coordinator))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Coordinator API stopped");
    Ok(())
}

async fn request_job_handler(
    State(coordinator): State<Arc<Coordinator>>,
    Json(req): Json<JobRequestDto>,
) -> ApiResult<Response> {
    match coordinator.request_job(&req.worker_id).await? {
        Some(assignment) => Ok(Json(JobResponseDto::from(assignment)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn heartbeat_handler(
    State(coordinator): State<Arc<Coordinator>>,
    Json(req): Json<HeartbeatDto>,
) -> ApiResult<StatusCode> {
    coordinator.heartbeat(req.job_id, &req.worker_id)?;
    Ok(StatusCode::OK)
}

async fn report_split_handler(
    State(coordinator): State<Arc<Coordinator>>,
    Json(req): Json<ReportSplitDto>,
) -> ApiResult<Json<SplitAckDto>> {
    let children = coordinator.report_split(req.into_report()?)?;
    Ok(Json(SplitAckDto { children }))
}

async fn report_outcome_handler(
    State(coordinator): State<Arc<Coordinator>>,
    Json(req): Json<ReportOutcomeDto>,
) -> ApiResult<Json<ReportAck>> {
    let ack = coordinator.report_outcome(req.into_report()?)?;
    Ok(Json(ack))
}

async fn stats_handler(State(coordinator): State<Arc<Coordinator>>) -> ApiResult<Json<StatsDto>> {
    Ok(Json(coordinator.stats()?.into()))
}

async fn pieces_handler(State(coordinator): State<Arc<Coordinator>>) -> Response {
    match coordinator.tiles() {
        Some(tiles) => Json(tiles.tiles().to_vec()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "coordinator has no tile set".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn job_handler(
    State(coordinator): State<Arc<Coordinator>>,
    Path(id): Path<JobId>,
) -> ApiResult<Json<JobView>> {
    Ok(Json(coordinator.job(id)?.into()))
}

async fn solutions_handler(
    State(coordinator): State<Arc<Coordinator>>,
) -> ApiResult<Json<Vec<SolutionDto>>> {
    let solutions = coordinator
        .solutions()?
        .into_iter()
        .map(SolutionDto::from)
        .collect();
    Ok(Json(solutions))
}

async fn verify_solution_handler(
    State(coordinator): State<Arc<Coordinator>>,
    Path(id): Path<SolutionId>,
    Json(req): Json<VerifyDto>,
) -> ApiResult<Json<SolutionDto>> {
    let solution = coordinator.verify_solution(id, Some(&req.admin_token))?;
    Ok(Json(solution.into()))
}
