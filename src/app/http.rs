use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::app::context::AppContext;
use crate::app::model::Job;
use crate::app::trigger::{TriggerError, trigger_audit};
use crate::report::AuditReport;
use crate::task::TaskInput;

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/audit-posts", post(run_audit))
        .route("/api/audit-posts/jobs", post(queue_audit))
        .route("/api/jobs/:job_id", get(get_job))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditResponse {
    success: bool,
    output: AuditReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueuedResponse {
    success: bool,
    job_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: error.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for TriggerError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotExecuted
            | Self::NotSuccessful { .. }
            | Self::NoOutput
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(err = %format!("{self:#}"), "audit trigger failed");
        }
        failure(status, self.to_string())
    }
}

/// Unreadable bodies get the same `{success:false, error}` shape as every other failure.
fn task_input(body: Result<Json<TaskInput>, JsonRejection>) -> Result<TaskInput, Response> {
    match body {
        Ok(Json(input)) => Ok(input),
        Err(rejection) => {
            tracing::warn!(
                status = %rejection.status(),
                error = %rejection.body_text(),
                "rejected audit request body"
            );
            Err(failure(StatusCode::BAD_REQUEST, rejection.body_text()))
        }
    }
}

/// Queues, runs and returns one audit in the same request.
async fn run_audit(
    State(ctx): State<AppContext>,
    body: Result<Json<TaskInput>, JsonRejection>,
) -> Response {
    let input = match task_input(body) {
        Ok(input) => input,
        Err(response) => return response,
    };
    match trigger_audit(&ctx.runner, input).await {
        Ok(output) => Json(AuditResponse {
            success: true,
            output,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Queues one audit for the background queue and returns its job id.
async fn queue_audit(
    State(ctx): State<AppContext>,
    body: Result<Json<TaskInput>, JsonRejection>,
) -> Response {
    let input = match task_input(body) {
        Ok(input) => input,
        Err(response) => return response,
    };
    let job = match ctx.runner.queue(input).await {
        Ok(Ok(job)) => job,
        Ok(Err(err)) => return TriggerError::InvalidInput(err).into_response(),
        Err(err) => return TriggerError::Internal(err).into_response(),
    };

    let runner = Arc::clone(&ctx.runner);
    let job_id = job.job_id.clone();
    ctx.queue.spawn(async move {
        runner.run_job(&job_id).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            success: true,
            job_id: job.job_id,
        }),
    )
        .into_response()
}

async fn get_job(
    State(ctx): State<AppContext>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, Response> {
    if uuid::Uuid::parse_str(job_id.trim()).is_err() {
        return Err(failure(StatusCode::BAD_REQUEST, "invalid job id"));
    }

    match ctx.job_store().get(job_id.trim()).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(failure(StatusCode::NOT_FOUND, "job not found")),
        Err(err) => {
            tracing::error!(job_id, ?err, "failed to load job");
            Err(failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("load job: {err:#}"),
            ))
        }
    }
}
