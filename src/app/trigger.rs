//! Queue one audit job, run exactly that job, then read its output back.

use anyhow::Context as _;

use crate::app::model::JobStatus;
use crate::app::runner::{JobRunner, RunFilter};
use crate::report::AuditReport;
use crate::task::{InputError, TaskInput};

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("Job was not executed")]
    NotExecuted,
    #[error("Job execution failed with status: {status}{}", detail_suffix(.message))]
    NotSuccessful {
        status: JobStatus,
        message: Option<String>,
    },
    #[error("Job completed but did not return output")]
    NoOutput,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn detail_suffix(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(" ({message})"),
        None => String::new(),
    }
}

pub async fn trigger_audit(
    runner: &JobRunner,
    input: TaskInput,
) -> Result<AuditReport, TriggerError> {
    let job = runner.queue(input).await??;
    let job_id = job.job_id;

    let summary = match runner.run(&RunFilter::job(&job_id)).await {
        Ok(summary) => summary,
        Err(err) => {
            runner.record_failure(&job_id, format!("{err:#}")).await;
            return Err(err.context("run audit job").into());
        }
    };
    tracing::info!(job_id = %job_id, ?summary, "executed audit job");

    let Some(status) = summary.job_status.get(&job_id).copied() else {
        return Err(TriggerError::NotExecuted);
    };

    let record = runner
        .job_store()
        .get(&job_id)
        .await
        .context("fetch completed job")?;

    if status != JobStatus::Succeeded {
        return Err(TriggerError::NotSuccessful {
            status,
            message: record.and_then(|job| job.error_message),
        });
    }

    record
        .and_then(|job| job.output)
        .ok_or(TriggerError::NoOutput)
}
