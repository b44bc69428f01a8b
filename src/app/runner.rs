use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context as _;

use crate::app::job_store::JobStore;
use crate::app::model::{Job, JobStatus};
use crate::audit::AuditEngine;
use crate::task::{InputError, TaskInput, TaskOutcome, run_audit_task};

/// Selects queued jobs for [`JobRunner::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    pub job_id: Option<String>,
    pub limit: Option<usize>,
}

impl RunFilter {
    pub fn job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            limit: Some(1),
        }
    }
}

/// Final status of every job a [`JobRunner::run`] call executed, keyed by job id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub job_status: BTreeMap<String, JobStatus>,
}

pub struct JobRunner {
    job_store: Arc<dyn JobStore>,
    engine: Arc<AuditEngine>,
}

impl JobRunner {
    pub fn new(job_store: Arc<dyn JobStore>, engine: Arc<AuditEngine>) -> Self {
        Self { job_store, engine }
    }

    pub fn job_store(&self) -> &Arc<dyn JobStore> {
        &self.job_store
    }

    /// Validates the input and persists a queued job. Nothing runs yet.
    pub async fn queue(&self, input: TaskInput) -> anyhow::Result<Result<Job, InputError>> {
        if let Err(err) = input.validate() {
            return Ok(Err(err));
        }
        let job = Job::queued(input);
        self.job_store.create(&job).await.context("create job")?;
        tracing::info!(job_id = %job.job_id, task = %job.task, "queued job");
        Ok(Ok(job))
    }

    /// Executes the queued jobs matching `filter`, one after another.
    pub async fn run(&self, filter: &RunFilter) -> anyhow::Result<RunSummary> {
        let candidates: Vec<Job> = match &filter.job_id {
            Some(job_id) => self
                .job_store
                .get(job_id)
                .await
                .context("load job")?
                .into_iter()
                .collect(),
            None => self.job_store.list().await.context("list jobs")?,
        };

        let mut summary = RunSummary::default();
        let limit = filter.limit.unwrap_or(usize::MAX);
        for job in candidates
            .into_iter()
            .filter(|job| job.status == JobStatus::Queued)
            .take(limit)
        {
            let (job_id, status) = self.execute(job).await?;
            summary.job_status.insert(job_id, status);
        }
        Ok(summary)
    }

    /// Runs one job and records the outcome. Used by the deferred queue.
    pub async fn run_job(&self, job_id: &str) {
        if let Err(err) = self.run(&RunFilter::job(job_id)).await {
            tracing::error!(job_id, ?err, "job run failed");
            self.record_failure(job_id, format!("{err:#}")).await;
        }
    }

    /// Best effort: moves a job that did not reach a terminal state to `failed`.
    pub async fn record_failure(&self, job_id: &str, message: String) {
        if let Err(err) = self.mark_failed(job_id, message).await {
            tracing::warn!(job_id, ?err, "could not record job failure");
        }
    }

    async fn execute(&self, mut job: Job) -> anyhow::Result<(String, JobStatus)> {
        job.start()?;
        self.job_store.put(&job).await.context("save job")?;
        tracing::info!(job_id = %job.job_id, "job running");

        let outcome = match job.input.validate() {
            Ok(options) => run_audit_task(&self.engine, &options).await,
            Err(err) => TaskOutcome::Failed {
                error_message: err.to_string(),
            },
        };
        match outcome {
            TaskOutcome::Succeeded(report) => job.succeed(report),
            TaskOutcome::Failed { error_message } => job.fail(error_message),
        }

        self.job_store.put(&job).await.context("save job")?;
        tracing::info!(job_id = %job.job_id, status = %job.status, "job finished");
        Ok((job.job_id, job.status))
    }

    async fn mark_failed(&self, job_id: &str, message: String) -> anyhow::Result<()> {
        let Some(mut job) = self.job_store.get(job_id).await.context("load job")? else {
            return Ok(());
        };
        if job.status.is_terminal() {
            return Ok(());
        }
        job.fail(message);
        self.job_store.put(&job).await.context("save job")?;
        Ok(())
    }
}
