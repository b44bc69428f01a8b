use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::AuditReport;
use crate::task::{TASK_SLUG, TaskInput};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted record of one task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub task: String,
    pub status: JobStatus,
    pub input: TaskInput,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<AuditReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn queued(input: TaskInput) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            task: TASK_SLUG.to_owned(),
            status: JobStatus::Queued,
            input,
            output: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.status != JobStatus::Queued {
            anyhow::bail!("job {} cannot start from {}", self.job_id, self.status);
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn succeed(&mut self, output: AuditReport) {
        self.status = JobStatus::Succeeded;
        self.output = Some(output);
        self.error_message = None;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.output = None;
        self.error_message = Some(message.into());
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditResult;

    #[test]
    fn lifecycle_moves_forward_only() {
        let mut job = Job::queued(TaskInput::default());
        assert_eq!(job.task, TASK_SLUG);
        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.start().is_err());

        job.succeed(AuditReport::new(AuditResult::default(), false));
        assert!(job.status.is_terminal());
        assert!(job.output.is_some());
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn failure_drops_output() {
        let mut job = Job::queued(TaskInput::default());
        job.start().unwrap();
        job.fail("boom");
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.output.is_none());
        assert_eq!(job.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn status_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Succeeded).unwrap(),
            r#""succeeded""#
        );
    }
}
