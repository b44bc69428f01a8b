//! The audit as a named background task: input schema, defaults and outcome.

use serde::{Deserialize, Serialize};

use crate::audit::{AuditEngine, AuditOptions};
use crate::report::AuditReport;

pub const TASK_SLUG: &str = "auditPostRelationships";

pub const DEFAULT_LIMIT: i64 = 50;
pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 500;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("limit must be between 1 and 500, got {0}")]
    LimitOutOfRange(i64),
}

/// Task input as submitted. Missing fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_unpublished: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_fix: Option<bool>,
}

impl TaskInput {
    pub fn validate(&self) -> Result<AuditOptions, InputError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
            return Err(InputError::LimitOutOfRange(limit));
        }
        Ok(AuditOptions {
            limit: limit as usize,
            include_unpublished: self.include_unpublished.unwrap_or(false),
            auto_fix: self.auto_fix.unwrap_or(false),
        })
    }
}

impl From<AuditOptions> for TaskInput {
    fn from(options: AuditOptions) -> Self {
        Self {
            limit: Some(options.limit as i64),
            include_unpublished: Some(options.include_unpublished),
            auto_fix: Some(options.auto_fix),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded(AuditReport),
    Failed { error_message: String },
}

/// Runs one audit and shapes the result. Errors become `Failed`; no partial output.
pub async fn run_audit_task(engine: &AuditEngine, options: &AuditOptions) -> TaskOutcome {
    tracing::info!(
        task = TASK_SLUG,
        limit = options.limit,
        include_unpublished = options.include_unpublished,
        auto_fix = options.auto_fix,
        "task started"
    );

    match engine.run(options).await {
        Ok(result) => {
            let report = AuditReport::new(result, options.auto_fix);
            tracing::info!(
                task = TASK_SLUG,
                health_score = report.summary.health_score,
                issues = report.summary.total_issues,
                "task succeeded"
            );
            TaskOutcome::Succeeded(report)
        }
        Err(err) => {
            tracing::error!(task = TASK_SLUG, ?err, "task failed");
            TaskOutcome::Failed {
                error_message: format!("{err:#}"),
            }
        }
    }
}
