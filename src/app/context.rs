use std::sync::Arc;

use crate::app::job_store::JobStore;
use crate::app::queue::InProcessQueue;
use crate::app::runner::JobRunner;
use crate::audit::AuditEngine;
use crate::config::AuditConfig;
use crate::store::DocumentStore;

/// Everything a request handler needs. Built once at startup and shared by reference.
#[derive(Clone)]
pub struct AppContext {
    pub runner: Arc<JobRunner>,
    pub queue: InProcessQueue,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        job_store: Arc<dyn JobStore>,
        config: AuditConfig,
        max_concurrency: usize,
    ) -> Self {
        let engine = Arc::new(AuditEngine::new(store, config));
        let runner = Arc::new(JobRunner::new(job_store, engine));
        Self {
            runner,
            queue: InProcessQueue::new(max_concurrency),
        }
    }

    pub fn job_store(&self) -> &Arc<dyn JobStore> {
        self.runner.job_store()
    }
}
