use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Runs deferred jobs in the background, at most `max_concurrency` at a time.
#[derive(Debug, Clone)]
pub struct InProcessQueue {
    semaphore: Arc<Semaphore>,
}

impl InProcessQueue {
    pub fn new(max_concurrency: usize) -> Self {
        let permits = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                tracing::warn!("in-process queue is closed; dropping deferred job");
                return;
            };
            fut.await;
        })
    }
}
