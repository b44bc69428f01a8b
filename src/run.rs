use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context as _;

use crate::audit::AuditEngine;
use crate::cli::AuditArgs;
use crate::config::{AuditConfig, StoreSource};
use crate::store::{DocumentStore, MemoryDocumentStore};
use crate::task::{TaskInput, TaskOutcome, run_audit_task};

/// One-shot audit: runs the task directly (no job queue) and prints the report.
pub async fn audit(args: AuditArgs) -> anyhow::Result<()> {
    let options = TaskInput {
        limit: Some(args.limit),
        include_unpublished: Some(args.include_unpublished),
        auto_fix: Some(args.auto_fix),
    }
    .validate()?;
    let config = AuditConfig::from_args(&args.store)?;
    let source = StoreSource::from_args(&args.store)?;

    let (store, fixture): (Arc<dyn DocumentStore>, _) = match &source {
        StoreSource::Fixture(path) => {
            let store = Arc::new(
                MemoryDocumentStore::load(path)
                    .await
                    .with_context(|| format!("load fixture: {}", path.display()))?,
            );
            let shared: Arc<dyn DocumentStore> = store.clone();
            (shared, Some((store, path)))
        }
        StoreSource::Payload { .. } => (source.open().await?, None),
    };

    let engine = AuditEngine::new(store, config);
    let report = match run_audit_task(&engine, &options).await {
        TaskOutcome::Succeeded(report) => report,
        TaskOutcome::Failed { error_message } => anyhow::bail!("audit failed: {error_message}"),
    };

    if args.save
        && let Some((store, path)) = fixture
    {
        store
            .save(path)
            .await
            .with_context(|| format!("save fixture: {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved fixture");
    }

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report).context("write report")?;
    stdout.write_all(b"\n").context("write report newline")?;
    Ok(())
}
