use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use post_audit::app::context::AppContext;
use post_audit::app::job_store::{JobStore, LocalFsJobStore};
use post_audit::cli::StoreArgs;
use post_audit::config::{AuditConfig, StoreSource};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Directory for job records.
    #[arg(long, default_value = "workspace-app")]
    data_dir: PathBuf,

    /// Deferred audit jobs allowed to run at once.
    #[arg(long, default_value_t = 1)]
    max_concurrency: usize,

    #[command(flatten)]
    store: StoreArgs,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    post_audit::logging::init("info,tower_http=debug")?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting post-audit-app");

    let config = AuditConfig::from_args(&args.store)?;
    let store = StoreSource::from_args(&args.store)?
        .open()
        .await
        .context("open document store")?;
    let job_store: Arc<dyn JobStore> = Arc::new(LocalFsJobStore::new(&args.data_dir));
    tracing::info!(
        data_dir = %args.data_dir.display(),
        fallback = ?config.fallback,
        empty_slug = ?config.empty_slug,
        category_limit = config.category_limit,
        "job store ready"
    );

    let ctx = AppContext::new(store, job_store, config, args.max_concurrency);
    let app = post_audit::app::http::router(ctx);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(?err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
