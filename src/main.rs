use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    post_audit::logging::init("info").context("init logging")?;

    let cli = post_audit::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        post_audit::cli::Command::Audit(args) => {
            post_audit::run::audit(args).await.context("audit")?;
        }
    }

    Ok(())
}
