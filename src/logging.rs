use anyhow::Context as _;

/// Installs the global stderr subscriber. `RUST_LOG` wins over `default_directive`.
pub fn init(default_directive: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_directive))
        .with_context(|| format!("build log filter from {default_directive:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    tracing::debug!(default_directive, "logging initialized");
    Ok(())
}
