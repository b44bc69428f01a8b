use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_CATEGORY_LIMIT, EmptySlugPolicy, FallbackPolicy};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify posts by missing relationships and print the report as JSON.
    Audit(AuditArgs),
}

/// Where posts and categories come from. Shared by the CLI and the server.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// JSON or YAML snapshot with `posts` and `categories`.
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Payload CMS base URL (falls back to `POST_AUDIT_PAYLOAD_URL`).
    /// The API key is read from `POST_AUDIT_API_KEY`.
    #[arg(long)]
    pub payload_url: Option<String>,

    /// Category to suggest when nothing matches (falls back to `POST_AUDIT_FALLBACK`).
    #[arg(long, value_enum)]
    pub fallback: Option<FallbackPolicy>,

    /// Whether a category without a slug earns the slug score
    /// (falls back to `POST_AUDIT_EMPTY_SLUG`).
    #[arg(long, value_enum)]
    pub empty_slug: Option<EmptySlugPolicy>,

    /// Maximum number of categories loaded as suggestion candidates.
    #[arg(long, default_value_t = DEFAULT_CATEGORY_LIMIT)]
    pub category_limit: usize,
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Maximum posts to audit (1-500).
    #[arg(long, default_value_t = 50)]
    pub limit: i64,

    /// Audit drafts as well as published posts.
    #[arg(long)]
    pub include_unpublished: bool,

    /// Persist suggested categories and related posts.
    #[arg(long)]
    pub auto_fix: bool,

    /// Write the fixed snapshot back to `--fixture`.
    #[arg(long, requires = "fixture")]
    pub save: bool,
}
