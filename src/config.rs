use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cli::StoreArgs;
use crate::payload_api::PayloadRestStore;
use crate::store::{DocumentStore, MemoryDocumentStore};

pub const ENV_PAYLOAD_URL: &str = "POST_AUDIT_PAYLOAD_URL";
pub const ENV_API_KEY: &str = "POST_AUDIT_API_KEY";
pub const ENV_FALLBACK: &str = "POST_AUDIT_FALLBACK";
pub const ENV_EMPTY_SLUG: &str = "POST_AUDIT_EMPTY_SLUG";

pub const DEFAULT_CATEGORY_LIMIT: usize = 1000;

/// What the category suggester does when no category scores above zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Suggest the first category in store order.
    #[default]
    FirstCategory,
    /// Suggest nothing.
    None,
}

impl FallbackPolicy {
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let Ok(raw) = std::env::var(ENV_FALLBACK) else {
            return Ok(None);
        };
        Self::parse(&raw)
            .map(Some)
            .with_context(|| format!("invalid {ENV_FALLBACK}={raw:?}"))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "" | "first-category" | "first" => Ok(Self::FirstCategory),
            "none" | "off" => Ok(Self::None),
            other => anyhow::bail!("unsupported fallback policy: {other}"),
        }
    }
}

/// How the category suggester scores a category that has no slug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EmptySlugPolicy {
    /// Every post slug contains the empty slug, so the category earns the slug score.
    #[default]
    Match,
    /// A missing slug earns nothing.
    Ignore,
}

impl EmptySlugPolicy {
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let Ok(raw) = std::env::var(ENV_EMPTY_SLUG) else {
            return Ok(None);
        };
        Self::parse(&raw)
            .map(Some)
            .with_context(|| format!("invalid {ENV_EMPTY_SLUG}={raw:?}"))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "match" => Ok(Self::Match),
            "ignore" | "skip" => Ok(Self::Ignore),
            other => anyhow::bail!("unsupported empty slug policy: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditConfig {
    pub fallback: FallbackPolicy,
    pub empty_slug: EmptySlugPolicy,
    /// Upper bound on categories loaded as suggestion candidates.
    pub category_limit: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::default(),
            empty_slug: EmptySlugPolicy::default(),
            category_limit: DEFAULT_CATEGORY_LIMIT,
        }
    }
}

impl AuditConfig {
    pub fn from_args(args: &StoreArgs) -> anyhow::Result<Self> {
        let fallback = match args.fallback {
            Some(policy) => policy,
            None => FallbackPolicy::from_env()?.unwrap_or_default(),
        };
        let empty_slug = match args.empty_slug {
            Some(policy) => policy,
            None => EmptySlugPolicy::from_env()?.unwrap_or_default(),
        };
        Ok(Self {
            fallback,
            empty_slug,
            category_limit: args.category_limit.max(1),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSource {
    Fixture(PathBuf),
    Payload { base_url: Url, api_key: Option<String> },
}

impl StoreSource {
    /// Resolves flags first, then `POST_AUDIT_PAYLOAD_URL` / `POST_AUDIT_API_KEY`.
    pub fn from_args(args: &StoreArgs) -> anyhow::Result<Self> {
        let payload_url = args
            .payload_url
            .clone()
            .or_else(|| std::env::var(ENV_PAYLOAD_URL).ok());
        let api_key = std::env::var(ENV_API_KEY).ok();
        Self::resolve(args.fixture.clone(), payload_url.as_deref(), api_key)
    }

    pub fn resolve(
        fixture: Option<PathBuf>,
        payload_url: Option<&str>,
        api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let payload_url = payload_url.map(str::trim).filter(|v| !v.is_empty());
        match (fixture, payload_url) {
            (Some(_), Some(_)) => {
                anyhow::bail!("--fixture and --payload-url are mutually exclusive")
            }
            (Some(path), None) => Ok(Self::Fixture(path)),
            (None, Some(raw)) => {
                let base_url = Url::parse(raw).with_context(|| format!("invalid payload url: {raw}"))?;
                if base_url.scheme() != "http" && base_url.scheme() != "https" {
                    anyhow::bail!("payload url must be http/https: {raw}");
                }
                let api_key = api_key.map(|k| k.trim().to_owned()).filter(|k| !k.is_empty());
                Ok(Self::Payload { base_url, api_key })
            }
            (None, None) => anyhow::bail!(
                "no document store configured: pass --fixture or --payload-url (or set {ENV_PAYLOAD_URL})"
            ),
        }
    }

    pub async fn open(&self) -> anyhow::Result<Arc<dyn DocumentStore>> {
        match self {
            Self::Fixture(path) => {
                let store = MemoryDocumentStore::load(path)
                    .await
                    .with_context(|| format!("load fixture: {}", path.display()))?;
                tracing::info!(path = %path.display(), "using fixture document store");
                Ok(Arc::new(store))
            }
            Self::Payload { base_url, api_key } => {
                tracing::info!(%base_url, auth = api_key.is_some(), "using payload document store");
                Ok(Arc::new(PayloadRestStore::new(base_url.clone(), api_key.clone())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fallback_variants() {
        assert_eq!(
            FallbackPolicy::parse("first-category").unwrap(),
            FallbackPolicy::FirstCategory
        );
        assert_eq!(
            FallbackPolicy::parse(" FIRST_CATEGORY ").unwrap(),
            FallbackPolicy::FirstCategory
        );
        assert_eq!(FallbackPolicy::parse("none").unwrap(), FallbackPolicy::None);
        assert!(
            FallbackPolicy::parse("random")
                .unwrap_err()
                .to_string()
                .contains("unsupported fallback policy")
        );
    }

    #[test]
    fn parse_empty_slug_variants() {
        assert_eq!(EmptySlugPolicy::parse("").unwrap(), EmptySlugPolicy::Match);
        assert_eq!(EmptySlugPolicy::parse(" Ignore ").unwrap(), EmptySlugPolicy::Ignore);
        assert!(
            EmptySlugPolicy::parse("sometimes")
                .unwrap_err()
                .to_string()
                .contains("unsupported empty slug policy")
        );
    }

    #[test]
    fn explicit_flags_win_over_defaults() {
        let args = StoreArgs {
            fixture: None,
            payload_url: None,
            fallback: Some(FallbackPolicy::None),
            empty_slug: Some(EmptySlugPolicy::Ignore),
            category_limit: 0,
        };
        let config = AuditConfig::from_args(&args).unwrap();
        assert_eq!(config.fallback, FallbackPolicy::None);
        assert_eq!(config.empty_slug, EmptySlugPolicy::Ignore);
        assert_eq!(config.category_limit, 1);
    }

    #[test]
    fn resolve_requires_exactly_one_source() {
        let err = StoreSource::resolve(None, None, None).unwrap_err().to_string();
        assert!(err.contains("no document store configured"));

        let err = StoreSource::resolve(
            Some(PathBuf::from("posts.json")),
            Some("http://localhost:3000"),
            None,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("mutually exclusive"));
    }

    #[test]
    fn resolve_payload_source_drops_blank_api_key() {
        let source =
            StoreSource::resolve(None, Some(" http://cms.local:3000 "), Some("  ".to_owned()))
                .unwrap();
        assert_eq!(
            source,
            StoreSource::Payload {
                base_url: Url::parse("http://cms.local:3000").unwrap(),
                api_key: None,
            }
        );
    }

    #[test]
    fn resolve_rejects_non_http_payload_url() {
        let err = StoreSource::resolve(None, Some("ftp://cms.local"), None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("http/https"));
    }
}
