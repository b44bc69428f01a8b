//! Classifies posts by which relationships they are missing and optionally
//! fills the gaps.
//!
//! A run has two passes. Pass 1 classifies every fetched post and performs no
//! writes. Pass 2 walks the frozen classification and persists suggestions,
//! so the result always describes the content as it was when the run started.

use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AuditConfig;
use crate::model::{Category, Post, PostPatch, PostStatus};
use crate::store::{DocumentStore, FindQuery};
use crate::suggest::{CategorySuggester, suggest_related_posts};

/// Relationship fields are inspected, so posts are fetched populated.
const POST_FETCH_DEPTH: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditOptions {
    pub limit: usize,
    pub include_unpublished: bool,
    pub auto_fix: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Bucket {
    MissingBoth,
    MissingCategories,
    MissingRelatedPosts,
    Complete,
}

impl Bucket {
    pub fn classify(has_categories: bool, has_related_posts: bool) -> Self {
        match (has_categories, has_related_posts) {
            (false, false) => Self::MissingBoth,
            (false, true) => Self::MissingCategories,
            (true, false) => Self::MissingRelatedPosts,
            (true, true) => Self::Complete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            slug: post.slug.clone().unwrap_or_default(),
            title: post.title.clone().unwrap_or_default(),
            published_at: post.published_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingCategoriesEntry {
    #[serde(flatten)]
    pub post: PostSummary,
    pub related_posts_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingRelatedPostsEntry {
    #[serde(flatten)]
    pub post: PostSummary,
    pub categories_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteEntry {
    #[serde(flatten)]
    pub post: PostSummary,
    pub categories_count: usize,
    pub related_posts_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub missing_both: Vec<PostSummary>,
    pub missing_categories: Vec<MissingCategoriesEntry>,
    pub missing_related_posts: Vec<MissingRelatedPostsEntry>,
    pub complete: Vec<CompleteEntry>,
}

impl AuditResult {
    pub fn total(&self) -> usize {
        self.missing_both.len()
            + self.missing_categories.len()
            + self.missing_related_posts.len()
            + self.complete.len()
    }

    pub fn issues(&self) -> usize {
        self.total() - self.complete.len()
    }

    fn record(&mut self, analysis: &PostAnalysis<'_>) {
        let post = PostSummary::from(analysis.post);
        match analysis.bucket {
            Bucket::MissingBoth => self.missing_both.push(post),
            Bucket::MissingCategories => self.missing_categories.push(MissingCategoriesEntry {
                post,
                related_posts_count: analysis.related_posts_count,
            }),
            Bucket::MissingRelatedPosts => {
                self.missing_related_posts.push(MissingRelatedPostsEntry {
                    post,
                    categories_count: analysis.categories_count,
                })
            }
            Bucket::Complete => self.complete.push(CompleteEntry {
                post,
                categories_count: analysis.categories_count,
                related_posts_count: analysis.related_posts_count,
            }),
        }
    }
}

/// Classification of one post, taken before any write of the run.
#[derive(Debug, Clone)]
pub struct PostAnalysis<'a> {
    pub post: &'a Post,
    pub bucket: Bucket,
    pub has_categories: bool,
    pub has_related_posts: bool,
    pub categories_count: usize,
    pub related_posts_count: usize,
}

impl<'a> PostAnalysis<'a> {
    pub fn of(post: &'a Post) -> Self {
        let categories_count = post.category_ids().len();
        let related_posts_count = post.related_post_ids().len();
        let has_categories = categories_count > 0;
        let has_related_posts = related_posts_count > 0;
        Self {
            post,
            bucket: Bucket::classify(has_categories, has_related_posts),
            has_categories,
            has_related_posts,
            categories_count,
            related_posts_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixStats {
    pub attempted: usize,
    pub applied: usize,
    pub failed: usize,
}

pub struct AuditEngine {
    store: Arc<dyn DocumentStore>,
    config: AuditConfig,
}

impl AuditEngine {
    pub fn new(store: Arc<dyn DocumentStore>, config: AuditConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self, options: &AuditOptions) -> anyhow::Result<AuditResult> {
        tracing::info!(
            limit = options.limit,
            include_unpublished = options.include_unpublished,
            auto_fix = options.auto_fix,
            "starting post relationship audit"
        );

        let query = FindQuery {
            status: (!options.include_unpublished).then_some(PostStatus::Published),
            limit: options.limit,
            depth: POST_FETCH_DEPTH,
        };
        let posts = self.store.find_posts(&query).await.context("fetch posts")?;
        tracing::info!(count = posts.len(), "fetched posts to audit");

        let categories = if options.auto_fix {
            self.load_categories().await?
        } else {
            Vec::new()
        };

        let mut result = AuditResult::default();
        let mut analyses = Vec::with_capacity(posts.len());
        for post in &posts {
            let analysis = PostAnalysis::of(post);
            tracing::debug!(
                post_id = %post.id,
                title = post.display_title(),
                categories = analysis.categories_count,
                related_posts = analysis.related_posts_count,
                bucket = ?analysis.bucket,
                "classified post"
            );
            result.record(&analysis);
            analyses.push(analysis);
        }

        if options.auto_fix {
            let stats = self.apply_fixes(&analyses, &posts, &categories).await;
            tracing::info!(
                attempted = stats.attempted,
                applied = stats.applied,
                failed = stats.failed,
                "auto-fix finished"
            );
        }

        tracing::info!(
            missing_both = result.missing_both.len(),
            missing_categories = result.missing_categories.len(),
            missing_related_posts = result.missing_related_posts.len(),
            complete = result.complete.len(),
            "audit complete"
        );
        Ok(result)
    }

    async fn load_categories(&self) -> anyhow::Result<Vec<Category>> {
        let categories = self
            .store
            .find_categories(self.config.category_limit)
            .await
            .context("fetch categories")?;
        if categories.is_empty() {
            tracing::warn!(
                "no categories exist; auto-fix cannot assign categories and will still fix related posts"
            );
        } else {
            let titles: Vec<&str> = categories
                .iter()
                .map(|c| c.title.as_deref().unwrap_or(&c.id))
                .collect();
            tracing::info!(
                count = categories.len(),
                titles = %titles.join(", "),
                "loaded existing categories"
            );
        }
        Ok(categories)
    }

    /// Writes are sequential; a failed write is logged and the run moves on.
    async fn apply_fixes(
        &self,
        analyses: &[PostAnalysis<'_>],
        posts: &[Post],
        categories: &[Category],
    ) -> FixStats {
        tracing::info!("applying auto-fixes");
        let suggester = CategorySuggester::from_config(&self.config);
        let mut stats = FixStats::default();

        for analysis in analyses {
            let post = analysis.post;
            let patch = match analysis.bucket {
                Bucket::MissingBoth => PostPatch {
                    categories: Some(suggester.suggest(post, categories)),
                    related_posts: Some(suggest_related_posts(post, posts)),
                },
                Bucket::MissingCategories => PostPatch {
                    categories: Some(suggester.suggest(post, categories)),
                    related_posts: None,
                },
                Bucket::MissingRelatedPosts => PostPatch {
                    categories: None,
                    related_posts: Some(suggest_related_posts(post, posts)),
                },
                Bucket::Complete => continue,
            };

            stats.attempted += 1;
            match self.store.update_post(&post.id, &patch).await {
                Ok(()) => {
                    stats.applied += 1;
                    tracing::info!(
                        post_id = %post.id,
                        title = post.display_title(),
                        categories = patch.categories.as_ref().map(Vec::len),
                        related_posts = patch.related_posts.as_ref().map(Vec::len),
                        "fixed post relationships"
                    );
                }
                Err(err) => {
                    stats.failed += 1;
                    tracing::error!(
                        post_id = %post.id,
                        title = post.display_title(),
                        ?err,
                        "failed to fix post relationships"
                    );
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::model::Snapshot;
    use crate::relation::relations_from_ids;
    use crate::store::MemoryDocumentStore;

    fn post(id: &str, title: &str, categories: &[&str], related: &[&str]) -> Post {
        Post {
            id: id.to_owned(),
            slug: Some(title.to_lowercase().replace(' ', "-")),
            title: Some(title.to_owned()),
            status: PostStatus::Published,
            categories: relations_from_ids(categories.iter().copied()),
            related_posts: relations_from_ids(related.iter().copied()),
            published_at: None,
        }
    }

    fn category(id: &str, title: &str) -> Category {
        Category {
            id: id.to_owned(),
            title: Some(title.to_owned()),
            slug: Some(title.to_lowercase()),
        }
    }

    fn options(auto_fix: bool) -> AuditOptions {
        AuditOptions {
            limit: 50,
            include_unpublished: false,
            auto_fix,
        }
    }

    /// Wraps the memory store, records updates and fails the ones it is told to.
    struct RecordingStore {
        inner: MemoryDocumentStore,
        fail_ids: HashSet<String>,
        fail_fetch: bool,
        updates: Mutex<Vec<(String, PostPatch)>>,
    }

    impl RecordingStore {
        fn new(snapshot: Snapshot) -> Self {
            Self {
                inner: MemoryDocumentStore::new(snapshot),
                fail_ids: HashSet::new(),
                fail_fetch: false,
                updates: Mutex::new(Vec::new()),
            }
        }

        fn updates(&self) -> Vec<(String, PostPatch)> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn find_posts(&self, query: &FindQuery) -> anyhow::Result<Vec<Post>> {
            if self.fail_fetch {
                anyhow::bail!("connection refused");
            }
            self.inner.find_posts(query).await
        }

        async fn find_categories(&self, limit: usize) -> anyhow::Result<Vec<Category>> {
            self.inner.find_categories(limit).await
        }

        async fn update_post(&self, id: &str, patch: &PostPatch) -> anyhow::Result<()> {
            self.updates
                .lock()
                .unwrap()
                .push((id.to_owned(), patch.clone()));
            if self.fail_ids.contains(id) {
                anyhow::bail!("validation failed for {id}");
            }
            self.inner.update_post(id, patch).await
        }
    }

    fn five_posts() -> Snapshot {
        Snapshot {
            posts: vec![
                post("p1", "AI Trends 2024", &[], &[]),
                post("p2", "Cooking basics", &[], &["p1"]),
                post("p3", "Rust tips", &["c2"], &[]),
                post("p4", "Rust async", &["c2"], &["p3"]),
                post("p5", "Weekly notes", &["c2"], &["p4", "p3"]),
            ],
            categories: vec![category("c1", "AI"), category("c2", "Rust")],
        }
    }

    #[tokio::test]
    async fn every_post_lands_in_exactly_one_bucket() -> anyhow::Result<()> {
        let store = Arc::new(RecordingStore::new(five_posts()));
        let engine = AuditEngine::new(store.clone(), AuditConfig::default());
        let result = engine.run(&options(false)).await?;

        assert_eq!(result.total(), 5);
        assert_eq!(result.missing_both[0].id, "p1");
        assert_eq!(result.missing_categories[0].post.id, "p2");
        assert_eq!(result.missing_categories[0].related_posts_count, 1);
        assert_eq!(result.missing_related_posts[0].post.id, "p3");
        assert_eq!(result.missing_related_posts[0].categories_count, 1);
        let complete: Vec<&str> = result.complete.iter().map(|e| e.post.id.as_str()).collect();
        assert_eq!(complete, vec!["p4", "p5"]);
        assert_eq!(result.issues(), 3);

        let mut seen: Vec<&str> = result
            .missing_both
            .iter()
            .map(|p| p.id.as_str())
            .chain(result.missing_categories.iter().map(|e| e.post.id.as_str()))
            .chain(result.missing_related_posts.iter().map(|e| e.post.id.as_str()))
            .chain(complete.iter().copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec!["p1", "p2", "p3", "p4", "p5"]);
        Ok(())
    }

    #[tokio::test]
    async fn read_only_run_never_writes_and_is_repeatable() -> anyhow::Result<()> {
        let store = Arc::new(RecordingStore::new(five_posts()));
        let engine = AuditEngine::new(store.clone(), AuditConfig::default());

        let first = engine.run(&options(false)).await?;
        let second = engine.run(&options(false)).await?;
        assert_eq!(first, second);
        assert!(store.updates().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn auto_fix_reports_starting_state_and_patches_by_bucket() -> anyhow::Result<()> {
        let store = Arc::new(RecordingStore::new(five_posts()));
        let engine = AuditEngine::new(store.clone(), AuditConfig::default());

        let result = engine.run(&options(true)).await?;
        assert_eq!(result.missing_both.len(), 1);
        assert_eq!(result.complete.len(), 2);

        let updates = store.updates();
        let ids: Vec<&str> = updates.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);

        let (_, both) = &updates[0];
        assert_eq!(both.categories.as_deref(), Some(&["c1".to_owned()][..]));
        assert_eq!(both.related_posts.as_ref().map(Vec::len), Some(3));

        let (_, cats_only) = &updates[1];
        assert!(cats_only.categories.is_some());
        assert!(cats_only.related_posts.is_none());

        let (_, related_only) = &updates[2];
        assert!(related_only.categories.is_none());
        assert_eq!(
            related_only.related_posts.as_deref(),
            Some(&["p4".to_owned(), "p5".to_owned()][..])
        );

        let after = engine.run(&options(false)).await?;
        assert_eq!(after.complete.len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn classification_ignores_writes_made_earlier_in_the_run() -> anyhow::Result<()> {
        // p2 is fixed with related post p1 only after p1 was classified.
        let store = Arc::new(RecordingStore::new(Snapshot {
            posts: vec![
                post("p1", "First", &["c1"], &[]),
                post("p2", "Second", &["c1"], &[]),
            ],
            categories: vec![category("c1", "General")],
        }));
        let engine = AuditEngine::new(store.clone(), AuditConfig::default());
        let result = engine.run(&options(true)).await?;
        assert_eq!(result.missing_related_posts.len(), 2);
        assert!(result.complete.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_update_does_not_abort_the_run() -> anyhow::Result<()> {
        let mut store = RecordingStore::new(five_posts());
        store.fail_ids.insert("p1".to_owned());
        let store = Arc::new(store);
        let engine = AuditEngine::new(store.clone(), AuditConfig::default());

        let result = engine.run(&options(true)).await?;
        assert_eq!(result.missing_both[0].id, "p1");
        assert_eq!(store.updates().len(), 3);

        let after = engine.run(&options(false)).await?;
        assert_eq!(after.missing_both.len(), 1);
        assert_eq!(after.complete.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn empty_category_collection_still_writes_empty_suggestions() -> anyhow::Result<()> {
        let mut snapshot = five_posts();
        snapshot.categories.clear();
        let store = Arc::new(RecordingStore::new(snapshot));
        let engine = AuditEngine::new(store.clone(), AuditConfig::default());

        engine.run(&options(true)).await?;
        let updates = store.updates();
        assert_eq!(updates[0].1.categories, Some(Vec::new()));
        assert_eq!(updates[1].1.categories, Some(Vec::new()));
        Ok(())
    }

    #[tokio::test]
    async fn empty_store_yields_empty_result() -> anyhow::Result<()> {
        let store = Arc::new(RecordingStore::new(Snapshot::default()));
        let engine = AuditEngine::new(store, AuditConfig::default());
        let result = engine.run(&options(true)).await?;
        assert_eq!(result, AuditResult::default());
        Ok(())
    }

    #[tokio::test]
    async fn drafts_are_skipped_unless_requested() -> anyhow::Result<()> {
        let mut snapshot = five_posts();
        snapshot.posts[0].status = PostStatus::Draft;
        let store = Arc::new(RecordingStore::new(snapshot));
        let engine = AuditEngine::new(store, AuditConfig::default());

        assert_eq!(engine.run(&options(false)).await?.total(), 4);
        let all = AuditOptions {
            include_unpublished: true,
            ..options(false)
        };
        assert_eq!(engine.run(&all).await?.total(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn fetch_failure_propagates() {
        let mut store = RecordingStore::new(five_posts());
        store.fail_fetch = true;
        let engine = AuditEngine::new(Arc::new(store), AuditConfig::default());
        let err = engine.run(&options(true)).await.unwrap_err();
        assert!(format!("{err:#}").contains("fetch posts"));
    }
}
